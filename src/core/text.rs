//! Character classification and small string utilities shared by the
//! normaliser and the reduction engine.

/// Characters that separate operands: the four binary operator priority
/// classes, comma (argument separator) and the two parenthesis characters.
pub fn is_special(c: char) -> bool {
    matches!(
        c,
        '%' | '^' | '*' | '/' | '+' | '-' | ',' | '(' | ')' | '!' | '=' | '<' | '>'
    )
}

/// Characters legal inside an identifier (variable/function name) once the
/// source has been normalised: letters, digits, underscore, and the select
/// few unicode symbols the built-in roster uses as names (`√`, `Σ`, `π`,
/// `Π`).
pub fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || matches!(c, '√' | 'Σ' | 'π' | 'Π' | '∫')
}

/// Priority of a binary operator character, highest binds tightest.
/// `None` for anything that isn't one of the four operator classes.
pub fn operator_priority(c: char) -> Option<u8> {
    match c {
        '%' => Some(3),
        '^' => Some(2),
        '*' | '/' => Some(1),
        '+' | '-' => Some(0),
        _ => None,
    }
}

/// Strips a single layer of balanced, redundant outer parentheses, e.g.
/// `(2+3)` becomes `2+3`, but `(2+3)*(4+5)` is left untouched since the
/// parens there don't wrap the *whole* expression.
pub fn strip_redundant_outer_parens(s: &str) -> &str {
    let mut cur = s;
    loop {
        let bytes = cur.as_bytes();
        if bytes.first() != Some(&b'(') || bytes.last() != Some(&b')') {
            return cur;
        }
        let mut depth = 0i32;
        let mut wraps_whole = true;
        for (i, c) in cur.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 && i != cur.len() - 1 {
                        wraps_whole = false;
                        break;
                    }
                }
                _ => {}
            }
        }
        if wraps_whole && cur.len() >= 2 {
            cur = &cur[1..cur.len() - 1];
        } else {
            return cur;
        }
    }
}

/// Finds the innermost balanced parenthesis pair: the first `)` encountered
/// scanning left to right, paired with the nearest unmatched `(` before it.
/// Returns byte offsets `(open, close)` pointing at the parenthesis
/// characters themselves.
pub fn find_innermost_parens(s: &str) -> Option<(usize, usize)> {
    let mut stack = Vec::new();
    for (i, c) in s.char_indices() {
        match c {
            '(' => stack.push(i),
            ')' => {
                let open = stack.pop()?;
                return Some((open, i));
            }
            _ => {}
        }
    }
    if stack.is_empty() {
        None
    } else {
        // An opening paren with no matching close: unbalanced, signalled by
        // returning it paired with itself so the caller can detect it.
        Some((stack[0], stack[0]))
    }
}

/// Walks backward from `pos` (exclusive) over identifier/digit characters,
/// returning the byte offset where the contiguous word begins.
pub fn word_start_before(s: &str, pos: usize) -> usize {
    let mut start = pos;
    for (i, c) in s[..pos].char_indices().rev() {
        if is_identifier_char(c) {
            start = i;
        } else {
            break;
        }
    }
    start
}

/// Splits a word into its leading run of ASCII digits and the remainder,
/// e.g. `"2f"` -> `("2", "f")`, `"x1"` -> `("", "x1")`.
pub fn split_leading_digits(word: &str) -> (&str, &str) {
    let split_at = word
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(word.len());
    word.split_at(split_at)
}

/// True if the adjoining character (on either side of a rewritten span)
/// requires an implicit multiplication sign to be inserted.
pub fn needs_implicit_mul(c: Option<char>) -> bool {
    match c {
        None => false,
        Some(c) => !is_special(c),
    }
}

/// Recognises a parametric function name: a known family prefix followed
/// by a trailing integer baked into the name, e.g. `log2` -> `("log", 2)`,
/// `radical3` -> `("radical", 3)`, `√4` -> `("radical", 4)`.
pub fn parse_parametric_name(name: &str) -> Option<(&'static str, f64)> {
    for (prefix, family) in [("log", "log"), ("radical", "radical"), ("√", "radical")] {
        if let Some(rest) = name.strip_prefix(prefix) {
            if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
                return rest.parse::<f64>().ok().map(|n| (family, n));
            }
        }
    }
    None
}
