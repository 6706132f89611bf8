//! Source normalisation: the single rewrite pass that runs once at the top
//! of every `Session::parse` (and again whenever a stored variable's source
//! expression is resolved). Everything here is a string-to-string rewrite;
//! none of it touches the session's tables.

use crate::core::text::{is_identifier_char, word_start_before};

/// Runs the full normalisation pipeline: whitespace strip, degree/radian
/// suffix handling, multi-radix literal folding, scientific notation
/// folding, then the postfix-factorial rewrite.
///
/// `has_variable` lets the degree/radian suffix rewrite back off when the
/// session already has a same-named variable shadowing the suffix word.
pub fn normalize(source: &str, has_variable: &dyn Fn(&str) -> bool) -> String {
    let stripped = strip_whitespace(source);
    let radix_folded = fold_radix_literals(&stripped);
    let sci_folded = fold_scientific_notation(&radix_folded);
    let deg_folded = fold_degree_suffix(&sci_folded, has_variable);
    let rad_stripped = strip_radian_suffix(&deg_folded, has_variable);
    fold_factorial(&rad_stripped)
}

fn strip_whitespace(source: &str) -> String {
    source.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Folds `0b`/`0o`/`0x` integer literals into plain decimal digit runs.
fn fold_radix_literals(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let prefix_ok = c == '0'
            && i + 1 < chars.len()
            && matches!(chars[i + 1].to_ascii_lowercase(), 'b' | 'o' | 'x');
        if prefix_ok {
            let radix = match chars[i + 1].to_ascii_lowercase() {
                'b' => 2,
                'o' => 8,
                _ => 16,
            };
            let digits_start = i + 2;
            let mut j = digits_start;
            while j < chars.len() && chars[j].is_digit(radix) {
                j += 1;
            }
            if j > digits_start {
                let digits: String = chars[digits_start..j].iter().collect();
                if let Ok(value) = i64::from_str_radix(&digits, radix) {
                    out.push_str(&value.to_string());
                    i = j;
                    continue;
                }
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Folds `\d+(\.\d+)?[eE][+-]?\d+` scientific notation into a plain decimal.
fn fold_scientific_notation(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let start = i;
            let mut j = i;
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            if j < chars.len() && chars[j] == '.' && j + 1 < chars.len() && chars[j + 1].is_ascii_digit() {
                j += 1;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
            }
            if j < chars.len() && matches!(chars[j], 'e' | 'E') {
                let mut k = j + 1;
                if k < chars.len() && matches!(chars[k], '+' | '-') {
                    k += 1;
                }
                let exp_start = k;
                while k < chars.len() && chars[k].is_ascii_digit() {
                    k += 1;
                }
                if k > exp_start {
                    let literal: String = chars[start..k].iter().collect();
                    if let Ok(value) = literal.parse::<f64>() {
                        out.push_str(&format!("{}", value));
                        i = k;
                        continue;
                    }
                }
            }
            let run: String = chars[start..j].iter().collect();
            out.push_str(&run);
            i = j;
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Wraps a numeric/paren operand followed by `deg`, `degrees` or `°` in a
/// call to the hidden `__deg2rad` conversion built-in, unless the session
/// shadows the suffix word with a variable of the same name.
fn fold_degree_suffix(s: &str, has_variable: &dyn Fn(&str) -> bool) -> String {
    const SUFFIXES: &[&str] = &["degrees", "degree", "deg", "°"];
    let mut s = s.to_string();
    let mut search_from = 0;
    'outer: loop {
        for suffix in SUFFIXES {
            if *suffix != "°" && has_variable(suffix) {
                continue;
            }
            if let Some(rel) = s[search_from..].find(suffix) {
                let pos = search_from + rel;
                let end = pos + suffix.len();
                let followed_by_ident = s[end..]
                    .chars()
                    .next()
                    .map(is_identifier_char)
                    .unwrap_or(false);
                let preceded_by_operand = pos > 0;
                if followed_by_ident || !preceded_by_operand || glued_to_alpha_identifier(&s, pos)
                {
                    search_from = end;
                    continue 'outer;
                }
                let operand_start = operand_span_before(&s, pos);
                if operand_start == pos {
                    search_from = end;
                    continue 'outer;
                }
                let operand = s[operand_start..pos].to_string();
                let replacement = format!("__deg2rad({})", operand);
                let new_end = operand_start + replacement.len();
                s.replace_range(operand_start..end, &replacement);
                search_from = new_end;
                continue 'outer;
            }
        }
        break;
    }
    s
}

/// Strips a trailing `rad`/`radian`/`radians` suffix in place (no
/// conversion needed, the value is already in radians).
fn strip_radian_suffix(s: &str, has_variable: &dyn Fn(&str) -> bool) -> String {
    const SUFFIXES: &[&str] = &["radians", "radian", "rad"];
    let mut s = s.to_string();
    let mut search_from = 0;
    'outer: loop {
        for suffix in SUFFIXES {
            if has_variable(suffix) {
                continue;
            }
            if let Some(rel) = s[search_from..].find(suffix) {
                let pos = search_from + rel;
                let end = pos + suffix.len();
                let followed_by_ident = s[end..]
                    .chars()
                    .next()
                    .map(is_identifier_char)
                    .unwrap_or(false);
                if followed_by_ident || pos == 0 || glued_to_alpha_identifier(&s, pos) {
                    search_from = end;
                    continue 'outer;
                }
                s.replace_range(pos..end, "");
                search_from = pos;
                continue 'outer;
            }
        }
        break;
    }
    s
}

/// True if the identifier/digit run immediately before `pos` contains a
/// letter, meaning `pos` sits mid-word (e.g. the `rad` inside a freshly
/// folded `__deg2rad`) rather than right after a numeric/parenthesised
/// operand a suffix can legitimately attach to.
fn glued_to_alpha_identifier(s: &str, pos: usize) -> bool {
    let start = word_start_before(s, pos);
    s[start..pos].chars().any(|c| c.is_alphabetic())
}

/// Finds the start of the operand immediately before `pos`: a balanced
/// parenthesis group (plus any function name prefixing it), or a run of
/// identifier/digit characters.
fn operand_span_before(s: &str, pos: usize) -> usize {
    if pos > 0 && s.as_bytes()[pos - 1] == b')' {
        let close = pos - 1;
        let mut depth = 0i32;
        let mut open = None;
        for (i, c) in s[..=close].char_indices().rev() {
            match c {
                ')' => depth += 1,
                '(' => {
                    depth -= 1;
                    if depth == 0 {
                        open = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let open = open.unwrap_or(close);
        word_start_before(s, open)
    } else {
        word_start_before(s, pos)
    }
}

/// Rewrites postfix `!` into `factorial(...)` calls, left to right. Skips
/// `!=` so the not-equal comparator used inside `if(...)` conditions
/// survives untouched.
fn fold_factorial(s: &str) -> String {
    let mut s = s.to_string();
    let mut search_from = 0;
    while let Some(rel) = s[search_from..].find('!') {
        let bang_idx = search_from + rel;
        if s.as_bytes().get(bang_idx + 1) == Some(&b'=') {
            search_from = bang_idx + 2;
            continue;
        }
        let operand_start = operand_span_before(&s, bang_idx);
        if operand_start == bang_idx {
            search_from = bang_idx + 1;
            continue;
        }
        let operand = s[operand_start..bang_idx].to_string();
        let replacement = format!("factorial({})", operand);
        let new_end = operand_start + replacement.len();
        s.replace_range(operand_start..=bang_idx, &replacement);
        search_from = new_end;
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_vars(_: &str) -> bool {
        false
    }

    #[test]
    fn strips_whitespace() {
        assert_eq!(normalize(" 2 + 3 ", &no_vars), "2+3");
    }

    #[test]
    fn folds_hex_and_octal_and_binary() {
        assert_eq!(normalize("(0xFF)", &no_vars), "(255)");
        assert_eq!(normalize("(0o777)", &no_vars), "(511)");
        assert_eq!(normalize("(0b100)", &no_vars), "(4)");
    }

    #[test]
    fn folds_scientific_notation() {
        assert_eq!(normalize("1.5e2", &no_vars), "150");
    }

    #[test]
    fn folds_degree_suffix() {
        assert_eq!(normalize("45deg", &no_vars), "__deg2rad(45)");
        assert_eq!(normalize("(2+3)°", &no_vars), "__deg2rad((2+3))");
    }

    #[test]
    fn shadowed_degree_suffix_is_left_alone() {
        let has_deg = |name: &str| name == "deg";
        assert_eq!(normalize("45deg", &has_deg), "45deg");
    }

    #[test]
    fn strips_radian_suffix() {
        assert_eq!(normalize("1.5rad", &no_vars), "1.5");
    }

    #[test]
    fn folds_factorial() {
        assert_eq!(normalize("5!", &no_vars), "factorial(5)");
        assert_eq!(normalize("(2+3)!", &no_vars), "factorial((2+3))");
    }

    #[test]
    fn leaves_not_equal_alone() {
        assert_eq!(normalize("x!=2", &no_vars), "x!=2");
    }
}
