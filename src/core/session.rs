//! The evaluation session: variable/function tables plus the reduction
//! engine that turns a normalised source string into an `f64`.
//!
//! The engine is three mutually recursive passes, run in this order every
//! time a parenthesis-free fragment needs a value:
//!
//! 1. [`Session::evaluate_source`] — the innermost-parenthesis loop. Finds
//!    the first closing paren, pairs it with its nearest open, detects a
//!    preceding function name, and replaces the whole match with a
//!    synthetic `__tmp{N}` binding.
//! 2. [`Session::reduce_precedence`] — once a fragment has no parens left,
//!    brackets the leftmost highest-priority operator with its immediate
//!    operands and hands the rewritten string back to pass 1.
//! 3. [`Session::linear_eval`] — once a fragment carries a single operator
//!    priority, walks it left to right accumulating a result.

use crate::core::builtins::register_builtins;
use crate::core::error_types::{EvalError, InterpreterError, ParseError, Suggestion};
use crate::core::function_registry::{ArgValue, FunctionEntry, FunctionRegistry, ParamKind};
use crate::core::normalizer::normalize;
use crate::core::text::{
    find_innermost_parens, needs_implicit_mul, operator_priority, parse_parametric_name,
    split_leading_digits, strip_redundant_outer_parens, word_start_before,
};
use std::collections::HashMap;
use std::rc::Rc;

/// A named, lazily-resolved user variable.
#[derive(Clone)]
struct VariableBinding {
    name: String,
    /// Present when the value hasn't been computed yet.
    source: Option<String>,
    /// Present once resolved (or when bound directly, e.g. a function
    /// parameter or a higher-order built-in's bound variable).
    cached: Option<f64>,
}

/// The value behind a synthetic `__tmp{N}` inner binding.
#[derive(Clone)]
enum InnerValue {
    /// Already evaluated.
    Number(f64),
    /// A plain parenthesised grouping, held as unevaluated source text.
    /// Resolved lazily so a group nested in a branch an enclosing `if`
    /// never takes doesn't get evaluated at all.
    Deferred(String),
    /// A resolved function call, held unevaluated (with any already-known
    /// arguments baked in) until something actually forces this temporary's
    /// value. This is what lets `if`'s untaken branch, or any call nested
    /// in it, skip execution entirely rather than merely skip its result.
    Call {
        entry: Rc<FunctionEntry>,
        args: Vec<ArgValue>,
    },
}

/// An interactive evaluation session: variable/function tables, the
/// built-in registry, rounding policy, and the reduction engine.
#[derive(Clone)]
pub struct Session {
    user_variables: Vec<VariableBinding>,
    registry: FunctionRegistry,
    inner_variables: HashMap<String, InnerValue>,
    temp_counter: u64,
    round_enabled: bool,
    round_scale: i32,
}

impl Session {
    /// Creates a session with the built-in function library and the
    /// mathematical constants (`e`, `pi`/`π`/`Π`) already registered.
    pub fn create() -> Self {
        let mut registry = FunctionRegistry::new();
        register_builtins(&mut registry);
        let mut session = Self {
            user_variables: Vec::new(),
            registry,
            inner_variables: HashMap::new(),
            temp_counter: 0,
            round_enabled: true,
            round_scale: 6,
        };
        session.register_constants();
        session
    }

    fn register_constants(&mut self) {
        self.inner_variables
            .insert("e".to_string(), InnerValue::Number(std::f64::consts::E));
        for name in ["pi", "π", "Π"] {
            self.inner_variables
                .insert(name.to_string(), InnerValue::Number(std::f64::consts::PI));
        }
    }

    /// Declares or redeclares a user variable from its defining source
    /// expression. Resolution is deferred to first use.
    pub fn add_variable(&mut self, name: &str, expr: &str) {
        let lowered = name.to_lowercase();
        let binding = VariableBinding {
            name: lowered.clone(),
            source: Some(expr.to_string()),
            cached: None,
        };
        match self.user_variables.iter_mut().find(|v| v.name == lowered) {
            Some(slot) => *slot = binding,
            None => self.user_variables.push(binding),
        }
    }

    /// Declares or redeclares a user-defined function.
    pub fn add_function(&mut self, name: &str, params: Vec<String>, body: &str) {
        let normalized_body = normalize(body, &|n| self.has_variable(n) || params.iter().any(|p| p == n));
        self.registry.register_user(name, params, normalized_body);
    }

    /// Declares several functions at once.
    pub fn add_functions(&mut self, defs: &[(&str, Vec<String>, &str)]) {
        for (name, params, body) in defs {
            self.add_function(name, params.clone(), body);
        }
    }

    /// Classifies a line of input as a variable declaration (`name = expr`),
    /// a function declaration (`name(params) = body`), or a bare query
    /// expression, and routes it accordingly. Returns the evaluated value
    /// for queries, `None` for declarations.
    pub fn add_expression(&mut self, line: &str) -> Result<Option<f64>, InterpreterError> {
        let trimmed = line.trim();
        if let Some(eq) = top_level_assignment(trimmed) {
            let (lhs, rhs) = (trimmed[..eq].trim(), trimmed[eq + 1..].trim());
            if let Some(open) = lhs.find('(') {
                if lhs.ends_with(')') {
                    let name = lhs[..open].trim();
                    let params: Vec<String> = lhs[open + 1..lhs.len() - 1]
                        .split(',')
                        .map(|p| p.trim().to_lowercase())
                        .filter(|p| !p.is_empty())
                        .collect();
                    self.add_function(name, params, rhs);
                    return Ok(None);
                }
            }
            self.add_variable(lhs, rhs);
            return Ok(None);
        }
        self.parse(trimmed).map(Some)
    }

    /// Evaluates a top-level expression: normalises it, runs the
    /// reduction engine, and applies the rounding policy to the result.
    pub fn parse(&mut self, expr: &str) -> Result<f64, InterpreterError> {
        self.temp_counter = 0;
        self.inner_variables.clear();
        self.register_constants();
        let normalized = normalize(expr, &|n| self.has_variable(n));
        let value = self.evaluate_source(&normalized, true)?;
        Ok(self.apply_rounding(value))
    }

    /// Clears session state. `deep = false` resets only the per-parse
    /// inner (temporary + constant) state; `deep = true` additionally
    /// clears user variables and functions.
    pub fn reset(&mut self, deep: bool) {
        self.temp_counter = 0;
        self.inner_variables.clear();
        self.register_constants();
        if deep {
            self.user_variables.clear();
            self.registry = FunctionRegistry::new();
            register_builtins(&mut self.registry);
        }
    }

    /// Enables or disables result rounding.
    pub fn set_round_enabled(&mut self, enabled: bool) {
        self.round_enabled = enabled;
    }

    /// Sets the number of decimal places results are rounded to.
    pub fn set_round_scale(&mut self, scale: i32) {
        self.round_scale = scale;
    }

    /// Lists the names of declared user variables, for a `vars()`-style
    /// front-end command.
    pub fn variable_names(&self) -> Vec<String> {
        self.user_variables.iter().map(|v| v.name.clone()).collect()
    }

    fn has_variable(&self, name: &str) -> bool {
        let lowered = name.to_lowercase();
        self.user_variables.iter().any(|v| v.name == lowered)
    }

    fn apply_rounding(&self, value: f64) -> f64 {
        if !self.round_enabled || !value.is_finite() {
            return value;
        }
        let factor = 10f64.powi(self.round_scale);
        (value * factor).round() / factor
    }

    // -- bound-variable injection, used by user functions and by
    // higher-order built-ins (sigma/integral/derivative/limit) --------

    fn bind_variable(&mut self, name: &str, value: f64) {
        let lowered = name.to_lowercase();
        let binding = VariableBinding {
            name: lowered.clone(),
            source: None,
            cached: Some(value),
        };
        match self.user_variables.iter_mut().find(|v| v.name == lowered) {
            Some(slot) => *slot = binding,
            None => self.user_variables.push(binding),
        }
    }

    /// Clones the session, injects `name = value` as a user variable in
    /// the clone, and evaluates `body` inside it. The clone is discarded
    /// afterward; nothing leaks back to `self`. This is how `sigma`,
    /// `integral`, `derivative` and `limit` sample their body expression,
    /// and how a user-defined function call binds its parameters.
    pub(crate) fn call_with_bindings(
        &self,
        bindings: &[(&str, f64)],
        body: &str,
        allow_recovery: bool,
    ) -> Result<f64, InterpreterError> {
        let mut clone = self.clone();
        for (name, value) in bindings {
            clone.bind_variable(name, *value);
        }
        clone.evaluate_source(body, allow_recovery)
    }

    // -- the reduction engine -------------------------------------------

    fn err(&self, kind: impl Into<EvalError>, source: &str) -> InterpreterError {
        let error = InterpreterError::new(kind, source);
        log::error!("{}", error.kind);
        error
    }

    fn new_temp_name(&mut self) -> String {
        self.temp_counter += 1;
        format!("__tmp{}", self.temp_counter)
    }

    /// Innermost-parenthesis reduction (component 4.2). Unwraps redundant
    /// outer parens, then repeatedly finds the innermost pair, resolves it
    /// to a function call or a plain grouping, and substitutes a fresh
    /// temporary name until no parens remain; hands the flat remainder to
    /// the operator-precedence reducer.
    pub(crate) fn evaluate_source(
        &mut self,
        source: &str,
        allow_recovery: bool,
    ) -> Result<f64, InterpreterError> {
        let mut s = strip_redundant_outer_parens(source).to_string();
        loop {
            let (open, close) = match find_innermost_parens(&s) {
                None => break,
                Some(pair) => pair,
            };
            if open == close {
                return Err(self.err(ParseError::UnbalancedParentheses, &s));
            }
            s = self.reduce_one_paren_group(&s, open, close, allow_recovery)?;
        }
        if s.is_empty() {
            return Err(self.err(ParseError::EmptyExpression, source));
        }
        self.reduce_precedence(&s, allow_recovery)
    }

    fn reduce_one_paren_group(
        &mut self,
        s: &str,
        open: usize,
        close: usize,
        allow_recovery: bool,
    ) -> Result<String, InterpreterError> {
        let inner = s[open + 1..close].to_string();
        let args_text: Vec<String> = if inner.is_empty() {
            Vec::new()
        } else {
            inner.split(',').map(|a| a.trim().to_string()).collect()
        };
        let word_start = word_start_before(s, open);
        let word = &s[word_start..open];
        let (digits, name) = split_leading_digits(word);
        let name_start = word_start + digits.len();
        let temp_name = self.new_temp_name();

        // A parametric name (`log2`, `radical3`, `√4`) dispatches to its
        // family's native overload with the baked-in integer supplied as
        // an extra argument.
        let parametric = if !self.registry.contains(name) {
            parse_parametric_name(name).filter(|(family, _)| self.registry.contains(family))
        } else {
            None
        };
        if let Some((family, n)) = parametric {
            let entry = self
                .registry
                .resolve(family, args_text.len() + 1)
                .expect("contains() guarantees at least one overload");
            let mut args = Vec::with_capacity(args_text.len() + 1);
            if family == "radical" {
                args.push(ArgValue::Number(n));
            }
            for text in &args_text {
                match self.evaluate_source(text, true) {
                    Ok(v) => args.push(ArgValue::Number(v)),
                    Err(e) if allow_recovery && e.is_variable_not_found() => {
                        log::warn!(
                            "deferring '{}' as {}: {}",
                            text,
                            temp_name,
                            e.kind
                        );
                        args.push(ArgValue::Deferred(text.clone()));
                    }
                    Err(e) => return Err(e),
                }
            }
            if family == "log" {
                args.push(ArgValue::Number(n));
            }
            self.inner_variables
                .insert(temp_name.clone(), InnerValue::Call { entry, args });
            return Ok(splice_temp(s, name_start, close, &temp_name));
        }

        if name.is_empty() || !self.registry.contains(name) {
            if args_text.len() > 1 {
                return Err(self.err(ParseError::FunctionNotFound(name.to_string()), s));
            }
            let content = args_text.into_iter().next().unwrap_or_default();
            self.inner_variables
                .insert(temp_name.clone(), InnerValue::Deferred(content));
            // The word (a plain variable name, or a leading numeric
            // coefficient) stays untouched before `open`; only the
            // parenthesised group itself is replaced.
            return Ok(splice_temp(s, open, close, &temp_name));
        }

        let entry = self
            .registry
            .resolve(name, args_text.len())
            .expect("contains() guarantees at least one overload");
        if !entry.arity.accepts(args_text.len()) {
            return Err(self.err(
                EvalError::FunctionInvalidArguments {
                    name: name.to_string(),
                    got: args_text.len(),
                },
                s,
            ));
        }

        let mut args = Vec::with_capacity(args_text.len());
        for (i, text) in args_text.iter().enumerate() {
            match entry.param_kind(i) {
                ParamKind::Special => args.push(ArgValue::Special(text.clone())),
                ParamKind::Numeric => match self.evaluate_source(text, true) {
                    Ok(v) => args.push(ArgValue::Number(v)),
                    Err(e) if allow_recovery && e.is_variable_not_found() => {
                        log::warn!(
                            "deferring '{}' as {}: {}",
                            text,
                            temp_name,
                            e.kind
                        );
                        args.push(ArgValue::Deferred(text.clone()));
                    }
                    Err(e) => return Err(e),
                },
            }
        }

        log::debug!("{} := {}({:?})", temp_name, name, args_text);
        self.inner_variables.insert(
            temp_name.clone(),
            InnerValue::Call {
                entry: entry.clone(),
                args,
            },
        );
        Ok(splice_temp(s, name_start, close, &temp_name))
    }

    /// Invokes a resolved function overload. User-defined functions bind
    /// each parameter into a fresh clone; native functions receive `self`
    /// directly so higher-order built-ins can clone it themselves.
    fn invoke(
        &mut self,
        entry: &FunctionEntry,
        args: &[ArgValue],
    ) -> Result<f64, InterpreterError> {
        log::debug!("dispatching '{}' with {} argument(s)", entry.name, args.len());
        match &entry.kind {
            crate::core::function_registry::FunctionKind::Native(f) => f(self, args),
            crate::core::function_registry::FunctionKind::UserDefined { params, body } => {
                let bindings: Vec<(&str, f64)> = params
                    .iter()
                    .zip(args.iter())
                    .map(|(p, a)| (p.as_str(), a.number()))
                    .collect();
                self.call_with_bindings(&bindings, body, true)
            }
        }
    }

    fn force_inner(&mut self, name: &str, allow_recovery: bool) -> Result<f64, InterpreterError> {
        let value = match self.inner_variables.get(name) {
            Some(v) => v.clone(),
            None => unreachable!("force_inner called on an unknown temporary"),
        };
        let resolved = match value {
            InnerValue::Number(v) => v,
            InnerValue::Deferred(text) => self.evaluate_source(&text, allow_recovery)?,
            InnerValue::Call { entry, mut args } => {
                for arg in args.iter_mut() {
                    if let ArgValue::Deferred(text) = arg {
                        let v = self.evaluate_source(text, allow_recovery)?;
                        *arg = ArgValue::Number(v);
                    }
                }
                self.invoke(&entry, &args)?
            }
        };
        self.inner_variables
            .insert(name.to_string(), InnerValue::Number(resolved));
        Ok(resolved)
    }

    fn resolve_user_variable(&mut self, index: usize) -> Result<f64, InterpreterError> {
        if let Some(v) = self.user_variables[index].cached {
            return Ok(v);
        }
        let source = self.user_variables[index]
            .source
            .clone()
            .expect("unresolved variable must carry source text");
        let normalized = normalize(&source, &|n| self.has_variable(n));
        let value = self.evaluate_source(&normalized, true)?;
        self.user_variables[index].cached = Some(value);
        Ok(value)
    }

    fn lookup_known_variable(
        &mut self,
        name: &str,
        allow_recovery: bool,
    ) -> Result<Option<f64>, InterpreterError> {
        let lowered = name.to_lowercase();
        if let Some(idx) = self.user_variables.iter().position(|v| v.name == lowered) {
            return Ok(Some(self.resolve_user_variable(idx)?));
        }
        if self.inner_variables.contains_key(&lowered) {
            return Ok(Some(self.force_inner(&lowered, allow_recovery)?));
        }
        Ok(None)
    }

    fn is_known_variable_name(&self, name: &str) -> bool {
        let lowered = name.to_lowercase();
        self.user_variables.iter().any(|v| v.name == lowered)
            || self.inner_variables.contains_key(&lowered)
    }

    fn suggest(&self, name: &str) -> Option<Suggestion> {
        let mut best: Option<Suggestion> = None;
        for v in &self.user_variables {
            let distance = strsim::levenshtein(name, &v.name);
            let max_len = name.chars().count().max(v.name.chars().count());
            if max_len == 0 {
                continue;
            }
            let score = (max_len as f64 - distance as f64) / max_len as f64;
            if score > 0.0 && best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(Suggestion {
                    name: v.name.clone(),
                    score,
                });
            }
        }
        best
    }

    /// Resolves a single operand token: a numeric literal, a known
    /// variable, or (failing both) a greedy identifier split.
    fn resolve_operand(&mut self, token: &str, allow_recovery: bool) -> Result<f64, InterpreterError> {
        if token.is_empty() {
            return Ok(0.0);
        }
        if let Ok(n) = token.parse::<f64>() {
            return Ok(n);
        }
        if let Some(v) = self.lookup_known_variable(token, allow_recovery)? {
            return Ok(v);
        }
        self.split_identifier(token, allow_recovery)
    }

    /// Peels a leading numeric coefficient, then greedily consumes the
    /// longest known-variable prefix repeatedly (`xy` resolves whole if
    /// `xy` is known even when `x` also is, since the full-length prefix
    /// is always tried first).
    fn split_identifier(&mut self, token: &str, allow_recovery: bool) -> Result<f64, InterpreterError> {
        let (digits, rest) = split_leading_digits(token);
        let mut product: f64 = if digits.is_empty() {
            1.0
        } else {
            digits.parse().unwrap_or(1.0)
        };
        let chars: Vec<char> = rest.chars().collect();
        let mut pos = 0usize;
        let mut unresolved = false;
        while pos < chars.len() {
            let mut matched = None;
            for len in (1..=chars.len() - pos).rev() {
                let candidate: String = chars[pos..pos + len].iter().collect();
                if self.is_known_variable_name(&candidate) {
                    matched = Some(len);
                    break;
                }
            }
            match matched {
                Some(len) => {
                    let candidate: String = chars[pos..pos + len].iter().collect();
                    let v = self
                        .lookup_known_variable(&candidate, allow_recovery)?
                        .expect("just confirmed this name is known");
                    product *= v;
                    pos += len;
                }
                None => {
                    unresolved = true;
                    break;
                }
            }
        }
        if unresolved || chars.is_empty() {
            let suggestion = self.suggest(token);
            return Err(self.err(
                EvalError::VariableNotFound {
                    name: token.to_string(),
                    suggestion,
                },
                token,
            ));
        }
        Ok(product)
    }

    /// Operator-precedence reduction (component 4.3). Brackets the
    /// leftmost highest-priority operator with its immediate operands and
    /// re-enters the parenthesis loop; once only one priority level
    /// remains, hands off to the linear evaluator.
    fn reduce_precedence(&mut self, s: &str, allow_recovery: bool) -> Result<f64, InterpreterError> {
        let chars: Vec<char> = s.chars().collect();
        let boundary = boundary_operators(&chars);
        let priorities: std::collections::BTreeSet<u8> =
            boundary.iter().map(|&(_, p)| p).collect();
        if priorities.len() <= 1 {
            return self.linear_eval(&chars, &boundary);
        }
        let wrapped = wrap_highest_priority(&chars, &boundary);
        self.evaluate_source(&wrapped, allow_recovery)
    }

    /// Linear left-to-right reduction (component 4.4) over a fragment
    /// whose operators all share one priority.
    fn linear_eval(&mut self, chars: &[char], boundary: &[(usize, u8)]) -> Result<f64, InterpreterError> {
        let allow_recovery = true;
        let s: String = chars.iter().collect();
        let mut acc = 0.0f64;
        let mut pending_op = '+';
        let mut start = 0usize;
        for &(pos, _) in boundary {
            let token: String = chars[start..pos].iter().collect();
            let value = self.resolve_operand(&token, allow_recovery)?;
            acc = apply_operator(acc, pending_op, value)
                .map_err(|reason| self.err(EvalError::ParseFailure(reason), &s))?;
            pending_op = chars[pos];
            start = pos + 1;
        }
        let token: String = chars[start..].iter().collect();
        let value = self.resolve_operand(&token, allow_recovery)?;
        acc = apply_operator(acc, pending_op, value)
            .map_err(|reason| self.err(EvalError::ParseFailure(reason), &s))?;
        Ok(acc)
    }
}

/// Splices a temporary name into `s`, replacing `s[start..=close]`, adding
/// an implicit `*` on either side when the adjoining character demands one.
fn splice_temp(s: &str, start: usize, close: usize, temp_name: &str) -> String {
    let before = needs_implicit_mul(s[..start].chars().last());
    let after = needs_implicit_mul(s[close + 1..].chars().next());
    let mut replacement = String::new();
    if before {
        replacement.push('*');
    }
    replacement.push_str(temp_name);
    if after {
        replacement.push('*');
    }
    let mut out = String::with_capacity(s.len());
    out.push_str(&s[..start]);
    out.push_str(&replacement);
    out.push_str(&s[close + 1..]);
    out
}

/// Finds every "boundary" binary operator position: an operator character
/// not immediately preceded by another operator character (a char right
/// after another operator is a unary sign, absorbed into its operand).
fn boundary_operators(chars: &[char]) -> Vec<(usize, u8)> {
    let mut out = Vec::new();
    for i in 0..chars.len() {
        let Some(p) = operator_priority(chars[i]) else {
            continue;
        };
        if i > 0 && operator_priority(chars[i - 1]).is_some() {
            continue;
        }
        out.push((i, p));
    }
    out
}

fn wrap_highest_priority(chars: &[char], boundary: &[(usize, u8)]) -> String {
    let max_p = boundary.iter().map(|&(_, p)| p).max().unwrap();
    let i = boundary.iter().find(|&&(_, p)| p == max_p).unwrap().0;
    let lhs_start = boundary
        .iter()
        .rev()
        .filter(|&&(pos, p)| pos < i && p < max_p)
        .map(|&(pos, _)| pos + 1)
        .next()
        .unwrap_or(0);
    let rhs_end = boundary
        .iter()
        .filter(|&&(pos, _)| pos > i)
        .map(|&(pos, _)| pos)
        .min()
        .unwrap_or(chars.len());
    let prefix: String = chars[..lhs_start].iter().collect();
    let lhs: String = chars[lhs_start..i].iter().collect();
    let op = chars[i];
    let rhs: String = chars[i + 1..rhs_end].iter().collect();
    let suffix: String = chars[rhs_end..].iter().collect();
    format!("{}({}{}{}){}", prefix, lhs, op, rhs, suffix)
}

fn apply_operator(a: f64, op: char, b: f64) -> Result<f64, String> {
    match op {
        '+' => Ok(a + b),
        '-' => Ok(a - b),
        '*' => Ok(a * b),
        '/' => Ok(a / b),
        '%' => Ok(a % b),
        '^' => {
            let r = a.powf(b);
            if r.is_nan() {
                Err("invalid exponentiation".to_string())
            } else {
                Ok(r)
            }
        }
        other => Err(format!("unsupported operator '{}'", other)),
    }
}

/// Finds a top-level `=` (declaration assignment), ignoring `==`, `!=`,
/// `<=`, `>=` so comparison-bearing bare expressions (rare outside
/// `if(...)`, but harmless to guard) aren't misread as declarations.
fn top_level_assignment(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'=' {
            continue;
        }
        let prev = if i > 0 { Some(bytes[i - 1]) } else { None };
        let next = bytes.get(i + 1).copied();
        if matches!(prev, Some(b'!') | Some(b'<') | Some(b'>') | Some(b'=')) {
            continue;
        }
        if next == Some(b'=') {
            continue;
        }
        return Some(i);
    }
    None
}
