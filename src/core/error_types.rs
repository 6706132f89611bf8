//! Error types for the interpreter.
//!
//! Small leaf error enums with manual `Display`/`Error` impls, folded
//! upward through `From` conversions into one `InterpreterError` the public
//! API returns. Every error that can be pinned to a column of the original
//! source carries a diagnostic cursor, so `Display` can underline it.

use std::error::Error;
use std::fmt;

/// A "did you mean" suggestion produced by Levenshtein similarity against
/// the session's resolved user variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    /// The resolved variable judged closest to the unresolved name.
    pub name: String,
    /// Similarity in `[0, 1]`; `1.0` is an exact match.
    pub score: f64,
}

/// Errors raised while splitting source into parenthesis groups and
/// operator-precedence brackets, before any operand is evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// A `(` was never closed, or a `)` had no matching `(`.
    UnbalancedParentheses,

    /// An argument list was preceded by an identifier that isn't a
    /// registered function, or had no preceding identifier while carrying
    /// more than one comma-separated argument.
    FunctionNotFound(String),

    /// The expression reduced to nothing evaluable (empty source, or a
    /// dangling operator with no operand on either side).
    EmptyExpression,
}

impl Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnbalancedParentheses => write!(f, "unbalanced parentheses"),
            ParseError::FunctionNotFound(name) if name.is_empty() => {
                write!(f, "no function context for argument list")
            }
            ParseError::FunctionNotFound(name) => write!(f, "function '{}' not found", name),
            ParseError::EmptyExpression => write!(f, "empty expression"),
        }
    }
}

/// Errors raised while evaluating a resolved operand or built-in call.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// An identifier could not be resolved to a known variable.
    VariableNotFound {
        /// The unresolved identifier.
        name: String,
        /// The closest resolved user variable, if any had positive
        /// similarity.
        suggestion: Option<Suggestion>,
    },

    /// The function exists under that name but no overload accepts the
    /// given argument count.
    FunctionInvalidArguments {
        /// The function name.
        name: String,
        /// Number of arguments actually supplied.
        got: usize,
    },

    /// A higher-order built-in (or a parametric function name) was called
    /// with a malformed parameter: a bad bound-variable name, a zero step,
    /// an unparseable comparison, and so on.
    InvalidParameter(String),

    /// Any other evaluation failure (math domain errors, malformed
    /// literals) not covered by a more specific kind above.
    ParseFailure(String),
}

impl Error for EvalError {}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::VariableNotFound { name, suggestion } => match suggestion {
                Some(s) => write!(
                    f,
                    "variable '{}' not found, did you mean '{}'?",
                    name, s.name
                ),
                None => write!(f, "variable '{}' not found", name),
            },
            EvalError::FunctionInvalidArguments { name, got } => write!(
                f,
                "function '{}' does not accept {} argument(s)",
                name, got
            ),
            EvalError::InvalidParameter(reason) => write!(f, "invalid parameter: {}", reason),
            EvalError::ParseFailure(reason) => write!(f, "{}", reason),
        }
    }
}

impl From<ParseError> for EvalError {
    fn from(error: ParseError) -> Self {
        EvalError::ParseFailure(error.to_string())
    }
}

/// The interpreter's public error type: a leaf error plus the diagnostic
/// context needed to render the `<message>\n\t<source>\n\t<cursor>` form.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpreterError {
    /// The underlying parse or evaluation failure.
    pub kind: EvalError,
    /// The full source string being parsed when the error occurred.
    pub source: String,
    /// 1-based column of the offending character, if one can be named.
    pub cursor: Option<usize>,
}

impl InterpreterError {
    /// Builds an error without a cursor.
    pub fn new(kind: impl Into<EvalError>, source: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            source: source.into(),
            cursor: None,
        }
    }

    /// Builds an error anchored at a specific 1-based column.
    pub fn at(kind: impl Into<EvalError>, source: impl Into<String>, cursor: usize) -> Self {
        Self {
            kind: kind.into(),
            source: source.into(),
            cursor: Some(cursor),
        }
    }

    /// True if this is a recoverable variable-not-found error, the only
    /// kind the reducer may turn into a deferred expression.
    pub fn is_variable_not_found(&self) -> bool {
        matches!(self.kind, EvalError::VariableNotFound { .. })
    }

    /// The unresolved variable name, if this is a `VariableNotFound`.
    pub fn missing_variable(&self) -> Option<&str> {
        match &self.kind {
            EvalError::VariableNotFound { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for InterpreterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind)?;
        write!(f, "\t{}", self.source)?;
        if let Some(cursor) = self.cursor {
            write!(f, "\n\t{}^", " ".repeat(cursor.saturating_sub(1)))?;
        }
        Ok(())
    }
}

impl Error for InterpreterError {}

/// Convenience alias for the public `CalcError` re-export.
pub type CalcError = InterpreterError;
