//! The function registry: native built-ins and user-defined functions,
//! looked up by name and argument count.

use crate::core::error_types::InterpreterError;
use crate::core::session::Session;
use std::collections::HashMap;
use std::rc::Rc;

/// Whether a formal parameter is evaluated to a number before the function
/// is invoked, or passed through as raw, unevaluated source text.
///
/// Special parameters are how `sigma`, `integral`, `derivative`, `limit`
/// and `if` receive a bound-variable name or an expression body that must
/// not be evaluated until the built-in has injected its own variable into
/// a cloned session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Evaluated to an `f64` before the call.
    Numeric,
    /// Passed through as trimmed source text.
    Special,
}

/// How many arguments a function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many arguments.
    Exact(usize),
    /// At least this many, the remainder repeating the last param kind.
    Variadic(usize),
}

impl Arity {
    /// True if this arity accepts `count` arguments.
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == *n,
            Arity::Variadic(min) => count >= *min,
        }
    }
}

/// An evaluated (or deliberately un-evaluated) call argument.
#[derive(Debug, Clone)]
pub enum ArgValue {
    /// A resolved numeric operand.
    Number(f64),
    /// Raw source text, for special parameters.
    Special(String),
    /// A numeric parameter whose evaluation deferred on a not-yet-bound
    /// variable; holds the original argument source text, re-evaluated
    /// when the enclosing temporary is forced.
    Deferred(String),
}

impl ArgValue {
    /// Unwraps a numeric argument. Native functions only call this on
    /// parameters they declared `Numeric`; the reducer never invokes a
    /// native function while one of its numeric arguments is still
    /// `Deferred`, so this never panics in practice.
    pub fn number(&self) -> f64 {
        match self {
            ArgValue::Number(n) => *n,
            other => panic!("expected numeric argument, got {:?}", other),
        }
    }

    /// Unwraps a special (raw text) argument.
    pub fn text(&self) -> &str {
        match self {
            ArgValue::Special(s) => s,
            other => panic!("expected special argument, got {:?}", other),
        }
    }
}

/// A native function implementation. Takes the session (so higher-order
/// built-ins can clone it and inject a bound variable) and the resolved
/// argument list.
pub type NativeFn = fn(&mut Session, &[ArgValue]) -> Result<f64, InterpreterError>;

/// The three shapes a function binding can take.
#[derive(Clone)]
pub enum FunctionKind {
    /// A built-in implemented in Rust.
    Native(NativeFn),
    /// A session-defined function: formal parameter names plus an
    /// unevaluated body expression, invoked by cloning the session.
    UserDefined {
        /// Formal parameter names, in declaration order.
        params: Vec<String>,
        /// The body expression's source text.
        body: String,
    },
}

/// One registered function overload.
#[derive(Clone)]
pub struct FunctionEntry {
    /// Lowercased registered name.
    pub name: String,
    /// Accepted argument count.
    pub arity: Arity,
    /// Parameter kinds, in declaration order (the last kind repeats for
    /// variadic overloads beyond the declared prefix).
    pub params: Vec<ParamKind>,
    /// The callable itself.
    pub kind: FunctionKind,
}

impl FunctionEntry {
    /// The parameter kind for argument index `i`, accounting for variadic
    /// overloads whose trailing parameters all share the last declared
    /// kind.
    pub fn param_kind(&self, i: usize) -> ParamKind {
        if i < self.params.len() {
            self.params[i]
        } else {
            *self.params.last().unwrap_or(&ParamKind::Numeric)
        }
    }
}

/// A name-keyed table of function overloads. Session-owned: constructed
/// fresh at `Session::create`/`clone`, never a process-wide global.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    entries: HashMap<String, Vec<Rc<FunctionEntry>>>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registers a native built-in overload.
    pub fn register_native(
        &mut self,
        name: &str,
        arity: Arity,
        params: Vec<ParamKind>,
        f: NativeFn,
    ) {
        self.insert(FunctionEntry {
            name: name.to_lowercase(),
            arity,
            params,
            kind: FunctionKind::Native(f),
        });
    }

    /// Registers a user-defined function, replacing any prior definition
    /// with the same name and arity.
    pub fn register_user(&mut self, name: &str, params: Vec<String>, body: String) {
        let arity = Arity::Exact(params.len());
        let param_kinds = vec![ParamKind::Numeric; params.len().max(1)];
        let lowered = name.to_lowercase();
        self.entries.retain(|k, v| {
            if k != &lowered {
                return true;
            }
            v.retain(|e| e.arity != arity);
            !v.is_empty()
        });
        self.insert(FunctionEntry {
            name: lowered,
            arity,
            params: param_kinds,
            kind: FunctionKind::UserDefined { params, body },
        });
    }

    fn insert(&mut self, entry: FunctionEntry) {
        self.entries
            .entry(entry.name.clone())
            .or_default()
            .push(Rc::new(entry));
    }

    /// True if any overload is registered under this name.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    /// Looks up the overload matching `name` and `arg_count`: an
    /// exact-arity match first, then a variadic overload, then (for
    /// argument-count diagnostics) the first overload registered under
    /// that name.
    pub fn resolve(&self, name: &str, arg_count: usize) -> Option<Rc<FunctionEntry>> {
        let candidates = self.entries.get(&name.to_lowercase())?;
        candidates
            .iter()
            .find(|e| matches!(e.arity, Arity::Exact(n) if n == arg_count))
            .or_else(|| {
                candidates
                    .iter()
                    .find(|e| matches!(e.arity, Arity::Variadic(_)) && e.arity.accepts(arg_count))
            })
            .or_else(|| candidates.first())
            .cloned()
    }
}
