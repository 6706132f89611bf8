//! The built-in function library: plain numeric functions registered
//! directly, and the higher-order built-ins (`sigma`, `integral`,
//! `derivative`, `limit`, `if`) that receive their bound-variable name and
//! body as raw, unevaluated source text.

use crate::core::error_types::{EvalError, InterpreterError};
use crate::core::function_registry::{ArgValue, Arity, FunctionRegistry, ParamKind};
use crate::core::session::Session;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Mutex;

type R = Result<f64, InterpreterError>;

fn invalid(reason: impl Into<String>) -> InterpreterError {
    InterpreterError::new(EvalError::InvalidParameter(reason.into()), String::new())
}

/// Registers every native function into `registry`.
pub fn register_builtins(registry: &mut FunctionRegistry) {
    register_trig(registry);
    register_logs_and_roots(registry);
    register_rounding(registry);
    register_arithmetic(registry);
    register_bitwise(registry);
    register_higher_order(registry);
}

macro_rules! unary {
    ($registry:expr, $name:expr, $f:expr) => {
        $registry.register_native(
            $name,
            Arity::Exact(1),
            vec![ParamKind::Numeric],
            |_session, args| Ok(($f)(args[0].number())),
        );
    };
}

macro_rules! binary {
    ($registry:expr, $name:expr, $f:expr) => {
        $registry.register_native(
            $name,
            Arity::Exact(2),
            vec![ParamKind::Numeric, ParamKind::Numeric],
            |_session, args| Ok(($f)(args[0].number(), args[1].number())),
        );
    };
}

fn register_trig(registry: &mut FunctionRegistry) {
    unary!(registry, "sin", f64::sin);
    unary!(registry, "cos", f64::cos);
    unary!(registry, "tan", f64::tan);
    unary!(registry, "sec", |x: f64| 1.0 / x.cos());
    unary!(registry, "csc", |x: f64| 1.0 / x.sin());
    unary!(registry, "cot", |x: f64| 1.0 / x.tan());
    unary!(registry, "asin", f64::asin);
    unary!(registry, "acos", f64::acos);
    unary!(registry, "atan", f64::atan);
    unary!(registry, "asec", |x: f64| (1.0 / x).acos());
    unary!(registry, "acsc", |x: f64| (1.0 / x).asin());
    unary!(registry, "acot", |x: f64| (1.0 / x).atan());
    unary!(registry, "sinh", f64::sinh);
    unary!(registry, "cosh", f64::cosh);
    unary!(registry, "tanh", f64::tanh);
    unary!(registry, "sech", |x: f64| 1.0 / x.cosh());
    unary!(registry, "csch", |x: f64| 1.0 / x.sinh());
    unary!(registry, "coth", |x: f64| 1.0 / x.tanh());
    unary!(registry, "asinh", f64::asinh);
    unary!(registry, "acosh", f64::acosh);
    unary!(registry, "atanh", f64::atanh);
    binary!(registry, "atan2", f64::atan2);
}

fn register_logs_and_roots(registry: &mut FunctionRegistry) {
    unary!(registry, "ln", f64::ln);
    unary!(registry, "log", f64::log10);
    binary!(registry, "log", |value: f64, base: f64| value.log(base));
    unary!(registry, "exp", f64::exp);
    binary!(registry, "pow", f64::powf);
    unary!(registry, "sqrt", f64::sqrt);
    unary!(registry, "cbrt", f64::cbrt);
    // radical(degree, radicand): preserves the sign of an odd-degree root
    // of a negative radicand, matching the familiar `cbrt(-8) == -2`.
    registry.register_native(
        "radical",
        Arity::Exact(2),
        vec![ParamKind::Numeric, ParamKind::Numeric],
        |_session, args| {
            let degree = args[0].number();
            let radicand = args[1].number();
            if radicand < 0.0 {
                let degree_int = degree.round();
                if (degree_int - degree).abs() > 1e-9 || (degree_int as i64) % 2 == 0 {
                    return Err(invalid("even or non-integer root of a negative number"));
                }
                return Ok(-(-radicand).powf(1.0 / degree));
            }
            Ok(radicand.powf(1.0 / degree))
        },
    );
}

fn register_rounding(registry: &mut FunctionRegistry) {
    unary!(registry, "abs", f64::abs);
    unary!(registry, "ceil", f64::ceil);
    unary!(registry, "floor", f64::floor);
    unary!(registry, "round", f64::round);
    unary!(registry, "sign", f64::signum);
    unary!(registry, "__deg2rad", f64::to_radians);
}

fn register_arithmetic(registry: &mut FunctionRegistry) {
    binary!(registry, "mod", |a: f64, b: f64| a % b);
    registry.register_native(
        "max",
        Arity::Variadic(1),
        vec![ParamKind::Numeric],
        |_session, args| {
            args.iter()
                .map(ArgValue::number)
                .fold(None, |acc: Option<f64>, x| {
                    Some(acc.map_or(x, |a| a.max(x)))
                })
                .ok_or_else(|| invalid("max requires at least one argument"))
        },
    );
    registry.register_native(
        "min",
        Arity::Variadic(1),
        vec![ParamKind::Numeric],
        |_session, args| {
            args.iter()
                .map(ArgValue::number)
                .fold(None, |acc: Option<f64>, x| {
                    Some(acc.map_or(x, |a| a.min(x)))
                })
                .ok_or_else(|| invalid("min requires at least one argument"))
        },
    );
    registry.register_native(
        "sum",
        Arity::Variadic(1),
        vec![ParamKind::Numeric],
        |_session, args| Ok(args.iter().map(ArgValue::number).sum()),
    );
    for name in ["avg", "average"] {
        registry.register_native(
            name,
            Arity::Variadic(1),
            vec![ParamKind::Numeric],
            |_session, args| {
                let total: f64 = args.iter().map(ArgValue::number).sum();
                Ok(total / args.len() as f64)
            },
        );
    }
    registry.register_native(
        "gcd",
        Arity::Variadic(2),
        vec![ParamKind::Numeric],
        |_session, args| {
            let mut values = args.iter().map(|a| a.number().round() as i64);
            let mut acc = values.next().unwrap().abs();
            for v in values {
                acc = gcd_i64(acc, v.abs());
            }
            Ok(acc as f64)
        },
    );
    registry.register_native(
        "factorial",
        Arity::Exact(1),
        vec![ParamKind::Numeric],
        |_session, args| {
            let n = args[0].number();
            let rounded = n.round();
            if (rounded - n).abs() > 1e-9 || rounded < 0.0 {
                return Err(invalid("factorial is only defined on non-negative integers"));
            }
            let mut acc = 1.0f64;
            let mut i = 2.0f64;
            while i <= rounded {
                acc *= i;
                i += 1.0;
            }
            Ok(acc)
        },
    );
    registry.register_native(
        "c",
        Arity::Exact(2),
        vec![ParamKind::Numeric, ParamKind::Numeric],
        |_session, args| {
            let n = args[0].number().round();
            let k = args[1].number().round();
            if k < 0.0 || k > n {
                return Ok(0.0);
            }
            let k = k.min(n - k);
            let mut result = 1.0f64;
            let mut i = 0.0f64;
            while i < k {
                result *= n - i;
                result /= i + 1.0;
                i += 1.0;
            }
            Ok(result.round())
        },
    );
}

fn gcd_i64(a: i64, b: i64) -> i64 {
    if b == 0 {
        a
    } else {
        gcd_i64(b, a % b)
    }
}

fn register_bitwise(registry: &mut FunctionRegistry) {
    binary!(registry, "and", |a: f64, b: f64| {
        ((a as i64) & (b as i64)) as f64
    });
    binary!(registry, "or", |a: f64, b: f64| {
        ((a as i64) | (b as i64)) as f64
    });
    binary!(registry, "xor", |a: f64, b: f64| {
        ((a as i64) ^ (b as i64)) as f64
    });
    unary!(registry, "not", |a: f64| (!(a as i64)) as f64);
    binary!(registry, "nor", |a: f64, b: f64| {
        (!((a as i64) | (b as i64))) as f64
    });
    binary!(registry, "shiftleft", |a: f64, b: f64| {
        ((a as i64) << (b as i64)) as f64
    });
    binary!(registry, "shiftright", |a: f64, b: f64| {
        ((a as i64) >> (b as i64)) as f64
    });
    binary!(registry, "unsignedshiftright", |a: f64, b: f64| {
        ((a as i64 as u64) >> (b as i64)) as f64
    });
}

fn bound_variable_name(arg: &ArgValue) -> Result<String, InterpreterError> {
    bound_variable_name_str(arg.text())
}

fn bound_variable_name_str(name: &str) -> Result<String, InterpreterError> {
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(invalid(format!("'{}' is not a valid bound variable name", name)));
    }
    Ok(name.to_lowercase())
}

/// Splits a `limit` binding of the form `var->target` (also accepting a
/// bare `=`) into its two halves.
fn split_bound_variable(binding: &str) -> Result<(String, String), InterpreterError> {
    if let Some(pos) = binding.find("->") {
        return Ok((binding[..pos].to_string(), binding[pos + 2..].to_string()));
    }
    if let Some(pos) = binding.find('=') {
        return Ok((binding[..pos].to_string(), binding[pos + 1..].to_string()));
    }
    Err(invalid(format!(
        "'{}' is not a valid limit binding, expected 'var->target'",
        binding
    )))
}

fn register_higher_order(registry: &mut FunctionRegistry) {
    for name in ["sigma", "Σ"] {
        registry.register_native(
            name,
            Arity::Variadic(4),
            vec![ParamKind::Special, ParamKind::Special, ParamKind::Numeric, ParamKind::Numeric],
            |session, args| {
                let var = bound_variable_name(&args[0])?;
                let body = args[1].text();
                let mut from = args[2].number();
                let mut to = args[3].number();
                let mut step = if args.len() > 4 { args[4].number() } else { 1.0 };
                if step == 0.0 {
                    return Err(invalid("sigma step must not be zero"));
                }
                if step < 0.0 {
                    let (lo, hi) = (from.min(to), from.max(to));
                    from = lo;
                    to = hi;
                    step = -step;
                }
                let mut total = 0.0f64;
                let mut i = from;
                while i <= to + 1e-9 {
                    total += session.call_with_bindings(&[(&var, i)], body, false)?;
                    i += step;
                }
                Ok(total)
            },
        );
    }

    for name in ["integral", "intg", "∫"] {
        registry.register_native(
            name,
            Arity::Variadic(4),
            vec![ParamKind::Special, ParamKind::Special, ParamKind::Numeric, ParamKind::Numeric],
            |session, args| {
                let var = bound_variable_name(&args[0])?;
                let body = args[1].text();
                let a = args[2].number();
                let b = args[3].number();
                let nodes = if args.len() > 4 {
                    let n = args[4].number().abs().round() as usize;
                    if n == 0 {
                        return Err(invalid("integral requires at least one quadrature node"));
                    }
                    n
                } else {
                    QUADRATURE_NODES
                };
                gauss_legendre_integral(session, &var, body, a, b, nodes)
            },
        );
    }

    registry.register_native(
        "derivative",
        Arity::Exact(3),
        vec![ParamKind::Special, ParamKind::Special, ParamKind::Numeric],
        |session, args| {
            let var = bound_variable_name(&args[0])?;
            let body = args[1].text();
            let point = args[2].number();
            const H: f64 = 1e-7;
            let forward = session.call_with_bindings(&[(&var, point + H)], body, false)?;
            let backward = session.call_with_bindings(&[(&var, point - H)], body, false)?;
            Ok((forward - backward) / (2.0 * H))
        },
    );

    for name in ["lim", "limit"] {
        registry.register_native(
            name,
            Arity::Exact(2),
            vec![ParamKind::Special, ParamKind::Special],
            |session, args| {
                let (var, target_text) = split_bound_variable(args[0].text())?;
                let var = bound_variable_name_str(&var)?;
                let body = args[1].text();
                let target = match target_text.trim() {
                    "inf" | "+inf" => f64::INFINITY,
                    "-inf" => f64::NEG_INFINITY,
                    text => session.evaluate_source(text, true)?,
                };
                two_sided_limit(session, &var, body, target)
            },
        );
    }

    registry.register_native(
        "if",
        Arity::Exact(3),
        vec![ParamKind::Special, ParamKind::Special, ParamKind::Special],
        |session, args| {
            let cond = args[0].text();
            let (lhs, op, rhs) = split_comparison(cond)?;
            let lhs_value = session.evaluate_source(lhs, true)?;
            let rhs_value = session.evaluate_source(rhs, true)?;
            let taken = match op {
                ">=" => lhs_value >= rhs_value,
                "<=" => lhs_value <= rhs_value,
                "!=" | "<>" => lhs_value != rhs_value,
                "==" | "=" => lhs_value == rhs_value,
                "<" => lhs_value < rhs_value,
                ">" => lhs_value > rhs_value,
                _ => unreachable!(),
            };
            let branch = if taken { args[1].text() } else { args[2].text() };
            session.evaluate_source(branch, true)
        },
    );
}

fn split_comparison(cond: &str) -> Result<(&str, &str, &str), InterpreterError> {
    for op in [">=", "<=", "!=", "<>", "=="] {
        if let Some(pos) = cond.find(op) {
            return Ok((&cond[..pos], op, &cond[pos + op.len()..]));
        }
    }
    for op in ["=", "<", ">"] {
        if let Some(pos) = cond.find(op) {
            return Ok((&cond[..pos], op, &cond[pos + op.len()..]));
        }
    }
    Err(invalid(format!(
        "'{}' is not a valid comparison for if()",
        cond
    )))
}

fn two_sided_limit(session: &mut Session, var: &str, body: &str, target: f64) -> R {
    let mut delta = 10.0f64;
    let mut last: Option<(f64, f64)> = None;
    while delta > 1e-11 {
        let left = session.call_with_bindings(&[(var, target - delta)], body, false);
        let right = session.call_with_bindings(&[(var, target + delta)], body, false);
        if let (Ok(l), Ok(r)) = (left, right) {
            last = Some((l, r));
        }
        delta /= 10.0;
    }
    let (l, r) = last.ok_or_else(|| invalid("limit did not converge from either side"))?;
    if (l - r).abs() < 1e-6 {
        Ok((l + r) / 2.0)
    } else {
        Ok(f64::NAN)
    }
}

lazy_static! {
    static ref QUADRATURE_CACHE: Mutex<HashMap<usize, (Vec<f64>, Vec<f64>)>> =
        Mutex::new(HashMap::new());
}

const QUADRATURE_NODES: usize = 20;

fn gauss_legendre_integral(
    session: &mut Session,
    var: &str,
    body: &str,
    a: f64,
    b: f64,
    node_count: usize,
) -> R {
    let (nodes, weights) = legendre_nodes_weights(node_count);
    let mid = (a + b) / 2.0;
    let half = (b - a) / 2.0;
    let mut total = 0.0f64;
    for (node, weight) in nodes.iter().zip(weights.iter()) {
        let x = mid + half * node;
        let y = session.call_with_bindings(&[(var, x)], body, false)?;
        total += weight * y;
    }
    Ok(total * half)
}

/// Gauss-Legendre quadrature nodes and weights for `n` points, found by
/// Newton-refining an initial Chebyshev-point guess against the Legendre
/// polynomial, cached per node count since the roots don't depend on the
/// integration bounds.
fn legendre_nodes_weights(n: usize) -> (Vec<f64>, Vec<f64>) {
    if let Some(cached) = QUADRATURE_CACHE.lock().unwrap().get(&n) {
        return cached.clone();
    }
    let mut nodes = vec![0.0f64; n];
    let mut weights = vec![0.0f64; n];
    let m = n.div_ceil(2);
    for i in 0..m {
        let mut x = ((std::f64::consts::PI * (i as f64 + 0.75)) / (n as f64 + 0.5)).cos();
        for _ in 0..100 {
            let (p, dp) = legendre_p(n, x);
            let dx = p / dp;
            x -= dx;
            if dx.abs() < 1e-15 {
                break;
            }
        }
        let (_, dp) = legendre_p(n, x);
        let w = 2.0 / ((1.0 - x * x) * dp * dp);
        nodes[i] = -x;
        nodes[n - 1 - i] = x;
        weights[i] = w;
        weights[n - 1 - i] = w;
    }
    QUADRATURE_CACHE
        .lock()
        .unwrap()
        .insert(n, (nodes.clone(), weights.clone()));
    (nodes, weights)
}

/// Returns `(P_n(x), P_n'(x))` via the standard three-term recurrence.
fn legendre_p(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0f64;
    let mut p1 = x;
    for k in 2..=n {
        let kf = k as f64;
        let p2 = ((2.0 * kf - 1.0) * x * p1 - (kf - 1.0) * p0) / kf;
        p0 = p1;
        p1 = p2;
    }
    let dp = n as f64 * (x * p1 - p0) / (x * x - 1.0);
    (p1, dp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadrature_integrates_a_cubic_exactly() {
        let (nodes, weights) = legendre_nodes_weights(10);
        // integral of x^2 from -1 to 1 is 2/3
        let sum: f64 = nodes.iter().zip(weights.iter()).map(|(n, w)| w * n * n).sum();
        assert!((sum - 2.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn gcd_euclidean() {
        assert_eq!(gcd_i64(8, 20), 4);
        assert_eq!(gcd_i64(0, 5), 5);
    }
}
