//! Built-in Functions
//!
//! The fixed allow-list of functions and named constants an expression may
//! use. Nothing outside this table is reachable from an expression.

use std::collections::HashMap;
use std::f64::consts;

use once_cell::sync::Lazy;

use super::evaluator::EvalError;
use crate::config::value::Scalar;

type Builtin = fn(&[Scalar]) -> Result<Scalar, EvalError>;

#[derive(Debug, Clone, Copy)]
enum Arity {
    Exact(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    fn accepts(self, n: usize) -> bool {
        match self {
            Self::Exact(k) => n == k,
            Self::Range(lo, hi) => (lo..=hi).contains(&n),
            Self::AtLeast(k) => n >= k,
        }
    }

    fn describe(self) -> String {
        match self {
            Self::Exact(1) => "exactly 1 argument".to_string(),
            Self::Exact(k) => format!("exactly {} arguments", k),
            Self::Range(lo, hi) => format!("{} to {} arguments", lo, hi),
            Self::AtLeast(k) => format!("at least {} argument(s)", k),
        }
    }
}

struct Function {
    arity: Arity,
    call: Builtin,
}

fn function(arity: Arity, call: Builtin) -> Function {
    Function { arity, call }
}

/// Allow-listed functions by name
static FUNCTIONS: Lazy<HashMap<&'static str, Function>> = Lazy::new(|| {
    use Arity::*;

    HashMap::from([
        ("abs", function(Exact(1), fn_abs)),
        ("min", function(AtLeast(1), fn_min)),
        ("max", function(AtLeast(1), fn_max)),
        ("pow", function(Exact(2), fn_pow)),
        ("sqrt", function(Exact(1), |a| math(a, "sqrt", f64::sqrt, |x| x >= 0.0))),
        ("exp", function(Exact(1), |a| math(a, "exp", f64::exp, |_| true))),
        ("log", function(Range(1, 2), fn_log)),
        ("log10", function(Exact(1), |a| math(a, "log10", f64::log10, |x| x > 0.0))),
        ("log2", function(Exact(1), |a| math(a, "log2", f64::log2, |x| x > 0.0))),
        ("sin", function(Exact(1), |a| math(a, "sin", f64::sin, f64::is_finite))),
        ("cos", function(Exact(1), |a| math(a, "cos", f64::cos, f64::is_finite))),
        ("tan", function(Exact(1), |a| math(a, "tan", f64::tan, f64::is_finite))),
        ("asin", function(Exact(1), |a| math(a, "asin", f64::asin, unit_interval))),
        ("acos", function(Exact(1), |a| math(a, "acos", f64::acos, unit_interval))),
        ("atan", function(Exact(1), |a| math(a, "atan", f64::atan, |_| true))),
        ("atan2", function(Exact(2), fn_atan2)),
        ("sinh", function(Exact(1), |a| math(a, "sinh", f64::sinh, |_| true))),
        ("cosh", function(Exact(1), |a| math(a, "cosh", f64::cosh, |_| true))),
        ("tanh", function(Exact(1), |a| math(a, "tanh", f64::tanh, |_| true))),
        ("floor", function(Exact(1), |a| to_int(number(a, 0, "floor")?.floor()))),
        ("ceil", function(Exact(1), |a| to_int(number(a, 0, "ceil")?.ceil()))),
        ("round", function(Range(1, 2), fn_round)),
        ("int", function(Exact(1), fn_int)),
        ("float", function(Exact(1), fn_float)),
        ("str", function(Exact(1), |a| Ok(Scalar::Str(a[0].to_string())))),
    ])
});

/// Calls the built-in `name` with already evaluated arguments.
pub fn call(name: &str, args: &[Scalar]) -> Result<Scalar, EvalError> {
    let function = FUNCTIONS
        .get(name)
        .ok_or_else(|| EvalError::new(format!("unknown function '{}'", name)))?;

    if !function.arity.accepts(args.len()) {
        return Err(EvalError::new(format!(
            "{}() takes {} ({} given)",
            name,
            function.arity.describe(),
            args.len()
        )));
    }

    (function.call)(args)
}

/// Value of a named constant.
pub fn constant(name: &str) -> Option<Scalar> {
    let value = match name {
        "pi" => consts::PI,
        "e" => consts::E,
        "inf" => f64::INFINITY,
        "nan" => f64::NAN,
        _ => return None,
    };
    Some(Scalar::Float(value))
}

fn number(args: &[Scalar], index: usize, name: &str) -> Result<f64, EvalError> {
    args[index].as_f64().ok_or_else(|| {
        EvalError::new(format!(
            "{}() expects a number, got {} '{}'",
            name,
            args[index].kind(),
            args[index]
        ))
    })
}

fn domain_error(name: &str, x: f64) -> EvalError {
    EvalError::new(format!("math domain error in {}({})", name, x))
}

fn unit_interval(x: f64) -> bool {
    (-1.0..=1.0).contains(&x)
}

fn math(
    args: &[Scalar],
    name: &str,
    f: fn(f64) -> f64,
    domain: fn(f64) -> bool,
) -> Result<Scalar, EvalError> {
    let x = number(args, 0, name)?;
    if !x.is_nan() && !domain(x) {
        return Err(domain_error(name, x));
    }
    Ok(Scalar::Float(f(x)))
}

fn to_int(x: f64) -> Result<Scalar, EvalError> {
    if x.is_finite() && x >= i64::MIN as f64 && x < i64::MAX as f64 {
        Ok(Scalar::Int(x as i64))
    } else {
        Err(EvalError::new(format!("cannot convert {} to integer", x)))
    }
}

fn fn_abs(args: &[Scalar]) -> Result<Scalar, EvalError> {
    match &args[0] {
        Scalar::Int(i) => i
            .checked_abs()
            .map(Scalar::Int)
            .ok_or_else(|| EvalError::new("integer overflow")),
        Scalar::Bool(b) => Ok(Scalar::Int(i64::from(*b))),
        _ => Ok(Scalar::Float(number(args, 0, "abs")?.abs())),
    }
}

fn pick(args: &[Scalar], name: &str, better: fn(f64, f64) -> bool) -> Result<Scalar, EvalError> {
    let mut best = 0;
    let mut best_value = number(args, 0, name)?;
    for index in 1..args.len() {
        let value = number(args, index, name)?;
        if better(value, best_value) {
            best = index;
            best_value = value;
        }
    }
    Ok(args[best].clone())
}

fn fn_min(args: &[Scalar]) -> Result<Scalar, EvalError> {
    pick(args, "min", |a, b| a < b)
}

fn fn_max(args: &[Scalar]) -> Result<Scalar, EvalError> {
    pick(args, "max", |a, b| a > b)
}

fn fn_pow(args: &[Scalar]) -> Result<Scalar, EvalError> {
    let x = number(args, 0, "pow")?;
    let y = number(args, 1, "pow")?;
    if x == 0.0 && y < 0.0 {
        return Err(domain_error("pow", x));
    }
    let value = x.powf(y);
    if value.is_nan() && !x.is_nan() && !y.is_nan() {
        return Err(domain_error("pow", x));
    }
    Ok(Scalar::Float(value))
}

fn fn_log(args: &[Scalar]) -> Result<Scalar, EvalError> {
    let x = number(args, 0, "log")?;
    if x <= 0.0 {
        return Err(domain_error("log", x));
    }
    if args.len() == 1 {
        return Ok(Scalar::Float(x.ln()));
    }
    let base = number(args, 1, "log")?;
    if base <= 0.0 || base == 1.0 {
        return Err(domain_error("log", base));
    }
    Ok(Scalar::Float(x.ln() / base.ln()))
}

fn fn_atan2(args: &[Scalar]) -> Result<Scalar, EvalError> {
    let y = number(args, 0, "atan2")?;
    let x = number(args, 1, "atan2")?;
    Ok(Scalar::Float(y.atan2(x)))
}

fn fn_round(args: &[Scalar]) -> Result<Scalar, EvalError> {
    let x = number(args, 0, "round")?;
    if args.len() == 1 {
        if let Scalar::Int(i) = args[0] {
            return Ok(Scalar::Int(i));
        }
        return to_int(x.round_ties_even());
    }

    let digits = match args[1] {
        Scalar::Int(d) => d,
        Scalar::Bool(b) => i64::from(b),
        _ => return Err(EvalError::new("round() digits must be an integer")),
    };
    let digits = i32::try_from(digits).map_err(|_| EvalError::new("round() digits out of range"))?;
    let factor = 10f64.powi(digits);
    let rounded = (x * factor).round_ties_even() / factor;

    match args[0] {
        Scalar::Int(_) | Scalar::Bool(_) => to_int(rounded),
        _ => Ok(Scalar::Float(rounded)),
    }
}

fn fn_int(args: &[Scalar]) -> Result<Scalar, EvalError> {
    match &args[0] {
        Scalar::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Scalar::Int)
            .map_err(|_| EvalError::new(format!("invalid literal for int(): '{}'", s))),
        Scalar::Int(i) => Ok(Scalar::Int(*i)),
        other => to_int(number(std::slice::from_ref(other), 0, "int")?.trunc()),
    }
}

fn fn_float(args: &[Scalar]) -> Result<Scalar, EvalError> {
    match &args[0] {
        Scalar::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Scalar::Float)
            .map_err(|_| EvalError::new(format!("could not convert string to float: '{}'", s))),
        _ => Ok(Scalar::Float(number(args, 0, "float")?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float(name: &str, args: &[Scalar]) -> f64 {
        match call(name, args).unwrap() {
            Scalar::Float(f) => f,
            other => panic!("{}() returned {:?}", name, other),
        }
    }

    #[test]
    fn test_pow_returns_float() {
        assert_eq!(call("pow", &[Scalar::Int(3), Scalar::Int(2)]).unwrap(), Scalar::Float(9.0));
        assert_eq!(call("pow", &[Scalar::Int(1), Scalar::Int(2)]).unwrap(), Scalar::Float(1.0));
        assert!(call("pow", &[Scalar::Int(0), Scalar::Int(-1)]).is_err());
    }

    #[test]
    fn test_math_functions() {
        assert_eq!(float("sqrt", &[Scalar::Int(16)]), 4.0);
        assert_eq!(float("exp", &[Scalar::Int(0)]), 1.0);
        assert_eq!(float("log", &[Scalar::Int(1)]), 0.0);
        assert!((float("log", &[Scalar::Int(8), Scalar::Int(2)]) - 3.0).abs() < 1e-12);
        assert!((float("log10", &[Scalar::Int(1000)]) - 3.0).abs() < 1e-12);
        assert!((float("atan2", &[Scalar::Int(1), Scalar::Int(1)]) - consts::FRAC_PI_4).abs() < 1e-12);
        assert_eq!(float("sin", &[Scalar::Int(0)]), 0.0);
        assert_eq!(float("cosh", &[Scalar::Int(0)]), 1.0);
    }

    #[test]
    fn test_domain_errors() {
        assert!(call("sqrt", &[Scalar::Int(-1)]).is_err());
        assert!(call("log", &[Scalar::Int(0)]).is_err());
        assert!(call("log", &[Scalar::Int(8), Scalar::Int(1)]).is_err());
        assert!(call("asin", &[Scalar::Int(2)]).is_err());
        assert!(call("sqrt", &[Scalar::from("x")]).is_err());
    }

    #[test]
    fn test_rounding_functions() {
        assert_eq!(call("floor", &[Scalar::Float(2.7)]).unwrap(), Scalar::Int(2));
        assert_eq!(call("floor", &[Scalar::Float(-2.5)]).unwrap(), Scalar::Int(-3));
        assert_eq!(call("ceil", &[Scalar::Float(2.1)]).unwrap(), Scalar::Int(3));
        assert_eq!(call("round", &[Scalar::Float(2.5)]).unwrap(), Scalar::Int(2));
        assert_eq!(call("round", &[Scalar::Float(3.5)]).unwrap(), Scalar::Int(4));
        assert_eq!(call("round", &[Scalar::Int(7)]).unwrap(), Scalar::Int(7));
        assert!((float("round", &[Scalar::Float(1.234), Scalar::Int(1)]) - 1.2).abs() < 1e-12);
        assert!(call("floor", &[Scalar::Float(f64::INFINITY)]).is_err());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(call("int", &[Scalar::from("12")]).unwrap(), Scalar::Int(12));
        assert_eq!(call("int", &[Scalar::Float(3.9)]).unwrap(), Scalar::Int(3));
        assert_eq!(call("int", &[Scalar::Bool(true)]).unwrap(), Scalar::Int(1));
        assert!(call("int", &[Scalar::from("1.5")]).is_err());
        assert_eq!(call("float", &[Scalar::from("2.5")]).unwrap(), Scalar::Float(2.5));
        assert_eq!(call("float", &[Scalar::Int(2)]).unwrap(), Scalar::Float(2.0));
        assert_eq!(call("str", &[Scalar::Int(4)]).unwrap(), Scalar::from("4"));
        assert_eq!(call("str", &[Scalar::Float(4.0)]).unwrap(), Scalar::from("4.0"));
    }

    #[test]
    fn test_min_max_keep_argument_type() {
        assert_eq!(
            call("min", &[Scalar::Int(3), Scalar::Float(1.5), Scalar::Int(2)]).unwrap(),
            Scalar::Float(1.5)
        );
        assert_eq!(call("max", &[Scalar::Int(1), Scalar::Int(2)]).unwrap(), Scalar::Int(2));
        assert_eq!(call("abs", &[Scalar::Int(-3)]).unwrap(), Scalar::Int(3));
        assert_eq!(call("abs", &[Scalar::Float(-2.5)]).unwrap(), Scalar::Float(2.5));
    }

    #[test]
    fn test_unknown_function_and_arity() {
        let err = call("system", &[Scalar::from("rm -rf /")]).unwrap_err();
        assert!(err.message.contains("unknown function 'system'"));

        let err = call("pow", &[Scalar::Int(1)]).unwrap_err();
        assert!(err.message.contains("exactly 2 arguments"));
        assert!(call("min", &[]).is_err());
    }

    #[test]
    fn test_constants() {
        assert_eq!(constant("pi"), Some(Scalar::Float(consts::PI)));
        assert!(matches!(constant("nan"), Some(Scalar::Float(f)) if f.is_nan()));
        assert_eq!(constant("tau"), None);
    }
}
