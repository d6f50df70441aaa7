//! Expression Evaluator
//!
//! Walks an [`Expr`] tree and produces a [`Scalar`]. Integer arithmetic
//! stays integral where it can; `/` always yields a float and `//` / `%`
//! round toward negative infinity.

use std::cmp::Ordering;
use std::fmt;

use super::functions;
use super::parser::{BinaryOp, Expr, UnaryOp};
use crate::config::value::Scalar;

/// Evaluation error
#[derive(Debug, Clone)]
pub struct EvalError {
    pub message: String,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for EvalError {}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Scalar) -> Option<Self> {
        match value {
            Scalar::Bool(b) => Some(Self::Int(i64::from(*b))),
            Scalar::Int(i) => Some(Self::Int(*i)),
            Scalar::Float(f) => Some(Self::Float(*f)),
            Scalar::Str(_) => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}

/// Truthiness: zero, `false` and the empty string are false.
pub fn truthy(value: &Scalar) -> bool {
    match value {
        Scalar::Bool(b) => *b,
        Scalar::Int(i) => *i != 0,
        Scalar::Float(f) => *f != 0.0,
        Scalar::Str(s) => !s.is_empty(),
    }
}

/// Stateless tree-walking evaluator
#[derive(Debug, Default, Clone, Copy)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, expr: &Expr) -> Result<Scalar, EvalError> {
        match expr {
            Expr::Int(n) => Ok(Scalar::Int(*n)),
            Expr::Float(n) => Ok(Scalar::Float(*n)),
            Expr::String(s) => Ok(Scalar::Str(s.clone())),
            Expr::Bool(b) => Ok(Scalar::Bool(*b)),

            Expr::Name(name) => functions::constant(name).ok_or_else(|| {
                EvalError::new(format!(
                    "unknown name '{}' (parameters must be written as %({}))",
                    name, name
                ))
            }),

            Expr::Call { name, args } => {
                let values = args
                    .iter()
                    .map(|arg| self.evaluate(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                functions::call(name, &values)
            }

            Expr::Unary { op, expr } => {
                let value = self.evaluate(expr)?;
                unary(*op, &value)
            }

            Expr::Binary { op, left, right } => match op {
                BinaryOp::And => {
                    let left = self.evaluate(left)?;
                    if !truthy(&left) {
                        return Ok(Scalar::Bool(false));
                    }
                    Ok(Scalar::Bool(truthy(&self.evaluate(right)?)))
                }
                BinaryOp::Or => {
                    let left = self.evaluate(left)?;
                    if truthy(&left) {
                        return Ok(Scalar::Bool(true));
                    }
                    Ok(Scalar::Bool(truthy(&self.evaluate(right)?)))
                }
                BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge => {
                    let left = self.evaluate(left)?;
                    let right = self.evaluate(right)?;
                    compare(*op, &left, &right)
                }
                _ => {
                    let left = self.evaluate(left)?;
                    let right = self.evaluate(right)?;
                    arithmetic(*op, &left, &right)
                }
            },
        }
    }
}

fn unary(op: UnaryOp, value: &Scalar) -> Result<Scalar, EvalError> {
    if op == UnaryOp::Not {
        return Ok(Scalar::Bool(!truthy(value)));
    }

    let num = Num::of(value).ok_or_else(|| {
        EvalError::new(format!("bad operand type for unary operator: {}", value.kind()))
    })?;

    match (op, num) {
        (UnaryOp::Neg, Num::Int(i)) => i
            .checked_neg()
            .map(Scalar::Int)
            .ok_or_else(|| EvalError::new("integer overflow")),
        (UnaryOp::Neg, Num::Float(f)) => Ok(Scalar::Float(-f)),
        (_, Num::Int(i)) => Ok(Scalar::Int(i)),
        (_, Num::Float(f)) => Ok(Scalar::Float(f)),
    }
}

fn compare(op: BinaryOp, left: &Scalar, right: &Scalar) -> Result<Scalar, EvalError> {
    let ordering = match (Num::of(left), Num::of(right)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => Some(a.cmp(&b)),
        (Some(a), Some(b)) => a.as_f64().partial_cmp(&b.as_f64()),
        (None, None) => Some(left.to_string().cmp(&right.to_string())),
        _ => {
            return match op {
                BinaryOp::Eq => Ok(Scalar::Bool(false)),
                BinaryOp::Ne => Ok(Scalar::Bool(true)),
                _ => Err(EvalError::new(format!(
                    "'{}' not supported between {} and {}",
                    op,
                    left.kind(),
                    right.kind()
                ))),
            }
        }
    };

    let result = match (op, ordering) {
        (BinaryOp::Ne, None) => true,
        (_, None) => false,
        (BinaryOp::Eq, Some(o)) => o == Ordering::Equal,
        (BinaryOp::Ne, Some(o)) => o != Ordering::Equal,
        (BinaryOp::Lt, Some(o)) => o == Ordering::Less,
        (BinaryOp::Le, Some(o)) => o != Ordering::Greater,
        (BinaryOp::Gt, Some(o)) => o == Ordering::Greater,
        (_, Some(o)) => o != Ordering::Less,
    };
    Ok(Scalar::Bool(result))
}

fn arithmetic(op: BinaryOp, left: &Scalar, right: &Scalar) -> Result<Scalar, EvalError> {
    if let (BinaryOp::Add, Scalar::Str(a), Scalar::Str(b)) = (op, left, right) {
        return Ok(Scalar::Str(format!("{}{}", a, b)));
    }

    let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) else {
        return Err(EvalError::new(format!(
            "unsupported operand types for {}: {} and {}",
            op,
            left.kind(),
            right.kind()
        )));
    };

    match (a, b) {
        (Num::Int(x), Num::Int(y)) => int_op(op, x, y),
        _ => float_op(op, a.as_f64(), b.as_f64()),
    }
}

fn int_op(op: BinaryOp, x: i64, y: i64) -> Result<Scalar, EvalError> {
    let overflow = || EvalError::new("integer overflow");
    let zero = || EvalError::new("division by zero");

    let value = match op {
        BinaryOp::Add => x.checked_add(y).ok_or_else(overflow)?,
        BinaryOp::Sub => x.checked_sub(y).ok_or_else(overflow)?,
        BinaryOp::Mul => x.checked_mul(y).ok_or_else(overflow)?,
        BinaryOp::Div => {
            if y == 0 {
                return Err(zero());
            }
            return Ok(Scalar::Float(x as f64 / y as f64));
        }
        BinaryOp::FloorDiv => {
            if y == 0 {
                return Err(zero());
            }
            let q = x.checked_div(y).ok_or_else(overflow)?;
            if x % y != 0 && ((x < 0) != (y < 0)) {
                q - 1
            } else {
                q
            }
        }
        BinaryOp::Mod => {
            if y == 0 {
                return Err(zero());
            }
            let r = x.checked_rem(y).ok_or_else(overflow)?;
            if r != 0 && ((r < 0) != (y < 0)) {
                r + y
            } else {
                r
            }
        }
        BinaryOp::Pow => {
            if y < 0 {
                return float_op(op, x as f64, y as f64);
            }
            let exp = u32::try_from(y).map_err(|_| overflow())?;
            x.checked_pow(exp).ok_or_else(overflow)?
        }
        _ => return Err(EvalError::new(format!("'{}' is not an arithmetic operator", op))),
    };
    Ok(Scalar::Int(value))
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> Result<Scalar, EvalError> {
    let needs_divisor = matches!(op, BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod);
    if needs_divisor && b == 0.0 {
        return Err(EvalError::new("division by zero"));
    }

    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::FloorDiv => (a / b).floor(),
        BinaryOp::Mod => {
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                r + b
            } else {
                r
            }
        }
        BinaryOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(EvalError::new("zero cannot be raised to a negative power"));
            }
            let value = a.powf(b);
            if value.is_nan() && !a.is_nan() && !b.is_nan() {
                return Err(EvalError::new(
                    "negative number cannot be raised to a fractional power",
                ));
            }
            value
        }
        _ => return Err(EvalError::new(format!("'{}' is not an arithmetic operator", op))),
    };
    Ok(Scalar::Float(value))
}
