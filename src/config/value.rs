//! Configuration Values
//!
//! Explicit tagged variants for the loosely typed values a sweep
//! configuration carries. Parameters hold a [`ParamValue`]; anything that
//! has been fully resolved is a [`Scalar`].
//!
//! # Example YAML Format
//!
//! ```yaml
//! userdef:
//!   name: cylinder        # string
//!   steps: 200            # integer
//!   dt: 1.0e-3            # float
//!   restart: false        # boolean
//!   tfinal: "`%(steps)*%(dt)`"   # expression
//!   seeds: [1, 2, 3]      # sequence
//! ```

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_yaml::Value;

/// A single resolved value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Human readable type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
        }
    }

    /// Numeric view of the value; booleans count as 0 and 1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Str(_) => None,
        }
    }

    /// Converts a YAML scalar node.
    pub fn from_yaml(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else {
                    n.as_f64()
                        .map(Self::Float)
                        .ok_or_else(|| format!("unsupported number {}", n))
                }
            }
            Value::String(s) => Ok(Self::Str(s.clone())),
            Value::Tagged(tagged) => Self::from_yaml(&tagged.value),
            Value::Null => Err("null values are not supported".to_string()),
            Value::Sequence(_) => Err("expected a scalar, found a list".to_string()),
            Value::Mapping(_) => Err("expected a scalar, found a mapping".to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => f.write_str(&format_float(*v)),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Natural string form of a float: integral values keep one decimal place
/// (`4.0`), very large or small magnitudes use exponent notation.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let rendered = format!("{:e}", value);
        match rendered.split_once('e') {
            Some((mantissa, exp)) => {
                let (sign, digits) = match exp.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exp),
                };
                format!("{}e{}{:0>2}", mantissa, sign, digits)
            }
            None => rendered,
        }
    } else if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Returns the body of a backtick expression, or `None` if `text` is not
/// entirely enclosed in backticks.
pub fn expression_body(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('`') && trimmed.ends_with('`') {
        Some(&trimmed[1..trimmed.len() - 1])
    } else {
        None
    }
}

/// Value bound to a parameter name before resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Literal value (strings may still contain `%(name)` placeholders).
    Scalar(Scalar),
    /// Backtick-enclosed expression, stored with its delimiters.
    Expression(String),
    /// List of literal values.
    Sequence(Vec<Scalar>),
}

impl ParamValue {
    /// Converts a YAML node into a parameter value.
    pub fn from_yaml(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(s) if expression_body(s).is_some() => Ok(Self::Expression(s.clone())),
            Value::Sequence(items) => items
                .iter()
                .map(Scalar::from_yaml)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Sequence),
            Value::Tagged(tagged) => Self::from_yaml(&tagged.value),
            other => Scalar::from_yaml(other).map(Self::Scalar),
        }
    }

    /// Template text of string-like values, which may contain placeholders.
    pub fn template_text(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::Str(s)) | Self::Expression(s) => Some(s),
            _ => None,
        }
    }

    /// Natural string form; sequences are joined with single spaces.
    pub fn natural_text(&self) -> String {
        match self {
            Self::Scalar(s) => s.to_string(),
            Self::Expression(e) => e.clone(),
            Self::Sequence(items) => items
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl From<Scalar> for ParamValue {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        if expression_body(value).is_some() {
            Self::Expression(value.to_string())
        } else {
            Self::Scalar(Scalar::from(value))
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Scalar(Scalar::Int(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Scalar(Scalar::Float(value))
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Scalar(s) => s.serialize(serializer),
            Self::Expression(e) => serializer.serialize_str(e),
            Self::Sequence(items) => items.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ParamValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_yaml(&value).map_err(de::Error::custom)
    }
}
