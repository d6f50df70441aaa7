//! Placeholder Format Specs
//!
//! printf-style directives used in `%(name:spec)` placeholders and in the
//! driver's `intformat` / `floatformat` options:
//!
//! ```text
//! [%][flags][width][.precision]conversion
//!
//! flags       -  +  space  0  #
//! conversion  d i u        integer (floats are truncated)
//!             x X o        integer in base 16 / 8
//!             f F e E g G  floating point
//!             s            natural string form, padded / truncated
//! ```
//!
//! Strings that parse as numbers are accepted by the numeric conversions;
//! anything else is a [`Error::MalformedFormat`].

use crate::config::value::Scalar;
use crate::error::{Error, Result};

/// Format specs applied to placeholders that carry no inline spec.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultFormats {
    pub int: Option<String>,
    pub float: Option<String>,
}

impl DefaultFormats {
    /// Default spec for a value's type, if one is configured.
    pub fn spec_for(&self, value: &Scalar) -> Option<&str> {
        match value {
            Scalar::Int(_) => self.int.as_deref(),
            Scalar::Float(_) => self.float.as_deref(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.int.is_none() && self.float.is_none()
    }
}

/// Formats `value` according to `spec`.
///
/// # Example
///
/// ```rust
/// use chauffeur::config::Scalar;
/// use chauffeur::params::format_scalar;
///
/// assert_eq!(format_scalar("04d", &Scalar::Int(7)).unwrap(), "0007");
/// assert_eq!(format_scalar(".2f", &Scalar::Float(3.14159)).unwrap(), "3.14");
/// ```
pub fn format_scalar(spec: &str, value: &Scalar) -> Result<String> {
    let malformed = || Error::MalformedFormat {
        spec: spec.to_string(),
        value: value.to_string(),
        kind: value.kind(),
    };

    let parsed = FormatSpec::parse(spec).ok_or_else(malformed)?;
    parsed.apply(value).ok_or_else(malformed)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn of(value: &Scalar) -> Option<Self> {
        match value {
            Scalar::Bool(b) => Some(Self::Int(i64::from(*b))),
            Scalar::Int(i) => Some(Self::Int(*i)),
            Scalar::Float(f) => Some(Self::Float(*f)),
            Scalar::Str(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Self::Int)
                    .or_else(|_| s.parse::<f64>().map(Self::Float))
                    .ok()
            }
        }
    }

    fn to_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct FormatSpec {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alt: bool,
    width: usize,
    precision: Option<usize>,
    conversion: char,
}

impl FormatSpec {
    fn parse(spec: &str) -> Option<Self> {
        let body = spec.strip_prefix('%').unwrap_or(spec);
        let mut chars = body.chars().peekable();
        let mut parsed = Self::default();

        while let Some(&c) = chars.peek() {
            match c {
                '-' => parsed.left = true,
                '+' => parsed.plus = true,
                ' ' => parsed.space = true,
                '0' => parsed.zero = true,
                '#' => parsed.alt = true,
                _ => break,
            }
            chars.next();
        }

        parsed.width = read_number(&mut chars)?;
        if chars.peek() == Some(&'.') {
            chars.next();
            parsed.precision = Some(read_number(&mut chars)?);
        }

        parsed.conversion = chars.next()?;
        if chars.next().is_some() || !"diuxXofFeEgGs".contains(parsed.conversion) {
            return None;
        }
        Some(parsed)
    }

    fn apply(&self, value: &Scalar) -> Option<String> {
        match self.conversion {
            's' => {
                let text = value.to_string();
                let text = match self.precision {
                    Some(p) => text.chars().take(p).collect(),
                    None => text,
                };
                Some(self.pad("", "", &text, false))
            }
            'd' | 'i' | 'u' => {
                let n = match Number::of(value)? {
                    Number::Int(i) => i,
                    Number::Float(f) if f.is_finite() => f.trunc() as i64,
                    Number::Float(_) => return None,
                };
                let digits = self.min_digits(n.unsigned_abs().to_string());
                Some(self.pad(self.sign(n < 0), "", &digits, true))
            }
            'x' | 'X' | 'o' => {
                let Number::Int(n) = Number::of(value)? else {
                    return None;
                };
                let (digits, prefix) = match self.conversion {
                    'x' => (format!("{:x}", n.unsigned_abs()), "0x"),
                    'X' => (format!("{:X}", n.unsigned_abs()), "0X"),
                    _ => (format!("{:o}", n.unsigned_abs()), "0o"),
                };
                let prefix = if self.alt { prefix } else { "" };
                let digits = self.min_digits(digits);
                Some(self.pad(self.sign(n < 0), prefix, &digits, true))
            }
            _ => {
                let x = Number::of(value)?.to_f64();
                let negative = !x.is_nan() && x.is_sign_negative();
                let mut body = if x.is_nan() {
                    "nan".to_string()
                } else if x.is_infinite() {
                    "inf".to_string()
                } else {
                    self.float_body(x.abs())
                };
                if self.conversion.is_ascii_uppercase() {
                    body = body.to_uppercase();
                }
                let finite = x.is_finite();
                let padded = self.pad(self.sign(negative), "", &body, finite);
                Some(padded)
            }
        }
    }

    fn float_body(&self, x: f64) -> String {
        let precision = self.precision.unwrap_or(6);
        match self.conversion.to_ascii_lowercase() {
            'f' => format!("{:.*}", precision, x),
            'e' => exponent_form(x, precision),
            _ => {
                let p = precision.max(1);
                let exp = decimal_exponent(x, p - 1);
                let body = if exp >= -4 && exp < p as i32 {
                    format!("{:.*}", (p as i32 - 1 - exp) as usize, x)
                } else {
                    exponent_form(x, p - 1)
                };
                if self.alt {
                    body
                } else {
                    strip_trailing_zeros(&body)
                }
            }
        }
    }

    fn min_digits(&self, digits: String) -> String {
        match self.precision {
            Some(p) if p > digits.len() => format!("{}{}", "0".repeat(p - digits.len()), digits),
            _ => digits,
        }
    }

    fn sign(&self, negative: bool) -> &'static str {
        if negative {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        }
    }

    fn pad(&self, sign: &str, prefix: &str, body: &str, zero_fill: bool) -> String {
        let len = sign.len() + prefix.len() + body.chars().count();
        if self.width <= len {
            return format!("{}{}{}", sign, prefix, body);
        }
        let fill = self.width - len;
        if self.left {
            format!("{}{}{}{}", sign, prefix, body, " ".repeat(fill))
        } else if self.zero && zero_fill {
            format!("{}{}{}{}", sign, prefix, "0".repeat(fill), body)
        } else {
            format!("{}{}{}{}", " ".repeat(fill), sign, prefix, body)
        }
    }
}

/// Largest accepted width or precision.
const MAX_FIELD: usize = 1024;

fn read_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<usize> {
    let mut n: usize = 0;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        n = n * 10 + d as usize;
        if n > MAX_FIELD {
            return None;
        }
        chars.next();
    }
    Some(n)
}

/// `d.ddde+XX` with at least two exponent digits.
fn exponent_form(x: f64, precision: usize) -> String {
    let rendered = format!("{:.*e}", precision, x);
    match rendered.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => rendered,
    }
}

/// Decimal exponent of `x` after rounding to `precision` fractional digits.
fn decimal_exponent(x: f64, precision: usize) -> i32 {
    if x == 0.0 {
        return 0;
    }
    format!("{:.*e}", precision, x)
        .split_once('e')
        .and_then(|(_, exp)| exp.parse().ok())
        .unwrap_or(0)
}

fn strip_trailing_zeros(body: &str) -> String {
    let (mantissa, exponent) = match body.find('e') {
        Some(pos) => body.split_at(pos),
        None => (body, ""),
    };
    let mantissa = if mantissa.contains('.') {
        mantissa.trim_end_matches('0').trim_end_matches('.')
    } else {
        mantissa
    };
    format!("{}{}", mantissa, exponent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(spec: &str, value: impl Into<Scalar>) -> String {
        format_scalar(spec, &value.into()).unwrap()
    }

    #[test]
    fn test_zero_padded_integer() {
        assert_eq!(fmt("04d", 7i64), "0007");
        assert_eq!(fmt("%04d", 7i64), "0007");
        assert_eq!(fmt("05d", -7i64), "-0007");
        assert_eq!(fmt("+d", 5i64), "+5");
        assert_eq!(fmt(".3d", 7i64), "007");
    }

    #[test]
    fn test_fixed_precision() {
        assert_eq!(fmt(".2f", 3.14159), "3.14");
        assert_eq!(fmt("8.3f", 2.5), "   2.500");
        assert_eq!(fmt("-8.1f", 2.5), "2.5     ");
        assert_eq!(fmt("f", 1i64), "1.000000");
    }

    #[test]
    fn test_exponent_form() {
        assert_eq!(fmt("12.7e", 3.0), "3.0000000e+00");
        assert_eq!(fmt(".2e", 0.000123), "1.23e-04");
        assert_eq!(fmt(".1E", 12345.0), "1.2E+04");
    }

    #[test]
    fn test_general_form() {
        assert_eq!(fmt("g", 0.0001), "0.0001");
        assert_eq!(fmt("g", 0.00001), "1e-05");
        assert_eq!(fmt("g", 100000.0), "100000");
        assert_eq!(fmt("g", 123456789.0), "1.23457e+08");
        assert_eq!(fmt("g", 2.5), "2.5");
        assert_eq!(fmt("g", 0.0), "0");
    }

    #[test]
    fn test_integer_bases() {
        assert_eq!(fmt("x", 255i64), "ff");
        assert_eq!(fmt("#X", 255i64), "0XFF");
        assert_eq!(fmt("o", 8i64), "10");
        assert_eq!(fmt("#06x", 255i64), "0x00ff");
    }

    #[test]
    fn test_float_truncated_by_integer_conversion() {
        assert_eq!(fmt("d", 3.9), "3");
        assert_eq!(fmt("03d", true), "001");
    }

    #[test]
    fn test_string_padding() {
        assert_eq!(fmt("6s", "ab"), "    ab");
        assert_eq!(fmt("-6s", "ab"), "ab    ");
        assert_eq!(fmt(".2s", "abcdef"), "ab");
        assert_eq!(fmt("s", 4.0), "4.0");
    }

    #[test]
    fn test_numeric_string_accepted() {
        assert_eq!(fmt("03d", "7"), "007");
        assert_eq!(fmt(".1f", " 2.26 "), "2.3");
    }

    #[test]
    fn test_non_numeric_value_rejected() {
        let err = format_scalar("04d", &Scalar::from("abc")).unwrap_err();
        assert!(matches!(err, Error::MalformedFormat { kind: "string", .. }));
        assert!(format_scalar("x", &Scalar::Float(1.5)).is_err());
    }

    #[test]
    fn test_malformed_specs() {
        for spec in ["", "4", "04q", "d4", "%%d", ".f2"] {
            assert!(
                format_scalar(spec, &Scalar::Int(1)).is_err(),
                "spec {:?} should be rejected",
                spec
            );
        }
    }

    #[test]
    fn test_oversized_width_and_precision_rejected() {
        for spec in ["9999999999999999d", "1025d", ".9999999999f", "1.2000g", ".5000s"] {
            let err = format_scalar(spec, &Scalar::Int(7)).unwrap_err();
            assert!(
                matches!(err, Error::MalformedFormat { .. }),
                "spec {:?} should be malformed",
                spec
            );
        }
        assert_eq!(fmt("1024d", 7i64).len(), 1024);
        assert_eq!(fmt(".1024f", 0.5).len(), 1026);
    }

    #[test]
    fn test_spec_ending_after_flags_rejected() {
        for spec in ["-", "%-", "+0", "#", "05", "-8."] {
            let err = format_scalar(spec, &Scalar::Int(1)).unwrap_err();
            assert!(
                matches!(err, Error::MalformedFormat { kind: "integer", .. }),
                "spec {:?} should be malformed",
                spec
            );
        }
    }

    #[test]
    fn test_non_finite_floats() {
        assert_eq!(fmt("08.2f", f64::INFINITY), "     inf");
        assert_eq!(fmt("F", f64::NAN), "NAN");
        assert_eq!(fmt("e", f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn test_default_formats() {
        let defaults = DefaultFormats {
            int: Some("%d".to_string()),
            float: Some("%12.7e".to_string()),
        };
        assert_eq!(defaults.spec_for(&Scalar::Int(1)), Some("%d"));
        assert_eq!(defaults.spec_for(&Scalar::Float(1.0)), Some("%12.7e"));
        assert_eq!(defaults.spec_for(&Scalar::from("x")), None);
        assert!(DefaultFormats::default().is_empty());
    }
}
