//! Expression Module
//!
//! Allow-listed arithmetic over resolved parameter values, written between
//! backticks in the configuration:
//!
//! ```yaml
//! parameters:
//!   squared: "`pow(%(num),2)`"
//!   dt: "`%(tfinal) / %(steps)`"
//! ```
//!
//! - [`lexer`] / [`parser`]: Tokens and the [`Expr`] tree
//! - [`evaluator`]: Tree-walking evaluation to a [`Scalar`]
//! - [`functions`]: The function and constant allow-list
//! - [`dependency`]: Topological resolution of inter-dependent parameters

pub mod dependency;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;

pub use dependency::{dependency_order, resolve_parameters};
pub use evaluator::{EvalError, Evaluator};
pub use lexer::{LexError, Lexer, Token};
pub use parser::{BinaryOp, Expr, ExprParser, ParseExprError, UnaryOp};

use crate::config::value::Scalar;
use crate::error::{Error, Result};

/// Evaluates an expression body whose placeholders are already substituted.
///
/// # Example
///
/// ```rust
/// use chauffeur::config::Scalar;
/// use chauffeur::expression::evaluate;
///
/// assert_eq!(evaluate("pow(3,2)").unwrap(), Scalar::Float(9.0));
/// assert_eq!(evaluate("7 // 2").unwrap(), Scalar::Int(3));
/// ```
pub fn evaluate(expression: &str) -> Result<Scalar> {
    let failed = |message: String| Error::ExpressionError {
        expression: expression.to_string(),
        message,
    };

    let ast = ExprParser::parse_str(expression).map_err(|e| failed(e.to_string()))?;
    Evaluator::new()
        .evaluate(&ast)
        .map_err(|e| failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_success() {
        assert_eq!(evaluate("1 + 2").unwrap(), Scalar::Int(3));
        assert_eq!(evaluate(" sqrt(16) ").unwrap(), Scalar::Float(4.0));
        assert_eq!(evaluate("'a' + 'b'").unwrap(), Scalar::from("ab"));
    }

    #[test]
    fn test_evaluate_errors_carry_expression() {
        for input in ["1 +", "1 / 0", "system('ls')", ""] {
            match evaluate(input) {
                Err(Error::ExpressionError { expression, .. }) => assert_eq!(expression, input),
                other => panic!("{:?}: expected expression error, got {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_deep_nesting_is_expression_error() {
        let input = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(matches!(evaluate(&input), Err(Error::ExpressionError { .. })));

        let input = format!("{}2", "-".repeat(100));
        assert!(matches!(evaluate(&input), Err(Error::ExpressionError { .. })));
    }
}
