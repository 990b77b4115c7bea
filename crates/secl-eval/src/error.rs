use std::fmt;

use thiserror::Error;

use crate::ValueType;

/// Error reported by the expression parser, with a 1-based position.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("syntax error: {line}:{column}: {reason}")]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),
    #[error("operator `{op}` not allowed between {left} and {right}")]
    OperatorNotAllowed {
        op: String,
        left: ValueType,
        right: ValueType,
    },
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: ValueType, got: ValueType },
    #[error("empty array")]
    EmptyArray,
    #[error("arrays of {0} are not supported")]
    InvalidArrayElement(ValueType),
    #[error("array elements must share the same type")]
    HeterogeneousArray,
    #[error("regular expression not allowed here")]
    UnexpectedRegex,
    #[error("operator `{0}` expects a pattern or a regular expression literal")]
    PatternExpected(String),
    #[error("macro `{0}` references itself")]
    RecursiveMacro(String),
    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("variable type mismatch: expected {expected}, got {got}")]
    VariableTypeMismatch { expected: ValueType, got: ValueType },
    #[error("values of type {0} can't be appended")]
    NotAppendable(ValueType),
    #[error("can't append {value} to {target}")]
    AppendMismatch { target: ValueType, value: ValueType },
    #[error("variable provider error: {0}")]
    Provider(String),
}

impl EvalError {
    pub(crate) fn operator_not_allowed(
        op: impl fmt::Display,
        left: ValueType,
        right: ValueType,
    ) -> EvalError {
        EvalError::OperatorNotAllowed {
            op: op.to_string(),
            left,
            right,
        }
    }
}
