use serde::{Deserialize, Serialize};

use crate::{BitOperator, Operator};

/// Expression tree produced by the parser, before validation against a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "content")]
pub enum Expr {
    Or {
        l: Box<Expr>,
        r: Box<Expr>,
    },
    And {
        l: Box<Expr>,
        r: Box<Expr>,
    },
    Not {
        inner: Box<Expr>,
    },
    Compare {
        l: Box<Expr>,
        op: Operator,
        r: Box<Expr>,
    },
    Bitwise {
        l: Box<Expr>,
        op: BitOperator,
        r: Box<Expr>,
    },
    Bool(bool),
    Int(i64),
    /// String literal, it may contain `${name}` variable references.
    String(String),
    /// Regular expression literal: `r"..."`.
    Regex(String),
    /// Field, macro or constant.
    Identifier(String),
    /// Variable reference: `${name}` or `${scope.name}`.
    Variable(String),
    Array(Vec<Expr>),
}
