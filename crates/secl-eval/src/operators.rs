//! This module contains the operators available in expressions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Enum of all the comparison operators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "content")]
pub enum Operator {
    Relational(RelationalOperator),
    Pattern(PatternOperator),
    Multi(MultiOperator),
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operator::Relational(op) => write!(f, "{op}"),
            Operator::Pattern(op) => write!(f, "{op}"),
            Operator::Multi(op) => write!(f, "{op}"),
        }
    }
}

/// Relational operators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RelationalOperator {
    Equals,
    NotEquals,
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
}

impl RelationalOperator {
    pub fn apply<T: PartialEq + PartialOrd>(&self, first: T, second: T) -> bool {
        match self {
            RelationalOperator::Equals => first == second,
            RelationalOperator::NotEquals => first != second,
            RelationalOperator::Greater => first > second,
            RelationalOperator::Less => first < second,
            RelationalOperator::GreaterEqual => first >= second,
            RelationalOperator::LessEqual => first <= second,
        }
    }

    /// Apply the operator between every element of a collection and a value.
    ///
    /// `!=` holds when no element is equal to the value, every other
    /// operator holds when at least one element satisfies it.
    pub fn apply_any<T: PartialEq + PartialOrd>(&self, items: &[T], second: &T) -> bool {
        match self {
            RelationalOperator::NotEquals => !items.iter().any(|item| item == second),
            op => items.iter().any(|item| op.apply(item, second)),
        }
    }

    pub fn is_equality(&self) -> bool {
        matches!(
            self,
            RelationalOperator::Equals | RelationalOperator::NotEquals
        )
    }
}

impl fmt::Display for RelationalOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            RelationalOperator::Equals => "==",
            RelationalOperator::NotEquals => "!=",
            RelationalOperator::Greater => ">",
            RelationalOperator::Less => "<",
            RelationalOperator::GreaterEqual => ">=",
            RelationalOperator::LessEqual => "<=",
        };
        write!(f, "{symbol}")
    }
}

/// Operators matching strings against glob patterns or regular expressions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PatternOperator {
    Matches,
    NotMatches,
}

impl PatternOperator {
    pub fn apply(&self, matched: bool) -> bool {
        match self {
            PatternOperator::Matches => matched,
            PatternOperator::NotMatches => !matched,
        }
    }
}

impl fmt::Display for PatternOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PatternOperator::Matches => write!(f, "=~"),
            PatternOperator::NotMatches => write!(f, "!~"),
        }
    }
}

/// Operators intended to be used on collections.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MultiOperator {
    In,
    NotIn,
}

impl MultiOperator {
    pub fn apply<T: PartialEq>(&self, items: &[T], value: &T) -> bool {
        match self {
            MultiOperator::In => items.contains(value),
            MultiOperator::NotIn => !items.contains(value),
        }
    }
}

impl fmt::Display for MultiOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MultiOperator::In => write!(f, "in"),
            MultiOperator::NotIn => write!(f, "not in"),
        }
    }
}

/// Bitwise operators between integers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BitOperator {
    And,
    Or,
    Xor,
}

impl BitOperator {
    pub fn apply(&self, first: i64, second: i64) -> i64 {
        match self {
            BitOperator::And => first & second,
            BitOperator::Or => first | second,
            BitOperator::Xor => first ^ second,
        }
    }
}

impl fmt::Display for BitOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BitOperator::And => write!(f, "&"),
            BitOperator::Or => write!(f, "|"),
            BitOperator::Xor => write!(f, "^"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relational_any() {
        let items = [1, 5, 9];
        assert!(RelationalOperator::Equals.apply_any(&items, &5));
        assert!(!RelationalOperator::NotEquals.apply_any(&items, &5));
        assert!(RelationalOperator::NotEquals.apply_any(&items, &4));
        assert!(RelationalOperator::Greater.apply_any(&items, &8));
        assert!(!RelationalOperator::Greater.apply_any(&items, &9));
        assert!(RelationalOperator::LessEqual.apply(3, 3));
    }

    #[test]
    fn multi() {
        let items = ["a".to_string()];
        assert!(MultiOperator::In.apply(&items, &"a".to_string()));
        assert!(MultiOperator::NotIn.apply(&items, &"b".to_string()));
    }
}
