//! Runtime values shared by fields, constants, macros and variables.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::EvalError;

/// Type of a [Value].
///
/// Boolean arrays are not part of the type system: there is no operator
/// that could make use of them and they can't be appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    Int,
    String,
    StringArray,
    IntArray,
}

impl ValueType {
    /// The array type holding elements of this type, if any.
    pub fn array_type(self) -> Option<ValueType> {
        match self {
            ValueType::Int | ValueType::IntArray => Some(ValueType::IntArray),
            ValueType::String | ValueType::StringArray => Some(ValueType::StringArray),
            ValueType::Bool => None,
        }
    }

    pub fn is_array(self) -> bool {
        matches!(self, ValueType::StringArray | ValueType::IntArray)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValueType::Bool => write!(f, "bool"),
            ValueType::Int => write!(f, "int"),
            ValueType::String => write!(f, "string"),
            ValueType::StringArray => write!(f, "[]string"),
            ValueType::IntArray => write!(f, "[]int"),
        }
    }
}

/// A typed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    String(String),
    StringArray(Vec<String>),
    IntArray(Vec<i64>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::String(_) => ValueType::String,
            Value::StringArray(_) => ValueType::StringArray,
            Value::IntArray(_) => ValueType::IntArray,
        }
    }

    /// The zero value of a type: what an unset variable evaluates to.
    pub fn zero(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::String => Value::String(String::new()),
            ValueType::StringArray => Value::StringArray(Vec::new()),
            ValueType::IntArray => Value::IntArray(Vec::new()),
        }
    }

    /// Wrap a scalar into a single element array. Arrays are returned as they are.
    pub fn into_array(self) -> Result<Value, EvalError> {
        match self {
            Value::Int(i) => Ok(Value::IntArray(vec![i])),
            Value::String(s) => Ok(Value::StringArray(vec![s])),
            array @ (Value::IntArray(_) | Value::StringArray(_)) => Ok(array),
            Value::Bool(_) => Err(EvalError::NotAppendable(ValueType::Bool)),
        }
    }

    /// Append a scalar or the elements of an array of the same element type.
    pub fn append(self, other: Value) -> Result<Value, EvalError> {
        match (self, other) {
            (Value::StringArray(mut items), Value::String(s)) => {
                items.push(s);
                Ok(Value::StringArray(items))
            }
            (Value::StringArray(mut items), Value::StringArray(others)) => {
                items.extend(others);
                Ok(Value::StringArray(items))
            }
            (Value::IntArray(mut items), Value::Int(i)) => {
                items.push(i);
                Ok(Value::IntArray(items))
            }
            (Value::IntArray(mut items), Value::IntArray(others)) => {
                items.extend(others);
                Ok(Value::IntArray(items))
            }
            (target, value) => Err(EvalError::AppendMismatch {
                target: target.value_type(),
                value: value.value_type(),
            }),
        }
    }

    /// Render the value the way it appears once interpolated into a string.
    pub fn to_plain_string(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::String(s) => s.clone(),
            Value::StringArray(items) => items.join(","),
            Value::IntArray(items) => items
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    pub(crate) fn into_bool(self) -> bool {
        matches!(self, Value::Bool(true))
    }

    pub(crate) fn into_int(self) -> i64 {
        match self {
            Value::Int(i) => i,
            _ => 0,
        }
    }

    pub(crate) fn into_string(self) -> String {
        match self {
            Value::String(s) => s,
            _ => String::new(),
        }
    }

    pub(crate) fn into_string_array(self) -> Vec<String> {
        match self {
            Value::StringArray(items) => items,
            _ => Vec::new(),
        }
    }

    pub(crate) fn into_int_array(self) -> Vec<i64> {
        match self {
            Value::IntArray(items) => items,
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::StringArray(items) => {
                let items: Vec<String> = items.iter().map(|s| format!("{s:?}")).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::IntArray(items) => {
                let items: Vec<String> = items.iter().map(i64::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::StringArray(items)
    }
}

impl From<Vec<i64>> for Value {
    fn from(items: Vec<i64>) -> Self {
        Value::IntArray(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_scalar_to_array() {
        let value = Value::from(vec!["a".to_string()])
            .append(Value::from("b"))
            .unwrap();
        assert_eq!(value, Value::from(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn append_type_mismatch() {
        let err = Value::from(vec![1i64]).append(Value::from("b")).unwrap_err();
        assert!(matches!(
            err,
            EvalError::AppendMismatch {
                target: ValueType::IntArray,
                value: ValueType::String
            }
        ));
    }

    #[test]
    fn bool_has_no_array_type() {
        assert_eq!(ValueType::Bool.array_type(), None);
        assert!(Value::Bool(true).into_array().is_err());
        assert_eq!(Value::Int(3).into_array().unwrap(), Value::IntArray(vec![3]));
    }

    #[test]
    fn display() {
        assert_eq!(Value::from(vec![1i64, 2]).to_string(), "[1, 2]");
        assert_eq!(Value::from("a").to_string(), r#""a""#);
        assert_eq!(Value::from(vec![1i64, 2]).to_plain_string(), "1,2");
    }
}
