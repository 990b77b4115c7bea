//! Rule actions: setting and appending to variables.

use std::sync::Arc;

use secl_eval::{Context, EvalError, Event, Model, Value, ValueType, Variable};
use thiserror::Error;

use crate::SetDefinition;

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("variable name is missing")]
    NoName,
    #[error("either a value or a field is required")]
    NoValue,
    #[error("a value and a field can't be both specified")]
    BothFieldAndValue,
    #[error("arrays of booleans are not supported")]
    BoolArray,
    #[error("array elements must share the same type")]
    HeterogeneousArray,
    #[error("empty arrays are not supported")]
    EmptyArray,
    #[error("unsupported value: {0}")]
    UnsupportedValue(String),
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("values of type {0} can't be appended")]
    NotAppendable(ValueType),
    #[error("unknown variable scope `{0}`")]
    UnknownScope(String),
}

/// Convert a YAML action value into a typed [Value].
pub fn parse_action_value(value: &serde_yaml::Value) -> Result<Value, ActionError> {
    match value {
        serde_yaml::Value::Sequence(items) => {
            let items = items
                .iter()
                .map(parse_scalar)
                .collect::<Result<Vec<_>, _>>()?;

            match items.first().map(Value::value_type) {
                None => Err(ActionError::EmptyArray),
                Some(ValueType::Int) => items
                    .into_iter()
                    .map(|item| match item {
                        Value::Int(i) => Ok(i),
                        _ => Err(ActionError::HeterogeneousArray),
                    })
                    .collect::<Result<_, _>>()
                    .map(Value::IntArray),
                Some(ValueType::String) => items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s),
                        _ => Err(ActionError::HeterogeneousArray),
                    })
                    .collect::<Result<_, _>>()
                    .map(Value::StringArray),
                Some(_) => Err(ActionError::BoolArray),
            }
        }
        value => parse_scalar(value),
    }
}

fn parse_scalar(value: &serde_yaml::Value) -> Result<Value, ActionError> {
    match value {
        serde_yaml::Value::Null => Err(ActionError::NoValue),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .ok_or_else(|| ActionError::UnsupportedValue(n.to_string())),
        serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
        other => Err(ActionError::UnsupportedValue(
            serde_yaml::to_string(other)
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
        )),
    }
}

/// Where the value of a set action comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SetSource {
    Value(Value),
    Field(String),
}

/// A set action checked against the model, ready to declare its variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSet {
    pub name: String,
    pub scope: Option<String>,
    pub value_type: ValueType,
    pub source: SetSource,
    pub append: bool,
}

impl ResolvedSet {
    /// Name the variable is referenced with in expressions.
    pub fn key(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{scope}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl SetDefinition {
    /// Check the definition and compute the type of the variable it writes.
    ///
    /// Appending makes the variable an array of the value type.
    pub fn resolve<E: Event>(&self, model: &Model<E>) -> Result<ResolvedSet, ActionError> {
        if self.name.is_empty() {
            return Err(ActionError::NoName);
        }

        let (source, value_type) = match (&self.value, &self.field) {
            (Some(_), Some(_)) => return Err(ActionError::BothFieldAndValue),
            (None, None) => return Err(ActionError::NoValue),
            (Some(value), None) => {
                let value = parse_action_value(value)?;
                let value_type = value.value_type();
                (SetSource::Value(value), value_type)
            }
            (None, Some(field)) => {
                let value_type = model
                    .field_type(field)
                    .ok_or_else(|| ActionError::UnknownField(field.clone()))?;
                (SetSource::Field(field.clone()), value_type)
            }
        };

        let value_type = if self.append {
            value_type
                .array_type()
                .ok_or(ActionError::NotAppendable(value_type))?
        } else {
            value_type
        };

        Ok(ResolvedSet {
            name: self.name.clone(),
            scope: self.scope.clone(),
            value_type,
            source,
            append: self.append,
        })
    }
}

/// Runtime form of a set action.
pub struct SetAction<E> {
    key: String,
    variable: Arc<dyn Variable<E>>,
    source: SetSource,
    append: bool,
}

impl<E: Event> SetAction<E> {
    pub(crate) fn new(set: ResolvedSet, variable: Arc<dyn Variable<E>>) -> Self {
        Self {
            key: set.key(),
            variable,
            source: set.source,
            append: set.append,
        }
    }

    /// Variable written by the action.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn execute(&self, ctx: &Context<'_, E>, model: &Model<E>) -> Result<(), EvalError> {
        let value = match &self.source {
            SetSource::Value(value) => value.clone(),
            SetSource::Field(field) => model
                .field_value(ctx.event(), field)
                .ok_or_else(|| EvalError::UnknownIdentifier(field.clone()))?,
        };

        if self.append {
            self.variable.append(ctx, value)
        } else {
            self.variable.set(ctx, value)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::TestEvent;

    use super::*;

    fn yaml(s: &str) -> serde_yaml::Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn action_values() {
        assert_eq!(parse_action_value(&yaml("true")).unwrap(), Value::Bool(true));
        assert_eq!(parse_action_value(&yaml("123")).unwrap(), Value::Int(123));
        assert_eq!(
            parse_action_value(&yaml("value")).unwrap(),
            Value::from("value")
        );
        assert_eq!(
            parse_action_value(&yaml("[val1, val2]")).unwrap(),
            Value::from(vec!["val1".to_string(), "val2".to_string()])
        );
        assert_eq!(
            parse_action_value(&yaml("[1, 2]")).unwrap(),
            Value::from(vec![1i64, 2])
        );
    }

    #[test]
    fn invalid_action_values() {
        assert!(matches!(
            parse_action_value(&yaml("[true]")),
            Err(ActionError::BoolArray)
        ));
        assert!(matches!(
            parse_action_value(&yaml("[string, true]")),
            Err(ActionError::HeterogeneousArray)
        ));
        assert!(matches!(
            parse_action_value(&yaml("[1, 2, three]")),
            Err(ActionError::HeterogeneousArray)
        ));
        assert!(matches!(
            parse_action_value(&yaml("[true, 1]")),
            Err(ActionError::BoolArray)
        ));
        assert!(matches!(
            parse_action_value(&yaml("[]")),
            Err(ActionError::EmptyArray)
        ));
        assert!(matches!(
            parse_action_value(&yaml("~")),
            Err(ActionError::NoValue)
        ));
        assert!(matches!(
            parse_action_value(&yaml("1.5")),
            Err(ActionError::UnsupportedValue(_))
        ));
        assert!(matches!(
            parse_action_value(&yaml("{a: 1}")),
            Err(ActionError::UnsupportedValue(_))
        ));
    }

    #[test]
    fn resolve_types() {
        let model = <TestEvent as Event>::model();

        let set = SetDefinition {
            name: "var10".to_string(),
            field: Some("open.filename".to_string()),
            append: true,
            ..Default::default()
        };
        let resolved = set.resolve(&model).unwrap();
        assert_eq!(resolved.value_type, ValueType::StringArray);
        assert_eq!(resolved.key(), "var10");

        let set = SetDefinition {
            name: "var4".to_string(),
            value: Some(yaml("123")),
            scope: Some("process".to_string()),
            ..Default::default()
        };
        let resolved = set.resolve(&model).unwrap();
        assert_eq!(resolved.value_type, ValueType::Int);
        assert_eq!(resolved.key(), "process.var4");
    }

    #[test]
    fn resolve_errors() {
        let model = <TestEvent as Event>::model();

        let both = SetDefinition {
            name: "var1".to_string(),
            value: Some(yaml("[abc]")),
            field: Some("open.filename".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            both.resolve(&model),
            Err(ActionError::BothFieldAndValue)
        ));

        let bool_append = SetDefinition {
            name: "var1".to_string(),
            field: Some("process.is_root".to_string()),
            append: true,
            ..Default::default()
        };
        assert!(matches!(
            bool_append.resolve(&model),
            Err(ActionError::NotAppendable(ValueType::Bool))
        ));

        let unknown = SetDefinition {
            name: "var1".to_string(),
            field: Some("open.unknown".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            unknown.resolve(&model),
            Err(ActionError::UnknownField(_))
        ));
    }
}
