//! Description of the events rules are evaluated against.
//!
//! A [Model] lists the fields available to expressions. Every field has a
//! name, the event type it belongs to and an accessor extracting its value
//! from an event. Fields with an empty event type are common to all events.

use std::{collections::HashMap, fmt, sync::Arc};

use crate::{Value, ValueType};

/// Event type of rules not bound to any specific event.
pub const WILDCARD_EVENT_TYPE: &str = "*";

/// An event rules can be evaluated against.
pub trait Event: Sized + Send + Sync + 'static {
    /// Type of the event, it must match the event type of one of the model fields.
    fn event_type(&self) -> &str;

    /// Fields available in expressions.
    fn model() -> Model<Self>;
}

/// Rust types a field accessor can return.
pub trait FieldType: Into<Value> {
    const VALUE_TYPE: ValueType;
}

impl FieldType for bool {
    const VALUE_TYPE: ValueType = ValueType::Bool;
}

impl FieldType for i64 {
    const VALUE_TYPE: ValueType = ValueType::Int;
}

impl FieldType for String {
    const VALUE_TYPE: ValueType = ValueType::String;
}

impl FieldType for Vec<String> {
    const VALUE_TYPE: ValueType = ValueType::StringArray;
}

impl FieldType for Vec<i64> {
    const VALUE_TYPE: ValueType = ValueType::IntArray;
}

pub(crate) type Accessor<E> = Arc<dyn Fn(&E) -> Value + Send + Sync>;

pub struct FieldDef<E> {
    name: &'static str,
    event_type: &'static str,
    value_type: ValueType,
    accessor: Accessor<E>,
}

impl<E> FieldDef<E> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Event type of the field, empty when the field is common to all events.
    pub fn event_type(&self) -> &'static str {
        self.event_type
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn value(&self, event: &E) -> Value {
        (self.accessor)(event)
    }

    pub(crate) fn accessor(&self) -> Accessor<E> {
        Arc::clone(&self.accessor)
    }
}

impl<E> fmt::Debug for FieldDef<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("event_type", &self.event_type)
            .field("value_type", &self.value_type)
            .finish()
    }
}

pub struct Model<E> {
    fields: HashMap<&'static str, FieldDef<E>>,
}

impl<E: Event> Model<E> {
    pub fn builder() -> ModelBuilder<E> {
        ModelBuilder {
            fields: HashMap::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef<E>> {
        self.fields.get(name)
    }

    pub fn field_type(&self, name: &str) -> Option<ValueType> {
        self.field(name).map(FieldDef::value_type)
    }

    pub fn field_value(&self, event: &E, name: &str) -> Option<Value> {
        self.field(name).map(|field| field.value(event))
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDef<E>> {
        self.fields.values()
    }

    /// Distinct, sorted event types declared by the fields.
    pub fn event_types(&self) -> Vec<&'static str> {
        let mut event_types: Vec<&'static str> = self
            .fields
            .values()
            .map(|field| field.event_type)
            .filter(|event_type| !event_type.is_empty())
            .collect();
        event_types.sort_unstable();
        event_types.dedup();
        event_types
    }
}

impl<E> fmt::Debug for Model<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("fields", &self.fields.values().collect::<Vec<_>>())
            .finish()
    }
}

pub struct ModelBuilder<E> {
    fields: HashMap<&'static str, FieldDef<E>>,
}

impl<E: Event> ModelBuilder<E> {
    /// Add a field to the model.
    ///
    /// Panics if a field with the same name was already added: models are
    /// static descriptions and a duplicate is a programming error.
    pub fn add_field<F, A>(
        mut self,
        name: &'static str,
        event_type: &'static str,
        accessor: A,
    ) -> Self
    where
        F: FieldType,
        A: Fn(&E) -> F + Send + Sync + 'static,
    {
        let field = FieldDef {
            name,
            event_type,
            value_type: F::VALUE_TYPE,
            accessor: Arc::new(move |event| accessor(event).into()),
        };

        if self.fields.insert(name, field).is_some() {
            panic!("field {name} already present in the model")
        }

        self
    }

    pub fn build(self) -> Model<E> {
        Model {
            fields: self.fields,
        }
    }
}
