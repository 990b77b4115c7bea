//! Variables readable from expressions as `${name}` and written by rule actions.
//!
//! Global variables hold a single value. Scoped variables (`${scope.name}`)
//! hold one value per scope instance, the instance being resolved from the
//! event by a [VariableProvider].

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use crate::{Context, EvalError, Value, ValueType};

pub trait Variable<E>: Send + Sync {
    fn value_type(&self) -> ValueType;

    /// Current value, `None` when the variable was never set in this context.
    fn get(&self, ctx: &Context<'_, E>) -> Option<Value>;

    fn set(&self, ctx: &Context<'_, E>, value: Value) -> Result<(), EvalError>;

    /// Append a value, or the elements of an array, to the current value.
    fn append(&self, ctx: &Context<'_, E>, value: Value) -> Result<(), EvalError> {
        let current = match self.get(ctx) {
            Some(current) => current.into_array()?,
            None => Value::zero(self.value_type()),
        };
        self.set(ctx, current.append(value)?)
    }
}

/// Name-indexed variables declared by a rule set: `name` for global
/// variables, `scope.name` for scoped ones.
pub type VariableMap<E> = HashMap<String, Arc<dyn Variable<E>>>;

fn check_type(expected: ValueType, value: &Value) -> Result<(), EvalError> {
    let got = value.value_type();
    if expected != got {
        return Err(EvalError::VariableTypeMismatch { expected, got });
    }
    Ok(())
}

/// A variable holding a single value shared by every event.
pub struct GlobalVariable {
    value_type: ValueType,
    value: RwLock<Option<Value>>,
}

impl GlobalVariable {
    pub fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            value: RwLock::new(None),
        }
    }

    pub fn with_value(value: Value) -> Self {
        Self {
            value_type: value.value_type(),
            value: RwLock::new(Some(value)),
        }
    }

    /// Current value, independent from any evaluation context.
    pub fn value(&self) -> Option<Value> {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<E> Variable<E> for GlobalVariable {
    fn value_type(&self) -> ValueType {
        self.value_type
    }

    fn get(&self, _ctx: &Context<'_, E>) -> Option<Value> {
        self.value()
    }

    fn set(&self, _ctx: &Context<'_, E>, value: Value) -> Result<(), EvalError> {
        check_type(self.value_type, &value)?;
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = Some(value);
        Ok(())
    }
}

impl fmt::Debug for GlobalVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalVariable")
            .field("value_type", &self.value_type)
            .field("value", &self.value())
            .finish()
    }
}

/// Creates the variables of a scope.
pub trait VariableProvider<E>: Send + Sync {
    fn get_variable(
        &self,
        name: &str,
        value_type: ValueType,
    ) -> Result<Arc<dyn Variable<E>>, EvalError>;

    /// Drop the values of the scope instance `event` belongs to.
    fn release_instance(&self, _event: &E) {}
}

/// Builds a fresh [VariableProvider] each time a rule set is created.
pub type VariableProviderFactory<E> = Arc<dyn Fn() -> Box<dyn VariableProvider<E>> + Send + Sync>;

type KeyFn<E> = Arc<dyn Fn(&E) -> Option<String> + Send + Sync>;
type ScopedStore = Arc<RwLock<HashMap<(String, String), Value>>>;

/// A provider storing one value per scope instance, the instance key being
/// extracted from the event.
pub struct KeyedVariableProvider<E> {
    key: KeyFn<E>,
    store: ScopedStore,
}

impl<E: 'static> KeyedVariableProvider<E> {
    pub fn new<F>(key: F) -> Self
    where
        F: Fn(&E) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            key: Arc::new(key),
            store: Arc::default(),
        }
    }

    /// Forget every value stored for a scope instance.
    pub fn release(&self, key: &str) {
        self.store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(instance, _), _| instance != key);
    }
}

impl<E: 'static> VariableProvider<E> for KeyedVariableProvider<E> {
    fn get_variable(
        &self,
        name: &str,
        value_type: ValueType,
    ) -> Result<Arc<dyn Variable<E>>, EvalError> {
        Ok(Arc::new(ScopedVariable {
            name: name.to_string(),
            value_type,
            key: Arc::clone(&self.key),
            store: Arc::clone(&self.store),
        }))
    }

    fn release_instance(&self, event: &E) {
        if let Some(key) = (self.key)(event) {
            self.release(&key);
        }
    }
}

struct ScopedVariable<E> {
    name: String,
    value_type: ValueType,
    key: KeyFn<E>,
    store: ScopedStore,
}

impl<E> Variable<E> for ScopedVariable<E> {
    fn value_type(&self) -> ValueType {
        self.value_type
    }

    fn get(&self, ctx: &Context<'_, E>) -> Option<Value> {
        let key = (self.key)(ctx.event())?;
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(key, self.name.clone()))
            .cloned()
    }

    fn set(&self, ctx: &Context<'_, E>, value: Value) -> Result<(), EvalError> {
        check_type(self.value_type, &value)?;
        let key = (self.key)(ctx.event())
            .ok_or_else(|| EvalError::Provider(format!("no scope instance for `{}`", self.name)))?;
        self.store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((key, self.name.clone()), value);
        Ok(())
    }
}
