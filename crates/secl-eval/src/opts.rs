use std::collections::HashMap;

use crate::Value;

/// Options shared by every expression compiled in a rule set.
#[derive(Debug, Clone, Default)]
pub struct EvalOpts {
    constants: HashMap<String, Value>,
}

impl EvalOpts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Named values usable as identifiers, e.g. `O_CREAT`.
    pub fn with_constants<I, K>(mut self, constants: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.constants
            .extend(constants.into_iter().map(|(name, value)| (name.into(), value)));
        self
    }

    pub fn with_constant(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.constants.insert(name.into(), value.into());
        self
    }

    pub fn constants(&self) -> &HashMap<String, Value> {
        &self.constants
    }
}
