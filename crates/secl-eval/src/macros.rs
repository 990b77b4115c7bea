use std::collections::HashMap;

use crate::{
    ast::Expr,
    compiler::{check_expression, CompileEnv},
    parse_expression, EvalError, Event, ValueType,
};

/// A named, type checked expression inlined wherever its name is referenced.
#[derive(Debug, Clone)]
pub struct Macro {
    id: String,
    expr: Expr,
    value_type: ValueType,
}

impl Macro {
    /// Parse and type check an expression macro. Only macros already present
    /// in the environment can be referenced.
    pub fn from_expression<E: Event>(
        id: &str,
        expression: &str,
        env: &CompileEnv<'_, E>,
    ) -> Result<Self, EvalError> {
        let expr = parse_expression(expression)?;
        let value_type = check_expression(&expr, env)?;

        Ok(Self {
            id: id.to_string(),
            expr,
            value_type,
        })
    }

    /// A list of string values, usable on the right of `in`.
    pub fn from_values(id: &str, values: &[String]) -> Result<Self, EvalError> {
        if values.is_empty() {
            return Err(EvalError::EmptyArray);
        }

        Ok(Self {
            id: id.to_string(),
            expr: Expr::Array(values.iter().cloned().map(Expr::String).collect()),
            value_type: ValueType::StringArray,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }
}

#[derive(Debug, Clone, Default)]
pub struct MacroStore {
    macros: HashMap<String, Macro>,
}

impl MacroStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, r#macro: Macro) {
        self.macros.insert(r#macro.id.clone(), r#macro);
    }

    pub fn get(&self, id: &str) -> Option<&Macro> {
        self.macros.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.macros.contains_key(id)
    }

    /// Sorted macro IDs.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.macros.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Macro> {
        self.macros.values()
    }
}
