use std::fmt;

use secl_eval::{EvalError, SyntaxError, ValueType};
use thiserror::Error;

use crate::{action::ActionError, filter::FilterError};

/// Errors of a policy provider. Any of them aborts the load attempt.
#[allow(clippy::enum_variant_names)]
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("policies directory not found: {0}")]
    DirNotFound(String),
    #[error("error listing policies: {0}")]
    PolicyListing(#[from] glob::PatternError),
    #[error("error reading policy: {name}")]
    PolicyLoading {
        name: String,
        #[source]
        error: std::io::Error,
    },
    #[error("error parsing policy file: {name}")]
    PolicyParsing {
        name: String,
        #[source]
        error: serde_yaml::Error,
    },
}

/// Why a single macro or rule definition was rejected.
#[derive(Error, Debug)]
pub enum DefinitionErrorKind {
    #[error("multiple definition with the same ID")]
    IdConflict,
    #[error("macro expression can't be merged")]
    CannotMergeExpression,
    #[error("unsupported combine value `{0}`")]
    UnsupportedCombine(String),
    #[error("no expression defined")]
    NoExpression,
    #[error("macro must have either an expression or values")]
    InvalidMacro,
    #[error(transparent)]
    Syntax(SyntaxError),
    #[error(transparent)]
    Eval(EvalError),
    #[error("rule with multiple event types: {}", .0.join(", "))]
    MultipleEventTypes(Vec<String>),
    #[error("field `{field}` doesn't belong to event type `{event_type}`")]
    FieldEventType { field: String, event_type: String },
    #[error("invalid action: {0}")]
    Action(#[from] ActionError),
    #[error("variable `{name}` already declared with type {existing}, got {new}")]
    VariableTypeConflict {
        name: String,
        existing: ValueType,
        new: ValueType,
    },
    #[error("variable name `{0}` conflicts with a field or a constant")]
    VariableNameConflict(String),
    #[error(transparent)]
    Filter(#[from] FilterError),
}

impl From<EvalError> for DefinitionErrorKind {
    fn from(error: EvalError) -> Self {
        match error {
            EvalError::Syntax(error) => DefinitionErrorKind::Syntax(error),
            error => DefinitionErrorKind::Eval(error),
        }
    }
}

impl From<SyntaxError> for DefinitionErrorKind {
    fn from(error: SyntaxError) -> Self {
        DefinitionErrorKind::Syntax(error)
    }
}

/// A rejected definition, with the policy it comes from.
#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("rule `{id}` definition error: {kind}")]
    Rule {
        id: String,
        policy: String,
        kind: DefinitionErrorKind,
    },
    #[error("macro `{id}` definition error: {kind}")]
    Macro {
        id: String,
        policy: String,
        kind: DefinitionErrorKind,
    },
}

impl DefinitionError {
    pub fn rule(id: &str, policy: &str, kind: impl Into<DefinitionErrorKind>) -> Self {
        DefinitionError::Rule {
            id: id.to_string(),
            policy: policy.to_string(),
            kind: kind.into(),
        }
    }

    pub fn r#macro(id: &str, policy: &str, kind: impl Into<DefinitionErrorKind>) -> Self {
        DefinitionError::Macro {
            id: id.to_string(),
            policy: policy.to_string(),
            kind: kind.into(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            DefinitionError::Rule { id, .. } | DefinitionError::Macro { id, .. } => id,
        }
    }

    pub fn policy(&self) -> &str {
        match self {
            DefinitionError::Rule { policy, .. } | DefinitionError::Macro { policy, .. } => policy,
        }
    }

    pub fn kind(&self) -> &DefinitionErrorKind {
        match self {
            DefinitionError::Rule { kind, .. } | DefinitionError::Macro { kind, .. } => kind,
        }
    }
}

/// Ordered collection of definition errors.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<DefinitionError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: DefinitionError) {
        self.errors.push(error);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DefinitionError> {
        self.errors.iter()
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            1 => writeln!(f, "1 error occurred:")?,
            n => writeln!(f, "{n} errors occurred:")?,
        }
        for error in &self.errors {
            writeln!(f, "\t* {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

impl IntoIterator for MultiError {
    type Item = DefinitionError;
    type IntoIter = std::vec::IntoIter<DefinitionError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a MultiError {
    type Item = &'a DefinitionError;
    type IntoIter = std::slice::Iter<'a, DefinitionError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl Extend<DefinitionError> for MultiError {
    fn extend<T: IntoIterator<Item = DefinitionError>>(&mut self, iter: T) {
        self.errors.extend(iter)
    }
}

/// Error of [crate::RuleSet::load_policies].
#[derive(Error, Debug)]
pub enum LoadError {
    /// No policy was loaded, the previous rule set is still active.
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// Policies were loaded, the listed definitions were rejected.
    #[error(transparent)]
    Definitions(#[from] MultiError),
}
