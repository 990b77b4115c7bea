//! YAML shape of policies and merge of definitions sharing an ID.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{error::DefinitionErrorKind, filter::SkipReason, PolicyError};

/// How a definition combines with an earlier one with the same ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combine {
    Merge,
    Override,
}

/// Content of a policy document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyDef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub macros: Vec<MacroDefinition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combine: Option<Combine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Name of the policy the definition was loaded from.
    #[serde(skip)]
    pub policy: String,
}

impl MacroDefinition {
    /// Combine a later definition with the same ID into this one.
    pub fn merge_with(&mut self, other: &MacroDefinition) -> Result<(), DefinitionErrorKind> {
        match other.combine {
            Some(Combine::Merge) => {
                if self.expression.is_some() || other.expression.is_some() {
                    return Err(DefinitionErrorKind::CannotMergeExpression);
                }
                self.values.extend(other.values.iter().cloned());
            }
            Some(Combine::Override) => {
                self.expression.clone_from(&other.expression);
                self.values.clone_from(&other.values);
            }
            None => return Err(DefinitionErrorKind::IdConflict),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combine: Option<Combine>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_version: Option<String>,
    /// Name of the policy the definition was loaded from.
    #[serde(skip)]
    pub policy: String,
}

impl RuleDefinition {
    /// Combine a later definition with the same ID into this one.
    ///
    /// An override replaces the expression and, when present, the actions,
    /// the description and the tags. A later definition only disabling the
    /// rule is accepted without combine.
    pub fn merge_with(&mut self, other: &RuleDefinition) -> Result<(), DefinitionErrorKind> {
        match other.combine {
            Some(Combine::Override) => {
                if !other.expression.is_empty() {
                    self.expression.clone_from(&other.expression);
                }
                if !other.actions.is_empty() {
                    self.actions.clone_from(&other.actions);
                }
                if other.description.is_some() {
                    self.description.clone_from(&other.description);
                }
                if !other.tags.is_empty() {
                    self.tags.clone_from(&other.tags);
                }
            }
            Some(Combine::Merge) => {
                return Err(DefinitionErrorKind::UnsupportedCombine("merge".to_string()));
            }
            None if other.disabled => {}
            None => return Err(DefinitionErrorKind::IdConflict),
        }
        self.disabled = other.disabled;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<SetDefinition>,
}

/// Set a variable from a literal value or from an event field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub append: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// A policy document as returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub name: String,
    pub source: String,
    pub def: PolicyDef,
}

impl Policy {
    pub fn new(name: &str, source: &str, def: PolicyDef) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            def,
        }
    }

    /// Parse a YAML policy document, an empty document is an empty policy.
    pub fn from_yaml(name: &str, source: &str, body: &str) -> Result<Self, PolicyError> {
        let def = if body.trim().is_empty() {
            PolicyDef::default()
        } else {
            serde_yaml::from_str(body).map_err(|error| PolicyError::PolicyParsing {
                name: name.to_string(),
                error,
            })?
        };

        Ok(Self::new(name, source, def))
    }
}

/// A definition left out by a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub id: String,
    pub reason: SkipReason,
}

/// Per-policy outcome of a load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyInfo {
    pub name: String,
    pub source: String,
    /// IDs of the accepted rules, merged ones included.
    pub rules: Vec<String>,
    pub macros: Vec<String>,
    pub rule_skipped: Vec<Skipped>,
    pub macro_skipped: Vec<Skipped>,
}

impl PolicyInfo {
    pub(crate) fn new(policy: &Policy) -> Self {
        Self {
            name: policy.name.clone(),
            source: policy.source.clone(),
            ..Default::default()
        }
    }
}
