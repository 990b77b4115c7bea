//! Policies of SECL rules: loading, merging, filtering and evaluation.
//!
//! A [PolicyLoader] reads policies from one or more [PolicyProvider]s and
//! merges the macros and rules they define. A [RuleSet] compiles the merged
//! definitions against the model of an [secl_eval::Event] type and evaluates
//! events against them, running the variable actions of matching rules.

mod action;
mod error;
mod filter;
mod loader;
mod policy;
mod provider;
mod ruleset;

#[cfg(test)]
mod test_utils;

pub use action::{parse_action_value, ActionError, ResolvedSet, SetAction, SetSource};
pub use error::{
    DefinitionError, DefinitionErrorKind, LoadError, MultiError, PolicyError,
};
pub use filter::{
    AgentVersionFilter, FilterError, FilterResult, MacroFilter, RuleFilter, RuleIdFilter,
    SkipReason,
};
pub use loader::{LoadedPolicies, PolicyLoader, PolicyLoaderOpts};
pub use policy::{
    ActionDefinition, Combine, MacroDefinition, Policy, PolicyDef, PolicyInfo, RuleDefinition,
    SetDefinition, Skipped,
};
pub use provider::{MemoryPolicyProvider, PoliciesDirProvider, PolicyProvider};
pub use ruleset::{Opts, Rule, RuleSet, RuleSetListener};
