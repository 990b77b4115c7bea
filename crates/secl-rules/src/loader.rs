use std::{collections::HashMap, sync::Arc};

use crate::{
    error::{DefinitionError, MultiError},
    filter::{FilterError, FilterResult, MacroFilter, RuleFilter},
    policy::{PolicyInfo, Skipped},
    MacroDefinition, PolicyError, PolicyProvider, RuleDefinition,
};

/// Filters applied while loading. A definition is loaded only if every
/// filter accepts it.
#[derive(Clone, Default)]
pub struct PolicyLoaderOpts {
    pub macro_filters: Vec<Arc<dyn MacroFilter>>,
    pub rule_filters: Vec<Arc<dyn RuleFilter>>,
}

impl PolicyLoaderOpts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_macro_filter(mut self, filter: Arc<dyn MacroFilter>) -> Self {
        self.macro_filters.push(filter);
        self
    }

    pub fn with_rule_filter(mut self, filter: Arc<dyn RuleFilter>) -> Self {
        self.rule_filters.push(filter);
        self
    }

    fn accept_macro(&self, r#macro: &MacroDefinition) -> Result<FilterResult, FilterError> {
        for filter in &self.macro_filters {
            if let rejected @ FilterResult::Rejected(_) = filter.is_macro_accepted(r#macro)? {
                return Ok(rejected);
            }
        }
        Ok(FilterResult::Accepted)
    }

    fn accept_rule(&self, rule: &RuleDefinition) -> Result<FilterResult, FilterError> {
        for filter in &self.rule_filters {
            if let rejected @ FilterResult::Rejected(_) = filter.is_rule_accepted(rule)? {
                return Ok(rejected);
            }
        }
        Ok(FilterResult::Accepted)
    }
}

/// Filtered and merged definitions of every policy.
#[derive(Debug, Default)]
pub struct LoadedPolicies {
    pub policies: Vec<PolicyInfo>,
    /// Merged macros, in first definition order.
    pub macros: Vec<MacroDefinition>,
    /// Merged rules, in first definition order.
    pub rules: Vec<RuleDefinition>,
    pub errors: MultiError,
}

pub struct PolicyLoader {
    providers: Vec<Box<dyn PolicyProvider>>,
}

impl PolicyLoader {
    pub fn new(providers: Vec<Box<dyn PolicyProvider>>) -> Self {
        Self { providers }
    }

    /// Load the policies of every provider and merge their definitions.
    ///
    /// A provider error aborts the load. Definition errors are collected
    /// and the first definition of a conflicting ID stays in place.
    pub fn load_policies(&self, opts: &PolicyLoaderOpts) -> Result<LoadedPolicies, PolicyError> {
        let mut policies = Vec::new();
        for provider in &self.providers {
            let loaded = provider.load_policies()?;
            log::debug!("{} policies loaded from {}", loaded.len(), provider.kind());
            policies.extend(loaded);
        }

        let mut result = LoadedPolicies::default();
        let mut macro_index: HashMap<String, usize> = HashMap::new();
        let mut rule_index: HashMap<String, usize> = HashMap::new();

        for policy in policies {
            let mut info = PolicyInfo::new(&policy);

            for mut r#macro in policy.def.macros {
                r#macro.policy.clone_from(&policy.name);

                match opts.accept_macro(&r#macro) {
                    Ok(FilterResult::Accepted) => {}
                    Ok(FilterResult::Rejected(reason)) => {
                        log::debug!("macro {} skipped: {reason}", r#macro.id);
                        info.macro_skipped.push(Skipped {
                            id: r#macro.id,
                            reason,
                        });
                        continue;
                    }
                    Err(error) => {
                        result
                            .errors
                            .push(DefinitionError::r#macro(&r#macro.id, &policy.name, error));
                        continue;
                    }
                }

                match macro_index.get(&r#macro.id) {
                    Some(&index) => match result.macros[index].merge_with(&r#macro) {
                        Ok(()) => info.macros.push(r#macro.id),
                        Err(kind) => result
                            .errors
                            .push(DefinitionError::r#macro(&r#macro.id, &policy.name, kind)),
                    },
                    None => {
                        macro_index.insert(r#macro.id.clone(), result.macros.len());
                        info.macros.push(r#macro.id.clone());
                        result.macros.push(r#macro);
                    }
                }
            }

            for mut rule in policy.def.rules {
                rule.policy.clone_from(&policy.name);

                match opts.accept_rule(&rule) {
                    Ok(FilterResult::Accepted) => {}
                    Ok(FilterResult::Rejected(reason)) => {
                        log::debug!("rule {} skipped: {reason}", rule.id);
                        info.rule_skipped.push(Skipped {
                            id: rule.id,
                            reason,
                        });
                        continue;
                    }
                    Err(error) => {
                        result
                            .errors
                            .push(DefinitionError::rule(&rule.id, &policy.name, error));
                        continue;
                    }
                }

                match rule_index.get(&rule.id) {
                    Some(&index) => match result.rules[index].merge_with(&rule) {
                        Ok(()) => info.rules.push(rule.id),
                        Err(kind) => result
                            .errors
                            .push(DefinitionError::rule(&rule.id, &policy.name, kind)),
                    },
                    None => {
                        rule_index.insert(rule.id.clone(), result.rules.len());
                        info.rules.push(rule.id.clone());
                        result.rules.push(rule);
                    }
                }
            }

            result.policies.push(info);
        }

        log::debug!(
            "{} macros and {} rules merged from {} policies",
            result.macros.len(),
            result.rules.len(),
            result.policies.len()
        );

        Ok(result)
    }
}
