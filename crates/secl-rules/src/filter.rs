//! Filters deciding which macros and rules take part in a load.
//!
//! A rejected definition is not an error: it's listed among the skipped
//! definitions of its policy, with the reason given by the filter.

use std::{collections::HashSet, fmt, str::FromStr};

use semver::{Version, VersionReq};
use thiserror::Error;

use crate::{MacroDefinition, RuleDefinition};

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("invalid agent version constraint `{constraint}`: {error}")]
    InvalidConstraint {
        constraint: String,
        #[source]
        error: semver::Error,
    },
    #[error("invalid agent version `{version}`: {error}")]
    InvalidVersion {
        version: String,
        #[source]
        error: semver::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AgentVersion,
    RuleId,
    Custom(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AgentVersion => write!(f, "agent version constraint not satisfied"),
            SkipReason::RuleId => write!(f, "rule ID not selected"),
            SkipReason::Custom(reason) => write!(f, "{reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterResult {
    Accepted,
    Rejected(SkipReason),
}

pub trait RuleFilter: Send + Sync {
    fn is_rule_accepted(&self, rule: &RuleDefinition) -> Result<FilterResult, FilterError>;
}

pub trait MacroFilter: Send + Sync {
    fn is_macro_accepted(&self, r#macro: &MacroDefinition) -> Result<FilterResult, FilterError>;
}

/// Accept definitions whose `agent_version` constraint holds for a given version.
///
/// The constraint is a comma separated list of comparators, all of them must
/// hold. Partial versions are padded with zeros, so `> 7.37` means
/// `> 7.37.0` and `!= 7.38` only excludes `7.38.0`. A bare version is an
/// exact match. Prerelease and build metadata of the agent version are
/// ignored.
#[derive(Debug, Clone)]
pub struct AgentVersionFilter {
    version: Version,
}

impl AgentVersionFilter {
    pub fn new(version: Version) -> Self {
        Self {
            version: Version::new(version.major, version.minor, version.patch),
        }
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    fn is_accepted(&self, constraint: Option<&str>) -> Result<FilterResult, FilterError> {
        let Some(constraint) = constraint.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(FilterResult::Accepted);
        };

        for clause in constraint.split(',') {
            let clause: String = clause.split_whitespace().collect();
            if clause.is_empty() {
                continue;
            }

            let op_len = clause
                .find(|c: char| !"=<>!~^".contains(c))
                .unwrap_or(clause.len());
            let (op, version) = clause.split_at(op_len);
            let version = pad_version(version);

            let (negated, requirement) = match op {
                "!=" => (true, format!("={version}")),
                "" if version.contains(['*', 'x', 'X']) => (false, version),
                "" => (false, format!("={version}")),
                op => (false, format!("{op}{version}")),
            };

            let requirement =
                VersionReq::parse(&requirement).map_err(|error| FilterError::InvalidConstraint {
                    constraint: constraint.to_string(),
                    error,
                })?;

            if requirement.matches(&self.version) == negated {
                return Ok(FilterResult::Rejected(SkipReason::AgentVersion));
            }
        }

        Ok(FilterResult::Accepted)
    }
}

/// Complete a numeric `major[.minor]` version to `major.minor.patch`,
/// keeping prerelease and build metadata. Wildcards are left untouched.
fn pad_version(version: &str) -> String {
    let core_len = version.find(['-', '+']).unwrap_or(version.len());
    let (core, rest) = version.split_at(core_len);

    let numeric = core
        .split('.')
        .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()));
    if !numeric {
        return version.to_string();
    }

    let mut padded = core.to_string();
    for _ in core.split('.').count()..3 {
        padded.push_str(".0");
    }
    padded.push_str(rest);
    padded
}

impl FromStr for AgentVersionFilter {
    type Err = FilterError;

    /// Parse a possibly partial version: `7.38` is `7.38.0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Version::parse(&pad_version(s))
            .map(AgentVersionFilter::new)
            .map_err(|error| FilterError::InvalidVersion {
                version: s.to_string(),
                error,
            })
    }
}

impl RuleFilter for AgentVersionFilter {
    fn is_rule_accepted(&self, rule: &RuleDefinition) -> Result<FilterResult, FilterError> {
        self.is_accepted(rule.agent_version.as_deref())
    }
}

impl MacroFilter for AgentVersionFilter {
    fn is_macro_accepted(&self, r#macro: &MacroDefinition) -> Result<FilterResult, FilterError> {
        self.is_accepted(r#macro.agent_version.as_deref())
    }
}

/// Accept only the rules whose ID is in the allow-list.
#[derive(Debug, Clone, Default)]
pub struct RuleIdFilter {
    ids: HashSet<String>,
}

impl RuleIdFilter {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn ids(&self) -> &HashSet<String> {
        &self.ids
    }
}

impl RuleFilter for RuleIdFilter {
    fn is_rule_accepted(&self, rule: &RuleDefinition) -> Result<FilterResult, FilterError> {
        if self.ids.contains(&rule.id) {
            Ok(FilterResult::Accepted)
        } else {
            Ok(FilterResult::Rejected(SkipReason::RuleId))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepts(version: &str, constraint: &str) -> bool {
        let filter = AgentVersionFilter::from_str(version).unwrap();
        let rule = RuleDefinition {
            id: "rule".to_string(),
            agent_version: Some(constraint.to_string()),
            ..Default::default()
        };
        filter.is_rule_accepted(&rule).unwrap() == FilterResult::Accepted
    }

    #[test]
    fn agent_version_constraints() {
        assert!(!accepts("7.38", "< 7.37"));
        assert!(accepts("7.38", ">= 7.37"));
        assert!(accepts("7.38", "> 7.37"));
        assert!(accepts("7.38", ">= 7.30, < 7.39"));
        assert!(!accepts("7.38", ">= 7.30, < 7.39, != 7.38"));
        assert!(accepts("7.37.2", ">= 7.30, < 7.39, != 7.38"));
        assert!(accepts("7.38.1", "7.38.1"));
        assert!(!accepts("7.38.1", "7.38.2"));
    }

    #[test]
    fn partial_versions_are_padded() {
        assert!(accepts("7.37.5", "> 7.37"));
        assert!(!accepts("7.37.0", "> 7.37"));
        assert!(!accepts("7.38.1", "<= 7.38"));
        assert!(accepts("7.38.0", "<= 7.38"));
        assert!(accepts("7.38.1", "!= 7.38"));
        assert!(!accepts("7.38.0", "!= 7.38"));
        assert!(accepts("7.38.1", ">= 7.30, < 7.39, != 7.38"));
        assert!(!accepts("8.0.1", "< 8"));
    }

    #[test]
    fn wildcards_are_kept() {
        assert!(accepts("7.38.4", "7.38.*"));
        assert!(!accepts("7.39.0", "7.38.*"));
    }

    #[test]
    fn prerelease_is_ignored() {
        assert!(accepts("7.38.0-rc.3", ">= 7.38"));
        let filter = AgentVersionFilter::from_str("7.38.0-rc.3+git.12").unwrap();
        assert_eq!(filter.version(), &Version::new(7, 38, 0));
    }

    #[test]
    fn no_constraint() {
        let filter = AgentVersionFilter::new(Version::new(7, 38, 0));
        let r#macro = MacroDefinition {
            id: "macro".to_string(),
            ..Default::default()
        };
        assert_eq!(
            filter.is_macro_accepted(&r#macro).unwrap(),
            FilterResult::Accepted
        );
    }

    #[test]
    fn invalid_constraint() {
        let filter = AgentVersionFilter::new(Version::new(7, 38, 0));
        let rule = RuleDefinition {
            id: "rule".to_string(),
            agent_version: Some(">= seven".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            filter.is_rule_accepted(&rule),
            Err(FilterError::InvalidConstraint { .. })
        ));
    }

    #[test]
    fn rule_id() {
        let filter = RuleIdFilter::new(["test2", "test3"]);
        let mut rule = RuleDefinition {
            id: "test1".to_string(),
            ..Default::default()
        };
        assert_eq!(
            filter.is_rule_accepted(&rule).unwrap(),
            FilterResult::Rejected(SkipReason::RuleId)
        );
        for id in ["test2", "test3"] {
            rule.id = id.to_string();
            assert_eq!(filter.is_rule_accepted(&rule).unwrap(), FilterResult::Accepted);
        }
    }
}
