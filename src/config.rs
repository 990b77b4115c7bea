//! Configuration of the `secl` commands.
//!
//! Values come from the `[secl]` section of an optional INI file, command
//! line flags take precedence.

use std::{
    collections::{HashMap, hash_map::Iter},
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use secl_eval::WILDCARD_EVENT_TYPE;
use secl_model::EventType;
use secl_rules::AgentVersionFilter;
use semver::Version;
use thiserror::Error;

use crate::cli::LoadOpts;

/// Section of the configuration file read by `secl`.
pub const SECL_SECTION: &str = "secl";

const DEFAULT_POLICIES_DIR: &str = "/etc/secl/policies";

#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("field {field} is required")]
    RequiredValue { field: String },
    #[error("{value} is not a valid value for field {field}: {err}")]
    InvalidValue {
        field: String,
        value: String,
        err: String,
    },
}

/// Raw key/values of a configuration section with typed accessors.
#[derive(Debug, Clone, Default)]
pub struct ConfigSection {
    inner: HashMap<String, String>,
}

impl ConfigSection {
    pub fn insert(&mut self, key: String, value: String) -> Option<String> {
        self.inner.insert(key, value)
    }

    pub fn get_raw(&self, config_name: &str) -> Option<&str> {
        self.inner.get(config_name).map(String::as_str)
    }

    /// Returns a typed configuration value.
    pub fn required<T>(&self, config_name: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        <T as FromStr>::Err: Display,
    {
        match self.inner.get(config_name) {
            None => Err(ConfigError::RequiredValue {
                field: config_name.to_string(),
            }),
            Some(value) => parse(value, config_name),
        }
    }

    /// Returns an optional typed configuration value.
    pub fn optional<T>(&self, config_name: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        <T as FromStr>::Err: Display,
    {
        self.inner
            .get(config_name)
            .map(|value| parse(value, config_name))
            .transpose()
    }

    /// Returns a typed configuration value, or the default if missing.
    pub fn with_default<T>(&self, config_name: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        <T as FromStr>::Err: Display,
    {
        Ok(self.optional(config_name)?.unwrap_or(default))
    }

    /// Return a comma separed list of values. Return empty vector if field is missing.
    pub fn get_list<T>(&self, config_name: &str) -> Result<Vec<T>, ConfigError>
    where
        T: FromStr,
        <T as FromStr>::Err: Display,
    {
        self.inner
            .get(config_name)
            .iter()
            .flat_map(|config| config.split(','))
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| parse(item, config_name))
            .collect()
    }

    pub fn iter(&self) -> Iter<'_, String, String> {
        self.inner.iter()
    }
}

fn parse<T>(value: &str, config_name: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    <T as FromStr>::Err: Display,
{
    T::from_str(value).map_err(|err| ConfigError::InvalidValue {
        field: config_name.to_string(),
        value: value.to_string(),
        err: err.to_string(),
    })
}

/// Event types rules can be loaded for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTypeSelector {
    All,
    Only(Vec<EventType>),
}

impl EventTypeSelector {
    fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, ConfigError> {
        if names.is_empty() || names.iter().any(|name| name.as_ref() == WILDCARD_EVENT_TYPE) {
            return Ok(Self::All);
        }

        names
            .iter()
            .map(|name| parse(name.as_ref(), "event_types"))
            .collect::<Result<_, _>>()
            .map(Self::Only)
    }

    /// Map of enabled event types as expected by the rule set options.
    pub fn enabled(&self) -> HashMap<String, bool> {
        match self {
            Self::All => HashMap::from([(WILDCARD_EVENT_TYPE.to_string(), true)]),
            Self::Only(event_types) => event_types
                .iter()
                .map(|event_type| (event_type.to_string(), true))
                .collect(),
        }
    }
}

/// Resolved configuration of a command.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub policies_dir: PathBuf,
    pub agent_version: Option<Version>,
    pub rule_ids: Vec<String>,
    pub event_types: EventTypeSelector,
}

impl Config {
    /// Build the configuration from the optional file and the command line flags.
    pub fn from_opts(opts: &LoadOpts) -> Result<Self> {
        let section = match &opts.config {
            Some(config_file) => load_section(config_file)?,
            None => ConfigSection::default(),
        };

        Self::from_section(&section, opts).context("Invalid configuration")
    }

    fn from_section(section: &ConfigSection, opts: &LoadOpts) -> Result<Self, ConfigError> {
        let policies_dir = match &opts.policies {
            Some(dir) => dir.clone(),
            None => section.with_default("policies_dir", PathBuf::from(DEFAULT_POLICIES_DIR))?,
        };

        // partial versions such as `7.38` are accepted
        let agent_version = match &opts.agent_version {
            Some(version) => Some(parse::<AgentVersionFilter>(version, "agent_version")?),
            None => section.optional::<AgentVersionFilter>("agent_version")?,
        }
        .map(|filter| filter.version().clone());

        let rule_ids = if opts.rule_ids.is_empty() {
            section.get_list("rule_ids")?
        } else {
            opts.rule_ids.clone()
        };

        let event_types = if opts.event_types.is_empty() {
            EventTypeSelector::from_names(&section.get_list::<String>("event_types")?)?
        } else {
            EventTypeSelector::from_names(&opts.event_types)?
        };

        Ok(Self {
            policies_dir,
            agent_version,
            rule_ids,
            event_types,
        })
    }
}

/// Load the `[secl]` section of an INI file.
pub fn load_section(config_file: &Path) -> Result<ConfigSection> {
    let conf = ini::Ini::load_from_file(config_file)
        .with_context(|| format!("Error loading configuration from {config_file:?}"))?;

    let mut section = ConfigSection::default();
    if let Some(props) = conf.section(Some(SECL_SECTION)) {
        for (key, value) in props.iter() {
            log::debug!("{}.{}={}", SECL_SECTION, key, value);
            section.insert(key.to_string(), value.to_string());
        }
    }

    Ok(section)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn section(values: &[(&str, &str)]) -> ConfigSection {
        let mut section = ConfigSection::default();
        for (key, value) in values {
            section.insert(key.to_string(), value.to_string());
        }
        section
    }

    #[test]
    fn typed_getters() {
        let section = section(&[("count", "3"), ("list", "a, b,,c"), ("bad", "x")]);

        assert_eq!(section.required::<u32>("count").unwrap(), 3);
        assert!(matches!(
            section.required::<u32>("missing"),
            Err(ConfigError::RequiredValue { .. })
        ));
        assert!(matches!(
            section.optional::<u32>("bad"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(section.optional::<u32>("missing").unwrap(), None);
        assert_eq!(section.with_default("missing", 7u32).unwrap(), 7);
        assert_eq!(section.get_list::<String>("list").unwrap(), ["a", "b", "c"]);
        assert!(section.get_list::<String>("missing").unwrap().is_empty());
    }

    #[test]
    fn defaults() {
        let config = Config::from_section(&ConfigSection::default(), &LoadOpts::default()).unwrap();
        assert_eq!(config.policies_dir, PathBuf::from(DEFAULT_POLICIES_DIR));
        assert_eq!(config.agent_version, None);
        assert!(config.rule_ids.is_empty());
        assert_eq!(config.event_types, EventTypeSelector::All);
    }

    #[test]
    fn flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_file = dir.path().join("secl.ini");
        fs::write(
            &config_file,
            concat!(
                "[secl]\n",
                "policies_dir = /var/lib/secl\n",
                "agent_version = 7.38\n",
                "event_types = open, exec\n",
                "rule_ids = a,b\n",
                "\n",
                "[other]\n",
                "policies_dir = /nope\n",
            ),
        )
        .unwrap();

        let opts = LoadOpts {
            config: Some(config_file.clone()),
            ..Default::default()
        };
        let config = Config::from_opts(&opts).unwrap();
        assert_eq!(config.policies_dir, PathBuf::from("/var/lib/secl"));
        assert_eq!(config.agent_version, Some(Version::new(7, 38, 0)));
        assert_eq!(config.rule_ids, ["a", "b"]);
        assert_eq!(
            config.event_types,
            EventTypeSelector::Only(vec![EventType::Open, EventType::Exec])
        );

        let opts = LoadOpts {
            config: Some(config_file),
            policies: Some(PathBuf::from("/tmp/policies")),
            agent_version: Some("7.40.1".to_string()),
            rule_ids: vec!["c".to_string()],
            event_types: vec!["*".to_string()],
        };
        let config = Config::from_opts(&opts).unwrap();
        assert_eq!(config.policies_dir, PathBuf::from("/tmp/policies"));
        assert_eq!(config.agent_version, Some(Version::new(7, 40, 1)));
        assert_eq!(config.rule_ids, ["c"]);
        assert_eq!(config.event_types, EventTypeSelector::All);
    }

    #[test]
    fn invalid_values() {
        let opts = LoadOpts {
            event_types: vec!["mount".to_string()],
            ..Default::default()
        };
        assert!(Config::from_section(&ConfigSection::default(), &opts).is_err());

        let section = section(&[("agent_version", "seven")]);
        assert!(Config::from_section(&section, &LoadOpts::default()).is_err());
    }

    #[test]
    fn enabled_event_types() {
        let selector = EventTypeSelector::Only(vec![EventType::Unlink]);
        assert_eq!(
            selector.enabled(),
            HashMap::from([("unlink".to_string(), true)])
        );
    }
}
