//! Rule set of the `secl` commands, built from a [Config].

use std::{collections::BTreeMap, sync::Arc};

use anyhow::{Context, Result};
use secl_model::{Event, EventType};
use secl_rules::{
    AgentVersionFilter, LoadError, MultiError, Opts, PoliciesDirProvider, PolicyLoader,
    PolicyLoaderOpts, Rule, RuleIdFilter, RuleSet, RuleSetListener,
};
use serde::Serialize;

use crate::config::Config;

pub struct Engine {
    config: Config,
    ruleset: RuleSet<Event>,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        let opts = Opts::default()
            .with_event_type_enabled(config.event_types.enabled())
            .with_state_scopes(secl_model::state_scopes());

        Self {
            ruleset: RuleSet::new(opts, secl_model::constants()),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ruleset(&self) -> &RuleSet<Event> {
        &self.ruleset
    }

    pub fn loader_opts(&self) -> PolicyLoaderOpts {
        let mut opts = PolicyLoaderOpts::new();

        if let Some(version) = &self.config.agent_version {
            let filter = Arc::new(AgentVersionFilter::new(version.clone()));
            opts = opts
                .with_macro_filter(filter.clone())
                .with_rule_filter(filter);
        }

        if !self.config.rule_ids.is_empty() {
            let filter = RuleIdFilter::new(&self.config.rule_ids);
            opts = opts.with_rule_filter(Arc::new(filter));
        }

        opts
    }

    /// (Re)load the policies directory.
    ///
    /// Fails, keeping the active rules, when the policies can't be read.
    /// Otherwise the new rules are active and the rejected definitions are
    /// returned.
    pub fn load(&self) -> Result<MultiError> {
        let dir = &self.config.policies_dir;
        let provider = PoliciesDirProvider::new(dir)
            .with_context(|| format!("Error loading policies from {}", dir.display()))?;
        let loader = PolicyLoader::new(vec![Box::new(provider)]);

        let errors = match self.ruleset.load_policies(&loader, &self.loader_opts()) {
            Ok(()) => MultiError::new(),
            Err(LoadError::Definitions(errors)) => errors,
            Err(LoadError::Policy(err)) => {
                return Err(err).with_context(|| {
                    format!("Error loading policies from {}", dir.display())
                });
            }
        };

        for error in &errors {
            log::warn!("{error}");
        }
        log::info!(
            "{} rules loaded from {}",
            self.ruleset.rules().len(),
            dir.display()
        );

        Ok(errors)
    }

    /// Evaluate an event. The scoped variables of an exiting process are
    /// released after its exit event was evaluated.
    pub fn evaluate(&self, event: &Event) -> bool {
        let matched = self.ruleset.evaluate(event);
        if event.kind() == EventType::Exit {
            self.ruleset.release_scopes(event);
        }
        matched
    }
}

/// Output line of a rule match.
#[derive(Debug, Serialize)]
pub struct RuleMatch<'a> {
    pub rule_id: &'a str,
    pub policy: &'a str,
    pub tags: &'a BTreeMap<String, String>,
    pub event: &'a Event,
}

impl<'a> RuleMatch<'a> {
    pub fn new(rule: &'a Rule<Event>, event: &'a Event) -> Self {
        Self {
            rule_id: rule.id(),
            policy: rule.policy(),
            tags: &rule.definition().tags,
            event,
        }
    }
}

/// Print every match as a JSON line on stdout.
pub struct MatchPrinter;

impl RuleSetListener<Event> for MatchPrinter {
    fn rule_match(&self, rule: &Rule<Event>, event: &Event) {
        log::debug!("rule {} matched {event}", rule.id());
        match serde_json::to_string(&RuleMatch::new(rule, event)) {
            Ok(line) => println!("{line}"),
            Err(err) => log::warn!("Error serializing match of rule {}: {err}", rule.id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path, sync::Mutex};

    use secl_model::{Payload, Process};
    use semver::Version;

    use crate::config::EventTypeSelector;

    use super::*;

    const POLICY: &str = r#"
macros:
  - id: sensitive_files
    values: ["/etc/shadow", "/etc/passwd"]
rules:
  - id: sensitive_open
    expression: 'open.filename in sensitive_files && process.uid != 0'
    tags:
      severity: high
    actions:
      - set:
          name: opened_sensitive
          value: true
          scope: process
  - id: shell_after_sensitive
    expression: 'exec.filename =~ "/bin/*sh" && ${process.opened_sensitive} == true'
  - id: recent
    expression: 'unlink.filename == "/tmp/x"'
    agent_version: ">= 8.0"
"#;

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    impl RuleSetListener<Event> for Collect {
        fn rule_match(&self, rule: &Rule<Event>, _event: &Event) {
            self.0.lock().unwrap().push(rule.id().to_string());
        }
    }

    fn config(dir: &Path) -> Config {
        Config {
            policies_dir: dir.to_path_buf(),
            agent_version: Some(Version::new(7, 38, 0)),
            rule_ids: Vec::new(),
            event_types: EventTypeSelector::All,
        }
    }

    fn event(pid: i64, payload: Payload) -> Event {
        Event {
            process: Process {
                pid,
                name: "bash".to_string(),
                uid: 1000,
                argv: Vec::new(),
            },
            payload,
        }
    }

    fn open(pid: i64, filename: &str) -> Event {
        event(
            pid,
            Payload::Open {
                filename: filename.to_string(),
                flags: 0,
                mode: 0,
            },
        )
    }

    fn exec(pid: i64, filename: &str) -> Event {
        event(
            pid,
            Payload::Exec {
                filename: filename.to_string(),
                argv: Vec::new(),
            },
        )
    }

    #[test]
    fn process_scoped_detection() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("default.policy"), POLICY).unwrap();

        let engine = Engine::new(config(dir.path()));
        let errors = engine.load().unwrap();
        assert!(errors.is_empty());
        assert!(!engine.ruleset().has_rule("recent"));

        let collect = Arc::new(Collect::default());
        engine.ruleset().add_listener(collect.clone());

        assert!(!engine.evaluate(&exec(10, "/bin/bash")));
        assert!(engine.evaluate(&open(10, "/etc/shadow")));
        assert!(!engine.evaluate(&exec(11, "/bin/bash")));
        assert!(engine.evaluate(&exec(10, "/bin/bash")));

        assert_eq!(
            *collect.0.lock().unwrap(),
            ["sensitive_open", "shell_after_sensitive"]
        );

        assert!(!engine.evaluate(&event(10, Payload::Exit { code: 0 })));
        assert!(!engine.evaluate(&exec(10, "/bin/bash")));
    }

    #[test]
    fn rule_id_and_event_type_filters() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("default.policy"), POLICY).unwrap();

        let mut config = config(dir.path());
        config.rule_ids = vec!["sensitive_open".to_string()];
        let engine = Engine::new(config);
        engine.load().unwrap();
        let ids: Vec<String> = engine
            .ruleset()
            .rules()
            .iter()
            .map(|rule| rule.id().to_string())
            .collect();
        assert_eq!(ids, ["sensitive_open"]);

        let mut config = self::config(dir.path());
        config.rule_ids = vec!["sensitive_open".to_string(), "recent".to_string()];
        config.agent_version = Some(Version::new(8, 1, 0));
        let engine = Engine::new(config);
        engine.load().unwrap();
        let ids: Vec<String> = engine
            .ruleset()
            .rules()
            .iter()
            .map(|rule| rule.id().to_string())
            .collect();
        assert_eq!(ids, ["sensitive_open", "recent"]);
        assert!(!engine.ruleset().has_rule("shell_after_sensitive"));

        let mut config = self::config(dir.path());
        config.event_types = EventTypeSelector::Only(vec![secl_model::EventType::Exec]);
        let engine = Engine::new(config);
        engine.load().unwrap();
        assert!(!engine.ruleset().has_rule("sensitive_open"));
        assert!(engine.ruleset().has_rule("shell_after_sensitive"));
    }

    #[test]
    fn failed_reload_keeps_rules() {
        let dir = tempfile::tempdir().unwrap();
        let policy = dir.path().join("default.policy");
        fs::write(&policy, POLICY).unwrap();

        let engine = Engine::new(config(dir.path()));
        engine.load().unwrap();

        fs::write(&policy, "rules: [[").unwrap();
        assert!(engine.load().is_err());
        assert!(engine.ruleset().has_rule("sensitive_open"));

        fs::write(
            &policy,
            "rules:\n  - id: broken\n    expression: 'open.filename =='\n",
        )
        .unwrap();
        let errors = engine.load().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(!engine.ruleset().has_rule("sensitive_open"));
    }

    #[test]
    fn match_line() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("default.policy"), POLICY).unwrap();
        let engine = Engine::new(config(dir.path()));
        engine.load().unwrap();

        let rule = engine.ruleset().rule("sensitive_open").unwrap();
        let event = open(10, "/etc/shadow");
        let line = serde_json::to_value(RuleMatch::new(&rule, &event)).unwrap();
        assert_eq!(line["rule_id"], "sensitive_open");
        assert_eq!(line["policy"], "default.policy");
        assert_eq!(line["tags"]["severity"], "high");
        assert_eq!(line["event"]["payload"]["type"], "open");
    }
}
