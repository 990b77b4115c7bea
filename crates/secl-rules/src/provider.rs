use std::{
    fs,
    path::{Path, PathBuf},
};

use glob::glob;

use crate::{Policy, PolicyDef, PolicyError};

const POLICY_EXTENSION: &str = "policy";
const DEFAULT_POLICY: &str = "default.policy";

/// A source of policies.
pub trait PolicyProvider: Send + Sync {
    /// Load every policy of the provider, in the order they must be merged.
    fn load_policies(&self) -> Result<Vec<Policy>, PolicyError>;

    fn kind(&self) -> &'static str;
}

/// Load the `*.policy` files of a directory, `default.policy` first then
/// sorted by file name.
#[derive(Debug, Clone)]
pub struct PoliciesDirProvider {
    dir: PathBuf,
}

impl PoliciesDirProvider {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(PolicyError::DirNotFound(dir.display().to_string()));
        }

        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn policy_files(&self) -> Result<Vec<PathBuf>, PolicyError> {
        let expr = format!(
            "{}/*.{}",
            glob::Pattern::escape(&self.dir.display().to_string()),
            POLICY_EXTENSION
        );

        let mut paths: Vec<PathBuf> = glob(&expr)?.flatten().filter(|p| p.is_file()).collect();
        paths.sort_by_key(|path| {
            let name = file_name(path);
            (name != DEFAULT_POLICY, name)
        });

        Ok(paths)
    }
}

impl PolicyProvider for PoliciesDirProvider {
    fn load_policies(&self) -> Result<Vec<Policy>, PolicyError> {
        self.policy_files()?
            .iter()
            .map(|path| {
                let policy_file = PolicyFile::from(path)?;
                Policy::from_yaml(&policy_file.name, self.kind(), &policy_file.body)
            })
            .collect()
    }

    fn kind(&self) -> &'static str {
        "file"
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
struct PolicyFile {
    name: String,
    body: String,
}

impl PolicyFile {
    fn from(path: &Path) -> Result<Self, PolicyError> {
        log::debug!("loading policy {}", path.display());
        let body = fs::read_to_string(path).map_err(|error| PolicyError::PolicyLoading {
            name: path.display().to_string(),
            error,
        })?;
        Ok(Self {
            name: file_name(path),
            body,
        })
    }
}

/// Policies kept in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryPolicyProvider {
    policies: Vec<Policy>,
}

impl MemoryPolicyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, name: &str, def: PolicyDef) -> Self {
        self.policies.push(Policy::new(name, "memory", def));
        self
    }

    pub fn with_yaml(mut self, name: &str, body: &str) -> Result<Self, PolicyError> {
        self.policies.push(Policy::from_yaml(name, "memory", body)?);
        Ok(self)
    }
}

impl PolicyProvider for MemoryPolicyProvider {
    fn load_policies(&self) -> Result<Vec<Policy>, PolicyError> {
        Ok(self.policies.clone())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use crate::RuleDefinition;

    use super::*;

    #[test]
    fn directory_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.policy", "default.policy", "a.policy", "ignored.yaml"] {
            fs::write(dir.path().join(name), "").unwrap();
        }

        let provider = PoliciesDirProvider::new(dir.path()).unwrap();
        let names: Vec<String> = provider
            .load_policies()
            .unwrap()
            .into_iter()
            .map(|policy| policy.name)
            .collect();

        assert_eq!(names, ["default.policy", "a.policy", "b.policy"]);
    }

    #[test]
    fn missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(matches!(
            PoliciesDirProvider::new(missing),
            Err(PolicyError::DirNotFound(_))
        ));
    }

    #[test]
    fn parse_error_aborts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.policy"), "rules: []").unwrap();
        fs::write(dir.path().join("wrong.policy"), "rules: [[").unwrap();

        let provider = PoliciesDirProvider::new(dir.path()).unwrap();
        let err = provider.load_policies().unwrap_err();
        assert!(matches!(err, PolicyError::PolicyParsing { name, .. } if name == "wrong.policy"));
    }

    #[test]
    fn memory() {
        let provider = MemoryPolicyProvider::new()
            .with_policy(
                "first",
                PolicyDef {
                    rules: vec![RuleDefinition {
                        id: "rule".to_string(),
                        expression: "open.mode == 1".to_string(),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            )
            .with_yaml("second", "macros: [{id: m, values: [a]}]")
            .unwrap();

        let policies = provider.load_policies().unwrap();
        assert_eq!(policies.len(), 2);
        assert_eq!(policies[0].source, "memory");
        assert_eq!(policies[1].def.macros[0].values, ["a"]);
    }
}
