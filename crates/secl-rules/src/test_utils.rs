use std::{collections::HashMap, fs, path::Path, sync::Arc};

use secl_eval::{
    EvalOpts, Event, KeyedVariableProvider, Model, Value, VariableProvider,
    VariableProviderFactory,
};
use serde::Serialize;

use crate::{
    LoadError, PoliciesDirProvider, PolicyDef, PolicyLoader, PolicyLoaderOpts, PolicyProvider,
    RuleSet,
};

#[derive(Debug, Clone, Default)]
pub struct TestProcess {
    pub name: String,
    pub uid: i64,
    pub is_root: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TestOpen {
    pub filename: String,
    pub mode: i64,
    pub flags: i64,
}

#[derive(Debug, Clone, Default)]
pub struct TestEvent {
    pub kind: &'static str,
    pub process: TestProcess,
    pub open: TestOpen,
    pub exec_filename: String,
}

impl TestEvent {
    pub fn open(filename: &str) -> Self {
        Self {
            kind: "open",
            process: TestProcess {
                name: "myprocess".to_string(),
                ..Default::default()
            },
            open: TestOpen {
                filename: filename.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

impl Event for TestEvent {
    fn event_type(&self) -> &str {
        self.kind
    }

    fn model() -> Model<Self> {
        Model::<Self>::builder()
            .add_field("process.name", "", |e| e.process.name.clone())
            .add_field("process.uid", "", |e| e.process.uid)
            .add_field("process.is_root", "", |e| e.process.is_root)
            .add_field("open.filename", "open", |e| e.open.filename.clone())
            .add_field("open.mode", "open", |e| e.open.mode)
            .add_field("open.flags", "open", |e| e.open.flags)
            .add_field("exec.filename", "exec", |e| e.exec_filename.clone())
            .build()
    }
}

pub fn eval_opts() -> EvalOpts {
    EvalOpts::new()
        .with_constant("O_RDONLY", Value::Int(0))
        .with_constant("O_CREAT", Value::Int(64))
}

pub fn process_scope() -> VariableProviderFactory<TestEvent> {
    Arc::new(|| -> Box<dyn VariableProvider<TestEvent>> {
        Box::new(KeyedVariableProvider::new(|e: &TestEvent| {
            Some(e.process.name.clone())
        }))
    })
}

pub fn state_scopes() -> HashMap<String, VariableProviderFactory<TestEvent>> {
    HashMap::from([("process".to_string(), process_scope())])
}

pub fn save_policy(dir: &Path, name: &str, def: &PolicyDef) {
    let body = serde_yaml::to_string(def).unwrap();
    fs::write(dir.join(name), body).unwrap();
}

pub fn yaml<T: Serialize>(value: T) -> Option<serde_yaml::Value> {
    Some(serde_yaml::to_value(value).unwrap())
}

pub fn dir_loader(dir: &Path) -> PolicyLoader {
    let provider: Box<dyn PolicyProvider> = Box::new(PoliciesDirProvider::new(dir).unwrap());
    PolicyLoader::new(vec![provider])
}

/// Load a single policy into a new rule set with every event type enabled.
pub fn load_policy(
    def: &PolicyDef,
    opts: &PolicyLoaderOpts,
) -> (RuleSet<TestEvent>, Result<(), LoadError>) {
    let dir = tempfile::tempdir().unwrap();
    save_policy(dir.path(), "test.policy", def);

    let rs = RuleSet::new(
        crate::Opts::default().with_state_scopes(state_scopes()),
        eval_opts(),
    );
    let result = rs.load_policies(&dir_loader(dir.path()), opts);
    (rs, result)
}
