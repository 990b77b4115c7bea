//! Event model of the `secl` tool: process, file and exec events with the
//! fields rules can reference.

use std::{collections::HashMap, fmt, sync::Arc};

use secl_eval::{
    EvalOpts, KeyedVariableProvider, Model, Value, VariableProvider, VariableProviderFactory,
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Name of the scope holding per-process variables.
pub const PROCESS_SCOPE: &str = "process";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub pid: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uid: i64,
    #[serde(default)]
    pub argv: Vec<String>,
}

impl Process {
    pub fn is_root(&self) -> bool {
        self.uid == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum Payload {
    Open {
        filename: String,
        #[serde(default)]
        flags: i64,
        #[serde(default)]
        mode: i64,
    },
    Exec {
        filename: String,
        #[serde(default)]
        argv: Vec<String>,
    },
    Unlink {
        filename: String,
    },
    /// The process terminated, its scoped variables are released once the
    /// rules ran.
    Exit {
        #[serde(default)]
        code: i64,
    },
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Open {
                filename,
                flags,
                mode,
            } => write!(
                f,
                "Open {{ filename: {filename}, flags: {flags}, mode: {mode} }}"
            ),
            Payload::Exec { filename, argv } => write!(
                f,
                "Exec {{ filename: {filename}, argv: {} }}",
                argv.join(" ")
            ),
            Payload::Unlink { filename } => write!(f, "Unlink {{ filename: {filename} }}"),
            Payload::Exit { code } => write!(f, "Exit {{ code: {code} }}"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
    Open,
    Exec,
    Unlink,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub process: Process,
    pub payload: Payload,
}

impl Event {
    pub fn kind(&self) -> EventType {
        match self.payload {
            Payload::Open { .. } => EventType::Open,
            Payload::Exec { .. } => EventType::Exec,
            Payload::Unlink { .. } => EventType::Unlink,
            Payload::Exit { .. } => EventType::Exit,
        }
    }

    fn open(&self) -> Option<(&str, i64, i64)> {
        match &self.payload {
            Payload::Open {
                filename,
                flags,
                mode,
            } => Some((filename, *flags, *mode)),
            _ => None,
        }
    }

    fn exec(&self) -> Option<(&str, &[String])> {
        match &self.payload {
            Payload::Exec { filename, argv } => Some((filename, argv)),
            _ => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Process { pid, name, .. } = &self.process;
        write!(f, "[{} {name} ({pid})] {}", self.kind(), self.payload)
    }
}

impl secl_eval::Event for Event {
    fn event_type(&self) -> &str {
        self.kind().into()
    }

    fn model() -> Model<Self> {
        Model::<Self>::builder()
            .add_field("process.pid", "", |e| e.process.pid)
            .add_field("process.name", "", |e| e.process.name.clone())
            .add_field("process.uid", "", |e| e.process.uid)
            .add_field("process.is_root", "", |e| e.process.is_root())
            .add_field("process.argv", "", |e| e.process.argv.clone())
            .add_field("open.filename", "open", |e| {
                e.open().map(|(filename, _, _)| filename.to_string()).unwrap_or_default()
            })
            .add_field("open.flags", "open", |e| {
                e.open().map(|(_, flags, _)| flags).unwrap_or_default()
            })
            .add_field("open.mode", "open", |e| {
                e.open().map(|(_, _, mode)| mode).unwrap_or_default()
            })
            .add_field("exec.filename", "exec", |e| {
                e.exec().map(|(filename, _)| filename.to_string()).unwrap_or_default()
            })
            .add_field("exec.argv", "exec", |e| {
                e.exec().map(|(_, argv)| argv.to_vec()).unwrap_or_default()
            })
            .add_field("unlink.filename", "unlink", |e| match &e.payload {
                Payload::Unlink { filename } => filename.clone(),
                _ => String::new(),
            })
            .add_field("exit.code", "exit", |e| match e.payload {
                Payload::Exit { code } => code,
                _ => 0,
            })
            .build()
    }
}

/// Open flags usable as constants in expressions.
pub fn constants() -> EvalOpts {
    EvalOpts::new().with_constants([
        ("O_RDONLY", Value::Int(0)),
        ("O_WRONLY", Value::Int(1)),
        ("O_RDWR", Value::Int(2)),
        ("O_CREAT", Value::Int(64)),
        ("O_TRUNC", Value::Int(512)),
        ("O_APPEND", Value::Int(1024)),
    ])
}

/// Variables scoped to a process, keyed by pid.
pub fn process_scope() -> VariableProviderFactory<Event> {
    Arc::new(|| -> Box<dyn VariableProvider<Event>> {
        Box::new(KeyedVariableProvider::new(|e: &Event| {
            Some(e.process.pid.to_string())
        }))
    })
}

pub fn state_scopes() -> HashMap<String, VariableProviderFactory<Event>> {
    HashMap::from([(PROCESS_SCOPE.to_string(), process_scope())])
}
