//! secl-eval parses, type checks and compiles SECL expressions against an event model.
//!
//! An event type implements [Event], describing its fields with a [Model]. Expressions
//! are parsed into an [ast::Expr] tree, then compiled into a [Predicate]: a tree of
//! closures checking an event without any further lookup. Example:
//!
//! ```
//! use std::collections::HashMap;
//!
//! use secl_eval::{
//!     compile_predicate, parse_expression, CompileEnv, Context, Event, MacroStore, Model,
//!     VariableMap,
//! };
//!
//! struct Open {
//!     filename: String,
//!     flags: i64,
//! }
//!
//! impl Event for Open {
//!     fn event_type(&self) -> &str {
//!         "open"
//!     }
//!
//!     fn model() -> Model<Self> {
//!         Model::<Self>::builder()
//!             .add_field("open.filename", "open", |e| e.filename.clone())
//!             .add_field("open.flags", "open", |e| e.flags)
//!             .build()
//!     }
//! }
//!
//! let model = Open::model();
//! let constants = HashMap::new();
//! let macros = MacroStore::new();
//! let variables = VariableMap::new();
//! let env = CompileEnv::new(&model, &constants, &macros, &variables);
//!
//! let expr = parse_expression(r#"open.filename =~ "/etc/*" && open.flags & 1 > 0"#).unwrap();
//! let predicate = compile_predicate(&expr, &env).unwrap();
//!
//! let event = Open {
//!     filename: "/etc/passwd".to_string(),
//!     flags: 1,
//! };
//!
//! assert!(predicate.is_match(&Context::new(&event)));
//! assert_eq!(predicate.event_types(), ["open"]);
//! ```
//!
//! Identifiers resolve to model fields first, then to macros of the [MacroStore], then
//! to constants. `${name}` references resolve to the variables of a [VariableMap].

pub mod ast;
mod compiler;
mod context;
mod error;
mod macros;
mod model;
mod operators;
mod opts;
mod parser;
mod value;
mod variables;

pub use compiler::{check_expression, compile_predicate, CompileEnv, Evaluator, Predicate};
pub use context::Context;
pub use error::{EvalError, SyntaxError};
pub use macros::{Macro, MacroStore};
pub use model::{Event, FieldDef, FieldType, Model, ModelBuilder, WILDCARD_EVENT_TYPE};
pub use operators::*;
pub use opts::EvalOpts;
pub use parser::parse_expression;
pub use value::{Value, ValueType};
pub use variables::{
    GlobalVariable, KeyedVariableProvider, Variable, VariableMap, VariableProvider,
    VariableProviderFactory,
};
