//! `secl` loads SECL security policies and evaluates events against them.
//!
//! Policies are YAML files defining macros and rules. Rules are boolean
//! expressions over the fields of an [event](secl_model::Event); matching
//! rules can set variables that later rules read back as `${name}`.
//!
//! The tool comes with three commands:
//!
//! ```sh
//! # Load the policies and report loaded, skipped and invalid rules
//! secl check --policies /etc/secl/policies
//!
//! # Evaluate a file of JSON events, one per line
//! secl eval --policies /etc/secl/policies --events events.jsonl
//!
//! # Evaluate events read from stdin, reloading policies on SIGHUP
//! secl run --config /etc/secl/secl.ini
//! ```
//!
//! The policy engine itself lives in the [secl_rules] crate, the expression
//! language in [secl_eval].

pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
mod term_print;
pub mod utils;

/// Init logger. We log from info level and above.
/// If RUST_LOG is set, we assume the user wants to debug something
/// and use env_logger default behaviour.
pub fn init_logger(override_log_level: log::Level) {
    if std::env::var_os("RUST_LOG").is_some() {
        env_logger::init();
    } else {
        env_logger::builder()
            .filter_level(override_log_level.to_level_filter())
            .init();
    }
}
