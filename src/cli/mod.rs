use std::{ffi::OsString, path::PathBuf};

use clap::{Arg, ArgAction, Args, Command, FromArgMatches, Subcommand};

pub const NAME: &str = "secl";

#[derive(Debug, Clone)]
pub struct SeclOpts {
    pub command: Commands,
    pub override_log_level: log::Level,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Load policies and report loaded, skipped and invalid definitions
    Check(LoadOpts),

    /// Evaluate a file of JSON events, one per line
    Eval(EvalArgs),

    /// Evaluate JSON events read from stdin, reload policies on SIGHUP
    Run(LoadOpts),
}

/// Where policies come from and which definitions to load.
///
/// Flags override the values of the configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct LoadOpts {
    /// Configuration file, its `[secl]` section provides defaults for the other flags
    #[clap(long, short)]
    pub config: Option<PathBuf>,

    /// Directory of `*.policy` files
    #[clap(long, short)]
    pub policies: Option<PathBuf>,

    /// Skip definitions whose `agent_version` constraint doesn't hold for this version
    #[clap(long, value_name = "VERSION")]
    pub agent_version: Option<String>,

    /// Load only the given rule, can be repeated
    #[clap(long = "rule-id", value_name = "ID")]
    pub rule_ids: Vec<String>,

    /// Load only rules of the given event type, can be repeated
    #[clap(long = "event-type", value_name = "TYPE")]
    pub event_types: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EvalArgs {
    #[clap(flatten)]
    pub load: LoadOpts,

    /// File of JSON events, one per line
    #[clap(long, short)]
    pub events: PathBuf,
}

pub fn parse_from_args() -> SeclOpts {
    parse_from(&mut std::env::args_os())
}

pub fn parse_from<I, T>(args: I) -> SeclOpts
where
    I: Iterator<Item = T>,
    T: Into<OsString> + Clone,
{
    try_parse_from(args).unwrap_or_else(|e| e.exit())
}

pub fn try_parse_from<I, T>(args: I) -> Result<SeclOpts, clap::Error>
where
    I: Iterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let app = Command::new(NAME)
        .version(env!("CARGO_PKG_VERSION"))
        .about("SECL policy loader and evaluator")
        .propagate_version(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .disable_help_subcommand(true);

    let matches =
        with_verbosity_flag(Commands::augment_subcommands(app)).try_get_matches_from(args)?;

    let override_log_level = match matches.subcommand() {
        Some((_, sub_matches)) => log_level_from_verbosity_flag_count(sub_matches.get_count("v")),
        None => unreachable!("Subcommand should be specified"),
    };
    let command = Commands::from_arg_matches(&matches)?;

    Ok(SeclOpts {
        command,
        override_log_level,
    })
}

fn with_verbosity_flag(app: Command) -> Command {
    app.arg(
        Arg::new("v")
            .short('v')
            .long("verbose")
            .action(ArgAction::Count)
            .global(true)
            .help(concat!(
                "Pass many times for a more verbose output. ",
                "Passing `-v` adds debug logs, `-vv` enables trace logging"
            )),
    )
}

fn log_level_from_verbosity_flag_count(num: u8) -> log::Level {
    match num {
        u8::MIN..=0 => log::Level::Info,
        1 => log::Level::Debug,
        2..=u8::MAX => log::Level::Trace,
    }
}
