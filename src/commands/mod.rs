use anyhow::Result;

use crate::cli::Commands;

mod check;
mod eval;
mod run;

pub async fn run(command: Commands) -> Result<()> {
    log::trace!("Command: {:?}", command);

    match command {
        Commands::Check(opts) => check::check(&opts),
        Commands::Eval(args) => eval::eval(&args).await,
        Commands::Run(opts) => run::run(&opts).await,
    }
}
