use anyhow::{Result, bail};

use crate::{
    cli::LoadOpts,
    config::Config,
    engine::Engine,
    term_print::TermPrintable,
};

/// Load the policies once and print what was loaded, skipped and rejected.
pub fn check(opts: &LoadOpts) -> Result<()> {
    let engine = Engine::new(Config::from_opts(opts)?);
    let errors = engine.load()?;

    engine.ruleset().policies().term_print()?;

    if !errors.is_empty() {
        errors.term_print()?;
        bail!("{} invalid definitions", errors.len());
    }

    Ok(())
}
