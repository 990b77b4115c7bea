use std::sync::Arc;

use anyhow::{Context, Result};
use secl_model::Event;

use crate::{
    cli::EvalArgs,
    config::Config,
    engine::{Engine, MatchPrinter},
};

/// Evaluate every event of a JSON lines file, in order.
pub async fn eval(args: &EvalArgs) -> Result<()> {
    let engine = Engine::new(Config::from_opts(&args.load)?);
    engine.load()?;
    engine.ruleset().add_listener(Arc::new(MatchPrinter));

    let events = tokio::fs::read_to_string(&args.events)
        .await
        .with_context(|| format!("Error reading events from {}", args.events.display()))?;

    let mut total = 0;
    let mut matched = 0;
    for (index, line) in events.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let event: Event = serde_json::from_str(line)
            .with_context(|| format!("Invalid event at line {}", index + 1))?;

        total += 1;
        if engine.evaluate(&event) {
            matched += 1;
        }
    }

    log::info!("{matched} of {total} events matched");

    Ok(())
}
