use std::sync::Arc;

use anyhow::Result;
use secl_model::Event;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    signal::unix::{SignalKind, signal},
};

use crate::{
    cli::LoadOpts,
    config::Config,
    engine::{Engine, MatchPrinter},
};

/// Evaluate the JSON events read from stdin until EOF or a termination
/// signal. SIGHUP reloads the policies.
pub async fn run(opts: &LoadOpts) -> Result<()> {
    let engine = Engine::new(Config::from_opts(opts)?);
    engine.load()?;
    engine.ruleset().add_listener(Arc::new(MatchPrinter));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut sig_int = signal(SignalKind::interrupt())?;
    let mut sig_term = signal(SignalKind::terminate())?;
    let mut sig_hup = signal(SignalKind::hangup())?;

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => handle_line(&engine, &line),
                None => {
                    log::trace!("stdin closed");
                    break;
                }
            },
            _ = sig_hup.recv() => {
                log::info!("SIGHUP received, reloading policies");
                if let Err(err) = engine.load() {
                    log::error!("Reload failed, keeping previous rules: {err:#}");
                }
            }
            _ = sig_int.recv() => {
                log::trace!("SIGINT received");
                break;
            }
            _ = sig_term.recv() => {
                log::trace!("SIGTERM received");
                break;
            }
        }
    }

    log::info!("Terminating secl...");

    Ok(())
}

fn handle_line(engine: &Engine, line: &str) {
    if line.trim().is_empty() {
        return;
    }

    match serde_json::from_str::<Event>(line) {
        Ok(event) => {
            engine.evaluate(&event);
        }
        Err(err) => log::warn!("Skipping invalid event: {err}"),
    }
}
