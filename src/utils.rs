use std::env;

fn show_backtrace() -> bool {
    if log::max_level() >= log::LevelFilter::Debug {
        return true;
    }

    if let Ok(true) = env::var("RUST_BACKTRACE").map(|s| s == "1") {
        return true;
    }

    false
}

/// Log a fatal error: the whole chain of causes on one line, or the debug
/// representation with backtrace when debugging.
pub fn report_error(e: &anyhow::Error) {
    if show_backtrace() {
        log::error!("{:?}", e);
    } else {
        log::error!("{:#}", e);
    }
}
