//! Diagnostic logging via `tracing`.
//!
//! Level priority:
//! 1. `-d make` on the command line (debug)
//! 2. `FRINGE_LOG` environment variable (e.g. "info", "trace")
//! 3. warn

use tracing::Level;

pub fn parse_level(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

/// Install the global subscriber.  Call once, at startup.
pub fn init(debug: bool) {
    let level = if debug {
        Level::DEBUG
    } else {
        std::env::var("FRINGE_LOG")
            .ok()
            .and_then(|s| parse_level(&s))
            .unwrap_or(Level::WARN)
    };
    // Fails only if a subscriber is already installed, in which case that
    // one wins.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
