use std::io::IsTerminal;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::is_true;

/// Variables that raise log verbosity to debug
///
/// `GIT_CACHE_SSH_TRACE` is the legacy spelling.
pub const TRACE_TOGGLES: &[&str] = &["GIT_TRACE", "GIT_CACHESSH_TRACE", "GIT_CACHE_SSH_TRACE"];

/// Pick the log level from the trace toggles
pub fn verbosity<F>(lookup: F) -> LevelFilter
where
    F: Fn(&str) -> Option<String>,
{
    let traced = TRACE_TOGGLES
        .iter()
        .any(|name| lookup(name).is_some_and(|value| is_true(&value)));

    if traced {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

/// Install the stderr subscriber
///
/// Reads only the trace toggles from the process environment; `RUST_LOG`
/// is ignored because the caller may not be trusted.
pub fn init() {
    let level = verbosity(|name| std::env::var(name).ok());
    let stderr = std::io::stderr();

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .parse_lossy("");

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(stderr.is_terminal())
        .with_target(false)
        .without_time()
        .with_env_filter(filter)
        .try_init();
}
