//! Diagnostic logging setup.
//!
//! Logs go to stderr and are off below `warn` unless `GPTREPL_LOG` says
//! otherwise. User-facing output never goes through here.

use tracing_subscriber::EnvFilter;

use crate::config::env_string_opt;

pub const LOG_ENV_VAR: &str = "GPTREPL_LOG";
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Parses `directives`, falling back to the default filter when they are
/// missing or invalid.
pub fn env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Installs the global subscriber. A second call is a no-op.
pub fn init_logging() {
    let filter = env_filter(env_string_opt(LOG_ENV_VAR).as_deref());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
