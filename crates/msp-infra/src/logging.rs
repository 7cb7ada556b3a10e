//! Process-wide tracing setup, initialized once at boot (spec §9: "no
//! process-wide singletons" for mutable state, but a tracing subscriber is
//! the one process-global the ecosystem expects). Mirrors the teacher's
//! `LoggingManager::initialize_tracing` shape: env-filter first, JSON or
//! plain formatting second, tolerant of a subscriber already being set
//! (harmless in tests that call it more than once).

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true,
        }
    }
}

/// Initializes the global `tracing` subscriber. Safe to call more than
/// once per process (e.g. across integration tests); subsequent calls are
/// a no-op rather than a panic.
pub fn init(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let result = if config.json_format {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .try_init()
    };

    if result.is_err() {
        eprintln!("tracing subscriber already initialized, skipping");
    }
}
