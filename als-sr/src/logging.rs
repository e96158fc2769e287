//! Tracing setup
//!
//! The subscriber is installed before the config file is read, so config loading
//! itself is logged. `RUST_LOG` wins when set; otherwise the filter starts at
//! `info` and is swapped for the configured `logging.level` once it is known.

use tracing::warn;
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

pub const DEFAULT_LEVEL: &str = "info";

/// Handle onto the installed filter
pub struct LogFilter {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LogFilter {
    /// Replace the startup filter with the configured level
    ///
    /// Returns false (and keeps the current filter) when `RUST_LOG` set the filter
    /// or the level does not parse.
    pub fn apply_config_level(&self, level: &str) -> bool {
        if self.from_env {
            return false;
        }
        let filter = match EnvFilter::try_new(level) {
            Ok(filter) => filter,
            Err(e) => {
                warn!("Invalid logging.level {:?}: {}; keeping {}", level, e, DEFAULT_LEVEL);
                return false;
            }
        };
        match self.handle.reload(filter) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to apply logging.level: {}", e);
                false
            }
        }
    }

    /// Current filter directives
    pub fn current(&self) -> Option<String> {
        self.handle.with_current(|filter| filter.to_string()).ok()
    }
}

/// Reloadable filter layer; `env` is the `RUST_LOG` filter, if any
pub fn filter_layer(env: Option<EnvFilter>) -> (reload::Layer<EnvFilter, Registry>, LogFilter) {
    let from_env = env.is_some();
    let (layer, handle) = reload::Layer::new(env.unwrap_or_else(|| DEFAULT_LEVEL.into()));
    (layer, LogFilter { handle, from_env })
}

/// Install the global subscriber
pub fn init_tracing() -> LogFilter {
    let (filter, log_filter) = filter_layer(EnvFilter::try_from_default_env().ok());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    log_filter
}
