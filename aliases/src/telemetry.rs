use alias_core::SaveOperation;
use config::ObservabilityConfig;
use metrics::counter;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

pub const LOOKUPS_TOTAL: &str = "contextual_alias_lookups_total";
pub const STORAGE_ERRORS_TOTAL: &str = "contextual_alias_storage_errors_total";
pub const SAVES_TOTAL: &str = "contextual_alias_saves_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Hit,
    Miss,
    Error,
}

impl Outcome {
    pub fn from_found(found: bool) -> Self {
        if found { Self::Hit } else { Self::Miss }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Error => "error",
        }
    }
}

pub fn record_lookup(operation: &'static str, outcome: Outcome) {
    counter!(LOOKUPS_TOTAL, "operation" => operation, "outcome" => outcome.as_str()).increment(1);
}

pub fn record_storage_error(operation: &'static str) {
    counter!(STORAGE_ERRORS_TOTAL, "operation" => operation).increment(1);
}

pub fn record_save(operation: SaveOperation) {
    counter!(SAVES_TOTAL, "operation" => operation.to_string()).increment(1);
}

/// `RUST_LOG` when set, otherwise the configured `logging_level`.
pub fn env_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging_level))
}

/// Install the global fmt subscriber. Fails if one is already installed.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(env_filter(config))
        .try_init()
}
