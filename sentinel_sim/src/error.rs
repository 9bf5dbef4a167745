use sentinel_core::{ConfigError, EngineError};

use crate::scenarios::ScenarioParseError;

/// Errors surfaced by the simulator and its CLI.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Scenario(#[from] ScenarioParseError),

    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("failed to encode JSON output: {0}")]
    Json(#[from] serde_json::Error),
}
