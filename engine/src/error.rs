use thiserror::Error;

/// Errors raised at the engine's boundary (parsing and validating external
/// input). Simulation steps themselves never fail.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),
    #[error("unsupported save version {found} (expected {expected})")]
    UnsupportedSaveVersion { found: u32, expected: u32 },
}
