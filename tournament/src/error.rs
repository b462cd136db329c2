use kingdom_engine::{EngineError, FactionId};

#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    #[error("engine: {0}")]
    Engine(#[from] EngineError),
    #[error("database: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no agent for {0}")]
    MissingAgent(FactionId),
}
