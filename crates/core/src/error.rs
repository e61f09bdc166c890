use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Invalid parameter: {0}")]
    Parameter(String),

    #[error("Invalid metrics for entity {entity_id}: {reason}")]
    InvalidMetrics { entity_id: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub fn invalid_metrics(entity_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidMetrics {
            entity_id: entity_id.into(),
            reason: reason.into(),
        }
    }
}
