pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, EngineConfig, RetryPolicy};
pub use error::{EngineError, EngineResult};
