use crate::application::ServiceError;
use thiserror::Error;

/// Flash sale application error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Fast counter error: {0}")]
    Counter(#[from] crate::infrastructure::CounterError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration value: {field}")]
    InvalidConfig { field: String },

    #[error("Inventory service error: {0}")]
    Service(#[from] ServiceError),
}

impl Error {
    pub fn invalid_config(field: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
