//! Errors for the voyage worker
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoyageWorkerError {
    #[error("Serialization error")]
    SerdeError(#[from] serde_json::Error),

    #[error("Configuration error")]
    ConfigError(#[from] config::ConfigError),

    #[error("Invalid configuration: {message}")]
    ConfigurationError { message: String },

    #[error("IO error")]
    IoError(#[from] std::io::Error),

    #[error("Invalid region data: {0}")]
    InvalidRegionData(String),

    #[error("Invalid propulsion mode: {0}")]
    InvalidPropulsion(i16),

    #[error("Invalid datapoint status: {0}")]
    InvalidStatus(i16),

    #[error("Trip not found: {0}")]
    TripNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Database connection error: {0}")]
    DatabaseConnectionError(String),

    #[error("Database migration error")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),
}
