use thiserror::Error;

pub type Result<T> = std::result::Result<T, GeoDbError>;

#[derive(Error, Debug)]
pub enum GeoDbError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Schema drift: {0}")]
    Schema(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<mongodb::error::Error> for GeoDbError {
    #[inline]
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod queries;
pub mod report;
pub mod schema;
