use thiserror::Error;

/// Core error type for lookout operations.
#[derive(Error, Debug)]
pub enum LookoutError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("invalid condition: {0}")]
    InvalidCondition(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for LookoutError {
    fn from(err: serde_json::Error) -> Self {
        LookoutError::Internal(err.to_string())
    }
}

impl From<toml::de::Error> for LookoutError {
    fn from(err: toml::de::Error) -> Self {
        LookoutError::Config(err.to_string())
    }
}

/// Result type alias using LookoutError.
pub type Result<T> = std::result::Result<T, LookoutError>;
