use thiserror::Error;

#[derive(Error, Debug)]
pub enum QfapError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Event not found: {0}")]
    NotFound(String),

    #[error("Malformed data: {0}")]
    MalformedData(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QfapError>;
