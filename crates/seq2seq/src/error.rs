use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransformerError>;

#[derive(Error, Debug)]
pub enum TransformerError {
    #[error("invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error("tensor operation failed: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    ConfigFormat(String),
}

impl From<toml::de::Error> for TransformerError {
    fn from(value: toml::de::Error) -> Self {
        TransformerError::ConfigFormat(value.to_string())
    }
}

impl From<serde_json::Error> for TransformerError {
    fn from(value: serde_json::Error) -> Self {
        TransformerError::ConfigFormat(value.to_string())
    }
}
