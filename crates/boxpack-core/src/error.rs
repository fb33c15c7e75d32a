use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoxPackError {
    #[error("Invalid atlas dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Encoding error: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for BoxPackError {
    fn from(e: serde_json::Error) -> Self {
        BoxPackError::Encode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BoxPackError>;
