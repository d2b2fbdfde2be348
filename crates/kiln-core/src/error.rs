//! Error types for Kiln

use thiserror::Error;

/// The main error type for Kiln operations
#[derive(Debug, Error)]
pub enum KilnError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Motion error: {0}")]
    Motion(String),

    #[error("Invalid sprite sheet: {0}")]
    InvalidSheet(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("TOML serialization error: {0}")]
    TomlSer(String),
}

/// Result type alias for Kiln operations
pub type Result<T> = std::result::Result<T, KilnError>;

impl From<toml::de::Error> for KilnError {
    fn from(err: toml::de::Error) -> Self {
        KilnError::TomlParse(err.to_string())
    }
}

impl From<toml::ser::Error> for KilnError {
    fn from(err: toml::ser::Error) -> Self {
        KilnError::TomlSer(err.to_string())
    }
}

impl From<image::ImageError> for KilnError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Decoding(e) => KilnError::Decode(e.to_string()),
            other => KilnError::Image(other.to_string()),
        }
    }
}
