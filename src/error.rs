//! Error types for voxmap

use thiserror::Error;

/// Result type alias for voxmap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for voxmap
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A mutating operation was invoked before `set_config`
    #[error("Map not configured: call set_config before inserting data")]
    ConfigMissing,

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization/deserialization error
    #[error("Codec error: {0}")]
    Codec(String),

    /// Container frame failed its integrity check
    #[error("CRC mismatch: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch { expected: u32, actual: u32 },

    /// Map file or container header is not in the expected format
    #[error("Invalid map format: {0}")]
    InvalidFormat(String),

    /// Section grid has no bounding box metadata
    #[error("Section grid is missing bb_min/bb_max metadata")]
    SectionMetadataMissing,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_cbor::Error> for Error {
    fn from(err: serde_cbor::Error) -> Self {
        Error::Codec(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Codec(err.to_string())
    }
}
