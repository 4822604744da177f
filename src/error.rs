//! Error types for ratha-nav

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// ratha-nav error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport not connected
    #[error("Transport not connected")]
    NotConnected,

    /// Communication timeout
    #[error("Communication timeout")]
    Timeout,

    /// Invalid packet or response
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    /// Invalid configuration or parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration file error
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}
