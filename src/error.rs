//! Error types for the dashboard core and its collaborators.

use thiserror::Error;

/// Errors raised by the connection, control and configuration layers.
///
/// Malformed inbound frames are logged and dropped inside the connection
/// manager; [`Error::Decode`] only escapes from explicit decode calls.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP transport failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The backend answered with a non-success status.
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// An inbound payload was not a valid metric frame.
    #[error("Failed to decode frame: {0}")]
    Decode(String),

    /// The configured server origin cannot be turned into a channel endpoint.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Report filename would escape the report directory.
    #[error("Invalid report filename: {0}")]
    InvalidFilename(String),

    /// Opening the duplex channel failed.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Http("request timed out".to_string())
        } else if err.is_decode() {
            Error::Decode(err.to_string())
        } else {
            Error::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}
