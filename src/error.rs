//! # Error Types
//!
//! Custom error types for DS4 Lightbar using `thiserror`.

use thiserror::Error;

/// Main error type for DS4 Lightbar
#[derive(Debug, Error)]
pub enum Ds4Error {
    /// HID backend errors (enumerate, open, read, write)
    #[error("HID error: {0}")]
    Hid(String),

    /// The controller has no live transport
    #[error("Controller not connected: {0}")]
    NotConnected(String),

    /// Input report could not be interpreted
    #[error("Invalid report: {0}")]
    InvalidReport(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No async runtime available for background loops
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Result type alias for DS4 Lightbar
pub type Result<T> = std::result::Result<T, Ds4Error>;
