//! Error types for the head tracking library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Frame buffer has the wrong size or geometry
    #[error("Frame buffer error: {0}")]
    FrameBuffer(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
