//! Service boundary errors
//!
//! Corpus and settings failures surface here. An unreadable corpus degrades
//! to an empty one at startup and fails a reload; bad settings stop startup.
//! Market and generation failures never reach this type: they resolve to
//! sentinel fields and the fixed error decision inside the pipeline.

use thiserror::Error;

/// Result alias for boundary operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Corpus file missing, unreadable or malformed
    #[error("corpus unavailable: {0}")]
    Corpus(String),

    /// Invalid settings
    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
