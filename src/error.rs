//! Error types for the MIME database.

use std::io;
use thiserror::Error;

/// The main error type for the MIME database.
///
/// Lookups never fail: an unknown name or an unmatched buffer is a `None`
/// or the default type. Errors only come out of ingestion.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Type name is empty or not of the form `media/subtype`
    #[error("Invalid MIME type name: {0:?}")]
    InvalidTypeName(String),

    /// Glob pattern could not be compiled
    #[error("Invalid glob pattern {pattern:?}: {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// Glob weight outside 1..=100
    #[error("Glob weight {0} out of range 1..=100")]
    WeightOutOfRange(u32),

    /// Magic priority outside 0..=100
    #[error("Magic priority {0} out of range 0..=100")]
    PriorityOutOfRange(u32),

    /// Magic rule that cannot be matched
    #[error("Invalid magic rule: {0}")]
    InvalidMagic(String),

    /// Malformed definitions file
    #[error("{label}: {message}")]
    Parse { label: String, message: String },
}

/// Specialized Result type for MIME database operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn parse(label: &str, message: impl Into<String>) -> Self {
        Error::Parse {
            label: label.to_string(),
            message: message.into(),
        }
    }
}
