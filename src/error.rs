//! Centralized error types for mailsift.
//!
//! Each variant maps to one scope of failure: a single attachment, a single
//! message, a single input file, or the whole task. Only [`MailError::NoOutput`]
//! and [`MailError::Parse`] are meant to reach the caller; the others are
//! contained and logged where they occur.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailsift library.
#[derive(Error, Debug)]
pub enum MailError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The input extension is not one we know how to parse.
    #[error("Unsupported input extension '{extension}' for {path}")]
    UnsupportedInput { path: PathBuf, extension: String },

    /// A single-message file is not a syntactically valid message.
    #[error("Failed to parse message '{path}': {reason}")]
    Parse { path: PathBuf, reason: String },

    /// The file does not appear to be a valid mailbox.
    #[error("File does not appear to be a valid MBOX: {0}")]
    ContainerFormat(PathBuf),

    /// One attachment could not be allocated or written.
    #[error("Failed to write attachment '{filename}': {reason}")]
    AttachmentWrite { filename: String, reason: String },

    /// One message inside a mailbox could not be processed.
    #[error("Failed to process message #{index}: {reason}")]
    MessageProcessing { index: usize, reason: String },

    /// The CSV writer failed.
    #[error("CSV error on '{path}': {source}")]
    Csv { path: PathBuf, source: csv::Error },

    /// Every input was skipped or failed.
    #[error("No compatible input files found. Supported extensions: {supported}.")]
    NoOutput { supported: String },
}

/// Convenience alias for `Result<T, MailError>`.
pub type Result<T> = std::result::Result<T, MailError>;

impl MailError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Map an `io::Error` raised while opening `path`, turning `NotFound`
    /// into [`MailError::FileNotFound`].
    pub fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound(path)
        } else {
            Self::Io { path, source }
        }
    }
}
