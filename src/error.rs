use std::path::PathBuf;
use thiserror::Error;

use crate::filter::FilterError;

/// Exit code for successful execution
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for general errors (file not found, permission denied, I/O error)
pub const EXIT_ERROR: i32 = 1;

/// Exit code for invalid arguments (bad option value, invalid line range)
pub const EXIT_INVALID_ARGS: i32 = 2;

/// Custom error type for plainview
#[derive(Error, Debug)]
pub enum ViewError {
    /// File I/O errors
    #[error("I/O error for '{path}': {source}")]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// The two handles opened on a path lead to different files
    #[error("'{path}' was replaced while it was being opened")]
    FileReplaced { path: PathBuf },

    /// An open, refresh or filter was requested while a scan is running
    #[error("A scan is already in progress")]
    ScanInProgress,

    /// An operation needs an open file
    #[error("No file is open")]
    NotOpen,

    /// Empty filter pattern
    #[error("Empty pattern provided. Did you mean to omit -g?")]
    EmptyPattern,

    /// Invalid line range format
    #[error("Invalid line range format: '{range}'. Expected formats: X:Y, :Y, X:, or X")]
    InvalidLineRange { range: String },

    /// An option value that parses but cannot be used
    #[error("Invalid value '{value}' for {option}")]
    InvalidOption { option: String, value: String },

    /// The scan ended in failure
    #[error("Scan failed: {reason}")]
    ScanFailed { reason: String },

    /// The filter run could not complete
    #[error(transparent)]
    Filter(#[from] FilterError),
}

impl ViewError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ViewError::EmptyPattern
            | ViewError::InvalidLineRange { .. }
            | ViewError::InvalidOption { .. } => EXIT_INVALID_ARGS,
            ViewError::Filter(FilterError::UnsupportedDelimiter { .. }) => EXIT_INVALID_ARGS,
            _ => EXIT_ERROR,
        }
    }

    /// Attach a path to an I/O error
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ViewError::Io {
            source,
            path: path.into(),
        }
    }
}

impl From<std::io::Error> for ViewError {
    fn from(source: std::io::Error) -> Self {
        ViewError::Io {
            source,
            path: PathBuf::new(),
        }
    }
}
