//! Error types for I/O operations

use thiserror::Error;

/// Errors that can occur during I/O operations
#[derive(Error, Debug)]
pub enum IoError {
    #[error("Parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type IoResult<T> = std::result::Result<T, IoError>;

impl From<IoError> for scanalign_core::Error {
    fn from(err: IoError) -> Self {
        match err {
            IoError::Io(e) => scanalign_core::Error::Io(e),
            parse @ IoError::ParseError { .. } => scanalign_core::Error::InvalidData(parse.to_string()),
        }
    }
}
