//! Errors raised by the native SAS format readers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with the expected signature.
    #[error("not a {format} file")]
    BadMagic { format: &'static str },

    #[error("unsupported SAS transport version: {0}")]
    UnsupportedVersion(String),

    /// A read went past the end of the buffer holding a structure.
    #[error("truncated {context}: need {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        context: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("unsupported character encoding (code {0})")]
    UnsupportedEncoding(u8),

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

pub type Result<T> = std::result::Result<T, ReadError>;
