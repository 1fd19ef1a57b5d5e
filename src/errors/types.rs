//! Error type definitions for the EPG mapper
//!
//! The indexer distinguishes between bytes that cannot be turned into text
//! ([`DecodeError`]) and text that is not a well-formed XMLTV document
//! ([`ParseError`]). Everything else that can go wrong at the edges of the
//! crate (provider JSON, configuration, file access) is folded into
//! [`AppError`].

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Raw EPG bytes could not be turned into text
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// XMLTV document is not well-formed
    #[error("Parse error: {0}")]
    Parse(#[source] ParseError),

    /// Provider channel list could not be read
    #[error("Provider error: {message}")]
    Provider { message: String },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// JSON (de)serialization failures
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File or stream I/O failures
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while turning raw EPG bytes into text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is neither valid UTF-8 nor a declared Latin-1 document
    #[error("Invalid UTF-8 at byte {valid_up_to} (source: {source_name})")]
    InvalidUtf8 {
        source_name: String,
        valid_up_to: usize,
    },

    /// Document declares an encoding we cannot represent
    #[error("Unsupported encoding '{encoding}' (source: {source_name})")]
    UnsupportedEncoding {
        source_name: String,
        encoding: String,
    },
}

/// Errors raised by a strict (full-document) XMLTV parse
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Syntax error reported by the XML reader
    #[error("Malformed XML at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    /// Input ended while elements were still open
    #[error("Document truncated with {open_elements} unclosed element(s), innermost <{innermost}>")]
    Truncated {
        open_elements: usize,
        innermost: String,
    },

    /// Input contained no root element at all
    #[error("Document has no root element")]
    NoRootElement,

    /// Stream could not be read
    #[error("Read failure at byte {position}: {message}")]
    Read { position: u64, message: String },

    /// Stream bytes are not text in the document's encoding
    #[error("Undecodable input: {0}")]
    Decode(#[from] DecodeError),
}

impl From<ParseError> for AppError {
    /// Decode failures found mid-stream surface as [`AppError::Decode`], the
    /// same as when the whole payload is decoded up front.
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Decode(decode) => AppError::Decode(decode),
            other => AppError::Parse(other),
        }
    }
}

impl AppError {
    /// Create a provider error with a custom message
    pub fn provider<S: Into<String>>(message: S) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl ParseError {
    /// Create a syntax error at the given reader position
    pub fn syntax<M: Into<String>>(position: u64, message: M) -> Self {
        Self::Syntax {
            position,
            message: message.into(),
        }
    }

    /// Create a read failure at the given reader position
    pub fn read<M: Into<String>>(position: u64, message: M) -> Self {
        Self::Read {
            position,
            message: message.into(),
        }
    }

    /// Create a truncation error for a stack of still-open elements
    pub fn truncated<S: Into<String>>(open_elements: usize, innermost: S) -> Self {
        Self::Truncated {
            open_elements,
            innermost: innermost.into(),
        }
    }
}

impl DecodeError {
    /// Create an invalid UTF-8 error
    pub fn invalid_utf8<S: Into<String>>(source_name: S, valid_up_to: usize) -> Self {
        Self::InvalidUtf8 {
            source_name: source_name.into(),
            valid_up_to,
        }
    }
}
