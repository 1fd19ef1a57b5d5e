//! Centralized error handling for the EPG mapper
//!
//! # Error Categories
//!
//! - **Decode Errors**: EPG bytes that cannot be turned into text
//! - **Parse Errors**: XMLTV documents that are not well-formed
//! - **Provider / Validation / Configuration Errors**: bad input at the edges
//!
//! The streaming indexer passes never return [`ParseError`]; they hand back
//! whatever they accumulated before the damage instead.
//!
//! # Usage
//!
//! ```rust
//! use epg_mapper::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Err(AppError::validation("threshold must be within 0.0..=1.0"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for strict XMLTV parse results
pub type ParseResult<T> = Result<T, ParseError>;
