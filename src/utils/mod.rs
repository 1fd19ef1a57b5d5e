//! Utility modules for the EPG mapper
//!
//! This module contains reusable utilities that can be used
//! across different parts of the system.

pub mod decompression;
pub mod text_reader;

// Re-export commonly used types for convenience
pub use decompression::{CompressionFormat, DecodeHints, DecompressionService};
pub use text_reader::{SourceEncoding, TextReader, decode_error_of};
