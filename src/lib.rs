//! Reconcile an IPTV provider's channel list with an XMLTV programme guide.
//!
//! - [`xmltv`] streams XMLTV documents into a channel directory, a
//!   programme-count index and per-channel programme lookups
//! - [`matching`] proposes provider-to-EPG associations by name similarity
//! - [`session`] holds loaded channels and associations and renders exports

pub mod config;
pub mod errors;
pub mod matching;
pub mod models;
pub mod session;
pub mod utils;
pub mod xmltv;

pub use errors::{AppError, AppResult, DecodeError, ParseError};
pub use matching::{MatchOptions, MatchReport, match_channels};
pub use models::{EpgChannel, Programme, ProgrammeCounts, ProgrammeLookup, ProviderChannel, StreamId};
pub use session::{ExportFormat, MappingSession, export_mappings};
pub use xmltv::{build_programme_counts, lookup_programmes, parse_channels};
