//! XMLTV indexing
//!
//! Three passes share one forward-only scanner ([`stream::scan`]):
//!
//! - [`parse_channels`] builds the channel directory and fails on malformed input
//! - [`build_programme_counts`] counts programmes per channel id
//! - [`lookup_programmes`] returns the programmes of one channel
//!
//! The last two never fail; a damaged document yields the data read before
//! the damage.

pub mod channels;
pub mod lookup;
pub mod programme_counts;
pub mod stream;

pub const TAG_CHANNEL: &str = "channel";
pub const TAG_DISPLAY_NAME: &str = "display-name";
pub const TAG_PROGRAMME: &str = "programme";
pub const TAG_TITLE: &str = "title";
pub const TAG_DESC: &str = "desc";

pub use channels::{ChannelCollector, parse_channels, parse_channels_from_reader};
pub use lookup::{ProgrammeCollector, lookup_programmes, lookup_programmes_from_reader};
pub use programme_counts::{
    ProgrammeCounter, build_programme_counts, build_programme_counts_from_reader, programme_count,
};
pub use stream::{ScanReport, XmlTag, XmltvVisitor, scan, scan_strict};
