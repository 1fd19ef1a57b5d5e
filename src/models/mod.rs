//! Channel and programme records shared by the matcher, the indexer and the
//! mapping session.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Provider-defined stream identifier; Xtream panels emit either numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamId {
    Number(i64),
    Text(String),
}

impl StreamId {
    /// Key used for associations. `1` and `"1"` collapse to the same key.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamId::Number(n) => write!(f, "{n}"),
            StreamId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for StreamId {
    fn from(value: i64) -> Self {
        StreamId::Number(value)
    }
}

impl From<&str> for StreamId {
    fn from(value: &str) -> Self {
        StreamId::Text(value.to_string())
    }
}

impl From<String> for StreamId {
    fn from(value: String) -> Self {
        StreamId::Text(value)
    }
}

/// A channel as delivered by the live-stream provider.
///
/// Only `stream_id`, `name` and `epg_channel_id` are interpreted; every other
/// field is kept verbatim in `extra` so the record can be written back out
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderChannel {
    pub stream_id: StreamId,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epg_channel_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProviderChannel {
    pub fn new(stream_id: impl Into<StreamId>, name: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            name: name.into(),
            epg_channel_id: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Association key for this channel
    pub fn key(&self) -> String {
        self.stream_id.key()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A `<channel>` entry of an XMLTV document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpgChannel {
    pub id: String,
    pub name: String,
}

impl EpgChannel {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A `<programme>` entry as returned by a lookup.
///
/// `start` and `stop` are the raw XMLTV timestamps; they are not parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Programme {
    pub start: String,
    pub stop: String,
    pub title: String,
    pub desc: String,
}

/// Result of a per-channel programme lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgrammeLookup {
    /// At most `limit` programmes, in document order
    pub programmes: Vec<Programme>,
    /// Every matching programme in the readable part of the document
    pub total_found: usize,
}

/// Lowercased EPG channel id -> number of `<programme>` elements referencing it.
///
/// An id missing from the map was never referenced by a programme; that is
/// different from an id that is present with a count.
pub type ProgrammeCounts = BTreeMap<String, usize>;
