//! Mapping session
//!
//! A [`MappingSession`] holds the currently loaded provider channels, the EPG
//! channel directory with its programme-count index, and the associations
//! between them. Loads replace their part of the state wholesale; the
//! associations survive reloads and are only changed by [`MappingSession::map`],
//! [`MappingSession::unmap`] and [`MappingSession::auto_match`].

pub mod export;

use bytes::Bytes;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

use crate::errors::{AppError, AppResult};
use crate::matching::{ChannelMatcher, MatchOptions, MatchReport};
use crate::models::{EpgChannel, ProgrammeCounts, ProviderChannel, StreamId};
use crate::utils::{DecodeHints, DecompressionService};
use crate::xmltv::{build_programme_counts, parse_channels, programme_count};

pub use export::{ExportFormat, ExportRow, export_mappings, export_rows};

/// Provider channel as shown to the user, with its current association
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderRow {
    pub stream_id: StreamId,
    pub name: String,
    /// Provider's own EPG hint, untouched
    pub epg_channel_id: Option<String>,
    pub mapped_to: Option<String>,
    pub mapped_name: Option<String>,
}

/// EPG channel as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpgRow {
    pub id: String,
    pub name: String,
    /// `None` when no programme references this id
    pub programme_count: Option<usize>,
}

#[derive(Debug, Default)]
pub struct MappingSession {
    providers: Vec<ProviderChannel>,
    provider_index: HashMap<String, usize>,
    epg_channels: Vec<EpgChannel>,
    programme_counts: ProgrammeCounts,
    mappings: BTreeMap<String, String>,
    decompression: DecompressionService,
}

impl MappingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decompression(mut self, decompression: DecompressionService) -> Self {
        self.decompression = decompression;
        self
    }

    /// Replace the provider channel list
    pub fn load_provider_channels(&mut self, channels: Vec<ProviderChannel>) {
        self.provider_index = channels
            .iter()
            .enumerate()
            .map(|(i, channel)| (channel.key(), i))
            .collect();
        self.providers = channels;
        info!(count = self.providers.len(), "Loaded provider channels");
    }

    /// Replace the provider channel list from a JSON array of stream records
    pub fn load_provider_json(&mut self, json: &str) -> AppResult<usize> {
        let channels: Vec<ProviderChannel> = serde_json::from_str(json)
            .map_err(|e| AppError::provider(format!("invalid provider channel list: {e}")))?;
        let count = channels.len();
        self.load_provider_channels(channels);
        Ok(count)
    }

    /// Replace the EPG channel directory and the programme-count index.
    ///
    /// The directory parse is strict: on malformed XML nothing is replaced.
    pub fn load_epg(&mut self, xml_text: &str) -> AppResult<usize> {
        let channels = parse_channels(xml_text)?;
        let counts = build_programme_counts(xml_text);

        info!(
            channels = channels.len(),
            indexed_channels = counts.len(),
            "Loaded EPG"
        );
        self.epg_channels = channels;
        self.programme_counts = counts;
        Ok(self.epg_channels.len())
    }

    /// [`load_epg`](Self::load_epg) from raw, possibly gzip-compressed bytes
    pub fn load_epg_bytes(&mut self, data: impl Into<Bytes>, hints: &DecodeHints) -> AppResult<usize> {
        let text = self.decompression.decode(data, hints)?;
        self.load_epg(&text)
    }

    pub fn load_epg_file(&mut self, path: &Path) -> AppResult<usize> {
        let data = std::fs::read(path)?;
        self.load_epg_bytes(data, &DecodeHints::from_name(path.to_string_lossy()))
    }

    /// Associate a provider channel with an EPG id; last write wins
    pub fn map(&mut self, stream_id: impl Into<StreamId>, epg_id: &str) -> AppResult<()> {
        let key = stream_id.into().key();
        let epg_id = epg_id.trim();
        if epg_id.is_empty() {
            return Err(AppError::validation(format!(
                "cannot map stream {key} to an empty EPG id"
            )));
        }
        debug!(stream = %key, epg_id, "Mapped channel");
        self.mappings.insert(key, epg_id.to_string());
        Ok(())
    }

    /// Remove an association; `false` if there was none
    pub fn unmap(&mut self, stream_id: impl Into<StreamId>) -> bool {
        self.mappings.remove(&stream_id.into().key()).is_some()
    }

    /// Run the matcher over the loaded channels and apply its associations.
    ///
    /// Only provider channels that received a match are touched; existing
    /// associations of the others are kept.
    pub fn auto_match(&mut self, options: &MatchOptions) -> AppResult<usize> {
        let report = self.match_report(options)?;
        let matched = report.matched;
        self.mappings.extend(report.mapping);
        Ok(matched)
    }

    /// Matcher output for the loaded channels without applying it
    pub fn match_report(&self, options: &MatchOptions) -> AppResult<MatchReport> {
        let matcher = ChannelMatcher::new(*options)?;
        Ok(matcher.run(&self.providers, &self.epg_channels))
    }

    pub fn provider_view(&self, search: &str) -> Vec<ProviderRow> {
        let needle = search.trim().to_lowercase();
        self.providers
            .iter()
            .filter(|channel| needle.is_empty() || channel.name.to_lowercase().contains(&needle))
            .map(|channel| {
                let mapped_to = self.mappings.get(&channel.key()).cloned();
                let mapped_name = mapped_to
                    .as_deref()
                    .and_then(|id| self.epg_channel(id))
                    .map(|epg| epg.name.clone());
                ProviderRow {
                    stream_id: channel.stream_id.clone(),
                    name: channel.name.clone(),
                    epg_channel_id: channel.epg_channel_id.clone(),
                    mapped_to,
                    mapped_name,
                }
            })
            .collect()
    }

    pub fn epg_view(&self, search: &str) -> Vec<EpgRow> {
        let needle = search.trim().to_lowercase();
        self.epg_channels
            .iter()
            .filter(|channel| needle.is_empty() || channel.name.to_lowercase().contains(&needle))
            .map(|channel| EpgRow {
                id: channel.id.clone(),
                name: channel.name.clone(),
                programme_count: self.programme_count(&channel.id),
            })
            .collect()
    }

    /// Case-insensitive point lookup into the programme-count index
    pub fn programme_count(&self, epg_id: &str) -> Option<usize> {
        programme_count(&self.programme_counts, epg_id)
    }

    pub fn provider_channels(&self) -> &[ProviderChannel] {
        &self.providers
    }

    pub fn provider_channel(&self, key: &str) -> Option<&ProviderChannel> {
        self.provider_index.get(key).map(|&i| &self.providers[i])
    }

    pub fn epg_channels(&self) -> &[EpgChannel] {
        &self.epg_channels
    }

    /// EPG channel by id, exact match first, then case-insensitive
    pub fn epg_channel(&self, epg_id: &str) -> Option<&EpgChannel> {
        self.epg_channels
            .iter()
            .find(|channel| channel.id == epg_id)
            .or_else(|| {
                self.epg_channels
                    .iter()
                    .find(|channel| channel.id.eq_ignore_ascii_case(epg_id))
            })
    }

    pub fn programme_counts(&self) -> &ProgrammeCounts {
        &self.programme_counts
    }

    /// provider key -> EPG id
    pub fn mappings(&self) -> &BTreeMap<String, String> {
        &self.mappings
    }
}
