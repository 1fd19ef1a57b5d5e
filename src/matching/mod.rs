//! Fuzzy provider-to-EPG channel matching
//!
//! Every provider channel is scored against every EPG channel (O(P×E)) and
//! the chosen [`MatchStrategy`] turns the scores into associations. Nothing
//! here fails and nothing is mutated; the caller decides what to do with the
//! returned [`MatchReport`].
//!
//! ```
//! use epg_mapper::matching::match_channels;
//! use epg_mapper::models::{EpgChannel, ProviderChannel};
//!
//! let providers = vec![ProviderChannel::new(1, "Das Erste")];
//! let epg = vec![EpgChannel::new("daserste.de", "das erste")];
//!
//! let report = match_channels(&providers, &epg, 0.8);
//! assert_eq!(report.matched, 1);
//! assert_eq!(report.mapping["1"], "daserste.de");
//! ```

pub mod normalize;
pub mod similarity;
pub mod strategy;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::defaults::DEFAULT_MATCH_THRESHOLD;
use crate::errors::{AppError, AppResult};
use crate::models::{EpgChannel, ProviderChannel};

pub use normalize::{NameNormalization, NameNormalizer};
pub use similarity::{GestaltScorer, SimilarityScorer, gestalt_ratio};
pub use strategy::{Assignment, ExclusiveStrategy, GreedyStrategy, MatchStrategy, PairScorer, StrategyKind};

/// Tunables of one matching run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchOptions {
    /// Minimum confidence; a pair must score strictly above it
    pub threshold: f64,
    pub strategy: StrategyKind,
    pub normalization: NameNormalization,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
            strategy: StrategyKind::default(),
            normalization: NameNormalization::default(),
        }
    }
}

impl MatchOptions {
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }
}

/// EPG channel proposed for a provider channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub epg_id: String,
    pub epg_name: String,
    pub score: f64,
}

/// Outcome for one provider channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub provider_key: String,
    pub provider_name: String,
    pub candidate: Option<MatchCandidate>,
}

/// Everything a matching run produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    /// provider key -> EPG channel id, accepted matches only
    pub mapping: BTreeMap<String, String>,
    /// Accepted matches, one per provider channel that received a candidate
    pub matched: usize,
    /// One entry per provider channel, in input order
    pub results: Vec<MatchResult>,
}

/// Configured matcher
pub struct ChannelMatcher {
    options: MatchOptions,
    normalizer: NameNormalizer,
    strategy: Box<dyn MatchStrategy>,
    scorer: Box<dyn SimilarityScorer>,
}

impl ChannelMatcher {
    pub fn new(options: MatchOptions) -> AppResult<Self> {
        if !(0.0..=1.0).contains(&options.threshold) {
            return Err(AppError::validation(format!(
                "match threshold must be within 0.0..=1.0, got {}",
                options.threshold
            )));
        }
        Ok(Self {
            normalizer: NameNormalizer::new(options.normalization)?,
            strategy: options.strategy.build(),
            scorer: Box::new(GestaltScorer),
            options,
        })
    }

    /// Greedy, case-fold-only matcher. Any threshold is accepted as given.
    pub fn greedy(threshold: f64) -> Self {
        Self {
            options: MatchOptions::with_threshold(threshold),
            normalizer: NameNormalizer::case_fold(),
            strategy: Box::new(GreedyStrategy),
            scorer: Box::new(GestaltScorer),
        }
    }

    pub fn with_scorer(mut self, scorer: Box<dyn SimilarityScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_strategy(mut self, strategy: Box<dyn MatchStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    pub fn run(&self, providers: &[ProviderChannel], epg: &[EpgChannel]) -> MatchReport {
        let pairs = PairScorer::new(providers, epg, &self.normalizer, self.scorer.as_ref());
        let assignments = self.strategy.assign(&pairs, self.options.threshold);

        let mut report = MatchReport::default();
        for (provider, assignment) in providers.iter().zip(assignments) {
            let candidate = assignment.map(|a| {
                let channel = &epg[a.epg_index];
                MatchCandidate {
                    epg_id: channel.id.clone(),
                    epg_name: channel.name.clone(),
                    score: a.score,
                }
            });

            if let Some(candidate) = &candidate {
                debug!(
                    provider = %provider.name,
                    epg_id = %candidate.epg_id,
                    score = candidate.score,
                    "Matched channel"
                );
                report.mapping.insert(provider.key(), candidate.epg_id.clone());
                report.matched += 1;
            }

            report.results.push(MatchResult {
                provider_key: provider.key(),
                provider_name: provider.name.clone(),
                candidate,
            });
        }

        info!(
            strategy = self.strategy.name(),
            threshold = self.options.threshold,
            providers = providers.len(),
            epg_channels = epg.len(),
            matched = report.matched,
            "Channel matching finished"
        );
        report
    }
}

/// Greedy case-fold match of `providers` against `epg`
pub fn match_channels(providers: &[ProviderChannel], epg: &[EpgChannel], threshold: f64) -> MatchReport {
    ChannelMatcher::greedy(threshold).run(providers, epg)
}
