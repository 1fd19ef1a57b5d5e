//! Assignment strategies
//!
//! A strategy decides, from the pairwise scores, which EPG channel (if any)
//! each provider channel is associated with.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use strum::{Display, EnumString};

use super::normalize::NameNormalizer;
use super::similarity::SimilarityScorer;
use crate::models::{EpgChannel, ProviderChannel};

/// Accepted association for one provider channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assignment {
    /// Index into the EPG channel slice
    pub epg_index: usize,
    pub score: f64,
}

/// Normalized names of both sides plus the scorer that compares them
pub struct PairScorer<'a> {
    providers: Vec<String>,
    epg: Vec<String>,
    epg_ids: Vec<&'a str>,
    scorer: &'a dyn SimilarityScorer,
}

impl<'a> PairScorer<'a> {
    pub fn new(
        providers: &[ProviderChannel],
        epg: &'a [EpgChannel],
        normalizer: &NameNormalizer,
        scorer: &'a dyn SimilarityScorer,
    ) -> Self {
        Self {
            providers: providers.iter().map(|p| normalizer.normalize(&p.name)).collect(),
            epg: epg.iter().map(|e| normalizer.normalize(&e.name)).collect(),
            epg_ids: epg.iter().map(|e| e.id.as_str()).collect(),
            scorer,
        }
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn epg_count(&self) -> usize {
        self.epg.len()
    }

    pub fn epg_id(&self, epg_index: usize) -> &str {
        self.epg_ids[epg_index]
    }

    pub fn score(&self, provider_index: usize, epg_index: usize) -> f64 {
        self.scorer
            .score(&self.providers[provider_index], &self.epg[epg_index])
    }
}

/// Turns pairwise scores into at most one assignment per provider channel
pub trait MatchStrategy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// One entry per provider channel, in input order.
    ///
    /// Only pairs scoring strictly above `threshold` may be assigned.
    fn assign(&self, pairs: &PairScorer<'_>, threshold: f64) -> Vec<Option<Assignment>>;
}

/// Nearest neighbour per provider channel.
///
/// EPG channels are not deduplicated: several provider channels may end up
/// on the same EPG id.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyStrategy;

impl MatchStrategy for GreedyStrategy {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn assign(&self, pairs: &PairScorer<'_>, threshold: f64) -> Vec<Option<Assignment>> {
        (0..pairs.provider_count())
            .map(|p| {
                let mut best: Option<Assignment> = None;
                for e in 0..pairs.epg_count() {
                    let score = pairs.score(p, e);
                    // strictly greater, so the first candidate wins ties
                    if best.is_none_or(|b| score > b.score) {
                        best = Some(Assignment { epg_index: e, score });
                    }
                }
                best.filter(|b| b.score > threshold)
            })
            .collect()
    }
}

/// Every EPG id is handed out at most once, best pairs first
#[derive(Debug, Clone, Copy, Default)]
pub struct ExclusiveStrategy;

impl MatchStrategy for ExclusiveStrategy {
    fn name(&self) -> &'static str {
        "exclusive"
    }

    fn assign(&self, pairs: &PairScorer<'_>, threshold: f64) -> Vec<Option<Assignment>> {
        let mut candidates = Vec::new();
        for p in 0..pairs.provider_count() {
            for e in 0..pairs.epg_count() {
                let score = pairs.score(p, e);
                if score > threshold {
                    candidates.push((p, Assignment { epg_index: e, score }));
                }
            }
        }
        // stable: equal scores stay in provider, then EPG order
        candidates.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));

        let mut assigned = vec![None; pairs.provider_count()];
        let mut taken: HashSet<&str> = HashSet::new();
        for (p, assignment) in candidates {
            if assigned[p].is_some() {
                continue;
            }
            if taken.insert(pairs.epg_id(assignment.epg_index)) {
                assigned[p] = Some(assignment);
            }
        }
        assigned
    }
}

/// Selectable strategy, as named in configuration and on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StrategyKind {
    #[default]
    Greedy,
    Exclusive,
}

impl StrategyKind {
    pub fn build(self) -> Box<dyn MatchStrategy> {
        match self {
            StrategyKind::Greedy => Box::new(GreedyStrategy),
            StrategyKind::Exclusive => Box::new(ExclusiveStrategy),
        }
    }
}
