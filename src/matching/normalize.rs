//! Channel name normalization applied before scoring
//!
//! The default only case-folds. Punctuation, whitespace and quality tags are
//! left alone, so "Das Erste HD" and "Das Erste" do not compare equal unless
//! [`NameNormalization::StripQualityTags`] is selected explicitly.

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::errors::{AppError, AppResult};

/// How names are prepared before they are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum NameNormalization {
    /// Lowercase only
    #[default]
    CaseFold,
    /// Remove quality/feed tags and brackets, collapse whitespace, lowercase
    StripQualityTags,
}

impl NameNormalization {
    /// Quality and feed markers removed by [`NameNormalization::StripQualityTags`]
    pub fn quality_tag_patterns() -> Vec<String> {
        vec![
            r"(?i)\b4K\b".to_string(),
            r"(?i)\bUHD\b".to_string(),
            r"(?i)\bFHD\b".to_string(),
            r"(?i)\bHD\b".to_string(),
            r"(?i)\bSD\b".to_string(),
            r"(?i)\bHEVC\b".to_string(),
            r"(?i)\b720P?\b".to_string(),
            r"(?i)\b1080P?\b".to_string(),
            r"\[|\]|\(|\)".to_string(),
        ]
    }
}

/// Applies a [`NameNormalization`] to channel names
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    mode: NameNormalization,
    tag_regex: Vec<Regex>,
}

impl NameNormalizer {
    pub fn new(mode: NameNormalization) -> AppResult<Self> {
        let tag_regex = match mode {
            NameNormalization::CaseFold => Vec::new(),
            NameNormalization::StripQualityTags => NameNormalization::quality_tag_patterns()
                .iter()
                .map(|pattern| {
                    Regex::new(pattern).map_err(|e| {
                        AppError::configuration(format!("invalid quality tag pattern '{pattern}': {e}"))
                    })
                })
                .collect::<AppResult<Vec<_>>>()?,
        };
        Ok(Self { mode, tag_regex })
    }

    /// Case-fold only; cannot fail
    pub fn case_fold() -> Self {
        Self {
            mode: NameNormalization::CaseFold,
            tag_regex: Vec::new(),
        }
    }

    pub fn mode(&self) -> NameNormalization {
        self.mode
    }

    pub fn normalize(&self, name: &str) -> String {
        match self.mode {
            NameNormalization::CaseFold => name.to_lowercase(),
            NameNormalization::StripQualityTags => {
                let mut stripped = name.to_string();
                for regex in &self.tag_regex {
                    stripped = regex.replace_all(&stripped, " ").into_owned();
                }
                stripped
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_case_fold_keeps_everything_else() {
        let normalizer = NameNormalizer::case_fold();
        assert_eq!(normalizer.normalize("  Das Erste HD (DE) "), "  das erste hd (de) ");
    }

    #[test]
    fn test_strip_quality_tags() {
        let normalizer = NameNormalizer::new(NameNormalization::StripQualityTags).unwrap();
        assert_eq!(normalizer.normalize("RU: TLC HD"), "ru: tlc");
        assert_eq!(normalizer.normalize("Sky Cinema [FHD]  1080p"), "sky cinema");
        assert_eq!(normalizer.normalize("ProSieben (HEVC)"), "prosieben");
        // "HDTV" is a word of its own, not a tag
        assert_eq!(normalizer.normalize("HDTV One"), "hdtv one");
    }

    #[test]
    fn test_parse_mode_names() {
        assert_eq!(
            NameNormalization::from_str("strip-quality-tags").unwrap(),
            NameNormalization::StripQualityTags
        );
        assert_eq!(NameNormalization::from_str("Case-Fold").unwrap(), NameNormalization::CaseFold);
        assert_eq!(NameNormalization::CaseFold.to_string(), "case-fold");
        assert!(NameNormalization::from_str("soundex").is_err());
    }
}
