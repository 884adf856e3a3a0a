//! Size-based summarization tier selection.
//!
//! Trivial content is stored as its own summary with no model call, mid-sized
//! content gets a fast extractive pass, and only long content pays for a full
//! abstractive synthesis.

use super::{SummaryLength, SummaryStyle};
use serde::{Deserialize, Serialize};

/// Content-size boundaries between tiers, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierThresholds {
    pub tiny: usize,
    pub small: usize,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            tiny: 500,
            small: 2000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryTier {
    DirectTiny,
    ExtractiveShort,
    AbstractiveMedium,
}

impl SummaryTier {
    pub fn label(&self) -> &'static str {
        match self {
            SummaryTier::DirectTiny => "direct_tiny",
            SummaryTier::ExtractiveShort => "extractive_short",
            SummaryTier::AbstractiveMedium => "abstractive_medium",
        }
    }

    /// Style and length passed to the generator; `None` for the direct tier,
    /// which never calls out.
    pub fn generation_params(&self) -> Option<(SummaryStyle, SummaryLength)> {
        match self {
            SummaryTier::DirectTiny => None,
            SummaryTier::ExtractiveShort => Some((SummaryStyle::Extractive, SummaryLength::Short)),
            SummaryTier::AbstractiveMedium => {
                Some((SummaryStyle::Abstractive, SummaryLength::Medium))
            }
        }
    }
}

/// Pure function of content size against the configured thresholds.
pub fn select_tier(content_size: usize, thresholds: &TierThresholds) -> SummaryTier {
    if content_size < thresholds.tiny {
        SummaryTier::DirectTiny
    } else if content_size < thresholds.small {
        SummaryTier::ExtractiveShort
    } else {
        SummaryTier::AbstractiveMedium
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        let thresholds = TierThresholds::default();

        assert_eq!(select_tier(0, &thresholds), SummaryTier::DirectTiny);
        assert_eq!(select_tier(499, &thresholds), SummaryTier::DirectTiny);
        assert_eq!(select_tier(500, &thresholds), SummaryTier::ExtractiveShort);
        assert_eq!(select_tier(1999, &thresholds), SummaryTier::ExtractiveShort);
        assert_eq!(select_tier(2000, &thresholds), SummaryTier::AbstractiveMedium);
        assert_eq!(select_tier(1_000_000, &thresholds), SummaryTier::AbstractiveMedium);
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = TierThresholds { tiny: 10, small: 20 };
        assert_eq!(select_tier(9, &thresholds), SummaryTier::DirectTiny);
        assert_eq!(select_tier(10, &thresholds), SummaryTier::ExtractiveShort);
        assert_eq!(select_tier(20, &thresholds), SummaryTier::AbstractiveMedium);
    }

    #[test]
    fn test_generation_params_per_tier() {
        assert!(SummaryTier::DirectTiny.generation_params().is_none());
        assert_eq!(
            SummaryTier::ExtractiveShort.generation_params(),
            Some((SummaryStyle::Extractive, SummaryLength::Short))
        );
        assert_eq!(
            SummaryTier::AbstractiveMedium.generation_params(),
            Some((SummaryStyle::Abstractive, SummaryLength::Medium))
        );
    }

    #[test]
    fn test_labels() {
        assert_eq!(SummaryTier::DirectTiny.label(), "direct_tiny");
        assert_eq!(SummaryTier::ExtractiveShort.label(), "extractive_short");
        assert_eq!(SummaryTier::AbstractiveMedium.label(), "abstractive_medium");
    }
}
