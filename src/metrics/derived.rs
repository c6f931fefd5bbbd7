//! Derived scorers computing from other metrics' results.
//!
//! These never touch the feature vector; their inputs are upstream
//! [`MetricResult`](super::MetricResult)s resolved earlier in the same
//! report. The registry guarantees the ordering; a failed upstream surfaces
//! as [`ScoreFailure::UpstreamFailed`] rather than a missing value.

use super::definition::{Band, Clamp};
use super::result::{ScoreFailure, Scored};
use super::scorer::{Scorer, Upstream, require_finite};
use crate::features::FeatureVector;

/// Maps an upstream score into ordered labeled bands.
///
/// The score is the matched band's index, the label is the band's label, and
/// confidence is inherited from the upstream result. Generalizes reading-level
/// and complexity classifiers: bands over a grade score yield labels like
/// `elementary` through `graduate`.
#[derive(Debug, Clone)]
pub struct BandsScorer {
    pub upstream: String,
    pub bands: Vec<Band>,
}

impl Scorer for BandsScorer {
    fn score(&self, _features: &FeatureVector, upstream: &Upstream<'_>) -> Result<Scored, ScoreFailure> {
        let value = upstream.score_of(&self.upstream)?;

        let index = self
            .bands
            .iter()
            .position(|band| band.up_to.is_none_or(|bound| value <= bound))
            .unwrap_or(self.bands.len() - 1);

        Ok(Scored {
            score: index as f64,
            label: Some(self.bands[index].label.clone()),
            confidence: upstream.confidence_of(&self.upstream),
        })
    }
}

/// Affine rescaling of an upstream score with optional clamping.
#[derive(Debug, Clone)]
pub struct RescaleScorer {
    pub upstream: String,
    pub factor: f64,
    pub offset: f64,
    pub clamp: Option<Clamp>,
}

impl Scorer for RescaleScorer {
    fn score(&self, _features: &FeatureVector, upstream: &Upstream<'_>) -> Result<Scored, ScoreFailure> {
        let value = upstream.score_of(&self.upstream)?;
        let mut scaled = require_finite("rescale", value * self.factor + self.offset)?;
        if let Some(clamp) = self.clamp {
            scaled = scaled.clamp(clamp.min, clamp.max);
        }
        Ok(Scored {
            score: scaled,
            label: None,
            confidence: upstream.confidence_of(&self.upstream),
        })
    }
}
