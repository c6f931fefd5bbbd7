//! Model-based scorers wrapping pre-fitted parameters.
//!
//! Model parameters are loaded once at configuration time and shared
//! read-only across all workers; scoring is deterministic for a fixed
//! parameter set and scorer version.

use super::result::{ScoreFailure, Scored};
use super::scorer::{Scorer, Upstream, require_finite, require_number};
use crate::features::FeatureVector;
use std::collections::BTreeSet;

/// Pre-fitted logistic classifier over numeric features.
///
/// The score is the positive-class probability; confidence is the gap between
/// the two class probabilities.
#[derive(Debug, Clone)]
pub struct LogisticScorer {
    pub weights: Vec<(String, f64)>,
    pub bias: f64,
    pub positive_label: String,
    pub negative_label: String,
}

impl Scorer for LogisticScorer {
    fn score(&self, features: &FeatureVector, _upstream: &Upstream<'_>) -> Result<Scored, ScoreFailure> {
        let mut z = self.bias;
        for (input, weight) in &self.weights {
            z += weight * require_number(features, input)?;
        }
        let probability = require_finite("logistic model", 1.0 / (1.0 + (-z).exp()))?;

        let label = if probability >= 0.5 {
            self.positive_label.clone()
        } else {
            self.negative_label.clone()
        };
        Ok(Scored {
            score: probability,
            label: Some(label),
            confidence: (2.0 * probability - 1.0).abs(),
        })
    }
}

/// Pre-fitted nearest-centroid model.
///
/// Scores the Euclidean distance to the closest labeled centroid. Confidence
/// is the margin between the best and second-best centroid under a normalized
/// inverse-distance distribution, so a point equidistant from two centroids
/// scores near zero confidence and a point on top of one scores near one.
#[derive(Debug, Clone)]
pub struct NearestCentroidScorer {
    pub inputs: Vec<String>,
    pub centroids: Vec<(String, Vec<f64>)>,
}

impl Scorer for NearestCentroidScorer {
    fn score(&self, features: &FeatureVector, _upstream: &Upstream<'_>) -> Result<Scored, ScoreFailure> {
        let point: Vec<f64> = self
            .inputs
            .iter()
            .map(|input| require_number(features, input))
            .collect::<Result<_, _>>()?;

        let distances: Vec<f64> = self
            .centroids
            .iter()
            .map(|(_, centroid)| {
                centroid
                    .iter()
                    .zip(&point)
                    .map(|(c, p)| (c - p).powi(2))
                    .sum::<f64>()
                    .sqrt()
            })
            .collect();

        let best = distances
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
            .ok_or_else(|| ScoreFailure::OutOfDomain("centroid model has no centroids".to_string()))?;

        let confidence = centroid_margin(&distances, best);
        Ok(Scored {
            score: require_finite("centroid model", distances[best])?,
            label: Some(self.centroids[best].0.clone()),
            confidence,
        })
    }
}

/// Margin between the best and second-best centroid under a normalized
/// inverse-distance distribution. A single centroid is fully confident.
fn centroid_margin(distances: &[f64], best: usize) -> f64 {
    if distances.len() < 2 {
        return 1.0;
    }

    const EPSILON: f64 = 1e-9;
    let inverses: Vec<f64> = distances.iter().map(|d| 1.0 / (d + EPSILON)).collect();
    let total: f64 = inverses.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return 0.0;
    }

    let best_p = inverses[best] / total;
    let second_p = inverses
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != best)
        .map(|(_, v)| v / total)
        .fold(0.0_f64, f64::max);
    (best_p - second_p).clamp(0.0, 1.0)
}

/// Signed-lexicon sentiment model over a token-sequence feature.
///
/// Positive tokens contribute +1, negative tokens -1; the raw sum is squashed
/// into `[-1, 1]` with `sum / sqrt(sum^2 + alpha)`. The label falls out of the
/// configured cutoffs, defaulting to positive / neutral / negative.
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    pub input: String,
    pub positive: BTreeSet<String>,
    pub negative: BTreeSet<String>,
    pub alpha: f64,
    pub positive_cutoff: f64,
    pub negative_cutoff: f64,
}

impl Scorer for LexiconScorer {
    fn score(&self, features: &FeatureVector, _upstream: &Upstream<'_>) -> Result<Scored, ScoreFailure> {
        let tokens = features
            .tokens(&self.input)
            .ok_or_else(|| match features.get(&self.input) {
                Some(_) => ScoreFailure::WrongKind(self.input.clone()),
                None => ScoreFailure::MissingFeature(self.input.clone()),
            })?;

        let mut sum = 0.0;
        for token in tokens {
            if self.positive.contains(token) {
                sum += 1.0;
            } else if self.negative.contains(token) {
                sum -= 1.0;
            }
        }

        let score = if tokens.is_empty() {
            0.0
        } else {
            require_finite("lexicon model", sum / (sum * sum + self.alpha).sqrt())?
        };

        let label = if score > self.positive_cutoff {
            "positive"
        } else if score < self.negative_cutoff {
            "negative"
        } else {
            "neutral"
        };
        Ok(Scored {
            score,
            label: Some(label.to_string()),
            confidence: score.abs().min(1.0),
        })
    }
}

/// Fixed score table over a categorical feature's levels.
///
/// The simplest fitted model: each known level carries a score assigned at
/// configuration time. Levels outside the table are a scoring failure, not a
/// default.
#[derive(Debug, Clone)]
pub struct LevelsScorer {
    pub input: String,
    pub scores: Vec<(String, f64)>,
}

impl Scorer for LevelsScorer {
    fn score(&self, features: &FeatureVector, _upstream: &Upstream<'_>) -> Result<Scored, ScoreFailure> {
        let level = features
            .category(&self.input)
            .ok_or_else(|| match features.get(&self.input) {
                Some(_) => ScoreFailure::WrongKind(self.input.clone()),
                None => ScoreFailure::MissingFeature(self.input.clone()),
            })?;

        let score = self
            .scores
            .iter()
            .find(|(known, _)| known == level)
            .map(|(_, score)| *score)
            .ok_or_else(|| ScoreFailure::UnknownLabel(level.to_string()))?;

        Ok(Scored {
            score,
            label: Some(level.to_string()),
            confidence: 1.0,
        })
    }
}
