//! Closed-form statistical scorers.
//!
//! All of these are pure functions of the declared numeric inputs and fixed
//! parameters; they hold no model state and always report full confidence.

use super::result::{ScoreFailure, Scored};
use super::scorer::{Scorer, Upstream, require_finite, require_number};
use crate::features::FeatureVector;

/// Arithmetic mean over the declared inputs.
#[derive(Debug, Clone)]
pub struct MeanScorer {
    pub inputs: Vec<String>,
}

impl Scorer for MeanScorer {
    fn score(&self, features: &FeatureVector, _upstream: &Upstream<'_>) -> Result<Scored, ScoreFailure> {
        let mut sum = 0.0;
        for input in &self.inputs {
            sum += require_number(features, input)?;
        }
        Ok(Scored::value(require_finite("mean", sum / self.inputs.len() as f64)?))
    }
}

/// Population variance over the declared inputs.
#[derive(Debug, Clone)]
pub struct VarianceScorer {
    pub inputs: Vec<String>,
}

impl Scorer for VarianceScorer {
    fn score(&self, features: &FeatureVector, _upstream: &Upstream<'_>) -> Result<Scored, ScoreFailure> {
        let values: Vec<f64> = self
            .inputs
            .iter()
            .map(|input| require_number(features, input))
            .collect::<Result<_, _>>()?;

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        Ok(Scored::value(require_finite("variance", variance)?))
    }
}

/// Standard score of one input against a fixed reference distribution.
#[derive(Debug, Clone)]
pub struct ZScoreScorer {
    pub input: String,
    pub mean: f64,
    pub std_dev: f64,
}

impl Scorer for ZScoreScorer {
    fn score(&self, features: &FeatureVector, _upstream: &Upstream<'_>) -> Result<Scored, ScoreFailure> {
        let value = require_number(features, &self.input)?;
        Ok(Scored::value(require_finite("z-score", (value - self.mean) / self.std_dev)?))
    }
}

/// Linear combination of inputs plus an intercept.
///
/// Covers closed-form readability-style indices: a grade-level formula is a
/// `Linear` over average sentence length and average syllables per word.
#[derive(Debug, Clone)]
pub struct LinearScorer {
    pub coefficients: Vec<(String, f64)>,
    pub intercept: f64,
}

impl Scorer for LinearScorer {
    fn score(&self, features: &FeatureVector, _upstream: &Upstream<'_>) -> Result<Scored, ScoreFailure> {
        let mut sum = self.intercept;
        for (input, coefficient) in &self.coefficients {
            sum += coefficient * require_number(features, input)?;
        }
        Ok(Scored::value(require_finite("linear combination", sum)?))
    }
}
