use super::result::{MetricResult, ScoreFailure, Scored};
use crate::features::{FeatureValue, FeatureVector};
use core::fmt;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A unit of metric computation bound to one metric definition.
///
/// Implementations must be deterministic given fixed parameters and a fixed
/// scorer version: the computation cache relies on it. Out-of-domain inputs
/// are reported as [`ScoreFailure`]s, never as panics.
pub trait Scorer: Send + Sync + fmt::Debug {
    fn score(&self, features: &FeatureVector, upstream: &Upstream<'_>) -> Result<Scored, ScoreFailure>;
}

/// Read-only view of already-resolved upstream metric results for one record.
///
/// The orchestrator guarantees every declared upstream has resolved (to
/// success or failure) before a dependent scorer runs, so a missing entry
/// here is treated the same as a failed one.
#[derive(Debug, Clone, Copy)]
pub struct Upstream<'a> {
    results: &'a BTreeMap<String, Arc<MetricResult>>,
}

impl<'a> Upstream<'a> {
    #[must_use]
    pub const fn new(results: &'a BTreeMap<String, Arc<MetricResult>>) -> Self {
        Self { results }
    }

    /// Returns the named upstream result, if it resolved.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MetricResult> {
        self.results.get(name).map(Arc::as_ref)
    }

    /// Returns the named upstream's score, or [`ScoreFailure::UpstreamFailed`]
    /// when it failed or never resolved.
    pub fn score_of(&self, name: &str) -> Result<f64, ScoreFailure> {
        self.get(name)
            .and_then(MetricResult::score)
            .ok_or_else(|| ScoreFailure::UpstreamFailed(name.to_string()))
    }

    /// Returns the named upstream's confidence (0 when failed or unresolved).
    #[must_use]
    pub fn confidence_of(&self, name: &str) -> f64 {
        self.get(name).map_or(0.0, |r| r.confidence)
    }
}

/// Fetches a declared numeric input, mapping absence and bad values to failures.
pub(crate) fn require_number(features: &FeatureVector, name: &str) -> Result<f64, ScoreFailure> {
    match features.get(name) {
        Some(FeatureValue::Number(n)) if n.is_finite() => Ok(*n),
        Some(FeatureValue::Number(_)) => Err(ScoreFailure::OutOfDomain(format!("feature '{name}' is not finite"))),
        Some(_) => Err(ScoreFailure::WrongKind(name.to_string())),
        None => Err(ScoreFailure::MissingFeature(name.to_string())),
    }
}

/// Rejects a non-finite computed score before it can enter a result.
pub(crate) fn require_finite(metric_context: &str, score: f64) -> Result<f64, ScoreFailure> {
    if score.is_finite() {
        Ok(score)
    } else {
        Err(ScoreFailure::OutOfDomain(format!("{metric_context} produced a non-finite score")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FieldKind, FieldValue, Record, Schema, SchemaField};

    fn features_with(name: &str, value: f64) -> FeatureVector {
        let record = Record::new(vec![(name.to_string(), FieldValue::Number(value))]);
        let schema = Schema::new(vec![SchemaField {
            name: name.to_string(),
            kind: FieldKind::Number,
            required: true,
        }]);
        crate::features::Extractor::default().extract(&record, &schema).0
    }

    #[test]
    fn require_number_happy_path() {
        let features = features_with("x", 3.5);
        assert_eq!(require_number(&features, "x"), Ok(3.5));
    }

    #[test]
    fn require_number_missing() {
        let features = features_with("x", 1.0);
        assert_eq!(
            require_number(&features, "y"),
            Err(ScoreFailure::MissingFeature("y".to_string()))
        );
    }

    #[test]
    fn require_number_rejects_nan() {
        let features = features_with("x", f64::NAN);
        assert!(matches!(require_number(&features, "x"), Err(ScoreFailure::OutOfDomain(_))));
    }

    #[test]
    fn upstream_score_of_failed_metric() {
        let mut results = BTreeMap::new();
        let _ = results.insert(
            "a".to_string(),
            Arc::new(MetricResult::failed(ScoreFailure::DeadlineExceeded, 1)),
        );
        let upstream = Upstream::new(&results);

        assert_eq!(upstream.score_of("a"), Err(ScoreFailure::UpstreamFailed("a".to_string())));
        assert_eq!(upstream.score_of("b"), Err(ScoreFailure::UpstreamFailed("b".to_string())));
        assert!(upstream.confidence_of("a").abs() < f64::EPSILON);
    }

    #[test]
    fn upstream_score_of_successful_metric() {
        let mut results = BTreeMap::new();
        let _ = results.insert("a".to_string(), Arc::new(MetricResult::success(Scored::value(2.0), 1)));
        let upstream = Upstream::new(&results);

        assert_eq!(upstream.score_of("a"), Ok(2.0));
        assert!((upstream.confidence_of("a") - 1.0).abs() < f64::EPSILON);
    }
}
