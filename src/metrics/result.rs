use chrono::{DateTime, Utc};
use core::fmt;
use serde::{Deserialize, Serialize};

/// Why a scorer could not produce a value.
///
/// Failures are data, not faults: they are recorded in the metric's
/// [`MetricResult`] and never abort the record or the batch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFailure {
    /// A declared input feature is absent from the feature vector.
    MissingFeature(String),

    /// A declared input feature exists but has the wrong kind.
    WrongKind(String),

    /// An input or output value is outside the supported domain (NaN,
    /// non-finite, or otherwise unusable).
    OutOfDomain(String),

    /// A categorical level was not seen by the model.
    UnknownLabel(String),

    /// A declared upstream metric failed or was never produced.
    UpstreamFailed(String),

    /// The batch deadline passed before this metric was started.
    DeadlineExceeded,
}

impl fmt::Display for ScoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFeature(name) => write!(f, "missing feature '{name}'"),
            Self::WrongKind(name) => write!(f, "feature '{name}' has the wrong kind"),
            Self::OutOfDomain(detail) => write!(f, "out of supported domain: {detail}"),
            Self::UnknownLabel(level) => write!(f, "unknown categorical level '{level}'"),
            Self::UpstreamFailed(name) => write!(f, "upstream metric '{name}' failed"),
            Self::DeadlineExceeded => write!(f, "batch deadline exceeded"),
        }
    }
}

/// The value side of a metric result.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricOutcome {
    /// A numeric score.
    Score(f64),

    /// The scorer reported a failure for this record.
    Failed(ScoreFailure),
}

/// A successful scorer output before it is stamped into a [`MetricResult`].
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub score: f64,
    pub label: Option<String>,
    pub confidence: f64,
}

impl Scored {
    /// A plain numeric score with full confidence and no label.
    #[must_use]
    pub const fn value(score: f64) -> Self {
        Self {
            score,
            label: None,
            confidence: 1.0,
        }
    }
}

/// The outcome of exactly one scorer invocation for one record.
///
/// Results are immutable once created: the cache replaces entries wholesale on
/// invalidation rather than editing them, and a cached result keeps its
/// original computation timestamp.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MetricResult {
    pub outcome: MetricOutcome,

    /// Categorical label, for classifier- and band-style scorers.
    pub label: Option<String>,

    /// Confidence in `[0, 1]`; always 0 for failures.
    pub confidence: f64,

    /// The scorer version that produced this result.
    pub version: u32,

    pub computed_at: DateTime<Utc>,
}

impl MetricResult {
    /// Stamps a successful scorer output.
    #[must_use]
    pub fn success(scored: Scored, version: u32) -> Self {
        Self {
            outcome: MetricOutcome::Score(scored.score),
            label: scored.label,
            confidence: scored.confidence.clamp(0.0, 1.0),
            version,
            computed_at: Utc::now(),
        }
    }

    /// Stamps a failure. Confidence is defined as 0.
    #[must_use]
    pub fn failed(failure: ScoreFailure, version: u32) -> Self {
        Self {
            outcome: MetricOutcome::Failed(failure),
            label: None,
            confidence: 0.0,
            version,
            computed_at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, MetricOutcome::Score(_))
    }

    /// Returns the numeric score if this result succeeded.
    #[must_use]
    pub const fn score(&self) -> Option<f64> {
        match self.outcome {
            MetricOutcome::Score(score) => Some(score),
            MetricOutcome::Failed(_) => None,
        }
    }

    /// Returns the failure if this result did not succeed.
    #[must_use]
    pub const fn failure(&self) -> Option<&ScoreFailure> {
        match &self.outcome {
            MetricOutcome::Score(_) => None,
            MetricOutcome::Failed(failure) => Some(failure),
        }
    }
}
