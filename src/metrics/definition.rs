use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::Display;

/// Static configuration for one metric: identity, scorer parameters, weight,
/// dependencies, and version tag.
///
/// Definitions are loaded once at startup and immutable for the process
/// lifetime. Bumping `version` changes the cache key for the metric, which
/// invalidates all previously cached results for that name.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricDefinition {
    pub name: String,

    /// Combination weight used by the aggregator. Must be finite and >= 0.
    #[serde(default = "default_weight")]
    pub weight: f64,

    /// Scorer version tag, part of the cache key.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Extra upstream ordering constraints beyond what the scorer itself
    /// references. Rarely needed; derived scorers declare their upstreams via
    /// their parameters.
    #[serde(default)]
    pub depends_on: Vec<String>,

    pub scorer: ScorerSpec,
}

const fn default_weight() -> f64 {
    1.0
}

const fn default_version() -> u32 {
    1
}

impl MetricDefinition {
    /// All upstream metric names this definition depends on: the explicit
    /// `depends_on` list plus whatever the scorer parameters reference.
    #[must_use]
    pub fn upstream_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.depends_on.iter().map(String::as_str).collect();
        for name in self.scorer.upstream_refs() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// The three scorer families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ScorerFamily {
    Statistical,
    ModelBased,
    Derived,
}

/// A labeled point for nearest-centroid models.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Centroid {
    pub label: String,
    pub point: Vec<f64>,
}

/// One threshold band for band-mapping derived scorers.
///
/// Bands are declared in ascending threshold order; an upstream score maps to
/// the first band whose `up_to` it does not exceed. The final band may omit
/// `up_to` to act as a catch-all.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Band {
    pub label: String,
    #[serde(default)]
    pub up_to: Option<f64>,
}

/// Output clamp range for rescaling scorers.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Clamp {
    pub min: f64,
    pub max: f64,
}

/// Tagged scorer configuration.
///
/// New scorer kinds are added by extending this enum and implementing the
/// scoring capability for the new variant; nothing else in the pipeline
/// changes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum ScorerSpec {
    /// Arithmetic mean over the declared numeric inputs.
    Mean { inputs: Vec<String> },

    /// Population variance over the declared numeric inputs.
    Variance { inputs: Vec<String> },

    /// Standard score of one input against a fixed distribution.
    ZScore { input: String, mean: f64, std_dev: f64 },

    /// Linear combination of numeric inputs plus an intercept. Expresses
    /// closed-form indices such as readability grades.
    Linear {
        coefficients: BTreeMap<String, f64>,
        #[serde(default)]
        intercept: f64,
    },

    /// Pre-fitted logistic classifier over numeric inputs.
    Logistic {
        weights: BTreeMap<String, f64>,
        #[serde(default)]
        bias: f64,
        #[serde(default = "default_positive_label")]
        positive_label: String,
        #[serde(default = "default_negative_label")]
        negative_label: String,
    },

    /// Pre-fitted nearest-centroid model; scores the distance to the closest
    /// labeled centroid.
    NearestCentroid { inputs: Vec<String>, centroids: Vec<Centroid> },

    /// Signed-lexicon sentiment model over a token-sequence feature.
    Lexicon {
        input: String,
        positive: Vec<String>,
        negative: Vec<String>,
        #[serde(default = "default_alpha")]
        alpha: f64,
        #[serde(default = "default_positive_cutoff")]
        positive_cutoff: f64,
        #[serde(default = "default_negative_cutoff")]
        negative_cutoff: f64,
    },

    /// Fixed score lookup over a categorical feature's levels. A level absent
    /// from the table fails with an unknown-label error.
    Levels {
        input: String,
        scores: BTreeMap<String, f64>,
    },

    /// Maps an upstream score into ordered labeled bands; the score is the
    /// band index.
    Bands { upstream: String, bands: Vec<Band> },

    /// Affine rescaling of an upstream score with optional clamping.
    Rescale {
        upstream: String,
        #[serde(default = "default_factor")]
        factor: f64,
        #[serde(default)]
        offset: f64,
        #[serde(default)]
        clamp: Option<Clamp>,
    },
}

fn default_positive_label() -> String {
    "positive".to_string()
}

fn default_negative_label() -> String {
    "negative".to_string()
}

const fn default_alpha() -> f64 {
    15.0
}

const fn default_positive_cutoff() -> f64 {
    0.05
}

const fn default_negative_cutoff() -> f64 {
    -0.05
}

const fn default_factor() -> f64 {
    1.0
}

impl ScorerSpec {
    /// Which family this spec belongs to.
    #[must_use]
    pub const fn family(&self) -> ScorerFamily {
        match self {
            Self::Mean { .. } | Self::Variance { .. } | Self::ZScore { .. } | Self::Linear { .. } => ScorerFamily::Statistical,
            Self::Logistic { .. } | Self::NearestCentroid { .. } | Self::Lexicon { .. } | Self::Levels { .. } => ScorerFamily::ModelBased,
            Self::Bands { .. } | Self::Rescale { .. } => ScorerFamily::Derived,
        }
    }

    /// Upstream metric names referenced by the scorer parameters themselves.
    #[must_use]
    pub fn upstream_refs(&self) -> Vec<&str> {
        match self {
            Self::Bands { upstream, .. } | Self::Rescale { upstream, .. } => vec![upstream.as_str()],
            _ => Vec::new(),
        }
    }
}
