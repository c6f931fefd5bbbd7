//! Metric definitions, scorers, and the registry
//!
//! A metric is one named, versioned, weighted computation over a record's
//! feature vector (and possibly other metrics' results). This module holds
//! the three scorer families and the [`Registry`] that binds configured
//! [`MetricDefinition`]s to implementations:
//!
//! - **Statistical** ([`statistical`]): closed-form computations over numeric
//!   features (mean, variance, z-score, linear indices).
//! - **Model-based** ([`model`]): pre-fitted models (logistic classifier,
//!   nearest-centroid, signed lexicon) with parameters frozen at load time.
//! - **Derived** ([`derived`]): computations over upstream metric results
//!   (threshold bands, affine rescaling).
//!
//! All scorers share the single [`Scorer`] capability; adding a scorer kind
//! means implementing the trait and extending the configuration enum, not
//! threading a new case through the pipeline.

mod definition;
mod registry;
mod result;
mod scorer;

pub mod derived;
pub mod model;
pub mod statistical;

pub use definition::{Band, Centroid, Clamp, MetricDefinition, ScorerFamily, ScorerSpec};
pub use registry::{BoundMetric, Registry};
pub use result::{MetricOutcome, MetricResult, ScoreFailure, Scored};
pub use scorer::{Scorer, Upstream};
