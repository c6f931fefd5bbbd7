//! Per-record reports and score aggregation
//!
//! A [`Report`] carries one entry per registered metric, in registry
//! evaluation order, plus a weighted composite over the metrics that
//! succeeded. Aggregation never fails: when some metrics fail their weight is
//! redistributed proportionally across the successes, and when everything
//! fails the composite is absent and the report is marked failed.

use crate::features::ExtractionIssue;
use crate::metrics::{MetricResult, Registry};
use crate::record::Fingerprint;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const LOG_TARGET: &str = "    report";

/// Overall disposition of one record's report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReportStatus {
    /// Every metric produced a score and extraction was clean.
    Complete,

    /// At least one metric scored, but some metric failed or extraction
    /// reported issues.
    Partial,

    /// No metric produced a score; there is no composite.
    Failed,
}

/// One metric's contribution to a report.
#[derive(Debug, Clone, Serialize)]
pub struct MetricEntry {
    pub name: String,
    pub result: Arc<MetricResult>,
}

/// The scored view of a single record.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Fingerprint of the record this report describes.
    pub fingerprint: Fingerprint,

    /// One entry per registered metric, in evaluation order.
    pub entries: Vec<MetricEntry>,

    /// Weighted composite over the successful metrics; `None` when no metric
    /// succeeded or the successful metrics carry zero total weight.
    pub composite: Option<f64>,

    pub status: ReportStatus,

    /// Extraction problems encountered for this record.
    pub issues: Vec<ExtractionIssue>,
}

impl Report {
    /// Builds the report for one record from its per-metric results.
    ///
    /// `results` must be ordered to match `registry.ordered()`; the entries
    /// keep that order. Weights of failed metrics are redistributed
    /// proportionally across the successes, so the composite of `{a: 0.5,
    /// b: 0.3, c: 0.2}` with `c` failed weighs `a` and `b` at 0.625 and
    /// 0.375.
    #[must_use]
    pub fn aggregate(
        registry: &Registry,
        fingerprint: Fingerprint,
        results: Vec<Arc<MetricResult>>,
        issues: Vec<ExtractionIssue>,
    ) -> Self {
        let mut entries = Vec::with_capacity(results.len());
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;
        let mut failures = 0_usize;

        for (metric, result) in registry.ordered().zip(results) {
            if let Some(score) = result.score() {
                weighted_sum += metric.def.weight * score;
                total_weight += metric.def.weight;
            } else {
                failures += 1;
            }
            entries.push(MetricEntry {
                name: metric.def.name.clone(),
                result,
            });
        }

        // Renormalization: dividing by the surviving weight mass is the same
        // as scaling each surviving weight by 1 / total_weight.
        let composite = (total_weight > 0.0).then(|| weighted_sum / total_weight);

        let status = if composite.is_none() {
            ReportStatus::Failed
        } else if failures > 0 || !issues.is_empty() {
            ReportStatus::Partial
        } else {
            ReportStatus::Complete
        };

        log::debug!(
            target: LOG_TARGET,
            "record {fingerprint}: {status}, {failures} of {} metrics failed",
            entries.len(),
        );

        Self {
            fingerprint,
            entries,
            composite,
            status,
            issues,
        }
    }

    /// Looks up one metric's result by name.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<&MetricResult> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.result.as_ref())
    }
}
