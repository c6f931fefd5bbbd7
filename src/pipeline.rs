//! Batch orchestration
//!
//! [`Engine`] drives a batch of records through extraction, scoring, and
//! aggregation.
//!
//! # Implementation Model
//!
//! Each record becomes one tokio task, admitted by a semaphore that bounds
//! batch concurrency. Within a record, metrics run stage by stage in the
//! registry's dependency order; metrics in the same stage share no dependency
//! path and are evaluated together with `join_all`. Every scorer invocation
//! goes through the cache, so two records with the same fingerprint compute
//! each metric once.
//!
//! Batch order is preserved by awaiting the per-record join handles in
//! submission order, independent of completion order. An optional deadline is
//! checked around each stage: metrics whose stage has not started when the
//! deadline passes fail with a deadline error and bypass the cache, while a
//! stage already in flight runs to completion and its results are cached as
//! usual. A stage that finishes past the deadline has its results reported
//! as deadline failures rather than live scores.

use crate::cache::{CacheKey, CacheStats, ScoreCache};
use crate::config::EngineConfig;
use crate::features::Extractor;
use crate::metrics::{BoundMetric, MetricResult, Registry, ScoreFailure, Upstream};
use crate::record::{Record, Schema};
use crate::report::Report;
use crate::Result;
use core::time::Duration;
use futures_util::future::join_all;
use ohno::IntoAppError;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

const LOG_TARGET: &str = "  pipeline";

/// Per-batch execution options.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Wall-clock budget for the whole batch. Stages that have not started
    /// when the budget is exhausted fail with a deadline error, and a stage
    /// that finishes past the budget has its results excluded the same way
    /// (the computed values still land in the cache).
    pub deadline: Option<Duration>,
}

/// Telemetry for one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub records: usize,
    pub metrics_succeeded: usize,
    pub metrics_failed: usize,

    /// Cache activity attributable to this batch, measured as the change in
    /// the engine's lifetime counters across the run. Exact when batches run
    /// serially; concurrent batches on one engine see each other's traffic
    /// in these figures.
    pub cache_hits: u64,
    pub cache_misses: u64,

    /// Number of scorer invocations this batch performed. Equals the cache
    /// misses: every other result was served from cache.
    pub scorer_invocations: u64,
}

impl BatchSummary {
    #[must_use]
    pub fn cache_hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// The result of scoring one batch: reports in input order plus telemetry.
#[derive(Debug)]
pub struct BatchOutcome {
    pub reports: Vec<Report>,
    pub summary: BatchSummary,
}

/// The metrics computation engine.
///
/// An engine is built once from an [`EngineConfig`] and scores any number of
/// batches; the cache persists across batches, so re-submitting a record
/// reuses its results as long as its fingerprint and the metric versions are
/// unchanged.
#[derive(Debug, Clone)]
pub struct Engine {
    registry: Arc<Registry>,
    extractor: Arc<Extractor>,
    cache: Arc<ScoreCache>,
    max_concurrent: usize,
}

impl Engine {
    /// Builds an engine from a validated configuration.
    ///
    /// Fails when the metric suite is invalid (empty, duplicate names,
    /// unknown upstreams, cycles, or bad scorer parameters).
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let registry = Registry::load(config.metrics.clone())?;
        Ok(Self {
            registry: Arc::new(registry),
            extractor: Arc::new(Extractor::new(config.extraction.clone())),
            cache: Arc::new(ScoreCache::new(
                config.cache.capacity,
                Duration::from_secs(config.cache.failure_ttl_secs),
            )),
            max_concurrent: config.pipeline.max_concurrent_records.max(1),
        })
    }

    /// The active metric registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Lifetime cache counters for this engine.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Scores a batch of records under `schema`.
    ///
    /// Produces exactly one report per record, in input order. An empty batch
    /// yields an empty outcome. Individual record problems never fail the
    /// batch; they surface as partial or failed reports.
    pub async fn run_batch(
        &self,
        records: Vec<Record>,
        schema: &Schema,
        options: BatchOptions,
    ) -> Result<BatchOutcome> {
        let started = Instant::now();
        let deadline = options.deadline.map(|budget| started + budget);
        let stats_before = self.cache.stats();
        let record_count = records.len();
        log::debug!(target: LOG_TARGET, "scoring batch of {record_count} record(s)");

        let schema = Arc::new(schema.clone());
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));

        let handles: Vec<_> = records
            .into_iter()
            .map(|record| {
                let engine = self.clone();
                let schema = Arc::clone(&schema);
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .into_app_err("batch semaphore closed")?;
                    Ok::<_, ohno::AppError>(engine.score_record(&record, &schema, deadline).await)
                })
            })
            .collect();

        // Awaiting in submission order keeps reports aligned with the input.
        let mut reports = Vec::with_capacity(record_count);
        for handle in handles {
            let report = handle.await.into_app_err("record scoring task panicked")??;
            reports.push(report);
        }

        let stats_after = self.cache.stats();
        let summary = summarize(&reports, &stats_before, &stats_after);
        log::debug!(
            target: LOG_TARGET,
            "batch done in {:?}: {} succeeded, {} failed, hit ratio {:.2}",
            started.elapsed(),
            summary.metrics_succeeded,
            summary.metrics_failed,
            summary.cache_hit_ratio(),
        );

        Ok(BatchOutcome { reports, summary })
    }

    /// Extracts, scores, and aggregates one record.
    async fn score_record(
        &self,
        record: &Record,
        schema: &Schema,
        deadline: Option<Instant>,
    ) -> Report {
        let (features, issues) = self.extractor.extract(record, schema);
        let features = Arc::new(features);
        let fingerprint = *record.fingerprint();

        // Results by metric index, filled stage by stage so each stage sees
        // every upstream it could possibly name.
        let mut by_index: Vec<Option<Arc<MetricResult>>> = vec![None; self.registry.len()];
        let mut by_name: BTreeMap<String, Arc<MetricResult>> = BTreeMap::new();

        for stage in self.registry.stages() {
            if deadline.is_some_and(|at| Instant::now() >= at) {
                log::debug!(
                    target: LOG_TARGET,
                    "deadline exceeded for record {fingerprint}, failing remaining metrics"
                );
                for &index in stage {
                    let metric = &self.registry.metrics()[index];
                    by_index[index] = Some(Arc::new(MetricResult::failed(
                        ScoreFailure::DeadlineExceeded,
                        metric.def.version,
                    )));
                }
                continue;
            }

            let upstream_snapshot = Arc::new(by_name.clone());
            let stage_results = join_all(stage.iter().map(|&index| {
                let metric = &self.registry.metrics()[index];
                let features = Arc::clone(&features);
                let upstream_snapshot = Arc::clone(&upstream_snapshot);
                async move {
                    let key = CacheKey {
                        fingerprint,
                        metric: metric.def.name.clone(),
                        version: metric.def.version,
                    };
                    let result = self
                        .cache
                        .get_or_compute(key, || async move {
                            evaluate(metric, &features, &upstream_snapshot)
                        })
                        .await;
                    (index, result)
                }
            }))
            .await;

            // A stage may straddle the deadline: its computations run to
            // completion and stay cached, but a cancelled batch's report
            // must not carry them as live scores.
            let expired = deadline.is_some_and(|at| Instant::now() >= at);
            if expired {
                log::debug!(
                    target: LOG_TARGET,
                    "stage for record {fingerprint} finished past the deadline, excluding its results"
                );
            }
            for (index, result) in stage_results {
                let metric = &self.registry.metrics()[index];
                let result = if expired {
                    Arc::new(MetricResult::failed(
                        ScoreFailure::DeadlineExceeded,
                        metric.def.version,
                    ))
                } else {
                    result
                };
                let _ = by_name.insert(metric.def.name.clone(), Arc::clone(&result));
                by_index[index] = Some(result);
            }
        }

        let results = self
            .registry
            .evaluation_order()
            .iter()
            .map(|&index| {
                by_index[index]
                    .clone()
                    .unwrap_or_else(|| unreachable!("every stage fills its metric slots"))
            })
            .collect();

        Report::aggregate(&self.registry, fingerprint, results, issues)
    }
}

/// Runs one scorer against extracted features and the upstream snapshot.
fn evaluate(
    metric: &BoundMetric,
    features: &crate::features::FeatureVector,
    upstream: &BTreeMap<String, Arc<MetricResult>>,
) -> MetricResult {
    let upstream = Upstream::new(upstream);
    match metric.scorer.score(features, &upstream) {
        Ok(scored) => MetricResult::success(scored, metric.def.version),
        Err(failure) => {
            log::debug!(
                target: LOG_TARGET,
                "metric '{}' failed: {failure}",
                metric.def.name
            );
            MetricResult::failed(failure, metric.def.version)
        }
    }
}

fn summarize(reports: &[Report], before: &CacheStats, after: &CacheStats) -> BatchSummary {
    let mut succeeded = 0;
    let mut failed = 0;
    for report in reports {
        for entry in &report.entries {
            if entry.result.is_success() {
                succeeded += 1;
            } else {
                failed += 1;
            }
        }
    }

    let misses = after.misses - before.misses;
    BatchSummary {
        records: reports.len(),
        metrics_succeeded: succeeded,
        metrics_failed: failed,
        cache_hits: after.hits - before.hits,
        cache_misses: misses,
        scorer_invocations: misses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;
    use crate::report::ReportStatus;

    fn engine(yaml: &str) -> Engine {
        let config = EngineConfig::from_yaml_str(yaml).unwrap();
        Engine::from_config(&config).unwrap()
    }

    fn number_schema() -> Schema {
        Schema::new(vec![crate::record::SchemaField {
            name: "x".to_string(),
            kind: crate::record::FieldKind::Number,
            required: true,
        }])
    }

    fn record(x: f64) -> Record {
        Record::new(vec![("x".to_string(), FieldValue::Number(x))])
    }

    const SUITE: &str = r"
metrics:
  - name: base
    scorer:
      kind: mean
      inputs: [x]
  - name: scaled
    scorer:
      kind: rescale
      upstream: base
      factor: 10.0
";

    #[tokio::test]
    async fn empty_batch_yields_empty_outcome() {
        let engine = engine(SUITE);
        let outcome = engine
            .run_batch(Vec::new(), &number_schema(), BatchOptions::default())
            .await
            .unwrap();

        assert!(outcome.reports.is_empty());
        assert_eq!(outcome.summary.records, 0);
        assert_eq!(outcome.summary.scorer_invocations, 0);
    }

    #[tokio::test]
    async fn reports_match_input_order() {
        let engine = engine(SUITE);
        let records: Vec<_> = (0..10).map(|i| record(f64::from(i))).collect();
        let expected: Vec<_> = records.iter().map(|r| *r.fingerprint()).collect();

        let outcome = engine
            .run_batch(records, &number_schema(), BatchOptions::default())
            .await
            .unwrap();

        let got: Vec<_> = outcome.reports.iter().map(|r| r.fingerprint).collect();
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn dependent_metric_sees_upstream_score() {
        let engine = engine(SUITE);
        let outcome = engine
            .run_batch(vec![record(3.0)], &number_schema(), BatchOptions::default())
            .await
            .unwrap();

        let report = &outcome.reports[0];
        assert_eq!(report.status, ReportStatus::Complete);
        assert_eq!(report.metric("base").unwrap().score(), Some(3.0));
        assert_eq!(report.metric("scaled").unwrap().score(), Some(30.0));
    }

    #[tokio::test]
    async fn repeated_record_skips_scorers() {
        let engine = engine(SUITE);
        let schema = number_schema();

        let first = engine
            .run_batch(vec![record(2.0)], &schema, BatchOptions::default())
            .await
            .unwrap();
        assert_eq!(first.summary.scorer_invocations, 2);

        let second = engine
            .run_batch(vec![record(2.0)], &schema, BatchOptions::default())
            .await
            .unwrap();
        assert_eq!(second.summary.scorer_invocations, 0);
        assert_eq!(second.summary.cache_hits, 2);
        assert_eq!(
            second.reports[0].composite,
            first.reports[0].composite
        );
    }

    #[tokio::test]
    async fn identical_records_in_one_batch_share_results() {
        let engine = engine(SUITE);
        let outcome = engine
            .run_batch(
                vec![record(1.0), record(1.0), record(1.0)],
                &number_schema(),
                BatchOptions::default(),
            )
            .await
            .unwrap();

        // Two metrics computed once each despite three records.
        assert_eq!(outcome.summary.scorer_invocations, 2);
        assert_eq!(outcome.reports.len(), 3);
        for report in &outcome.reports {
            assert_eq!(report.composite, outcome.reports[0].composite);
        }
    }

    #[tokio::test]
    async fn record_without_inputs_fails_every_metric() {
        let engine = engine(SUITE);
        let empty = Record::new(vec![(
            "y".to_string(),
            FieldValue::Number(1.0),
        )]);

        let outcome = engine
            .run_batch(vec![empty], &number_schema(), BatchOptions::default())
            .await
            .unwrap();

        // Extraction is lenient; with no numeric input both metrics fail and
        // the report carries the issue.
        let report = &outcome.reports[0];
        assert_eq!(report.status, ReportStatus::Failed);
        assert!(!report.issues.is_empty());
        assert_eq!(report.entries.len(), 2);
    }

    #[tokio::test]
    async fn stage_finishing_past_the_deadline_is_excluded_but_cached() {
        let engine = engine(
            r"
metrics:
  - name: avg
    scorer:
      kind: mean
      inputs: [x]
",
        );
        let schema = number_schema();
        let record = record(5.0);
        let key = CacheKey {
            fingerprint: *record.fingerprint(),
            metric: "avg".to_string(),
            version: 1,
        };

        // Occupy the key with an in-flight computation that outlives the
        // batch deadline; the record's only stage joins it mid-flight.
        let cache = Arc::clone(&engine.cache);
        let holder = tokio::spawn(async move {
            cache
                .get_or_compute(key, || async {
                    tokio::time::sleep(Duration::from_millis(80)).await;
                    MetricResult::success(crate::metrics::Scored::value(5.0), 1)
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let outcome = engine
            .run_batch(
                vec![record.clone()],
                &schema,
                BatchOptions {
                    deadline: Some(Duration::from_millis(30)),
                },
            )
            .await
            .unwrap();

        // The computation finished after the deadline: the report carries a
        // deadline failure, not the live score.
        let report = &outcome.reports[0];
        assert_eq!(
            report.metric("avg").unwrap().failure(),
            Some(&ScoreFailure::DeadlineExceeded)
        );
        assert!(holder.await.unwrap().is_success());

        // The finished computation still landed in the cache; a later batch
        // reuses it without invoking the scorer.
        let later = engine
            .run_batch(vec![record], &schema, BatchOptions::default())
            .await
            .unwrap();
        assert_eq!(later.reports[0].metric("avg").unwrap().score(), Some(5.0));
        assert_eq!(later.summary.scorer_invocations, 0);
    }

    #[tokio::test]
    async fn zero_deadline_fails_unstarted_stages() {
        let engine = engine(SUITE);
        let outcome = engine
            .run_batch(
                vec![record(1.0)],
                &number_schema(),
                BatchOptions {
                    deadline: Some(Duration::ZERO),
                },
            )
            .await
            .unwrap();

        let report = &outcome.reports[0];
        assert_eq!(report.status, ReportStatus::Failed);
        for entry in &report.entries {
            assert_eq!(
                entry.result.failure(),
                Some(&ScoreFailure::DeadlineExceeded)
            );
        }
        // Deadline failures are synthesized outside the cache.
        assert_eq!(outcome.summary.scorer_invocations, 0);
    }
}
