//! Core library for tabscore
//!
//! This library turns batches of structured records (spreadsheet-style rows with
//! numeric, text, and categorical fields) into deterministic, versioned scoring
//! reports. Each record flows through feature extraction, a configured set of
//! metric scorers, and weighted aggregation into a per-record [`Report`].
//!
//! # Module Organization
//!
//! - [`record`]: Immutable record model, schema, and content fingerprinting
//! - [`features`]: Feature extraction from record fields, including text statistics
//! - [`metrics`]: Metric definitions, scorer implementations, and the registry
//! - [`cache`]: Fingerprint-keyed computation cache with single-flight semantics
//! - [`report`]: Per-record result aggregation and composite scoring
//! - [`pipeline`]: Batch orchestration, concurrency, and telemetry
//! - [`config`]: Declarative engine configuration loaded at startup

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod cache;
pub mod config;
pub mod features;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod report;

pub use crate::cache::{CacheKey, CacheStats, ScoreCache};
pub use crate::config::EngineConfig;
pub use crate::features::{ExtractionIssue, Extractor, FeatureValue, FeatureVector, IssueKind};
pub use crate::metrics::{MetricDefinition, MetricOutcome, MetricResult, Registry, ScoreFailure};
pub use crate::pipeline::{BatchOptions, BatchOutcome, BatchSummary, Engine};
pub use crate::record::{FieldKind, FieldValue, Fingerprint, Record, Schema, SchemaField};
pub use crate::report::{MetricEntry, Report, ReportStatus};
