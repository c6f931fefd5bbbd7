use super::definition::{MetricDefinition, ScorerSpec};
use super::derived::{BandsScorer, RescaleScorer};
use super::model::{LevelsScorer, LexiconScorer, LogisticScorer, NearestCentroidScorer};
use super::scorer::Scorer;
use super::statistical::{LinearScorer, MeanScorer, VarianceScorer, ZScoreScorer};
use crate::Result;
use ohno::app_err;
use std::collections::HashMap;

const LOG_TARGET: &str = "  registry";

/// A metric definition bound to its scorer implementation and resolved
/// dependency indices.
#[derive(Debug)]
pub struct BoundMetric {
    pub def: MetricDefinition,
    pub scorer: Box<dyn Scorer>,

    /// Indices into the registry's metric list, in `upstream_names` order.
    pub deps: Vec<usize>,
}

/// The configured set of active metrics in dependency-safe evaluation order.
///
/// Loading resolves the dependency graph exactly once: topological order with
/// declaration-order tie-breaking, plus stage levels grouping metrics that
/// share no dependency path and may therefore run concurrently for the same
/// record. Invalid configurations (cycles, unknown upstreams, bad parameters)
/// fail fast here, before any record is scored.
#[derive(Debug)]
pub struct Registry {
    metrics: Vec<BoundMetric>,
    order: Vec<usize>,
    stages: Vec<Vec<usize>>,
}

impl Registry {
    /// Validates definitions, binds scorers, and resolves evaluation order.
    pub fn load(defs: Vec<MetricDefinition>) -> Result<Self> {
        if defs.is_empty() {
            return Err(app_err!("metric configuration is empty; at least one metric is required"));
        }

        let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(defs.len());
        for (i, def) in defs.iter().enumerate() {
            if index_of.insert(def.name.as_str(), i).is_some() {
                return Err(app_err!("duplicate metric name '{}'", def.name));
            }
        }

        let mut metrics = Vec::with_capacity(defs.len());
        for def in &defs {
            if !def.weight.is_finite() || def.weight < 0.0 {
                return Err(app_err!("metric '{}' has invalid weight {}", def.name, def.weight));
            }

            let mut deps = Vec::new();
            for upstream in def.upstream_names() {
                let Some(&dep) = index_of.get(upstream) else {
                    return Err(app_err!("metric '{}' references undefined upstream metric '{upstream}'", def.name));
                };
                if defs[dep].name == def.name {
                    return Err(app_err!("metric '{}' depends on itself", def.name));
                }
                deps.push(dep);
            }

            metrics.push(BoundMetric {
                scorer: build_scorer(&def.name, &def.scorer)?,
                def: def.clone(),
                deps,
            });
        }

        let order = topological_order(&metrics)?;
        let stages = stage_levels(&metrics, &order);
        log::debug!(
            target: LOG_TARGET,
            "loaded {} metric(s) across {} stage(s)",
            metrics.len(),
            stages.len()
        );

        Ok(Self { metrics, order, stages })
    }

    /// All metrics, in declaration order.
    #[must_use]
    pub fn metrics(&self) -> &[BoundMetric] {
        &self.metrics
    }

    /// Metric indices in dependency-safe evaluation order (upstreams strictly
    /// before dependents, ties broken by declaration order).
    #[must_use]
    pub fn evaluation_order(&self) -> &[usize] {
        &self.order
    }

    /// Metrics grouped by stage: metrics within a stage have no dependency
    /// path between them and may be evaluated concurrently.
    #[must_use]
    pub fn stages(&self) -> &[Vec<usize>] {
        &self.stages
    }

    /// Bound metrics in evaluation order.
    pub fn ordered(&self) -> impl Iterator<Item = &BoundMetric> {
        self.order.iter().map(|&i| &self.metrics[i])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// Kahn's algorithm with declaration-order tie-breaking for determinism.
fn topological_order(metrics: &[BoundMetric]) -> Result<Vec<usize>> {
    let n = metrics.len();
    let mut in_degree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, metric) in metrics.iter().enumerate() {
        in_degree[i] = metric.deps.len();
        for &dep in &metric.deps {
            dependents[dep].push(i);
        }
    }

    // Ready set kept sorted so the smallest declaration index is always
    // dispatched first.
    let mut ready: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(&next) = ready.iter().min() {
        ready.retain(|&i| i != next);
        order.push(next);
        for &dependent in &dependents[next] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(dependent);
            }
        }
    }

    if order.len() < n {
        let cycle: Vec<&str> = (0..n)
            .filter(|&i| !order.contains(&i))
            .map(|i| metrics[i].def.name.as_str())
            .collect();
        return Err(app_err!("metric dependency cycle involving: {}", cycle.join(", ")));
    }
    Ok(order)
}

/// Stage level per metric: 0 for no dependencies, otherwise one past the
/// deepest upstream. Computed in topological order so upstream levels are
/// always known.
fn stage_levels(metrics: &[BoundMetric], order: &[usize]) -> Vec<Vec<usize>> {
    let mut level = vec![0usize; metrics.len()];
    let mut max_level = 0;
    for &i in order {
        for &dep in &metrics[i].deps {
            level[i] = level[i].max(level[dep] + 1);
        }
        max_level = max_level.max(level[i]);
    }

    let mut stages = vec![Vec::new(); max_level + 1];
    for &i in order {
        stages[level[i]].push(i);
    }
    stages
}

/// Binds a scorer spec to its implementation, validating parameters.
fn build_scorer(metric: &str, spec: &ScorerSpec) -> Result<Box<dyn Scorer>> {
    match spec {
        ScorerSpec::Mean { inputs } => {
            require_inputs(metric, inputs)?;
            Ok(Box::new(MeanScorer { inputs: inputs.clone() }))
        }
        ScorerSpec::Variance { inputs } => {
            require_inputs(metric, inputs)?;
            Ok(Box::new(VarianceScorer { inputs: inputs.clone() }))
        }
        ScorerSpec::ZScore { input, mean, std_dev } => {
            if !std_dev.is_finite() || *std_dev <= 0.0 {
                return Err(app_err!("metric '{metric}': z-score std_dev must be positive, got {std_dev}"));
            }
            if !mean.is_finite() {
                return Err(app_err!("metric '{metric}': z-score mean must be finite"));
            }
            Ok(Box::new(ZScoreScorer {
                input: input.clone(),
                mean: *mean,
                std_dev: *std_dev,
            }))
        }
        ScorerSpec::Linear { coefficients, intercept } => {
            if coefficients.is_empty() {
                return Err(app_err!("metric '{metric}': linear scorer needs at least one coefficient"));
            }
            if coefficients.values().any(|c| !c.is_finite()) || !intercept.is_finite() {
                return Err(app_err!("metric '{metric}': linear coefficients must be finite"));
            }
            Ok(Box::new(LinearScorer {
                coefficients: coefficients.iter().map(|(k, v)| (k.clone(), *v)).collect(),
                intercept: *intercept,
            }))
        }
        ScorerSpec::Logistic {
            weights,
            bias,
            positive_label,
            negative_label,
        } => {
            if weights.is_empty() {
                return Err(app_err!("metric '{metric}': logistic model needs at least one weight"));
            }
            if weights.values().any(|w| !w.is_finite()) || !bias.is_finite() {
                return Err(app_err!("metric '{metric}': logistic weights must be finite"));
            }
            Ok(Box::new(LogisticScorer {
                weights: weights.iter().map(|(k, v)| (k.clone(), *v)).collect(),
                bias: *bias,
                positive_label: positive_label.clone(),
                negative_label: negative_label.clone(),
            }))
        }
        ScorerSpec::NearestCentroid { inputs, centroids } => {
            require_inputs(metric, inputs)?;
            if centroids.is_empty() {
                return Err(app_err!("metric '{metric}': centroid model needs at least one centroid"));
            }
            for centroid in centroids {
                if centroid.point.len() != inputs.len() {
                    return Err(app_err!(
                        "metric '{metric}': centroid '{}' has {} dimension(s) but {} input(s) are declared",
                        centroid.label,
                        centroid.point.len(),
                        inputs.len()
                    ));
                }
                if centroid.point.iter().any(|v| !v.is_finite()) {
                    return Err(app_err!("metric '{metric}': centroid '{}' has non-finite coordinates", centroid.label));
                }
            }
            Ok(Box::new(NearestCentroidScorer {
                inputs: inputs.clone(),
                centroids: centroids.iter().map(|c| (c.label.clone(), c.point.clone())).collect(),
            }))
        }
        ScorerSpec::Lexicon {
            input,
            positive,
            negative,
            alpha,
            positive_cutoff,
            negative_cutoff,
        } => {
            if !alpha.is_finite() || *alpha <= 0.0 {
                return Err(app_err!("metric '{metric}': lexicon alpha must be positive, got {alpha}"));
            }
            if positive.is_empty() && negative.is_empty() {
                return Err(app_err!("metric '{metric}': lexicon has no words"));
            }
            Ok(Box::new(LexiconScorer {
                input: input.clone(),
                positive: positive.iter().cloned().collect(),
                negative: negative.iter().cloned().collect(),
                alpha: *alpha,
                positive_cutoff: *positive_cutoff,
                negative_cutoff: *negative_cutoff,
            }))
        }
        ScorerSpec::Levels { input, scores } => {
            if scores.is_empty() {
                return Err(app_err!("metric '{metric}': level table is empty"));
            }
            if scores.values().any(|s| !s.is_finite()) {
                return Err(app_err!("metric '{metric}': level scores must be finite"));
            }
            Ok(Box::new(LevelsScorer {
                input: input.clone(),
                scores: scores.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            }))
        }
        ScorerSpec::Bands { upstream, bands } => {
            if bands.is_empty() {
                return Err(app_err!("metric '{metric}': bands scorer needs at least one band"));
            }
            let mut prev: Option<f64> = None;
            for (i, band) in bands.iter().enumerate() {
                match band.up_to {
                    Some(bound) => {
                        if !bound.is_finite() {
                            return Err(app_err!("metric '{metric}': band '{}' has a non-finite bound", band.label));
                        }
                        if prev.is_some_and(|p| bound <= p) {
                            return Err(app_err!("metric '{metric}': band bounds must be strictly increasing"));
                        }
                        prev = Some(bound);
                    }
                    None => {
                        if i + 1 != bands.len() {
                            return Err(app_err!("metric '{metric}': only the final band may omit `up_to`"));
                        }
                    }
                }
            }
            Ok(Box::new(BandsScorer {
                upstream: upstream.clone(),
                bands: bands.clone(),
            }))
        }
        ScorerSpec::Rescale {
            upstream,
            factor,
            offset,
            clamp,
        } => {
            if !factor.is_finite() || !offset.is_finite() {
                return Err(app_err!("metric '{metric}': rescale parameters must be finite"));
            }
            if let Some(c) = clamp {
                if !c.min.is_finite() || !c.max.is_finite() || c.min > c.max {
                    return Err(app_err!("metric '{metric}': rescale clamp range is invalid"));
                }
            }
            Ok(Box::new(RescaleScorer {
                upstream: upstream.clone(),
                factor: *factor,
                offset: *offset,
                clamp: *clamp,
            }))
        }
    }
}

fn require_inputs(metric: &str, inputs: &[String]) -> Result<()> {
    if inputs.is_empty() {
        return Err(app_err!("metric '{metric}': at least one input feature is required"));
    }
    Ok(())
}
