//! Common types used throughout the propensity-learning crate.
//!
//! This module defines the scored and ranked outputs, training diagnostics
//! and the run outcome returned by the pipeline.
//!
//! # Overview
//!
//! - [`ScoredHousehold`]: one household with its propensity score
//! - [`RankedResult`]: the ranked, range-filtered scores, or an explicit empty marker
//! - [`TrainingDiagnostics`]: what happened while fitting the model
//! - [`EvaluationMetrics`]: accuracy and ROC AUC on held-out rows
//! - [`RunOutcome`]: everything a pipeline run produces

use crate::config::ModelVariant;
use serde::{Deserialize, Serialize};

/// A household and its predicted purchase probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredHousehold {
    /// Household identifier.
    pub household: i64,

    /// Propensity score in `[0, 1]`.
    pub probability: f64,
}

impl ScoredHousehold {
    pub fn new(household: i64, probability: f64) -> Self {
        Self {
            household,
            probability,
        }
    }
}

impl From<(i64, f64)> for ScoredHousehold {
    fn from((household, probability): (i64, f64)) -> Self {
        Self::new(household, probability)
    }
}

/// Scores that survived the range filter, highest first.
///
/// An empty filter result is a value, not an error: it is reported as
/// [`Empty`](Self::Empty) so presentation layers can show "No results".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "households", rename_all = "snake_case")]
pub enum RankedResult {
    /// At least one household, sorted by descending probability.
    Ranked(Vec<ScoredHousehold>),

    /// No household fell inside the requested range.
    Empty,
}

impl RankedResult {
    /// Wrap sorted entries, mapping an empty list to [`Empty`](Self::Empty).
    pub fn from_sorted(entries: Vec<ScoredHousehold>) -> Self {
        if entries.is_empty() {
            RankedResult::Empty
        } else {
            RankedResult::Ranked(entries)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RankedResult::Empty)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// The ranked entries; empty for [`Empty`](Self::Empty).
    pub fn entries(&self) -> &[ScoredHousehold] {
        match self {
            RankedResult::Ranked(entries) => entries,
            RankedResult::Empty => &[],
        }
    }

    /// `(household, probability)` pairs in rank order.
    pub fn to_pairs(&self) -> Vec<(i64, f64)> {
        self.entries()
            .iter()
            .map(|e| (e.household, e.probability))
            .collect()
    }
}

/// Loss and classification quality after one network epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based epoch number.
    pub epoch: usize,

    /// Mean binary cross-entropy over the epoch's batches.
    pub loss: f64,

    /// Training accuracy at a 0.5 threshold after the epoch.
    pub accuracy: f64,

    /// Training ROC AUC after the epoch (`None` if only one class is present).
    pub auc: Option<f64>,
}

/// Classification quality on a labelled set of rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Number of rows evaluated.
    pub rows: usize,

    /// Share of rows classified correctly at a 0.5 threshold.
    pub accuracy: f64,

    /// Area under the ROC curve (`None` if only one class is present).
    pub auc: Option<f64>,
}

/// Diagnostics collected while fitting a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingDiagnostics {
    /// Model family that was fitted.
    pub variant: ModelVariant,

    /// Training rows.
    pub rows: usize,

    /// Feature columns.
    pub features: usize,

    /// Share of training rows labelled as purchases.
    pub positive_rate: f64,

    /// Per-epoch history; empty for the linear variant.
    pub epochs: Vec<EpochMetrics>,

    /// Training-set accuracy and AUC of the fitted model.
    pub training_metrics: EvaluationMetrics,

    /// Wall-clock fitting time.
    pub duration_seconds: f64,
}

/// Everything a pipeline run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Product category the run was triggered for.
    pub category: String,

    /// Model family used.
    pub variant: ModelVariant,

    /// Ranked, range-filtered scores.
    pub result: RankedResult,

    /// Rows scored before range filtering.
    pub scored_rows: usize,

    /// Training diagnostics.
    pub training: TrainingDiagnostics,

    /// Metrics on held-out rows (hold-out mode with labels only).
    pub evaluation: Option<EvaluationMetrics>,

    /// Wall-clock time of the whole run.
    pub duration_seconds: f64,
}
