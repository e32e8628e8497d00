//! End-to-end propensity run.
//!
//! This module provides the [`Pipeline`] struct and its builder. One run
//! takes a product category and a probability range and executes these
//! stages in order:
//!
//! 1. **Fetching** - Load history (and current rows when deployed) from the [`RowSource`]
//! 2. **Encoding** - Turn records into an [`EncodedMatrix`] with a fixed vocabulary
//! 3. **Splitting** - Hold out evaluation rows (hold-out mode only)
//! 4. **Training** - Fit the configured [`ModelVariant`](crate::ModelVariant)
//! 5. **Scoring** - Score the held-out or current rows
//! 6. **Ranking** - Keep scores inside the range, highest first
//!
//! # Example
//!
//! ```rust,ignore
//! use propensity_features::{CsvRowSource, FeatureConfig};
//! use propensity_learning::{Pipeline, PipelineConfig, RunMode, ScoringRequest};
//! use std::sync::Arc;
//!
//! let source = CsvRowSource::new("feature_store.csv", FeatureConfig::default())
//!     .with_features_to_score("features_to_score.csv");
//!
//! let pipeline = Pipeline::builder()
//!     .config(PipelineConfig::builder().mode(RunMode::Deployed).build()?)
//!     .source(Arc::new(source))
//!     .on_progress(|u| println!("{:.0}% {}", u.progress * 100.0, u.message))
//!     .build()?;
//!
//! let outcome = pipeline.run(&ScoringRequest::new("SOFT DRINKS", 0.5, 1.0))?;
//! for entry in outcome.result.entries() {
//!     println!("{} {:.4}", entry.household, entry.probability);
//! }
//! ```
//!
//! # Thread Safety
//!
//! A [`Pipeline`] is `Send + Sync` and holds no state between runs; each
//! run builds and owns its matrices and model.

use crate::config::{OverlapPolicy, PipelineConfig, RunMode};
use crate::error::{PropensityError, Result};
use crate::metrics::{binarize, evaluate};
use crate::model::FittedModel;
use crate::progress::{ProgressCallback, ProgressUpdate, RunStage};
use crate::ranker::{RangeFilter, rank};
use crate::scorer::Scorer;
use crate::trainer::Trainer;
use crate::types::{EvaluationMetrics, RunOutcome, TrainingDiagnostics};
use ndarray::Array1;
use polars::prelude::DataFrame;
use propensity_features::{
    CategoryVocabulary, DatasetSplitter, EncodedMatrix, FeatureEncoder, RowKey, RowSource,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// What to score: a product category and the probability range to report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRequest {
    pub category: String,
    pub lo: f64,
    pub hi: f64,
}

impl ScoringRequest {
    pub fn new(category: impl Into<String>, lo: f64, hi: f64) -> Self {
        Self {
            category: category.into(),
            lo,
            hi,
        }
    }
}

/// The propensity pipeline.
///
/// Use [`Pipeline::builder()`] to construct one.
pub struct Pipeline {
    config: PipelineConfig,
    source: Arc<dyn RowSource>,
    vocabulary: Option<CategoryVocabulary>,
    progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("source", &"<row source>")
            .field("vocabulary", &self.vocabulary.as_ref().map(|v| v.version))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

/// Progress reporting for one run.
struct RunProgress<'a> {
    callback: Option<&'a ProgressCallback>,
    category: &'a str,
    last: f64,
}

impl<'a> RunProgress<'a> {
    fn new(callback: Option<&'a ProgressCallback>, category: &'a str) -> Self {
        Self {
            callback,
            category,
            last: 0.0,
        }
    }

    fn stage(&mut self, stage: RunStage, message: impl Into<String>) {
        let progress = if stage == RunStage::Failed {
            self.last
        } else {
            stage.start_progress().max(self.last)
        };
        self.last = progress;

        if let Some(callback) = self.callback {
            callback(ProgressUpdate {
                stage,
                progress,
                message: message.into(),
                category: Some(self.category.to_string()),
                epochs_completed: None,
            });
        }
    }
}

/// Training and scoring matrices of one run.
struct Prepared {
    train: EncodedMatrix,
    score: EncodedMatrix,
}

impl Pipeline {
    /// Create a new builder for `Pipeline`.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Product categories the row source offers.
    pub fn categories(&self) -> Result<Vec<String>> {
        Ok(self.source.categories()?)
    }

    /// Run the pipeline for one category.
    ///
    /// In hold-out mode the history is split, the model is trained on the
    /// training partition and the evaluation partition is scored and ranked.
    /// In deployed mode the model is trained on all history and the current
    /// rows are scored and ranked.
    ///
    /// A range that keeps no household yields
    /// [`RankedResult::Empty`](crate::RankedResult::Empty), not an error.
    ///
    /// # Errors
    ///
    /// - [`PropensityError::InvalidConfig`] if the range is invalid or the
    ///   history is too small to split
    /// - [`PropensityError::DataUnavailable`] if the source has no rows for
    ///   the category
    /// - [`PropensityError::Schema`] if the rows lack expected columns or the
    ///   current rows do not match the training layout
    /// - [`PropensityError::Training`] if the model cannot be fitted
    pub fn run(&self, request: &ScoringRequest) -> Result<RunOutcome> {
        let mut progress = RunProgress::new(self.progress_callback.as_ref(), &request.category);

        match self.execute(request, &mut progress) {
            Ok(outcome) => {
                progress.stage(
                    RunStage::Complete,
                    format!("{} households ranked", outcome.result.len()),
                );
                Ok(outcome)
            }
            Err(e) => {
                error!("Run for '{}' failed: {}", request.category, e);
                progress.stage(RunStage::Failed, e.to_string());
                Err(e)
            }
        }
    }

    fn execute(
        &self,
        request: &ScoringRequest,
        progress: &mut RunProgress<'_>,
    ) -> Result<RunOutcome> {
        let start = Instant::now();
        let filter = RangeFilter::with_bounds(request.lo, request.hi, self.config.range_bounds)?;
        let category = request.category.as_str();

        info!(
            "Scoring '{}' with the {} model in range ({}, {})",
            category,
            self.config.variant.as_str(),
            request.lo,
            request.hi
        );

        let prepared = match self.config.mode {
            RunMode::HoldOut(_) => self.prepare_hold_out(category, progress)?,
            RunMode::Deployed => self.prepare_deployed(category, progress)?,
        };

        progress.stage(
            RunStage::Training,
            format!(
                "Training {} model on {} rows",
                self.config.variant.as_str(),
                prepared.train.n_rows()
            ),
        );
        let (model, training) = self.trainer(category).train(&prepared.train)?;

        progress.stage(
            RunStage::Scoring,
            format!("Scoring {} rows", prepared.score.n_rows()),
        );
        let scorer = Scorer::from_config(&self.config);
        let (households, scores) = scorer.score_households(&model, &prepared.score)?;
        let evaluation = self.evaluation(&prepared.score, &scores);

        progress.stage(RunStage::Ranking, "Ranking households");
        let result = rank(
            &households,
            scores.view(),
            &filter,
            self.config.dedupe_households,
        )?;

        if result.is_empty() {
            info!("No household of '{}' scored inside the range", category);
        }

        Ok(RunOutcome {
            category: category.to_string(),
            variant: model.variant(),
            result,
            scored_rows: prepared.score.n_rows(),
            training,
            evaluation,
            duration_seconds: start.elapsed().as_secs_f64(),
        })
    }

    /// Train a model and score a matrix without a row source.
    ///
    /// Both matrices must come from the same encoder.
    pub fn train_and_score(
        &self,
        train: &EncodedMatrix,
        score: &EncodedMatrix,
    ) -> Result<(FittedModel, TrainingDiagnostics, Array1<f64>)> {
        let (model, diagnostics) = Trainer::from_config(&self.config).train(train)?;
        let scores = Scorer::from_config(&self.config).score(&model, score)?;
        Ok((model, diagnostics, scores))
    }

    fn fetch_history(&self, category: &str, progress: &mut RunProgress<'_>) -> Result<DataFrame> {
        progress.stage(RunStage::Fetching, format!("Fetching history for '{category}'"));
        let history = self.source.history(category)?;
        if history.height() == 0 {
            return Err(PropensityError::DataUnavailable {
                category: category.to_string(),
            });
        }
        Ok(history)
    }

    fn encoder(&self, history: &DataFrame) -> Result<FeatureEncoder> {
        let encoder = match &self.vocabulary {
            Some(vocabulary) => {
                FeatureEncoder::from_vocabulary(&self.config.feature, vocabulary.clone())?
            }
            None => FeatureEncoder::fit(&self.config.feature, history)?,
        };
        Ok(encoder)
    }

    fn prepare_hold_out(&self, category: &str, progress: &mut RunProgress<'_>) -> Result<Prepared> {
        let history = self.fetch_history(category, progress)?;

        progress.stage(
            RunStage::Encoding,
            format!("Encoding {} history rows", history.height()),
        );
        let matrix = self.encoder(&history)?.transform(&history)?;

        let split_config = self.config.split_config().ok_or_else(|| {
            PropensityError::InvalidConfig("hold-out run without a split".to_string())
        })?;
        progress.stage(
            RunStage::Splitting,
            format!("Holding out {:.0}% of rows", split_config.test_size * 100.0),
        );
        let split = DatasetSplitter::new(split_config)?.split(&matrix)?;

        Ok(Prepared {
            train: split.train,
            score: split.eval,
        })
    }

    fn prepare_deployed(&self, category: &str, progress: &mut RunProgress<'_>) -> Result<Prepared> {
        let history = self.fetch_history(category, progress)?;
        let current = self.source.current(category)?;
        if current.height() == 0 {
            return Err(PropensityError::DataUnavailable {
                category: category.to_string(),
            });
        }

        progress.stage(
            RunStage::Encoding,
            format!(
                "Encoding {} history and {} current rows",
                history.height(),
                current.height()
            ),
        );
        let encoder = self.encoder(&history)?;
        let train = encoder.transform(&history)?;
        let mut score = encoder.transform_unlabelled(&current)?;

        if self.config.overlap == OverlapPolicy::ExcludeTrainingRows {
            let training_keys: HashSet<RowKey> = train.keys().iter().cloned().collect();
            let before = score.n_rows();
            score = score.without_keys(&training_keys);
            if score.n_rows() < before {
                info!(
                    "Excluded {} current rows that were also training rows",
                    before - score.n_rows()
                );
            }
            if score.is_empty() {
                warn!("Every current row of '{}' was a training row", category);
            }
        }

        Ok(Prepared { train, score })
    }

    fn trainer(&self, category: &str) -> Trainer {
        let trainer = Trainer::from_config(&self.config);
        let Some(callback) = self.progress_callback.clone() else {
            return trainer;
        };

        let category = category.to_string();
        let total = self.config.network.epochs;
        let start = RunStage::Training.start_progress();
        let end = RunStage::Scoring.start_progress();

        trainer.on_epoch(move |metrics| {
            callback(ProgressUpdate {
                stage: RunStage::Training,
                progress: (start + (end - start) * metrics.epoch as f64 / total as f64).min(end),
                message: format!("Epoch {}/{}: loss {:.4}", metrics.epoch, total, metrics.loss),
                category: Some(category.clone()),
                epochs_completed: Some((metrics.epoch, total)),
            });
        })
    }

    /// Accuracy and AUC of scores against labels, when the scored rows carry labels.
    fn evaluation(
        &self,
        scored: &EncodedMatrix,
        scores: &Array1<f64>,
    ) -> Option<EvaluationMetrics> {
        let labels = scored.labels()?;
        if labels.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let metrics = evaluate(scores.view(), binarize(labels.view()).view());
        info!(
            "Evaluation on {} rows: accuracy {:.4}, AUC {}",
            metrics.rows,
            metrics.accuracy,
            metrics
                .auc
                .map_or_else(|| "n/a".to_string(), |auc| format!("{auc:.4}"))
        );
        Some(metrics)
    }
}

/// Builder for [`Pipeline`].
///
/// # Required Configuration
///
/// - [`source()`](Self::source): where rows come from
///
/// # Optional Configuration
///
/// - [`config()`](Self::config): pipeline configuration (default: [`PipelineConfig::default()`])
/// - [`vocabulary()`](Self::vocabulary): a persisted vocabulary to encode with
/// - [`on_progress()`](Self::on_progress): progress callback for monitoring
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    source: Option<Arc<dyn RowSource>>,
    vocabulary: Option<CategoryVocabulary>,
    progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("config", &self.config)
            .field("source", &self.source.as_ref().map(|_| "<row source>"))
            .field("vocabulary", &self.vocabulary.as_ref().map(|v| v.version))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl PipelineBuilder {
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the row source (required).
    #[must_use]
    pub fn source(mut self, source: Arc<dyn RowSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Encode with a previously fitted vocabulary instead of fitting one per run.
    #[must_use]
    pub fn vocabulary(mut self, vocabulary: CategoryVocabulary) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    /// Set the progress callback (optional).
    ///
    /// The callback runs inline with the pipeline and should return quickly.
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Build the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PropensityError::InvalidConfig`] if no row source was set or
    /// the configuration is invalid.
    pub fn build(self) -> Result<Pipeline> {
        let source = self.source.ok_or_else(|| {
            PropensityError::InvalidConfig("Pipeline row source is required".to_string())
        })?;
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Pipeline {
            config,
            source,
            vocabulary: self.vocabulary,
            progress_callback: self.progress_callback,
        })
    }
}

static_assertions::assert_impl_all!(Pipeline: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelVariant;
    use polars::prelude::*;
    use propensity_features::{FeatureConfig, FrameRowSource};

    fn feature_config() -> FeatureConfig {
        FeatureConfig::builder()
            .categorical_columns(["AGE_DESC"])
            .build()
            .unwrap()
    }

    fn history() -> DataFrame {
        df! {
            "HOUSEHOLD_KEY" => &[1i64, 2, 3, 4, 5, 6, 7, 8],
            "COMMODITY_DESC" => &["SOFT DRINKS"; 8],
            "DATE" => &["2024-01-05"; 8],
            "AGE_DESC" => &["25-34", "45-54", "25-34", "45-54", "25-34", "45-54", "25-34", "45-54"],
            "SPEND_30D" => &[50.0f64, 2.0, 45.0, 1.0, 60.0, 3.0, 40.0, 0.5],
            "PURCHASED" => &[1i64, 0, 1, 0, 2, 0, 1, 0],
        }
        .unwrap()
    }

    fn source() -> Arc<dyn RowSource> {
        Arc::new(FrameRowSource::new(history(), feature_config()))
    }

    #[test]
    fn test_builder_requires_source() {
        let err = Pipeline::builder().build().unwrap_err();
        assert!(matches!(err, PropensityError::InvalidConfig(_)));
        assert!(err.to_string().contains("row source is required"));
    }

    #[test]
    fn test_builder_validates_config() {
        let mut config = PipelineConfig::default();
        config.network.epochs = 0;
        let result = Pipeline::builder().config(config).source(source()).build();
        assert!(matches!(result, Err(PropensityError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_debug() {
        let builder = Pipeline::builder().source(source()).on_progress(|_| {});
        let debug_str = format!("{builder:?}");
        assert!(debug_str.contains("PipelineBuilder"));
        assert!(debug_str.contains("<callback>"));
    }

    #[test]
    fn test_hold_out_run() {
        let config = PipelineConfig::builder()
            .variant(ModelVariant::Linear)
            .hold_out(0.25)
            .seed(7)
            .feature(feature_config())
            .build()
            .unwrap();
        let pipeline = Pipeline::builder().config(config).source(source()).build().unwrap();

        let outcome = pipeline
            .run(&ScoringRequest::new("SOFT DRINKS", 0.0, 1.0))
            .unwrap();

        assert_eq!(outcome.scored_rows, 2);
        assert_eq!(outcome.training.rows, 6);
        assert!(outcome.evaluation.is_some());
    }

    #[test]
    fn test_invalid_range_fails_before_fetching() {
        let pipeline = Pipeline::builder().source(source()).build().unwrap();
        let err = pipeline
            .run(&ScoringRequest::new("SOFT DRINKS", 0.9, 0.1))
            .unwrap_err();
        assert!(matches!(err, PropensityError::InvalidConfig(_)));
    }
}
