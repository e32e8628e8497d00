//! Model trainer.
//!
//! The [`Trainer`] validates a labelled [`EncodedMatrix`], fits the selected
//! [`ModelVariant`] and returns the [`FittedModel`] with its diagnostics.
//!
//! # Example
//!
//! ```rust,ignore
//! use propensity_learning::{ModelVariant, Trainer};
//!
//! let trainer = Trainer::new(ModelVariant::Network)
//!     .with_seed(42)
//!     .on_epoch(|m| println!("epoch {} loss {:.4}", m.epoch, m.loss));
//!
//! let (model, diagnostics) = trainer.train(&matrix)?;
//! println!("training accuracy {:.3}", diagnostics.training_metrics.accuracy);
//! ```

use crate::config::{LinearParams, ModelVariant, NetworkParams, PipelineConfig};
use crate::error::TrainingError;
use crate::metrics::{binarize, evaluate};
use crate::model::{FitContext, FittedModel, LinearModel, ModelKind, NetworkModel, PropensityModel};
use crate::types::{EpochMetrics, TrainingDiagnostics};
use propensity_features::EncodedMatrix;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Positive rates outside `[MIN, 1 - MIN]` are logged as imbalanced.
const MIN_CLASS_SHARE: f64 = 0.05;

/// Callback invoked after every network epoch.
pub type EpochCallback = Arc<dyn Fn(&EpochMetrics) + Send + Sync>;

/// Fits propensity models.
#[derive(Clone)]
pub struct Trainer {
    variant: ModelVariant,
    linear: LinearParams,
    network: NetworkParams,
    seed: Option<u64>,
    on_epoch: Option<EpochCallback>,
}

impl std::fmt::Debug for Trainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("variant", &self.variant)
            .field("linear", &self.linear)
            .field("network", &self.network)
            .field("seed", &self.seed)
            .field("on_epoch", &self.on_epoch.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Trainer {
    /// Trainer for `variant` with default hyperparameters.
    pub fn new(variant: ModelVariant) -> Self {
        Self {
            variant,
            linear: LinearParams::default(),
            network: NetworkParams::default(),
            seed: None,
            on_epoch: None,
        }
    }

    /// Trainer using the variant, hyperparameters and seed of a pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            variant: config.variant,
            linear: config.linear,
            network: config.network.clone(),
            seed: config.seed,
            on_epoch: None,
        }
    }

    pub fn with_linear_params(mut self, params: LinearParams) -> Self {
        self.linear = params;
        self
    }

    pub fn with_network_params(mut self, params: NetworkParams) -> Self {
        self.network = params;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Observe network training epoch by epoch.
    pub fn on_epoch<F>(mut self, callback: F) -> Self
    where
        F: Fn(&EpochMetrics) + Send + Sync + 'static,
    {
        self.on_epoch = Some(Arc::new(callback));
        self
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    /// Fit the configured variant on a labelled matrix.
    ///
    /// # Errors
    ///
    /// - [`TrainingError::InvalidParams`] if the variant's hyperparameters are out of range
    /// - [`TrainingError::MissingLabels`] if the matrix has no labels
    /// - [`TrainingError::EmptyMatrix`] if it has no rows or no feature columns
    /// - [`TrainingError::NonNumericFeature`] if a feature cell is not a number
    /// - [`TrainingError::NonNumericLabel`] if a label is not a number
    /// - [`TrainingError::SingleClass`] if every label is in the same class
    /// - [`TrainingError::Solver`] or [`TrainingError::Diverged`] if fitting fails
    pub fn train(
        &self,
        matrix: &EncodedMatrix,
    ) -> Result<(FittedModel, TrainingDiagnostics), TrainingError> {
        match self.variant {
            ModelVariant::Linear => self.linear.validate()?,
            ModelVariant::Network => self.network.validate()?,
        }

        let labels = matrix.labels().ok_or(TrainingError::MissingLabels)?;

        if matrix.n_rows() == 0 || matrix.n_features() == 0 {
            return Err(TrainingError::EmptyMatrix {
                rows: matrix.n_rows(),
                columns: matrix.n_features(),
            });
        }

        if let Some(column) = matrix.first_non_finite_column() {
            return Err(TrainingError::NonNumericFeature {
                column: column.to_string(),
            });
        }

        let non_numeric_labels = labels.iter().filter(|v| !v.is_finite()).count();
        if non_numeric_labels > 0 {
            return Err(TrainingError::NonNumericLabel {
                rows: non_numeric_labels,
            });
        }

        let targets = binarize(labels.view());
        let positives = targets.sum();
        let n_rows = matrix.n_rows();
        if positives == 0.0 || positives == n_rows as f64 {
            return Err(TrainingError::SingleClass { label: targets[0] });
        }

        let positive_rate = positives / n_rows as f64;
        if !(MIN_CLASS_SHARE..=1.0 - MIN_CLASS_SHARE).contains(&positive_rate) {
            warn!(
                "Imbalanced training labels: {:.1}% purchases in {} rows",
                positive_rate * 100.0,
                n_rows
            );
        }

        info!(
            "Training {} model on {} rows x {} features",
            self.variant.as_str(),
            n_rows,
            matrix.n_features()
        );

        let start = Instant::now();
        let features = matrix.features().view();
        let mut ctx = FitContext::new(self.seed);
        if let Some(callback) = &self.on_epoch {
            ctx = ctx.with_epoch_observer(callback.as_ref());
        }

        let model = match self.variant {
            ModelVariant::Linear => ModelKind::Linear(LinearModel::fit(
                features,
                targets.view(),
                &self.linear,
                &mut ctx,
            )?),
            ModelVariant::Network => ModelKind::Network(NetworkModel::fit(
                features,
                targets.view(),
                &self.network,
                &mut ctx,
            )?),
        };

        let fitted = FittedModel::new(matrix.schema().clone(), model);
        let training_metrics = evaluate(fitted.predict_proba(features).view(), targets.view());
        let duration_seconds = start.elapsed().as_secs_f64();

        info!(
            "Trained {} model in {:.2}s: training accuracy {:.4}",
            self.variant.as_str(),
            duration_seconds,
            training_metrics.accuracy
        );

        let diagnostics = TrainingDiagnostics {
            variant: self.variant,
            rows: n_rows,
            features: matrix.n_features(),
            positive_rate,
            epochs: ctx.into_history(),
            training_metrics,
            duration_seconds,
        };

        Ok((fitted, diagnostics))
    }
}

static_assertions::assert_impl_all!(Trainer: Send, Sync, Clone);
