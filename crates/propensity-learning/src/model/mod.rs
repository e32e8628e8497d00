//! Propensity models and the fitted-model wrapper.
//!
//! Both model families implement [`PropensityModel`], one fit/predict
//! contract over dense `f64` matrices. [`FittedModel`] pairs a fitted model
//! with the [`FeatureSchema`] it was trained on so the scorer can reject
//! matrices with a different column layout.
//!
//! # Variants
//!
//! - [`LinearModel`]: logistic regression (see [`linear`])
//! - [`NetworkModel`]: ReLU network trained with Adam on burn (see [`network`])

pub mod linear;
pub mod network;

pub use linear::LinearModel;
pub use network::{Mlp, NetworkModel};

use crate::config::ModelVariant;
use crate::error::TrainingError;
use crate::types::EpochMetrics;
use ndarray::{Array1, ArrayView1, ArrayView2};
use propensity_features::FeatureSchema;

/// Observer called after every network epoch.
pub type EpochObserver<'a> = &'a (dyn Fn(&EpochMetrics) + Send + Sync);

/// Per-fit state shared with a model while it trains.
///
/// Carries the seed and collects the epoch history of iterative models.
#[derive(Default)]
pub struct FitContext<'a> {
    /// Seed for weight initialisation and batch order; `None` draws one.
    pub seed: Option<u64>,
    on_epoch: Option<EpochObserver<'a>>,
    history: Vec<EpochMetrics>,
}

impl<'a> FitContext<'a> {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            seed,
            on_epoch: None,
            history: Vec::new(),
        }
    }

    /// Call `observer` with the metrics of every completed epoch.
    pub fn with_epoch_observer(mut self, observer: EpochObserver<'a>) -> Self {
        self.on_epoch = Some(observer);
        self
    }

    /// Record a finished epoch and notify the observer.
    pub fn record(&mut self, metrics: EpochMetrics) {
        if let Some(observer) = self.on_epoch {
            observer(&metrics);
        }
        self.history.push(metrics);
    }

    pub fn history(&self) -> &[EpochMetrics] {
        &self.history
    }

    pub fn into_history(self) -> Vec<EpochMetrics> {
        self.history
    }
}

/// Shared fit/predict contract of the model families.
pub trait PropensityModel: Sized {
    /// Hyperparameters of this family.
    type Params;

    /// Fit on a validated matrix: finite features, at least one row, labels
    /// where anything above zero is a purchase.
    fn fit(
        features: ArrayView2<f64>,
        labels: ArrayView1<f64>,
        params: &Self::Params,
        ctx: &mut FitContext<'_>,
    ) -> Result<Self, TrainingError>;

    /// Purchase probability per row, each in `[0, 1]`.
    ///
    /// Pure: the same model and matrix always give the same output.
    fn predict_proba(&self, features: ArrayView2<f64>) -> Array1<f64>;
}

/// The fitted model of one family.
#[derive(Debug, Clone)]
pub enum ModelKind {
    Linear(LinearModel),
    Network(NetworkModel),
}

/// A fitted model plus the feature layout it expects.
///
/// Produced by the [`Trainer`](crate::Trainer) and consumed by the
/// [`Scorer`](crate::Scorer). Immutable once built.
#[derive(Debug, Clone)]
pub struct FittedModel {
    schema: FeatureSchema,
    model: ModelKind,
}

static_assertions::assert_impl_all!(FittedModel: Send, Sync);

impl FittedModel {
    pub fn new(schema: FeatureSchema, model: ModelKind) -> Self {
        Self { schema, model }
    }

    pub fn variant(&self) -> ModelVariant {
        match self.model {
            ModelKind::Linear(_) => ModelVariant::Linear,
            ModelKind::Network(_) => ModelVariant::Network,
        }
    }

    /// Feature columns, in order, the model was fitted on.
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn model(&self) -> &ModelKind {
        &self.model
    }

    /// Raw purchase probabilities, without schema checks or rounding.
    ///
    /// Use [`Scorer`](crate::Scorer) for validated, variant-rounded scores.
    pub fn predict_proba(&self, features: ArrayView2<f64>) -> Array1<f64> {
        match &self.model {
            ModelKind::Linear(model) => model.predict_proba(features),
            ModelKind::Network(model) => model.predict_proba(features),
        }
    }
}
