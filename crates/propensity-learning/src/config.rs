//! Configuration types for the propensity pipeline.
//!
//! This module provides [`PipelineConfig`] and its builder, the
//! [`ModelVariant`] that selects the model family, and the hyperparameters of
//! each variant.
//!
//! # Example
//!
//! ```
//! use propensity_learning::{ModelVariant, PipelineConfig, RunMode};
//!
//! let config = PipelineConfig::builder()
//!     .variant(ModelVariant::Network)
//!     .mode(RunMode::Deployed)
//!     .epochs(30)
//!     .seed(42)
//!     .build()
//!     .expect("valid config");
//! ```

use crate::error::{PropensityError, TrainingError};
use propensity_features::{FeatureConfig, SplitConfig};
use serde::{Deserialize, Serialize};

/// The model family to train.
///
/// Both variants share one fit/predict contract and produce a probability
/// in `[0, 1]` per row:
/// - [`Linear`](Self::Linear): L2-regularised logistic regression
/// - [`Network`](Self::Network): feed-forward network with ReLU hidden layers
///   and a single logit output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    /// Linear probabilistic classifier.
    #[default]
    Linear,

    /// Multi-layer perceptron trained with Adam.
    Network,
}

impl ModelVariant {
    /// Returns the lowercase name used in logs and reports.
    ///
    /// # Examples
    ///
    /// ```
    /// use propensity_learning::ModelVariant;
    ///
    /// assert_eq!(ModelVariant::Linear.as_str(), "linear");
    /// assert_eq!(ModelVariant::Network.as_str(), "network");
    /// ```
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::Linear => "linear",
            ModelVariant::Network => "network",
        }
    }
}

/// Which rows are trained on and which are scored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunMode {
    /// Train on part of the history and score the held-out remainder.
    HoldOut(SplitConfig),

    /// Train on all history and score the current rows.
    Deployed,
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::HoldOut(SplitConfig::default())
    }
}

/// What to do with current rows that were also training rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Score every current row.
    #[default]
    Allow,

    /// Drop current rows whose (household, date) key appears in the training rows.
    ExcludeTrainingRows,
}

/// Hyperparameters of the linear variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearParams {
    /// Maximum solver iterations (default: 100).
    pub max_iterations: u64,

    /// L2 regularisation strength (default: 1.0).
    pub alpha: f64,
}

impl LinearParams {
    /// Check the solver settings.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::InvalidParams`] naming the first invalid setting.
    pub fn validate(&self) -> Result<(), TrainingError> {
        let invalid = |msg: &str| Err(TrainingError::InvalidParams(msg.to_string()));

        if self.max_iterations == 0 {
            return invalid("max_iterations must be at least 1");
        }
        if !(self.alpha.is_finite() && self.alpha >= 0.0) {
            return invalid("alpha must be a finite, non-negative number");
        }
        Ok(())
    }
}

impl Default for LinearParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            alpha: 1.0,
        }
    }
}

/// Hyperparameters of the network variant.
///
/// Defaults reproduce three hidden layers of 128 units trained for 30 epochs
/// with Adam at its usual settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkParams {
    /// Width of each hidden layer (default: `[128, 128, 128]`).
    pub hidden_layers: Vec<usize>,

    /// Passes over the training rows (default: 30).
    pub epochs: usize,

    /// Rows per gradient step (default: 32).
    pub batch_size: usize,

    /// Adam step size (default: 0.001).
    pub learning_rate: f64,

    /// Adam first-moment decay (default: 0.9).
    pub beta1: f64,

    /// Adam second-moment decay (default: 0.999).
    pub beta2: f64,

    /// Adam denominator offset (default: 1e-7).
    pub epsilon: f64,
}

impl NetworkParams {
    /// Check the architecture and optimiser settings.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::InvalidParams`] naming the first invalid setting.
    pub fn validate(&self) -> Result<(), TrainingError> {
        let invalid = |msg: &str| Err(TrainingError::InvalidParams(msg.to_string()));

        if self.hidden_layers.is_empty() || self.hidden_layers.contains(&0) {
            return invalid("hidden_layers must list at least one layer of positive width");
        }
        if self.epochs == 0 {
            return invalid("epochs must be at least 1");
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1");
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid("learning_rate must be a positive number");
        }
        if !((0.0..1.0).contains(&self.beta1) && (0.0..1.0).contains(&self.beta2)) {
            return invalid("beta1 and beta2 must be in [0, 1)");
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return invalid("epsilon must be a positive number");
        }
        Ok(())
    }
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            hidden_layers: vec![128, 128, 128],
            epochs: 30,
            batch_size: 32,
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }
}

/// Inclusivity of the probability range bounds.
///
/// The default keeps only scores strictly inside the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeBounds {
    pub lo_inclusive: bool,
    pub hi_inclusive: bool,
}

/// Configuration for the propensity pipeline.
///
/// Use [`PipelineConfig::builder()`] to construct a configuration with the
/// builder pattern, or deserialize one from JSON; missing fields take their
/// defaults.
///
/// # Validation
///
/// [`validate()`](Self::validate) (called by the builder) checks:
/// - the feature configuration and, in hold-out mode, the split configuration
/// - `max_iterations` is at least 1 and `alpha` is finite and non-negative
/// - hidden layers are non-empty with positive widths
/// - `epochs` and `batch_size` are at least 1
/// - `learning_rate` and `epsilon` are positive; `beta1` and `beta2` are in `[0, 1)`
/// - `score_precision` is at most 15 digits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Model family to train (default: linear).
    pub variant: ModelVariant,

    /// Hold-out evaluation or deployed scoring (default: hold-out, 25% evaluation rows).
    pub mode: RunMode,

    /// Linear variant hyperparameters.
    pub linear: LinearParams,

    /// Network variant hyperparameters.
    pub network: NetworkParams,

    /// Decimal places network scores are rounded to (default: `Some(4)`).
    ///
    /// Linear scores are never rounded.
    pub score_precision: Option<u32>,

    /// Inclusivity of the requested probability range (default: both exclusive).
    pub range_bounds: RangeBounds,

    /// Keep only each household's highest score (default: false).
    pub dedupe_households: bool,

    /// Handling of current rows that were also training rows (default: allow).
    pub overlap: OverlapPolicy,

    /// Seed for the split, weight initialisation and batch order.
    ///
    /// `None` draws fresh randomness per run. A split seed set in
    /// [`RunMode::HoldOut`] takes precedence for the split.
    pub seed: Option<u64>,

    /// Column names and categorical encoding settings.
    pub feature: FeatureConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            variant: ModelVariant::default(),
            mode: RunMode::default(),
            linear: LinearParams::default(),
            network: NetworkParams::default(),
            score_precision: Some(4),
            range_bounds: RangeBounds::default(),
            dedupe_households: false,
            overlap: OverlapPolicy::default(),
            seed: None,
            feature: FeatureConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Read a configuration from a JSON file and validate it.
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, PropensityError> {
        let config: PipelineConfig = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        config.validate()?;
        Ok(config)
    }

    /// Split configuration for hold-out runs, with the run seed filled in.
    pub fn split_config(&self) -> Option<SplitConfig> {
        match self.mode {
            RunMode::HoldOut(split) => Some(SplitConfig {
                seed: split.seed.or(self.seed),
                ..split
            }),
            RunMode::Deployed => None,
        }
    }

    /// Check every setting.
    ///
    /// # Errors
    ///
    /// Returns [`PropensityError::InvalidConfig`] naming the first invalid setting.
    pub fn validate(&self) -> Result<(), PropensityError> {
        let invalid = |msg: &str| Err(PropensityError::InvalidConfig(msg.to_string()));

        self.feature
            .validate()
            .map_err(|e| PropensityError::InvalidConfig(e.to_string()))?;

        if let RunMode::HoldOut(split) = &self.mode {
            split
                .validate()
                .map_err(|e| PropensityError::InvalidConfig(e.to_string()))?;
        }

        self.linear
            .validate()
            .and_then(|()| self.network.validate())
            .map_err(|e| match e {
                TrainingError::InvalidParams(msg) => PropensityError::InvalidConfig(msg),
                other => PropensityError::Training(other),
            })?;

        if self.score_precision.is_some_and(|digits| digits > 15) {
            return invalid("score_precision must be at most 15 digits");
        }

        Ok(())
    }
}

/// Builder for [`PipelineConfig`].
///
/// Created via [`PipelineConfig::builder()`]. All setters return `self` to allow
/// method chaining.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Start from an existing configuration, e.g. one read from JSON.
    #[must_use]
    pub fn from_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Set the model variant.
    #[must_use]
    pub fn variant(mut self, variant: ModelVariant) -> Self {
        self.config.variant = variant;
        self
    }

    /// Set the run mode.
    #[must_use]
    pub fn mode(mut self, mode: RunMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Hold out `test_size` of the history for evaluation and scoring.
    #[must_use]
    pub fn hold_out(mut self, test_size: f64) -> Self {
        self.config.mode = RunMode::HoldOut(SplitConfig::new(test_size));
        self
    }

    /// Set the linear variant's iteration cap (default: 100).
    #[must_use]
    pub fn max_iterations(mut self, iterations: u64) -> Self {
        self.config.linear.max_iterations = iterations;
        self
    }

    /// Set the linear variant's L2 strength (default: 1.0).
    #[must_use]
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.config.linear.alpha = alpha;
        self
    }

    /// Replace all network hyperparameters.
    #[must_use]
    pub fn network(mut self, params: NetworkParams) -> Self {
        self.config.network = params;
        self
    }

    /// Set the network's hidden layer widths (default: `[128, 128, 128]`).
    #[must_use]
    pub fn hidden_layers(mut self, layers: impl Into<Vec<usize>>) -> Self {
        self.config.network.hidden_layers = layers.into();
        self
    }

    /// Set the number of network training epochs (default: 30).
    #[must_use]
    pub fn epochs(mut self, epochs: usize) -> Self {
        self.config.network.epochs = epochs;
        self
    }

    /// Set the network mini-batch size (default: 32).
    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.network.batch_size = batch_size;
        self
    }

    /// Set the Adam learning rate (default: 0.001).
    #[must_use]
    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.config.network.learning_rate = learning_rate;
        self
    }

    /// Set network score rounding; `None` keeps full precision.
    #[must_use]
    pub fn score_precision(mut self, digits: Option<u32>) -> Self {
        self.config.score_precision = digits;
        self
    }

    /// Set the inclusivity of the probability range bounds.
    #[must_use]
    pub fn range_bounds(mut self, lo_inclusive: bool, hi_inclusive: bool) -> Self {
        self.config.range_bounds = RangeBounds {
            lo_inclusive,
            hi_inclusive,
        };
        self
    }

    /// Keep only each household's highest score.
    #[must_use]
    pub fn dedupe_households(mut self, dedupe: bool) -> Self {
        self.config.dedupe_households = dedupe;
        self
    }

    /// Set the overlap policy for deployed runs.
    #[must_use]
    pub fn overlap(mut self, overlap: OverlapPolicy) -> Self {
        self.config.overlap = overlap;
        self
    }

    /// Fix all randomness of a run.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Set the column and encoding configuration.
    #[must_use]
    pub fn feature(mut self, feature: FeatureConfig) -> Self {
        self.config.feature = feature;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`PropensityError::InvalidConfig`] as described on
    /// [`PipelineConfig::validate`].
    pub fn build(self) -> Result<PipelineConfig, PropensityError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.variant, ModelVariant::Linear);
        assert_eq!(config.mode, RunMode::HoldOut(SplitConfig::default()));
        assert_eq!(config.network.hidden_layers, vec![128, 128, 128]);
        assert_eq!(config.network.epochs, 30);
        assert_eq!(config.score_precision, Some(4));
        assert_eq!(config.range_bounds, RangeBounds::default());
        assert_eq!(config.overlap, OverlapPolicy::Allow);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = PipelineConfig::builder()
            .variant(ModelVariant::Network)
            .mode(RunMode::Deployed)
            .hidden_layers([16, 8])
            .epochs(50)
            .learning_rate(0.01)
            .seed(7)
            .build()
            .unwrap();

        assert_eq!(config.variant, ModelVariant::Network);
        assert_eq!(config.network.hidden_layers, vec![16, 8]);
        assert_eq!(config.network.epochs, 50);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.split_config(), None);
    }

    #[test]
    fn test_split_config_takes_run_seed() {
        let config = PipelineConfig::builder().hold_out(0.3).seed(9).build().unwrap();
        let split = config.split_config().unwrap();
        assert_eq!(split.seed, Some(9));
        assert!((split.test_size - 0.3).abs() < f64::EPSILON);

        let config = PipelineConfig::builder()
            .mode(RunMode::HoldOut(SplitConfig::new(0.25).with_seed(1)))
            .seed(9)
            .build()
            .unwrap();
        assert_eq!(config.split_config().unwrap().seed, Some(1));
    }

    #[test]
    fn test_invalid_settings() {
        let cases = [
            (PipelineConfig::builder().hold_out(1.0), "test_size"),
            (PipelineConfig::builder().max_iterations(0), "max_iterations"),
            (PipelineConfig::builder().alpha(-1.0), "alpha"),
            (PipelineConfig::builder().hidden_layers(Vec::new()), "hidden_layers"),
            (PipelineConfig::builder().hidden_layers([8, 0]), "hidden_layers"),
            (PipelineConfig::builder().epochs(0), "epochs"),
            (PipelineConfig::builder().batch_size(0), "batch_size"),
            (PipelineConfig::builder().learning_rate(0.0), "learning_rate"),
            (PipelineConfig::builder().score_precision(Some(20)), "score_precision"),
        ];

        for (builder, needle) in cases {
            let err = builder.build().unwrap_err();
            assert!(
                err.to_string().contains(needle),
                "expected '{needle}' in '{err}'"
            );
        }
    }

    #[test]
    fn test_config_from_partial_json() {
        let json = r#"{
            "variant": "network",
            "mode": { "type": "deployed" },
            "network": { "epochs": 5 },
            "dedupe_households": true
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.variant, ModelVariant::Network);
        assert_eq!(config.mode, RunMode::Deployed);
        assert_eq!(config.network.epochs, 5);
        assert_eq!(config.network.batch_size, 32);
        assert_eq!(config.score_precision, Some(4));
        assert!(config.dedupe_households);
        assert_eq!(config.feature.label_column, "PURCHASED");
    }

    #[test]
    fn test_hold_out_json() {
        let json = r#"{ "mode": { "type": "hold_out", "test_size": 0.4, "seed": 3 } }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.mode,
            RunMode::HoldOut(SplitConfig::new(0.4).with_seed(3))
        );
    }

    #[test]
    fn test_variant_as_str() {
        assert_eq!(ModelVariant::Linear.as_str(), "linear");
        assert_eq!(ModelVariant::Network.as_str(), "network");
    }
}
