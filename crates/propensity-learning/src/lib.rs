//! propensity-learning: household purchase-propensity models.
//!
//! This crate trains a binary classifier on encoded household records, scores
//! households with it and ranks them by predicted purchase probability. Feature
//! encoding and row access live in [`propensity_features`].
//!
//! # Features
//!
//! - **Two model variants**: L2-regularised logistic regression (linfa) and a
//!   feed-forward ReLU network trained with Adam on binary cross-entropy
//! - **Schema-checked scoring**: a model refuses matrices whose feature
//!   columns differ from the ones it was fitted on
//! - **Range ranking**: scores filtered to a probability range, highest first,
//!   with an explicit empty result
//! - **Hold-out or deployed runs**: evaluate on held-out history, or train on
//!   all history and score current rows
//! - **Progress Reporting**: stage and per-epoch callbacks
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use propensity_features::{CsvRowSource, FeatureConfig};
//! use propensity_learning::{ModelVariant, Pipeline, PipelineConfig, ScoringRequest};
//! use std::sync::Arc;
//!
//! let config = PipelineConfig::builder()
//!     .variant(ModelVariant::Network)
//!     .hold_out(0.25)
//!     .seed(42)
//!     .build()?;
//!
//! let source = CsvRowSource::new("feature_store.csv", config.feature.clone());
//! let pipeline = Pipeline::builder()
//!     .config(config)
//!     .source(Arc::new(source))
//!     .build()?;
//!
//! let outcome = pipeline.run(&ScoringRequest::new("SOFT DRINKS", 0.1, 0.9))?;
//! println!("{} households in range", outcome.result.len());
//! ```
//!
//! # Architecture
//!
//! ```text
//! RowSource ──► FeatureEncoder ──► EncodedMatrix ──► DatasetSplitter (hold-out)
//!                                        │
//!                                        ▼
//!                   Trainer ──► FittedModel ──► Scorer ──► rank ──► RankedResult
//! ```
//!
//! The pieces can be used on their own: [`Trainer::train`] takes any labelled
//! [`EncodedMatrix`](propensity_features::EncodedMatrix), [`Scorer::score`]
//! any matrix with the training schema, and [`rank`] any pair of identifier
//! and probability sequences.
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, PropensityError>`](Result).
//! [`PropensityError::kind`] reports which of the three expected failures
//! happened:
//!
//! - [`ErrorKind::Schema`] - the input does not have the expected columns
//! - [`ErrorKind::Training`] - the model could not be fitted ([`TrainingError`])
//! - [`ErrorKind::DataUnavailable`] - no rows for the requested category
//!
//! # Thread Safety
//!
//! Runs share no mutable state. [`Pipeline`], [`Trainer`] and [`FittedModel`]
//! are `Send + Sync`.

mod config;
mod error;
pub mod metrics;
pub mod model;
mod pipeline;
mod progress;
mod ranker;
mod scorer;
mod trainer;
mod types;

// Re-export public API
//
// Configuration types
pub use config::{
    LinearParams, ModelVariant, NetworkParams, OverlapPolicy, PipelineConfig,
    PipelineConfigBuilder, RangeBounds, RunMode,
};
// Error types
pub use error::{ErrorKind, PropensityError, Result, TrainingError};
// Model types
pub use model::{FittedModel, ModelKind, PropensityModel};
// Training, scoring and ranking
pub use ranker::{RangeFilter, rank};
pub use scorer::{DEFAULT_SCORE_PRECISION, Scorer};
pub use trainer::{EpochCallback, Trainer};
// Pipeline types
pub use pipeline::{Pipeline, PipelineBuilder, ScoringRequest};
// Progress reporting types
pub use progress::{ProgressCallback, ProgressUpdate, RunStage};
// Result and metrics types
pub use types::{
    EpochMetrics, EvaluationMetrics, RankedResult, RunOutcome, ScoredHousehold,
    TrainingDiagnostics,
};
