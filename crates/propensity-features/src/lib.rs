//! Household Feature Encoding Library
//!
//! Turns raw household purchase records into numeric model input for
//! purchase-propensity models, built on Polars and ndarray.
//!
//! # Overview
//!
//! - **Row sources**: the [`RowSource`] trait supplies feature-store history,
//!   rows to score and the list of product categories
//! - **Feature encoding**: [`FeatureEncoder`] drops identifier columns,
//!   label-encodes categorical columns and fills missing numbers with zero
//! - **Persisted vocabulary**: [`CategoryVocabulary`] keeps codes stable
//!   across runs and can be saved as JSON
//! - **Dataset splitting**: [`DatasetSplitter`] holds out a random fraction
//!   of rows for evaluation
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use propensity_features::{
//!     CsvRowSource, DatasetSplitter, FeatureConfig, FeatureEncoder, RowSource, SplitConfig,
//! };
//!
//! let config = FeatureConfig::default();
//! let source = CsvRowSource::new("feature_store.csv", config.clone());
//!
//! let history = source.history("SOFT DRINKS")?;
//! let matrix = FeatureEncoder::encode(&config, &history)?;
//!
//! let split = DatasetSplitter::new(SplitConfig::default().with_seed(42))?.split(&matrix)?;
//! println!("{} training rows, {} evaluation rows", split.train.n_rows(), split.eval.n_rows());
//! ```

pub mod config;
pub mod encoder;
pub mod error;
pub mod source;
pub mod splitter;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{
    ConfigValidationError, FeatureConfig, FeatureConfigBuilder, SplitConfig, UnseenPolicy,
};
pub use encoder::{CategoryVocabulary, FeatureEncoder, LabelEncoding};
pub use error::{FeatureError, Result as FeatureResult, ResultExt, SchemaError};
pub use source::{CsvRowSource, FrameRowSource, RowSource, read_csv};
pub use splitter::{DatasetSplitter, Split};
pub use types::{EncodedMatrix, FeatureSchema, RowKey};

static_assertions::assert_impl_all!(EncodedMatrix: Send, Sync, Clone);
static_assertions::assert_impl_all!(CategoryVocabulary: Send, Sync);
static_assertions::assert_impl_all!(CsvRowSource: RowSource);
static_assertions::assert_impl_all!(FrameRowSource: RowSource);
