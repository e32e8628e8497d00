//! Error types for the propensity-learning crate.
//!
//! This module defines [`PropensityError`], the main error type used throughout
//! the crate, and [`TrainingError`] for failures while fitting a model. All
//! public API functions return `Result<T, PropensityError>`.
//!
//! # Error Handling
//!
//! Errors fall into three kinds a caller is expected to react to, reported by
//! [`PropensityError::kind`]:
//! - **Schema**: the input table or matrix does not have the expected columns
//! - **Training**: the model could not be fitted on the data it was given
//! - **DataUnavailable**: the row source had nothing for the requested category
//!
//! Configuration mistakes and I/O failures are reported as their own kinds.
//!
//! # Example
//!
//! ```rust,ignore
//! use propensity_learning::{ErrorKind, Pipeline, ScoringRequest};
//!
//! match pipeline.run(&ScoringRequest::new("SOFT DRINKS", 0.1, 0.9)) {
//!     Ok(outcome) => println!("{} households", outcome.result.len()),
//!     Err(e) if e.kind() == ErrorKind::DataUnavailable => println!("No data: {e}"),
//!     Err(e) => return Err(e),
//! }
//! ```

use propensity_features::{FeatureError, SchemaError};
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// Training could not produce a fitted model.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum TrainingError {
    /// The training matrix has no rows or no feature columns.
    #[error("Training matrix is empty ({rows} rows x {columns} columns)")]
    EmptyMatrix { rows: usize, columns: usize },

    /// A feature column still holds text that could not be read as a number.
    ///
    /// The encoder keeps such cells as markers instead of silently zeroing
    /// them; list the column in `categorical_columns` or clean the source.
    #[error("Feature column '{column}' contains non-numeric values")]
    NonNumericFeature { column: String },

    /// Some labels could not be read as numbers.
    #[error("{rows} training labels are not numeric")]
    NonNumericLabel { rows: usize },

    /// Every training label belongs to the same class.
    #[error("Training labels contain a single class ({label}); both purchasers and non-purchasers are required")]
    SingleClass { label: f64 },

    /// The training matrix carries no label column.
    #[error("Training matrix has no labels")]
    MissingLabels,

    /// The history is too small to hold out evaluation rows and still train.
    #[error("Hold-out split of {rows} rows with test_size {test_size} leaves an empty partition")]
    TooFewRows { rows: usize, test_size: f64 },

    /// A hyperparameter is outside its accepted range.
    #[error("Invalid hyperparameter: {0}")]
    InvalidParams(String),

    /// The linear solver failed.
    #[error("Solver failed: {0}")]
    Solver(String),

    /// The network loss became NaN or infinite.
    ///
    /// Usually a sign that the learning rate is too high for the feature scale.
    #[error("Training diverged at epoch {epoch} (loss is not finite)")]
    Diverged { epoch: usize },
}

/// Kind of a [`PropensityError`], for callers that branch on the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Schema,
    Training,
    DataUnavailable,
    Config,
    Internal,
}

/// The main error type for propensity-learning operations.
///
/// This enum covers all error conditions that can occur during:
/// - Pipeline configuration and validation
/// - Fetching and encoding household records
/// - Model training
/// - Scoring and ranking
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PropensityError {
    /// A table or matrix does not match the expected feature layout.
    ///
    /// Raised when a required column is missing, or when the matrix handed to
    /// the scorer has different feature columns than the model was fitted on.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Model fitting failed.
    #[error("Training failed: {0}")]
    Training(#[from] TrainingError),

    /// The row source returned no rows for the category.
    #[error("No rows available for product category '{category}'")]
    DataUnavailable {
        /// The category that was requested.
        category: String,
    },

    /// Invalid configuration provided to the pipeline.
    ///
    /// Check the error message for details on which configuration value is invalid
    /// and what values are accepted.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Any other failure from the features crate (CSV parsing, Polars).
    #[error("Feature error: {0}")]
    Features(FeatureError),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PropensityError {
    /// Kind of failure, for callers that branch on it.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Schema(_) => ErrorKind::Schema,
            Self::Training(_) => ErrorKind::Training,
            Self::DataUnavailable { .. } => ErrorKind::DataUnavailable,
            Self::InvalidConfig(_) => ErrorKind::Config,
            Self::Features(_) | Self::Io(_) | Self::Json(_) => ErrorKind::Internal,
        }
    }

    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Schema(_) => "SCHEMA_ERROR",
            Self::Training(_) => "TRAINING_ERROR",
            Self::DataUnavailable { .. } => "DATA_UNAVAILABLE",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Features(e) => e.error_code(),
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
        }
    }
}

/// Lifts the schema, data-availability and configuration failures of the
/// features crate into the matching variants so callers see one taxonomy.
/// A split that leaves no training or evaluation rows is a training failure.
impl From<FeatureError> for PropensityError {
    fn from(err: FeatureError) -> Self {
        let lifted = matches!(
            err.root(),
            FeatureError::Schema(_)
                | FeatureError::DataUnavailable { .. }
                | FeatureError::InvalidConfig(_)
                | FeatureError::EmptyPartition { .. }
        );
        if !lifted {
            return PropensityError::Features(err);
        }
        match unwrap_context(err) {
            FeatureError::Schema(e) => PropensityError::Schema(e),
            FeatureError::DataUnavailable { category } => {
                PropensityError::DataUnavailable { category }
            }
            FeatureError::InvalidConfig(msg) => PropensityError::InvalidConfig(msg),
            FeatureError::EmptyPartition { total, test_size } => {
                PropensityError::Training(TrainingError::TooFewRows {
                    rows: total,
                    test_size,
                })
            }
            other => PropensityError::Features(other),
        }
    }
}

fn unwrap_context(err: FeatureError) -> FeatureError {
    match err {
        FeatureError::WithContext { source, .. } => unwrap_context(*source),
        other => other,
    }
}

/// Serialized as a struct with `code`, `kind` and `message` fields.
impl Serialize for PropensityError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PropensityError", 3)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for propensity operations.
pub type Result<T> = std::result::Result<T, PropensityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_code() {
        let err = PropensityError::from(TrainingError::MissingLabels);
        assert_eq!(err.kind(), ErrorKind::Training);
        assert_eq!(err.error_code(), "TRAINING_ERROR");

        let err = PropensityError::DataUnavailable {
            category: "SOFT DRINKS".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
    }

    #[test]
    fn test_feature_errors_keep_their_kind() {
        let err: PropensityError =
            FeatureError::from(SchemaError::MissingColumn("AGE_DESC".into()))
                .with_context("Encoding history")
                .into();
        assert!(matches!(
            err,
            PropensityError::Schema(SchemaError::MissingColumn(ref c)) if c == "AGE_DESC"
        ));

        let err: PropensityError = FeatureError::DataUnavailable {
            category: "PET FOOD".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);

        let err: PropensityError = FeatureError::EmptyPartition {
            total: 1,
            test_size: 0.25,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Training);
        assert!(matches!(
            err,
            PropensityError::Training(TrainingError::TooFewRows { rows: 1, .. })
        ));
    }

    #[test]
    fn test_internal_feature_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.csv");
        let err: PropensityError = FeatureError::from(io).with_context("Reading").into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.error_code(), "IO_ERROR");
    }

    #[test]
    fn test_error_serialization() {
        let err = PropensityError::from(TrainingError::Diverged { epoch: 3 });
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"code\":\"TRAINING_ERROR\""));
        assert!(json.contains("\"kind\":\"Training\""));
        assert!(json.contains("epoch 3"));
    }
}
