//! Error types for feature encoding and data access.
//!
//! [`SchemaError`] covers every way a table can disagree with the expected
//! feature layout. [`FeatureError`] is the crate-wide error and wraps schema
//! problems together with data availability, configuration and I/O failures.
//!
//! Errors are serializable as `{ code, message }` so a presentation layer can
//! show the error kind and the offending column or category.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// A table does not have the shape the encoder or a fitted model expects.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// An expected column is absent from the input.
    #[error("Column '{0}' not found in dataset")]
    MissingColumn(String),

    /// Feature columns differ in count or order from the reference schema.
    #[error("Feature columns do not match: expected {expected} columns {expected_names:?}, found {found} columns {found_names:?}")]
    FeatureMismatch {
        expected: usize,
        found: usize,
        expected_names: Vec<String>,
        found_names: Vec<String>,
    },

    /// A categorical value has no code in the vocabulary and the policy rejects it.
    #[error("Value '{value}' in column '{column}' was not seen when the encoding was fitted")]
    UnseenCategory { column: String, value: String },

    /// The vocabulary has no encoding for a configured categorical column.
    #[error("No label encoding available for column '{0}'")]
    MissingEncoding(String),

    /// Parallel sequences have different lengths.
    #[error("Length mismatch: {left} {left_name} vs {right} {right_name}")]
    LengthMismatch {
        left_name: String,
        left: usize,
        right_name: String,
        right: usize,
    },

    /// An identifier cell is null or not an integer.
    #[error("Column '{column}' has a missing or non-integer identifier at row {row}")]
    NullIdentifier { column: String, row: usize },

    /// A feature column carries values that could not be read as numbers.
    #[error("Column '{0}' contains non-numeric values")]
    NonFiniteFeature(String),
}

/// The main error type for the features crate.
#[derive(Error, Debug)]
pub enum FeatureError {
    /// The input table does not match the expected schema.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The row source returned nothing for the selected product category.
    #[error("No rows available for product category '{category}'")]
    DataUnavailable { category: String },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A split produced a partition with no rows.
    #[error("Split of {total} rows with test_size {test_size} leaves an empty partition")]
    EmptyPartition { total: usize, test_size: f64 },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<FeatureError>,
    },
}

impl FeatureError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        FeatureError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Schema(_) => "SCHEMA_ERROR",
            Self::DataUnavailable { .. } => "DATA_UNAVAILABLE",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::EmptyPartition { .. } => "EMPTY_PARTITION",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// The innermost error, with any context layers removed.
    pub fn root(&self) -> &FeatureError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this error is a schema problem.
    pub fn is_schema(&self) -> bool {
        matches!(self.root(), Self::Schema(_))
    }
}

/// Serialized as a struct with `code` and `message` fields.
impl Serialize for FeatureError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("FeatureError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for feature operations.
pub type Result<T> = std::result::Result<T, FeatureError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| FeatureError::Polars(e).with_context(context))
    }
}
