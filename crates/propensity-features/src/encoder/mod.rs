//! Feature encoder: household records in, [`EncodedMatrix`] out.
//!
//! The encoder drops the identifier columns (product category, date,
//! household key), label-encodes the configured categorical columns,
//! fills missing numbers with zero and coerces the label to `f64`.
//!
//! Two ways to use it:
//!
//! - [`FeatureEncoder::encode`] fits the encodings on the table it encodes,
//!   the quick path for a single table.
//! - [`FeatureEncoder::fit`] followed by [`FeatureEncoder::transform`] fits
//!   once on a reference table and reuses the same codes and column order for
//!   every later table. The fitted [`CategoryVocabulary`] can be saved and
//!   loaded with [`FeatureEncoder::from_vocabulary`].
//!
//! # Example
//!
//! ```rust,ignore
//! use propensity_features::{FeatureConfig, FeatureEncoder};
//!
//! let config = FeatureConfig::default();
//! let encoder = FeatureEncoder::fit(&config, &feature_store)?;
//! let train = encoder.transform(&feature_store)?;
//! let to_score = encoder.transform_unlabelled(&features_to_score)?;
//! ```

mod vocabulary;

pub use vocabulary::{CategoryVocabulary, LabelEncoding};

use crate::config::FeatureConfig;
use crate::error::{FeatureError, Result, ResultExt, SchemaError};
use crate::types::{EncodedMatrix, FeatureSchema, RowKey};
use crate::utils::{integer_values, numeric_values, optional_string_values, string_values};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use tracing::{debug, info, warn};

/// Vocabulary revision given to encoders fitted in-process.
const FIRST_VERSION: u32 = 1;

/// Fitted feature encoder.
///
/// Holds the configuration and the vocabulary (codes plus column order) it
/// applies. Encoding never mutates the input table.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    config: FeatureConfig,
    vocabulary: CategoryVocabulary,
}

static_assertions::assert_impl_all!(FeatureEncoder: Send, Sync);

impl FeatureEncoder {
    /// Fit encodings on `df` and encode it in one go.
    pub fn encode(config: &FeatureConfig, df: &DataFrame) -> Result<EncodedMatrix> {
        let (_, matrix) = Self::fit_transform(config, df)?;
        Ok(matrix)
    }

    /// Fit encodings on `df`, encode it, and keep the encoder for later tables.
    pub fn fit_transform(config: &FeatureConfig, df: &DataFrame) -> Result<(Self, EncodedMatrix)> {
        let encoder = Self::fit(config, df)?;
        let matrix = encoder.transform(df)?;
        Ok((encoder, matrix))
    }

    /// Fit one label encoding per categorical column and record the feature order.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MissingColumn`] if a categorical column or the
    /// label column is absent.
    pub fn fit(config: &FeatureConfig, df: &DataFrame) -> Result<Self> {
        config
            .validate()
            .map_err(|e| FeatureError::InvalidConfig(e.to_string()))?;

        require_column(df, &config.label_column)?;
        let schema = FeatureSchema::new(feature_columns(config, df));

        let mut vocabulary = CategoryVocabulary::new(FIRST_VERSION, schema);
        for column in &config.categorical_columns {
            let series = require_column(df, column)?;
            let values = string_values(series, &config.missing_token)
                .context(format!("Reading categorical column '{column}'"))?;
            let encoding = LabelEncoding::fit(column.as_str(), values.iter().map(String::as_str));
            debug!("Fitted '{}' with {} classes", column, encoding.len());
            vocabulary.insert(encoding);
        }

        info!(
            "Fitted feature encoder: {} feature columns, {} categorical, {} rows",
            vocabulary.schema.len(),
            config.categorical_columns.len(),
            df.height()
        );

        Ok(Self {
            config: config.clone(),
            vocabulary,
        })
    }

    /// Build an encoder from a previously fitted (usually persisted) vocabulary.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MissingEncoding`] if the vocabulary lacks an
    /// encoding for a configured categorical column.
    pub fn from_vocabulary(config: &FeatureConfig, vocabulary: CategoryVocabulary) -> Result<Self> {
        config
            .validate()
            .map_err(|e| FeatureError::InvalidConfig(e.to_string()))?;

        for column in &config.categorical_columns {
            vocabulary.require(column)?;
        }

        Ok(Self {
            config: config.clone(),
            vocabulary,
        })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> &CategoryVocabulary {
        &self.vocabulary
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.vocabulary.schema
    }

    pub fn into_vocabulary(self) -> CategoryVocabulary {
        self.vocabulary
    }

    /// Encode a labelled table with the fitted vocabulary.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::MissingColumn`] if the label, household key, a
    ///   categorical column or a fitted feature column is absent
    /// - [`SchemaError::FeatureMismatch`] if the table has feature columns
    ///   the encoder was not fitted on
    /// - [`SchemaError::UnseenCategory`] for unseen values under the reject policy
    pub fn transform(&self, df: &DataFrame) -> Result<EncodedMatrix> {
        self.encode_frame(df, true)
    }

    /// Encode a table whose label column may be absent (rows to score).
    ///
    /// If the label column is present it is carried along.
    pub fn transform_unlabelled(&self, df: &DataFrame) -> Result<EncodedMatrix> {
        self.encode_frame(df, false)
    }

    fn encode_frame(&self, df: &DataFrame, label_required: bool) -> Result<EncodedMatrix> {
        let config = &self.config;
        let schema = self.schema();

        for column in &config.categorical_columns {
            require_column(df, column)?;
        }

        let found = feature_columns(config, df);
        if found.iter().any(|c| schema.index_of(c).is_none()) {
            return Err(SchemaError::FeatureMismatch {
                expected: schema.len(),
                found: found.len(),
                expected_names: schema.columns().to_vec(),
                found_names: found,
            }
            .into());
        }

        let n_rows = df.height();
        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(schema.len());

        for name in schema.columns() {
            let series = require_column(df, name)?;

            if config.is_categorical(name) {
                let encoding = self.vocabulary.require(name)?;
                let values = string_values(series, &config.missing_token)
                    .context(format!("Reading categorical column '{name}'"))?;
                let (codes, unseen) = encoding.encode(&values, config.unseen_policy)?;
                if unseen > 0 {
                    warn!(
                        "Column '{}': {} values not in the fitted encoding, mapped to code {}",
                        name,
                        unseen,
                        encoding.reserved_code()
                    );
                }
                columns.push(codes);
            } else {
                let numeric = numeric_values(series)
                    .context(format!("Reading numeric column '{name}'"))?;
                if numeric.non_numeric > 0 {
                    warn!(
                        "Column '{}': {} non-numeric values survived encoding",
                        name, numeric.non_numeric
                    );
                }
                columns.push(numeric.values);
            }
        }

        let features = Array2::from_shape_fn((n_rows, columns.len()), |(row, col)| columns[col][row]);

        let labels = match df.column(&config.label_column) {
            Ok(column) => {
                let numeric = numeric_values(column.as_materialized_series())
                    .context("Reading label column")?;
                Some(Array1::from(numeric.values))
            }
            Err(_) if !label_required => None,
            Err(_) => return Err(SchemaError::MissingColumn(config.label_column.clone()).into()),
        };

        let keys = row_keys(config, df)?;

        debug!(
            "Encoded matrix: {} rows x {} features (labels: {})",
            n_rows,
            schema.len(),
            labels.is_some()
        );

        Ok(EncodedMatrix::new(schema.clone(), features, labels, keys)?)
    }
}

/// Feature columns of a table: everything except identifiers and the label, in table order.
fn feature_columns(config: &FeatureConfig, df: &DataFrame) -> Vec<String> {
    let identifiers = config.identifier_columns();
    df.get_column_names()
        .iter()
        .map(|name| name.to_string())
        .filter(|name| name != &config.label_column && !identifiers.contains(&name.as_str()))
        .collect()
}

fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|column| column.as_materialized_series())
        .map_err(|_| SchemaError::MissingColumn(name.to_string()).into())
}

/// Household key and date of every row.
fn row_keys(config: &FeatureConfig, df: &DataFrame) -> Result<Vec<RowKey>> {
    let households = integer_values(require_column(df, &config.household_column)?)
        .context("Reading household column")?;

    let dates = match df.column(&config.date_column) {
        Ok(column) => optional_string_values(column.as_materialized_series())
            .context("Reading date column")?,
        Err(_) => vec![None; df.height()],
    };

    households
        .into_iter()
        .zip(dates)
        .enumerate()
        .map(|(row, (household, date))| match household {
            Some(household) => Ok(RowKey::new(household, date)),
            None => Err(SchemaError::NullIdentifier {
                column: config.household_column.clone(),
                row,
            }
            .into()),
        })
        .collect()
}
