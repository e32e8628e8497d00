//! Core data types shared by the encoder, the splitter and downstream models.

use crate::error::SchemaError;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identifies the source row behind one matrix row.
///
/// The product category is fixed for a run, so household and date are
/// enough to tell feature-store rows apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowKey {
    pub household: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl RowKey {
    pub fn new(household: i64, date: Option<String>) -> Self {
        Self { household, date }
    }
}

/// Ordered feature column names of an encoded matrix.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of a column in the schema.
    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Fail unless `other` has exactly the same columns in the same order.
    pub fn ensure_matches(&self, other: &FeatureSchema) -> Result<(), SchemaError> {
        if self.columns == other.columns {
            return Ok(());
        }
        Err(SchemaError::FeatureMismatch {
            expected: self.columns.len(),
            found: other.columns.len(),
            expected_names: self.columns.clone(),
            found_names: other.columns.clone(),
        })
    }
}

/// Numeric model input built from household records.
///
/// One row per input record and one column per schema entry. Missing
/// values are already zero; a NaN cell marks text that could not be read
/// as a number and is rejected by training and scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedMatrix {
    schema: FeatureSchema,
    features: Array2<f64>,
    labels: Option<Array1<f64>>,
    keys: Vec<RowKey>,
}

impl EncodedMatrix {
    /// Assemble a matrix, checking that every part has the same row count
    /// and that the column count matches the schema.
    pub fn new(
        schema: FeatureSchema,
        features: Array2<f64>,
        labels: Option<Array1<f64>>,
        keys: Vec<RowKey>,
    ) -> Result<Self, SchemaError> {
        if features.ncols() != schema.len() {
            return Err(SchemaError::LengthMismatch {
                left_name: "schema columns".to_string(),
                left: schema.len(),
                right_name: "matrix columns".to_string(),
                right: features.ncols(),
            });
        }
        if keys.len() != features.nrows() {
            return Err(SchemaError::LengthMismatch {
                left_name: "row keys".to_string(),
                left: keys.len(),
                right_name: "matrix rows".to_string(),
                right: features.nrows(),
            });
        }
        match &labels {
            Some(labels) if labels.len() != features.nrows() => {
                return Err(SchemaError::LengthMismatch {
                    left_name: "labels".to_string(),
                    left: labels.len(),
                    right_name: "matrix rows".to_string(),
                    right: features.nrows(),
                });
            }
            _ => {}
        }

        Ok(Self {
            schema,
            features,
            labels,
            keys,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn labels(&self) -> Option<&Array1<f64>> {
        self.labels.as_ref()
    }

    pub fn keys(&self) -> &[RowKey] {
        &self.keys
    }

    /// Household identifier of every row, in row order.
    pub fn households(&self) -> Vec<i64> {
        self.keys.iter().map(|k| k.household).collect()
    }

    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    /// Name of the first column holding a non-finite cell, if any.
    pub fn first_non_finite_column(&self) -> Option<&str> {
        self.features
            .axis_iter(Axis(1))
            .position(|column| column.iter().any(|v| !v.is_finite()))
            .map(|idx| self.schema.columns()[idx].as_str())
    }

    /// New matrix holding only the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            schema: self.schema.clone(),
            features: self.features.select(Axis(0), indices),
            labels: self.labels.as_ref().map(|l| l.select(Axis(0), indices)),
            keys: indices.iter().map(|&i| self.keys[i].clone()).collect(),
        }
    }

    /// New matrix without the rows whose key is in `excluded`.
    pub fn without_keys(&self, excluded: &HashSet<RowKey>) -> Self {
        let keep: Vec<usize> = self
            .keys
            .iter()
            .enumerate()
            .filter(|(_, key)| !excluded.contains(key))
            .map(|(i, _)| i)
            .collect();
        self.select_rows(&keep)
    }
}
