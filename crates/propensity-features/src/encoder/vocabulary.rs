//! Label encodings and the persisted category vocabulary.
//!
//! A [`LabelEncoding`] maps the distinct values of one categorical column to
//! consecutive codes in sorted value order, so the same values always get the
//! same codes no matter how rows are ordered. A [`CategoryVocabulary`] bundles
//! one encoding per column with the feature column order it was fitted on,
//! and can be written to disk and reused by later runs.

use crate::config::UnseenPolicy;
use crate::error::{Result, SchemaError};
use crate::types::FeatureSchema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::info;

/// Value-to-code mapping for one categorical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoding {
    column: String,
    /// Distinct values in sorted order; a value's code is its index.
    classes: Vec<String>,
}

impl LabelEncoding {
    /// Fit an encoding from the values present in a column.
    pub fn fit<'a, I>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let classes: BTreeSet<&str> = values.into_iter().collect();
        Self {
            column: column.into(),
            classes: classes.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Code of a value seen at fit time.
    pub fn code(&self, value: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .ok()
    }

    /// Code given to values outside the fitted set under [`UnseenPolicy::Reserved`].
    pub fn reserved_code(&self) -> usize {
        self.classes.len()
    }

    /// Encode a column of values.
    ///
    /// Returns the codes and the number of values that were not seen at fit time.
    pub fn encode(
        &self,
        values: &[String],
        policy: UnseenPolicy,
    ) -> std::result::Result<(Vec<f64>, usize), SchemaError> {
        let mut unseen = 0;
        let mut codes = Vec::with_capacity(values.len());

        for value in values {
            let code = match (self.code(value), policy) {
                (Some(code), _) => code,
                (None, UnseenPolicy::Reserved) => {
                    unseen += 1;
                    self.reserved_code()
                }
                (None, UnseenPolicy::Reject) => {
                    return Err(SchemaError::UnseenCategory {
                        column: self.column.clone(),
                        value: value.clone(),
                    });
                }
            };
            codes.push(code as f64);
        }

        Ok((codes, unseen))
    }
}

/// Versioned set of label encodings plus the feature order they belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryVocabulary {
    /// Revision number, bumped by whoever refits the vocabulary.
    pub version: u32,
    /// When the encodings were fitted.
    pub fitted_at: DateTime<Utc>,
    /// Feature columns, in matrix order, of the table the vocabulary was fitted on.
    pub schema: FeatureSchema,
    encodings: BTreeMap<String, LabelEncoding>,
}

impl CategoryVocabulary {
    /// Create an empty vocabulary for the given feature order.
    pub fn new(version: u32, schema: FeatureSchema) -> Self {
        Self {
            version,
            fitted_at: Utc::now(),
            schema,
            encodings: BTreeMap::new(),
        }
    }

    /// Add or replace the encoding for a column.
    pub fn insert(&mut self, encoding: LabelEncoding) {
        self.encodings.insert(encoding.column.clone(), encoding);
    }

    /// Encoding for a column, if one was fitted.
    pub fn get(&self, column: &str) -> Option<&LabelEncoding> {
        self.encodings.get(column)
    }

    /// Encoding for a column, or a schema error naming it.
    pub fn require(&self, column: &str) -> std::result::Result<&LabelEncoding, SchemaError> {
        self.get(column)
            .ok_or_else(|| SchemaError::MissingEncoding(column.to_string()))
    }

    /// Names of the encoded columns, sorted.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.encodings.keys().map(String::as_str)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the vocabulary as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)?;
        info!(
            "Saved category vocabulary v{} ({} columns) to {}",
            self.version,
            self.encodings.len(),
            path.display()
        );
        Ok(())
    }

    /// Read a vocabulary written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let vocabulary = Self::from_json(&fs::read_to_string(path)?)?;
        info!(
            "Loaded category vocabulary v{} ({} columns) from {}",
            vocabulary.version,
            vocabulary.encodings.len(),
            path.display()
        );
        Ok(vocabulary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_fit_sorts_classes() {
        let encoding = LabelEncoding::fit("INCOME_DESC", ["50-74K", "15-24K", "50-74K", "Under 15K"]);

        assert_eq!(encoding.classes(), &strings(&["15-24K", "50-74K", "Under 15K"]));
        assert_eq!(encoding.code("15-24K"), Some(0));
        assert_eq!(encoding.code("Under 15K"), Some(2));
        assert_eq!(encoding.code("250K+"), None);
    }

    #[test]
    fn test_codes_independent_of_row_order() {
        let a = LabelEncoding::fit("AGE_DESC", ["B", "A", "C"]);
        let b = LabelEncoding::fit("AGE_DESC", ["C", "C", "A", "B"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_encode_reserved_policy() {
        let encoding = LabelEncoding::fit("AGE_DESC", ["A", "B"]);
        let (codes, unseen) = encoding
            .encode(&strings(&["B", "Z", "A"]), UnseenPolicy::Reserved)
            .unwrap();

        assert_eq!(codes, vec![1.0, 2.0, 0.0]);
        assert_eq!(unseen, 1);
    }

    #[test]
    fn test_encode_reject_policy() {
        let encoding = LabelEncoding::fit("AGE_DESC", ["A", "B"]);
        let err = encoding
            .encode(&strings(&["A", "Z"]), UnseenPolicy::Reject)
            .unwrap_err();

        assert_eq!(
            err,
            SchemaError::UnseenCategory {
                column: "AGE_DESC".to_string(),
                value: "Z".to_string()
            }
        );
    }

    #[test]
    fn test_vocabulary_json_round_trip() {
        let mut vocabulary = CategoryVocabulary::new(
            3,
            FeatureSchema::new(strings(&["AGE_DESC", "SPEND_30D"])),
        );
        vocabulary.insert(LabelEncoding::fit("AGE_DESC", ["25-34", "35-44"]));

        let restored = CategoryVocabulary::from_json(&vocabulary.to_json().unwrap()).unwrap();
        assert_eq!(restored, vocabulary);
        assert_eq!(restored.require("AGE_DESC").unwrap().len(), 2);
        assert!(restored.require("INCOME_DESC").is_err());
    }
}
