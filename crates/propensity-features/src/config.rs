//! Configuration types for feature encoding and dataset splitting.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic encoder setup.

use serde::{Deserialize, Serialize};

/// Household key column in the feature store.
pub const DEFAULT_HOUSEHOLD_COLUMN: &str = "HOUSEHOLD_KEY";
/// Product category column in the feature store.
pub const DEFAULT_CATEGORY_COLUMN: &str = "COMMODITY_DESC";
/// Transaction date column in the feature store.
pub const DEFAULT_DATE_COLUMN: &str = "DATE";
/// Purchase label column in the feature store.
pub const DEFAULT_LABEL_COLUMN: &str = "PURCHASED";

/// Demographic columns that arrive as strings and need label encoding.
pub const DEFAULT_CATEGORICAL_COLUMNS: [&str; 7] = [
    "AGE_DESC",
    "MARITAL_STATUS_CODE",
    "INCOME_DESC",
    "HOMEOWNER_DESC",
    "HH_COMP_DESC",
    "HOUSEHOLD_SIZE_DESC",
    "KID_CATEGORY_DESC",
];

/// What to do with a categorical value that has no code in a fitted vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UnseenPolicy {
    /// Fail the encode with a schema error naming the column and value
    Reject,
    /// Map every unseen value to one reserved code, one past the last fitted code
    #[default]
    Reserved,
}

/// Configuration for the feature encoder.
///
/// Use [`FeatureConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use propensity_features::config::{FeatureConfig, UnseenPolicy};
///
/// let config = FeatureConfig::builder()
///     .label_column("PURCHASES")
///     .unseen_policy(UnseenPolicy::Reject)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Household identifier column, joined back onto scores.
    /// Default: "HOUSEHOLD_KEY"
    pub household_column: String,

    /// Product category column, used to select rows for a run.
    /// Default: "COMMODITY_DESC"
    pub category_column: String,

    /// Transaction date column.
    /// Default: "DATE"
    pub date_column: String,

    /// Purchase label column (flag or count; anything above zero is a purchase).
    /// Default: "PURCHASED"
    pub label_column: String,

    /// Columns converted from strings to integer codes.
    /// Default: the seven demographic description columns
    pub categorical_columns: Vec<String>,

    /// Handling of categorical values outside a fitted vocabulary.
    /// Default: Reserved
    pub unseen_policy: UnseenPolicy,

    /// Token a null categorical cell is encoded as, so missing is its own category.
    /// Default: "nan"
    pub missing_token: String,

    /// Product categories hidden from the category enumeration.
    /// Default: ["ADULT INCONTINENCE"]
    pub excluded_categories: Vec<String>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            household_column: DEFAULT_HOUSEHOLD_COLUMN.to_string(),
            category_column: DEFAULT_CATEGORY_COLUMN.to_string(),
            date_column: DEFAULT_DATE_COLUMN.to_string(),
            label_column: DEFAULT_LABEL_COLUMN.to_string(),
            categorical_columns: DEFAULT_CATEGORICAL_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            unseen_policy: UnseenPolicy::default(),
            missing_token: "nan".to_string(),
            excluded_categories: vec!["ADULT INCONTINENCE".to_string()],
        }
    }
}

impl FeatureConfig {
    /// Create a new configuration builder.
    pub fn builder() -> FeatureConfigBuilder {
        FeatureConfigBuilder::default()
    }

    /// Columns that identify or group rows and never enter the feature matrix.
    pub fn identifier_columns(&self) -> [&str; 3] {
        [
            self.category_column.as_str(),
            self.date_column.as_str(),
            self.household_column.as_str(),
        ]
    }

    /// Returns `true` if the column is one of the configured categorical columns.
    pub fn is_categorical(&self, column: &str) -> bool {
        self.categorical_columns.iter().any(|c| c == column)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let named = [
            ("household_column", &self.household_column),
            ("category_column", &self.category_column),
            ("date_column", &self.date_column),
            ("label_column", &self.label_column),
        ];

        for (field, value) in named {
            if value.trim().is_empty() {
                return Err(ConfigValidationError::EmptyColumnName(field.to_string()));
            }
        }

        for (i, (_, a)) in named.iter().enumerate() {
            if named[i + 1..].iter().any(|(_, b)| a == b) {
                return Err(ConfigValidationError::DuplicateColumn((*a).clone()));
            }
        }

        if self.categorical_columns.is_empty() {
            return Err(ConfigValidationError::NoCategoricalColumns);
        }

        for (i, column) in self.categorical_columns.iter().enumerate() {
            if column.trim().is_empty() {
                return Err(ConfigValidationError::EmptyColumnName(
                    "categorical_columns".to_string(),
                ));
            }
            if self.categorical_columns[i + 1..].contains(column) {
                return Err(ConfigValidationError::DuplicateColumn(column.clone()));
            }
            if named.iter().any(|(_, reserved)| *reserved == column) {
                return Err(ConfigValidationError::ReservedCategorical(column.clone()));
            }
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigValidationError {
    #[error("Column name for '{0}' must not be empty")]
    EmptyColumnName(String),

    #[error("Column '{0}' is configured more than once")]
    DuplicateColumn(String),

    #[error("At least one categorical column is required")]
    NoCategoricalColumns,

    #[error("Column '{0}' is an identifier or label column and cannot be categorical")]
    ReservedCategorical(String),

    #[error("Invalid test_size: {0} (must be between 0.0 and 1.0, exclusive)")]
    InvalidTestSize(f64),
}

/// Builder for [`FeatureConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct FeatureConfigBuilder {
    household_column: Option<String>,
    category_column: Option<String>,
    date_column: Option<String>,
    label_column: Option<String>,
    categorical_columns: Option<Vec<String>>,
    unseen_policy: Option<UnseenPolicy>,
    missing_token: Option<String>,
    excluded_categories: Option<Vec<String>>,
}

impl FeatureConfigBuilder {
    /// Set the household identifier column.
    pub fn household_column(mut self, column: impl Into<String>) -> Self {
        self.household_column = Some(column.into());
        self
    }

    /// Set the product category column.
    pub fn category_column(mut self, column: impl Into<String>) -> Self {
        self.category_column = Some(column.into());
        self
    }

    /// Set the transaction date column.
    pub fn date_column(mut self, column: impl Into<String>) -> Self {
        self.date_column = Some(column.into());
        self
    }

    /// Set the label column.
    pub fn label_column(mut self, column: impl Into<String>) -> Self {
        self.label_column = Some(column.into());
        self
    }

    /// Replace the list of categorical columns.
    pub fn categorical_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categorical_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Set the policy for categorical values missing from a fitted vocabulary.
    pub fn unseen_policy(mut self, policy: UnseenPolicy) -> Self {
        self.unseen_policy = Some(policy);
        self
    }

    /// Set the token used for null categorical cells.
    pub fn missing_token(mut self, token: impl Into<String>) -> Self {
        self.missing_token = Some(token.into());
        self
    }

    /// Replace the list of product categories hidden from enumeration.
    pub fn excluded_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `FeatureConfig` or an error if validation fails.
    pub fn build(self) -> Result<FeatureConfig, ConfigValidationError> {
        let defaults = FeatureConfig::default();
        let config = FeatureConfig {
            household_column: self.household_column.unwrap_or(defaults.household_column),
            category_column: self.category_column.unwrap_or(defaults.category_column),
            date_column: self.date_column.unwrap_or(defaults.date_column),
            label_column: self.label_column.unwrap_or(defaults.label_column),
            categorical_columns: self
                .categorical_columns
                .unwrap_or(defaults.categorical_columns),
            unseen_policy: self.unseen_policy.unwrap_or_default(),
            missing_token: self.missing_token.unwrap_or(defaults.missing_token),
            excluded_categories: self
                .excluded_categories
                .unwrap_or(defaults.excluded_categories),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Configuration for the hold-out split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of rows held out for evaluation (0.0 - 1.0, exclusive).
    /// Default: 0.25
    pub test_size: f64,

    /// Seed for the row shuffle. `None` draws a fresh seed per run.
    /// Default: None
    pub seed: Option<u64>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.25,
            seed: None,
        }
    }
}

impl SplitConfig {
    /// Create a split configuration with the given evaluation fraction.
    pub fn new(test_size: f64) -> Self {
        Self {
            test_size,
            seed: None,
        }
    }

    /// Fix the shuffle seed for a reproducible split.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ConfigValidationError::InvalidTestSize(self.test_size));
        }
        Ok(())
    }
}
