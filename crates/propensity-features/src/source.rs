//! Row sources: where household records come from.
//!
//! The pipeline never opens a connection itself. It receives rows through
//! the [`RowSource`] trait, which exposes three queries:
//!
//! - the list of product categories a run can be triggered for
//! - historical feature-store rows for one category (features plus label)
//! - current rows for one category, the households to score
//!
//! [`CsvRowSource`] reads CSV exports of the two tables and [`FrameRowSource`]
//! serves DataFrames already in memory.

use crate::config::FeatureConfig;
use crate::error::{FeatureError, Result, ResultExt, SchemaError};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Source of household records for the pipeline.
pub trait RowSource: Send + Sync {
    /// Product categories available for scoring, sorted, without excluded ones.
    fn categories(&self) -> Result<Vec<String>>;

    /// Labelled feature-store rows for `category`.
    ///
    /// Returns [`FeatureError::DataUnavailable`] if there are none.
    fn history(&self, category: &str) -> Result<DataFrame>;

    /// Rows to score for `category`.
    ///
    /// Returns [`FeatureError::DataUnavailable`] if there are none.
    fn current(&self, category: &str) -> Result<DataFrame>;
}

/// Row source backed by CSV exports of the feature tables.
#[derive(Debug, Clone)]
pub struct CsvRowSource {
    feature_store: PathBuf,
    features_to_score: Option<PathBuf>,
    config: FeatureConfig,
}

impl CsvRowSource {
    /// Source reading history from `feature_store`.
    pub fn new(feature_store: impl Into<PathBuf>, config: FeatureConfig) -> Self {
        Self {
            feature_store: feature_store.into(),
            features_to_score: None,
            config,
        }
    }

    /// Also read current rows from `path`.
    pub fn with_features_to_score(mut self, path: impl Into<PathBuf>) -> Self {
        self.features_to_score = Some(path.into());
        self
    }

    pub fn feature_store(&self) -> &Path {
        &self.feature_store
    }

    pub fn features_to_score(&self) -> Option<&Path> {
        self.features_to_score.as_deref()
    }
}

impl RowSource for CsvRowSource {
    fn categories(&self) -> Result<Vec<String>> {
        let df = read_csv(&self.feature_store)?;
        distinct_categories(&df, &self.config)
    }

    fn history(&self, category: &str) -> Result<DataFrame> {
        let df = read_csv(&self.feature_store)?;
        rows_for_category(&df, &self.config, category)
    }

    fn current(&self, category: &str) -> Result<DataFrame> {
        let path = self.features_to_score.as_ref().ok_or_else(|| {
            FeatureError::InvalidConfig("no features-to-score table configured".to_string())
        })?;
        let df = read_csv(path)?;
        rows_for_category(&df, &self.config, category)
    }
}

/// Row source over DataFrames held in memory.
#[derive(Debug, Clone)]
pub struct FrameRowSource {
    feature_store: DataFrame,
    features_to_score: Option<DataFrame>,
    config: FeatureConfig,
}

impl FrameRowSource {
    pub fn new(feature_store: DataFrame, config: FeatureConfig) -> Self {
        Self {
            feature_store,
            features_to_score: None,
            config,
        }
    }

    pub fn with_features_to_score(mut self, df: DataFrame) -> Self {
        self.features_to_score = Some(df);
        self
    }
}

impl RowSource for FrameRowSource {
    fn categories(&self) -> Result<Vec<String>> {
        distinct_categories(&self.feature_store, &self.config)
    }

    fn history(&self, category: &str) -> Result<DataFrame> {
        rows_for_category(&self.feature_store, &self.config, category)
    }

    fn current(&self, category: &str) -> Result<DataFrame> {
        let df = self.features_to_score.as_ref().ok_or_else(|| {
            FeatureError::InvalidConfig("no features-to-score table configured".to_string())
        })?;
        rows_for_category(df, &self.config, category)
    }
}

/// Read a CSV file with a header row.
pub fn read_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .context(format!("Opening {}", path.display()))?
        .finish()
        .context(format!("Reading {}", path.display()))?;

    debug!(
        "Read {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );
    Ok(df)
}

/// Rows of `df` whose category column equals `category`.
pub fn rows_for_category(df: &DataFrame, config: &FeatureConfig, category: &str) -> Result<DataFrame> {
    if df.column(&config.category_column).is_err() {
        return Err(SchemaError::MissingColumn(config.category_column.clone()).into());
    }

    let rows = df
        .clone()
        .lazy()
        .filter(col(config.category_column.as_str()).eq(lit(category)))
        .collect()
        .context(format!("Filtering rows for category '{category}'"))?;

    if rows.height() == 0 {
        return Err(FeatureError::DataUnavailable {
            category: category.to_string(),
        });
    }

    info!("Fetched {} rows for category '{}'", rows.height(), category);
    Ok(rows)
}

/// Sorted distinct category names, minus the configured exclusions.
pub fn distinct_categories(df: &DataFrame, config: &FeatureConfig) -> Result<Vec<String>> {
    let column = df
        .column(&config.category_column)
        .map_err(|_| SchemaError::MissingColumn(config.category_column.clone()))?;

    let values = column.cast(&DataType::String)?;
    let names: BTreeSet<&str> = values
        .str()?
        .into_iter()
        .flatten()
        .filter(|name| !config.excluded_categories.iter().any(|e| e == *name))
        .collect();

    Ok(names.into_iter().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store() -> DataFrame {
        df!(
            "HOUSEHOLD_KEY" => &[1i64, 2, 3, 4],
            "COMMODITY_DESC" => &["SOFT DRINKS", "ADULT INCONTINENCE", "BAKED BREAD", "SOFT DRINKS"],
            "AGE_DESC" => &["35-44", "45-54", "25-34", "35-44"],
            "PURCHASED" => &[1i64, 0, 1, 0]
        )
        .unwrap()
    }

    #[test]
    fn test_categories_sorted_without_exclusions() {
        let source = FrameRowSource::new(store(), FeatureConfig::default());
        assert_eq!(
            source.categories().unwrap(),
            vec!["BAKED BREAD".to_string(), "SOFT DRINKS".to_string()]
        );
    }

    #[test]
    fn test_history_filters_category() {
        let source = FrameRowSource::new(store(), FeatureConfig::default());
        let rows = source.history("SOFT DRINKS").unwrap();

        assert_eq!(rows.height(), 2);
        let households: Vec<Option<i64>> = rows
            .column("HOUSEHOLD_KEY")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(households, vec![Some(1), Some(4)]);
    }

    #[test]
    fn test_unknown_category_is_data_unavailable() {
        let source = FrameRowSource::new(store(), FeatureConfig::default());
        let err = source.history("FROZEN PIZZA").unwrap_err();
        assert!(matches!(
            err,
            FeatureError::DataUnavailable { ref category } if category == "FROZEN PIZZA"
        ));
    }

    #[test]
    fn test_current_requires_table() {
        let source = FrameRowSource::new(store(), FeatureConfig::default());
        assert!(matches!(
            source.current("SOFT DRINKS"),
            Err(FeatureError::InvalidConfig(_))
        ));

        let source = source.with_features_to_score(store().drop("PURCHASED").unwrap());
        assert_eq!(source.current("BAKED BREAD").unwrap().height(), 1);
    }

    #[test]
    fn test_missing_category_column() {
        let df = store().drop("COMMODITY_DESC").unwrap();
        let source = FrameRowSource::new(df, FeatureConfig::default());
        assert!(source.history("SOFT DRINKS").unwrap_err().is_schema());
    }
}
