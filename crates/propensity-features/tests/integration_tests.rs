//! Integration tests for row sources, encoding and splitting.
//!
//! These tests run the features crate end to end on the CSV fixtures.

use pretty_assertions::assert_eq;
use propensity_features::{
    CategoryVocabulary, CsvRowSource, DatasetSplitter, FeatureConfig, FeatureEncoder,
    FeatureError, RowSource, SchemaError, SplitConfig,
};
use std::path::PathBuf;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn source() -> CsvRowSource {
    CsvRowSource::new(
        fixtures_path().join("feature_store.csv"),
        FeatureConfig::default(),
    )
    .with_features_to_score(fixtures_path().join("features_to_score.csv"))
}

// ============================================================================
// Row Source Tests
// ============================================================================

#[test]
fn test_categories_hide_excluded() {
    let categories = source().categories().unwrap();
    assert_eq!(
        categories,
        vec!["BAKED BREAD".to_string(), "SOFT DRINKS".to_string()]
    );
}

#[test]
fn test_history_and_current_rows() {
    let source = source();
    assert_eq!(source.history("SOFT DRINKS").unwrap().height(), 24);
    assert_eq!(source.history("BAKED BREAD").unwrap().height(), 8);
    assert_eq!(source.current("SOFT DRINKS").unwrap().height(), 10);
}

#[test]
fn test_missing_category_is_data_unavailable() {
    let err = source().history("PET FOOD").unwrap_err();
    assert_eq!(err.error_code(), "DATA_UNAVAILABLE");
}

// ============================================================================
// Encoding Tests
// ============================================================================

#[test]
fn test_encode_history_has_no_missing_cells() {
    let config = FeatureConfig::default();
    let history = source().history("SOFT DRINKS").unwrap();
    let matrix = FeatureEncoder::encode(&config, &history).unwrap();

    assert_eq!(matrix.n_rows(), 24);
    // 7 categorical + SPEND_30D + VISITS_90D
    assert_eq!(matrix.n_features(), 9);
    assert!(matrix.features().iter().all(|v| v.is_finite()));
    assert!(matrix.schema().index_of("HOUSEHOLD_KEY").is_none());
    assert!(matrix.schema().index_of("COMMODITY_DESC").is_none());
    assert!(matrix.schema().index_of("DATE").is_none());
    assert!(matrix.schema().index_of("PURCHASED").is_none());
}

#[test]
fn test_encode_is_deterministic() {
    let config = FeatureConfig::default();
    let history = source().history("SOFT DRINKS").unwrap();

    let a = FeatureEncoder::encode(&config, &history).unwrap();
    let b = FeatureEncoder::encode(&config, &history).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_current_rows_share_history_schema() {
    let config = FeatureConfig::default();
    let source = source();
    let encoder = FeatureEncoder::fit(&config, &source.history("SOFT DRINKS").unwrap()).unwrap();

    let current = encoder
        .transform_unlabelled(&source.current("SOFT DRINKS").unwrap())
        .unwrap();

    assert_eq!(current.schema(), encoder.schema());
    assert!(current.labels().is_none());
    assert_eq!(current.households()[8], 1001);
}

#[test]
fn test_vocabulary_survives_save_and_load() {
    let config = FeatureConfig::default();
    let history = source().history("SOFT DRINKS").unwrap();
    let (encoder, expected) = FeatureEncoder::fit_transform(&config, &history).unwrap();

    let path = std::env::temp_dir().join(format!(
        "propensity_vocabulary_{}.json",
        std::process::id()
    ));
    encoder.vocabulary().save(&path).unwrap();
    let loaded = CategoryVocabulary::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let restored = FeatureEncoder::from_vocabulary(&config, loaded).unwrap();
    assert_eq!(restored.transform(&history).unwrap(), expected);
}

#[test]
fn test_history_without_label_is_schema_error() {
    let config = FeatureConfig::default();
    let current = source().current("SOFT DRINKS").unwrap();

    let err = FeatureEncoder::encode(&config, &current).unwrap_err();
    assert!(matches!(
        err,
        FeatureError::Schema(SchemaError::MissingColumn(ref c)) if c == "PURCHASED"
    ));
}

// ============================================================================
// Splitting Tests
// ============================================================================

#[test]
fn test_split_history() {
    let config = FeatureConfig::default();
    let matrix =
        FeatureEncoder::encode(&config, &source().history("SOFT DRINKS").unwrap()).unwrap();

    let split = DatasetSplitter::new(SplitConfig::default().with_seed(7))
        .unwrap()
        .split(&matrix)
        .unwrap();

    assert_eq!(split.eval.n_rows(), 6);
    assert_eq!(split.train.n_rows(), 18);
    assert_eq!(split.train.schema(), matrix.schema());
}
