//! Scoring of encoded matrices with a fitted model.
//!
//! The [`Scorer`] checks that a matrix has exactly the feature columns the
//! model was fitted on, then produces one purchase probability per row.
//! Network scores are rounded to a fixed number of decimals; linear scores
//! are reported as the solver returns them.

use crate::config::{ModelVariant, PipelineConfig};
use crate::error::{PropensityError, Result};
use crate::model::FittedModel;
use ndarray::Array1;
use propensity_features::{EncodedMatrix, SchemaError};
use tracing::debug;

/// Decimals network scores are rounded to unless configured otherwise.
pub const DEFAULT_SCORE_PRECISION: u32 = 4;

/// Produces validated propensity scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scorer {
    precision: Option<u32>,
}

impl Default for Scorer {
    fn default() -> Self {
        Self {
            precision: Some(DEFAULT_SCORE_PRECISION),
        }
    }
}

impl Scorer {
    /// Scorer rounding network scores to `precision` decimals; `None` keeps
    /// full precision.
    pub fn new(precision: Option<u32>) -> Self {
        Self { precision }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.score_precision)
    }

    pub fn precision(&self) -> Option<u32> {
        self.precision
    }

    /// One probability in `[0, 1]` per matrix row, in row order.
    ///
    /// Pure: scoring the same model and matrix twice gives identical output.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::FeatureMismatch`] if the matrix columns differ in
    ///   count or order from the model's schema
    /// - [`SchemaError::NonFiniteFeature`] if a cell could not be read as a number
    pub fn score(&self, model: &FittedModel, matrix: &EncodedMatrix) -> Result<Array1<f64>> {
        model.schema().ensure_matches(matrix.schema())?;

        if let Some(column) = matrix.first_non_finite_column() {
            return Err(PropensityError::Schema(SchemaError::NonFiniteFeature(
                column.to_string(),
            )));
        }

        let raw = model.predict_proba(matrix.features().view());
        let scores = match (model.variant(), self.precision) {
            (ModelVariant::Network, Some(digits)) => {
                let scale = 10f64.powi(digits as i32);
                raw.mapv(|p| ((p * scale).round() / scale).clamp(0.0, 1.0))
            }
            _ => raw.mapv(|p| p.clamp(0.0, 1.0)),
        };

        debug!(
            "Scored {} rows with the {} model",
            scores.len(),
            model.variant().as_str()
        );
        Ok(scores)
    }

    /// Household identifiers paired with their scores, ready for ranking.
    pub fn score_households(
        &self,
        model: &FittedModel,
        matrix: &EncodedMatrix,
    ) -> Result<(Vec<i64>, Array1<f64>)> {
        let scores = self.score(model, matrix)?;
        Ok((matrix.households(), scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Trainer;
    use crate::config::NetworkParams;
    use crate::error::ErrorKind;
    use ndarray::array;
    use propensity_features::{FeatureSchema, RowKey};

    fn matrix(columns: &[&str], features: ndarray::Array2<f64>) -> EncodedMatrix {
        let n = features.nrows();
        let labels = Array1::from_iter((0..n).map(|i| if i % 2 == 0 { 1.0 } else { 0.0 }));
        EncodedMatrix::new(
            FeatureSchema::new(columns.iter().map(|c| c.to_string()).collect()),
            features,
            Some(labels),
            (0..n).map(|i| RowKey::new(100 + i as i64, None)).collect(),
        )
        .unwrap()
    }

    fn training() -> EncodedMatrix {
        matrix(
            &["CAT", "F1"],
            array![[0.0, 5.0], [1.0, 1.0], [0.0, 4.0], [1.0, 0.0]],
        )
    }

    fn network() -> FittedModel {
        Trainer::new(ModelVariant::Network)
            .with_network_params(NetworkParams {
                hidden_layers: vec![8, 8],
                epochs: 50,
                learning_rate: 0.01,
                ..NetworkParams::default()
            })
            .with_seed(3)
            .train(&training())
            .unwrap()
            .0
    }

    #[test]
    fn test_network_scores_are_rounded() {
        let model = network();
        let scores = Scorer::default().score(&model, &training()).unwrap();

        for p in scores.iter() {
            assert!((0.0..=1.0).contains(p));
            assert_eq!(*p, (p * 1e4).round() / 1e4);
        }
    }

    #[test]
    fn test_full_precision() {
        let model = network();
        let rounded = Scorer::new(Some(1)).score(&model, &training()).unwrap();
        let raw = Scorer::new(None).score(&model, &training()).unwrap();

        assert_eq!(raw, model.predict_proba(training().features().view()));
        for (r, p) in rounded.iter().zip(raw.iter()) {
            assert!((r - p).abs() <= 0.05 + 1e-12);
        }
    }

    #[test]
    fn test_linear_scores_unrounded() {
        let (model, _) = Trainer::new(ModelVariant::Linear).train(&training()).unwrap();
        let scores = Scorer::new(Some(1)).score(&model, &training()).unwrap();
        assert_eq!(scores, model.predict_proba(training().features().view()));
    }

    #[test]
    fn test_rescoring_is_identical() {
        let model = network();
        let scorer = Scorer::default();
        assert_eq!(
            scorer.score(&model, &training()).unwrap(),
            scorer.score(&model, &training()).unwrap()
        );
    }

    #[test]
    fn test_column_count_mismatch() {
        let (model, _) = Trainer::new(ModelVariant::Linear).train(&training()).unwrap();
        let wider = matrix(&["CAT", "F1", "F2"], array![[0.0, 5.0, 1.0], [1.0, 1.0, 0.0]]);

        let err = Scorer::default().score(&model, &wider).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(matches!(
            err,
            PropensityError::Schema(SchemaError::FeatureMismatch {
                expected: 2,
                found: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_column_order_mismatch() {
        let (model, _) = Trainer::new(ModelVariant::Linear).train(&training()).unwrap();
        let swapped = matrix(&["F1", "CAT"], array![[5.0, 0.0], [1.0, 1.0]]);
        assert!(matches!(
            Scorer::default().score(&model, &swapped),
            Err(PropensityError::Schema(SchemaError::FeatureMismatch { .. }))
        ));
    }

    #[test]
    fn test_non_numeric_cell() {
        let (model, _) = Trainer::new(ModelVariant::Linear).train(&training()).unwrap();
        let dirty = matrix(&["CAT", "F1"], array![[0.0, f64::NAN], [1.0, 1.0]]);
        assert!(matches!(
            Scorer::default().score(&model, &dirty),
            Err(PropensityError::Schema(SchemaError::NonFiniteFeature(c))) if c == "F1"
        ));
    }

    #[test]
    fn test_score_households() {
        let (model, _) = Trainer::new(ModelVariant::Linear).train(&training()).unwrap();
        let (ids, scores) = Scorer::default()
            .score_households(&model, &training())
            .unwrap();
        assert_eq!(ids, vec![100, 101, 102, 103]);
        assert_eq!(scores.len(), 4);
    }
}
