//! Linear variant: L2-regularised logistic regression.
//!
//! Fitted with `linfa-logistic` (L-BFGS). Scores are the predicted
//! probability of the purchase class and are never rounded.

use super::{FitContext, PropensityModel};
use crate::config::LinearParams;
use crate::error::TrainingError;
use linfa::prelude::*;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use ndarray::{Array1, ArrayView1, ArrayView2};
use tracing::debug;

/// A fitted logistic regression.
#[derive(Debug, Clone)]
pub struct LinearModel {
    inner: FittedLogisticRegression<f64, bool>,
}

impl LinearModel {
    /// Feature weights, in schema order.
    pub fn coefficients(&self) -> &Array1<f64> {
        self.inner.params()
    }

    pub fn intercept(&self) -> f64 {
        self.inner.intercept()
    }
}

impl PropensityModel for LinearModel {
    type Params = LinearParams;

    fn fit(
        features: ArrayView2<f64>,
        labels: ArrayView1<f64>,
        params: &LinearParams,
        _ctx: &mut FitContext<'_>,
    ) -> Result<Self, TrainingError> {
        params.validate()?;

        let targets: Array1<bool> = labels.mapv(|y| y > 0.0);
        let dataset = Dataset::new(features.to_owned(), targets);

        let inner = LogisticRegression::default()
            .alpha(params.alpha)
            .max_iterations(params.max_iterations)
            .fit(&dataset)
            .map_err(|e| TrainingError::Solver(e.to_string()))?;

        debug!(
            "Fitted logistic regression: intercept {:.4}, {} coefficients",
            inner.intercept(),
            inner.params().len()
        );

        Ok(Self { inner })
    }

    fn predict_proba(&self, features: ArrayView2<f64>) -> Array1<f64> {
        let probabilities = self.inner.predict_probabilities(&features);
        // the solver's positive class is whichever label it picked; report P(purchase)
        if self.inner.labels().pos.class {
            probabilities
        } else {
            probabilities.mapv(|p| 1.0 - p)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_separates_classes() {
        let x = array![[0.0, 5.0], [1.0, 1.0], [0.0, 4.0], [1.0, 0.0]];
        let y = array![1.0, 0.0, 1.0, 0.0];

        let model = LinearModel::fit(
            x.view(),
            y.view(),
            &LinearParams::default(),
            &mut FitContext::default(),
        )
        .unwrap();
        let p = model.predict_proba(x.view());

        assert!(p[0] > 0.5 && p[2] > 0.5);
        assert!(p[1] < 0.5 && p[3] < 0.5);
        assert!(p.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_count_labels_are_purchases() {
        let x = array![[3.0], [0.0], [4.0], [1.0], [5.0], [0.5]];
        let y = array![2.0, 0.0, 1.0, 0.0, 3.0, 0.0];

        let model = LinearModel::fit(
            x.view(),
            y.view(),
            &LinearParams::default(),
            &mut FitContext::default(),
        )
        .unwrap();
        let p = model.predict_proba(array![[6.0], [0.0]].view());
        assert!(p[0] > p[1]);
        assert_eq!(model.coefficients().len(), 1);
    }
}
