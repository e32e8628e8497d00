//! Binary classification metrics.
//!
//! Labels may be purchase flags or counts; any label above zero counts as a
//! purchase.

use crate::types::EvaluationMetrics;
use ndarray::{Array1, ArrayView1};

/// Score at or above which a row is classified as a purchase.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Map labels to `1.0` (purchase) or `0.0`.
pub fn binarize(labels: ArrayView1<f64>) -> Array1<f64> {
    labels.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 })
}

/// Share of rows whose thresholded probability matches the label.
pub fn accuracy(probabilities: ArrayView1<f64>, labels: ArrayView1<f64>) -> f64 {
    if probabilities.is_empty() {
        return 0.0;
    }
    let correct = probabilities
        .iter()
        .zip(labels.iter())
        .filter(|&(&p, &y)| (p >= DECISION_THRESHOLD) == (y > 0.0))
        .count();
    correct as f64 / probabilities.len() as f64
}

/// Area under the ROC curve.
///
/// Computed from the rank-sum of positive rows, with tied scores sharing
/// their average rank. Returns `None` unless both classes are present.
pub fn roc_auc(probabilities: ArrayView1<f64>, labels: ArrayView1<f64>) -> Option<f64> {
    let n_pos = labels.iter().filter(|&&y| y > 0.0).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| probabilities[a].total_cmp(&probabilities[b]));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && probabilities[order[end]] == probabilities[order[start]] {
            end += 1;
        }
        // ranks are 1-based; the tie group [start, end) shares their mean
        let mean_rank = (start + end + 1) as f64 / 2.0;
        let positives = order[start..end]
            .iter()
            .filter(|&&i| labels[i] > 0.0)
            .count();
        positive_rank_sum += mean_rank * positives as f64;
        start = end;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Accuracy and AUC of `probabilities` against `labels`.
pub fn evaluate(probabilities: ArrayView1<f64>, labels: ArrayView1<f64>) -> EvaluationMetrics {
    EvaluationMetrics {
        rows: probabilities.len(),
        accuracy: accuracy(probabilities, labels),
        auc: roc_auc(probabilities, labels),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_binarize_counts() {
        assert_eq!(binarize(array![0.0, 1.0, 3.0, 0.0].view()), array![0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_accuracy() {
        let p = array![0.9, 0.2, 0.6, 0.4];
        let y = array![1.0, 0.0, 0.0, 0.0];
        assert!((accuracy(p.view(), y.view()) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_auc_perfect_and_inverted() {
        let y = array![1.0, 0.0, 1.0, 0.0];
        let perfect = array![0.9, 0.1, 0.8, 0.2];
        let inverted = array![0.1, 0.9, 0.2, 0.8];

        assert_eq!(roc_auc(perfect.view(), y.view()), Some(1.0));
        assert_eq!(roc_auc(inverted.view(), y.view()), Some(0.0));
    }

    #[test]
    fn test_auc_ties_count_half() {
        let y = array![1.0, 0.0];
        let p = array![0.5, 0.5];
        assert_eq!(roc_auc(p.view(), y.view()), Some(0.5));
    }

    #[test]
    fn test_auc_mixed() {
        // positives 0.8, 0.4; negatives 0.6, 0.2 -> 3 of 4 pairs ordered correctly
        let y = array![1.0, 0.0, 1.0, 0.0];
        let p = array![0.8, 0.6, 0.4, 0.2];
        assert_eq!(roc_auc(p.view(), y.view()), Some(0.75));
    }

    #[test]
    fn test_auc_single_class() {
        let y = array![1.0, 2.0];
        let p = array![0.3, 0.7];
        assert_eq!(roc_auc(p.view(), y.view()), None);
    }
}
