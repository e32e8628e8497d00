//! Ranking and range filtering of scored households.

use crate::config::RangeBounds;
use crate::error::{PropensityError, Result};
use crate::types::{RankedResult, ScoredHousehold};
use ndarray::ArrayView1;
use propensity_features::SchemaError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Probability range a score must fall in to be reported.
///
/// Both bounds are exclusive unless configured otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeFilter {
    pub lo: f64,
    pub hi: f64,
    #[serde(default)]
    pub lo_inclusive: bool,
    #[serde(default)]
    pub hi_inclusive: bool,
}

impl RangeFilter {
    /// Exclusive range `lo < p < hi`.
    ///
    /// # Errors
    ///
    /// [`PropensityError::InvalidConfig`] unless `0 <= lo <= hi <= 1`.
    pub fn new(lo: f64, hi: f64) -> Result<Self> {
        Self::with_bounds(lo, hi, RangeBounds::default())
    }

    pub fn with_bounds(lo: f64, hi: f64, bounds: RangeBounds) -> Result<Self> {
        let filter = Self {
            lo,
            hi,
            lo_inclusive: bounds.lo_inclusive,
            hi_inclusive: bounds.hi_inclusive,
        };
        filter.validate()?;
        Ok(filter)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("lo", self.lo), ("hi", self.hi)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PropensityError::InvalidConfig(format!(
                    "{name} must be between 0.0 and 1.0, got {value}"
                )));
            }
        }
        if self.lo > self.hi {
            return Err(PropensityError::InvalidConfig(format!(
                "lo ({}) must not exceed hi ({})",
                self.lo, self.hi
            )));
        }
        Ok(())
    }

    pub fn contains(&self, p: f64) -> bool {
        let above = if self.lo_inclusive { p >= self.lo } else { p > self.lo };
        let below = if self.hi_inclusive { p <= self.hi } else { p < self.hi };
        above && below
    }
}

/// Sort scored households by descending probability and keep those inside
/// `filter`.
///
/// The range filter applies first. With `dedupe` set, a household scored on
/// several rows is then reported once with its highest score inside the
/// range. Ties keep input order.
///
/// # Errors
///
/// [`SchemaError::LengthMismatch`] if `households` and `probabilities`
/// differ in length.
pub fn rank(
    households: &[i64],
    probabilities: ArrayView1<f64>,
    filter: &RangeFilter,
    dedupe: bool,
) -> Result<RankedResult> {
    if households.len() != probabilities.len() {
        return Err(SchemaError::LengthMismatch {
            left_name: "households".to_string(),
            left: households.len(),
            right_name: "probabilities".to_string(),
            right: probabilities.len(),
        }
        .into());
    }

    let mut entries: Vec<ScoredHousehold> = households
        .iter()
        .zip(probabilities.iter())
        .filter(|&(_, &probability)| filter.contains(probability))
        .map(|(&household, &probability)| ScoredHousehold::new(household, probability))
        .collect();

    if dedupe {
        let mut best: HashMap<i64, usize> = HashMap::new();
        let mut kept: Vec<ScoredHousehold> = Vec::with_capacity(entries.len());
        for entry in entries {
            match best.get(&entry.household) {
                Some(&idx) => {
                    if entry.probability > kept[idx].probability {
                        kept[idx] = entry;
                    }
                }
                None => {
                    best.insert(entry.household, kept.len());
                    kept.push(entry);
                }
            }
        }
        entries = kept;
    }

    entries.sort_by(|a, b| b.probability.total_cmp(&a.probability));

    debug!(
        "Ranked {} of {} scored rows in range ({}, {})",
        entries.len(),
        households.len(),
        filter.lo,
        filter.hi
    );

    Ok(RankedResult::from_sorted(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rank_filters_and_sorts() {
        let filter = RangeFilter::new(0.1, 0.9).unwrap();
        let result = rank(&[1, 2, 3], array![0.2, 0.9, 0.5].view(), &filter, false).unwrap();
        assert_eq!(result.to_pairs(), vec![(3, 0.5), (1, 0.2)]);
    }

    #[test]
    fn test_inclusive_bounds() {
        let filter = RangeFilter::with_bounds(
            0.2,
            0.9,
            RangeBounds {
                lo_inclusive: true,
                hi_inclusive: true,
            },
        )
        .unwrap();
        let result = rank(&[1, 2, 3], array![0.2, 0.9, 0.5].view(), &filter, false).unwrap();
        assert_eq!(result.to_pairs(), vec![(2, 0.9), (3, 0.5), (1, 0.2)]);
    }

    #[test]
    fn test_nothing_in_range_is_empty() {
        let filter = RangeFilter::new(0.6, 0.7).unwrap();
        let result = rank(&[1, 2], array![0.2, 0.9].view(), &filter, false).unwrap();
        assert_eq!(result, RankedResult::Empty);
    }

    #[test]
    fn test_empty_input_is_empty() {
        let filter = RangeFilter::new(0.0, 1.0).unwrap();
        let result = rank(&[], ndarray::Array1::zeros(0).view(), &filter, false).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_degenerate_exclusive_range() {
        let filter = RangeFilter::new(0.5, 0.5).unwrap();
        let result = rank(&[1], array![0.5].view(), &filter, false).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_length_mismatch() {
        let filter = RangeFilter::new(0.0, 1.0).unwrap();
        let err = rank(&[1, 2], array![0.5].view(), &filter, false).unwrap_err();
        assert!(matches!(
            err,
            PropensityError::Schema(SchemaError::LengthMismatch { left: 2, right: 1, .. })
        ));
    }

    #[test]
    fn test_dedupe_keeps_highest() {
        let filter = RangeFilter::new(0.0, 1.0).unwrap();
        let ids = [7, 8, 7, 9];
        let p = array![0.3, 0.4, 0.6, 0.1];

        let all = rank(&ids, p.view(), &filter, false).unwrap();
        assert_eq!(all.len(), 4);

        let deduped = rank(&ids, p.view(), &filter, true).unwrap();
        assert_eq!(deduped.to_pairs(), vec![(7, 0.6), (8, 0.4), (9, 0.1)]);
    }

    #[test]
    fn test_dedupe_keeps_highest_score_in_range() {
        let filter = RangeFilter::new(0.0, 0.8).unwrap();
        let ids = [7, 8, 7];
        let p = array![0.9, 0.5, 0.4];

        let result = rank(&ids, p.view(), &filter, true).unwrap();
        assert_eq!(result.to_pairs(), vec![(8, 0.5), (7, 0.4)]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let filter = RangeFilter::new(0.0, 1.0).unwrap();
        let result = rank(&[5, 4, 6], array![0.5, 0.5, 0.7].view(), &filter, false).unwrap();
        assert_eq!(result.to_pairs(), vec![(6, 0.7), (5, 0.5), (4, 0.5)]);
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(matches!(
            RangeFilter::new(0.8, 0.2),
            Err(PropensityError::InvalidConfig(_))
        ));
        assert!(matches!(
            RangeFilter::new(-0.1, 0.5),
            Err(PropensityError::InvalidConfig(_))
        ));
        assert!(matches!(
            RangeFilter::new(0.1, 1.5),
            Err(PropensityError::InvalidConfig(_))
        ));
        assert!(RangeFilter::new(f64::NAN, 0.5).is_err());
    }
}
