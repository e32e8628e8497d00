//! Random hold-out split of an encoded matrix.
//!
//! Rows are shuffled and the first `ceil(test_size * n)` of them become the
//! evaluation partition. Every row lands in exactly one partition and the
//! feature, label and key rows stay aligned.

use crate::config::SplitConfig;
use crate::error::{FeatureError, Result};
use crate::types::EncodedMatrix;
use rand::prelude::*;
use rand::rngs::StdRng;
use tracing::debug;

/// The two partitions of a split, plus the source row indices behind them.
#[derive(Debug, Clone)]
pub struct Split {
    pub train: EncodedMatrix,
    pub eval: EncodedMatrix,
    /// Source rows of `train`, in partition order.
    pub train_indices: Vec<usize>,
    /// Source rows of `eval`, in partition order.
    pub eval_indices: Vec<usize>,
}

/// Splits encoded matrices into training and evaluation partitions.
#[derive(Debug, Clone, Copy)]
pub struct DatasetSplitter {
    config: SplitConfig,
}

impl DatasetSplitter {
    /// Create a splitter, rejecting a `test_size` outside `(0, 1)`.
    pub fn new(config: SplitConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| FeatureError::InvalidConfig(e.to_string()))?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Number of evaluation rows for a matrix of `total` rows.
    pub fn eval_size(&self, total: usize) -> usize {
        (self.config.test_size * total as f64).ceil() as usize
    }

    /// Partition the rows of `matrix`.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::EmptyPartition`] when the matrix is too small
    /// for both partitions to receive a row.
    pub fn split(&self, matrix: &EncodedMatrix) -> Result<Split> {
        let total = matrix.n_rows();
        let n_eval = self.eval_size(total);

        if n_eval == 0 || n_eval >= total {
            return Err(FeatureError::EmptyPartition {
                total,
                test_size: self.config.test_size,
            });
        }

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut order: Vec<usize> = (0..total).collect();
        order.shuffle(&mut rng);
        let train_indices = order.split_off(n_eval);
        let eval_indices = order;

        debug!(
            "Split {} rows into {} training and {} evaluation rows",
            total,
            train_indices.len(),
            eval_indices.len()
        );

        Ok(Split {
            train: matrix.select_rows(&train_indices),
            eval: matrix.select_rows(&eval_indices),
            train_indices,
            eval_indices,
        })
    }
}
