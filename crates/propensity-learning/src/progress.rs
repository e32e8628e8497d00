//! Progress reporting types for the propensity pipeline.
//!
//! This module defines types for tracking and reporting progress during a
//! run, including [`RunStage`], [`ProgressUpdate`], and the
//! [`ProgressCallback`] type alias.
//!
//! # Overview
//!
//! Progress reporting allows you to monitor a run as it happens:
//! - Track which stage of the pipeline is currently executing
//! - Get overall progress (0.0 to 1.0)
//! - Follow network training epoch by epoch
//!
//! # Example
//!
//! ```rust,ignore
//! use propensity_learning::{Pipeline, ProgressUpdate};
//!
//! let pipeline = Pipeline::builder()
//!     .source(source)
//!     .on_progress(|update: ProgressUpdate| {
//!         println!(
//!             "[{}] {:.0}% - {}",
//!             update.stage.as_str(),
//!             update.progress * 100.0,
//!             update.message
//!         );
//!     })
//!     .build()?;
//! ```

use serde::Serialize;
use std::sync::Arc;

/// The current stage of a pipeline run.
///
/// A run progresses through these stages in order:
///
/// 1. [`Fetching`](Self::Fetching) - Reading rows from the row source
/// 2. [`Encoding`](Self::Encoding) - Building the feature matrices
/// 3. [`Splitting`](Self::Splitting) - Holding out evaluation rows (hold-out mode only)
/// 4. [`Training`](Self::Training) - Fitting the model
/// 5. [`Scoring`](Self::Scoring) - Computing propensity scores
/// 6. [`Ranking`](Self::Ranking) - Filtering and sorting the scores
/// 7. [`Complete`](Self::Complete) - Run finished successfully
///
/// Terminal states: [`Complete`](Self::Complete), [`Failed`](Self::Failed).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new stages in future versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum RunStage {
    /// Rows are being read for the requested category.
    #[default]
    Fetching,

    /// Rows are being encoded into feature matrices.
    Encoding,

    /// History is being split into training and evaluation rows.
    Splitting,

    /// The model is being fitted.
    Training,

    /// Rows are being scored.
    Scoring,

    /// Scores are being filtered and sorted.
    Ranking,

    /// The run completed successfully.
    Complete,

    /// The run failed. Check the error for details.
    Failed,
}

impl RunStage {
    /// Returns the lowercase stage name.
    ///
    /// # Examples
    ///
    /// ```
    /// use propensity_learning::RunStage;
    ///
    /// assert_eq!(RunStage::Training.as_str(), "training");
    /// assert_eq!(RunStage::Complete.as_str(), "complete");
    /// ```
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Fetching => "fetching",
            RunStage::Encoding => "encoding",
            RunStage::Splitting => "splitting",
            RunStage::Training => "training",
            RunStage::Scoring => "scoring",
            RunStage::Ranking => "ranking",
            RunStage::Complete => "complete",
            RunStage::Failed => "failed",
        }
    }

    /// Overall progress at the start of this stage.
    #[must_use]
    pub fn start_progress(&self) -> f64 {
        match self {
            RunStage::Fetching => 0.0,
            RunStage::Encoding => 0.1,
            RunStage::Splitting => 0.2,
            RunStage::Training => 0.25,
            RunStage::Scoring => 0.85,
            RunStage::Ranking => 0.95,
            RunStage::Complete | RunStage::Failed => 1.0,
        }
    }
}

/// A progress update from the pipeline.
///
/// Sent to the progress callback during a run to report current status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    /// The current stage.
    pub stage: RunStage,

    /// Overall progress from 0.0 to 1.0, increasing monotonically.
    pub progress: f64,

    /// Human-readable status message.
    pub message: String,

    /// Product category of the run.
    pub category: Option<String>,

    /// Network epochs completed and total: `(completed, total)`.
    ///
    /// Only populated during [`Training`](RunStage::Training) of the network variant.
    pub epochs_completed: Option<(usize, usize)>,
}

impl Default for ProgressUpdate {
    fn default() -> Self {
        Self {
            stage: RunStage::default(),
            progress: 0.0,
            message: String::new(),
            category: None,
            epochs_completed: None,
        }
    }
}

/// Type alias for a progress callback function.
///
/// Callbacks must be thread-safe (`Send + Sync`) so a pipeline can be shared
/// across threads. The callback should return quickly; it runs inline with
/// the pipeline.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STAGES: [RunStage; 8] = [
        RunStage::Fetching,
        RunStage::Encoding,
        RunStage::Splitting,
        RunStage::Training,
        RunStage::Scoring,
        RunStage::Ranking,
        RunStage::Complete,
        RunStage::Failed,
    ];

    #[test]
    fn test_start_progress_is_monotonic() {
        let progress: Vec<f64> = ALL_STAGES[..7].iter().map(|s| s.start_progress()).collect();
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(RunStage::Complete.start_progress(), 1.0);
    }

    #[test]
    fn test_progress_update_default() {
        let update = ProgressUpdate::default();
        assert_eq!(update.stage, RunStage::Fetching);
        assert_eq!(update.progress, 0.0);
        assert!(update.message.is_empty());
        assert!(update.epochs_completed.is_none());
    }
}
