//! Analysis parameters.

use crate::error::{AnalysisError, Result};
use crate::matching::check_iou_thresholds;
use crate::threshold::{generate_threshold_range, validate_threshold};
use crate::types::AreaBucket;
use serde::{Deserialize, Serialize};

/// Upper bound of the default large-object bucket.
pub const AREA_MAX: f64 = 1e10;

/// Parameters controlling matching and aggregation.
///
/// Missing fields take their defaults when deserialized.
///
/// # Example
///
/// ```
/// use analytical_map::params::AnalysisParams;
///
/// let params = AnalysisParams::default();
/// assert_eq!(params.iou_thresh, 0.5);
/// assert_eq!(params.recall_points.len(), 11);
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    /// Strict IoU threshold for Match, DC, LC and Cls.
    pub iou_thresh: f64,
    /// Loose IoU threshold for Loc.
    pub iou_loc: f64,
    /// Detections scoring below this are dropped before matching.
    pub score_thresh: f64,
    /// Ascending recall grid used for precision interpolation.
    pub recall_points: Vec<f64>,
    /// `[lo, hi)` size buckets; the all-areas bucket is implicit.
    pub area_ranges: Vec<[f64; 2]>,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            iou_thresh: 0.5,
            iou_loc: 0.2,
            score_thresh: 0.0001,
            recall_points: default_recall_points(),
            area_ranges: vec![[0.0, 1024.0], [1024.0, 9216.0], [9216.0, AREA_MAX]],
        }
    }
}

// `i * 0.1` rather than `i / 10`: grid values such as 0.30000000000000004 decide
// which curve point a recall of exactly 0.3 interpolates from.
fn default_recall_points() -> Vec<f64> {
    (0..=10).map(|i| i as f64 * 0.1).collect()
}

impl AnalysisParams {
    /// Replace the recall grid with `steps` evenly spaced points over [0, 1].
    pub fn with_recall_steps(mut self, steps: usize) -> Result<Self> {
        self.recall_points = generate_threshold_range(0.0, 1.0, steps)?;
        Ok(self)
    }

    /// Check every parameter, failing on the first violation.
    pub fn validate(&self) -> Result<()> {
        check_iou_thresholds(self.iou_thresh, self.iou_loc)?;
        validate_threshold(self.score_thresh)?;

        if self.recall_points.is_empty() {
            return Err(AnalysisError::InvalidParams(
                "recall_points must not be empty".to_string(),
            ));
        }
        for &point in &self.recall_points {
            validate_threshold(point)?;
        }
        if self.recall_points.windows(2).any(|w| w[0] > w[1]) {
            return Err(AnalysisError::InvalidParams(
                "recall_points must be ascending".to_string(),
            ));
        }

        for &[lo, hi] in &self.area_ranges {
            if !(lo >= 0.0 && lo < hi) {
                return Err(AnalysisError::InvalidParams(format!(
                    "area range [{}, {}) must satisfy 0 <= lo < hi",
                    lo, hi
                )));
            }
        }
        Ok(())
    }

    /// The all-areas bucket followed by one bucket per configured range.
    pub fn area_buckets(&self) -> Vec<AreaBucket> {
        std::iter::once(AreaBucket::All)
            .chain(
                self.area_ranges
                    .iter()
                    .map(|&[lo, hi]| AreaBucket::Range { lo, hi }),
            )
            .collect()
    }
}
