//! Score thresholding and recall-grid utilities.

use crate::error::{AnalysisError, Result};
use crate::types::DetectionResult;

/// Keep only detections whose score is at least `threshold`.
///
/// Detections without a score, or with a NaN score, are kept so that record
/// construction can report them.
///
/// # Errors
///
/// Returns an error if the threshold is not in the valid range [0.0, 1.0].
///
/// # Example
///
/// ```
/// use analytical_map::threshold::filter_by_score;
/// use analytical_map::types::DetectionResult;
///
/// let detections = vec![
///     DetectionResult {
///         id: None,
///         image_id: 1,
///         category_id: 1,
///         bbox: vec![10.0, 20.0, 30.0, 40.0],
///         score: Some(0.9),
///     },
///     DetectionResult {
///         id: None,
///         image_id: 1,
///         category_id: 1,
///         bbox: vec![50.0, 60.0, 70.0, 80.0],
///         score: Some(0.00001),
///     },
/// ];
///
/// let filtered = filter_by_score(&detections, 0.0001).unwrap();
/// assert_eq!(filtered.len(), 1);
/// ```
pub fn filter_by_score(detections: &[DetectionResult], threshold: f64) -> Result<Vec<DetectionResult>> {
    validate_threshold(threshold)?;

    Ok(detections
        .iter()
        .filter(|det| det.score.map_or(true, |score| score.is_nan() || score >= threshold))
        .cloned()
        .collect())
}

/// Generate `steps` evenly spaced values from `start` to `end`, both inclusive.
///
/// # Example
///
/// ```
/// use analytical_map::threshold::generate_threshold_range;
///
/// let points = generate_threshold_range(0.0, 1.0, 11).unwrap();
/// assert_eq!(points.len(), 11);
/// assert_eq!(points[0], 0.0);
/// assert_eq!(points[10], 1.0);
/// ```
pub fn generate_threshold_range(start: f64, end: f64, steps: usize) -> Result<Vec<f64>> {
    if steps == 0 {
        return Err(AnalysisError::InvalidThreshold(
            "Number of steps must be greater than 0".to_string(),
        ));
    }

    validate_threshold(start)?;
    validate_threshold(end)?;

    if start > end {
        return Err(AnalysisError::InvalidThreshold(format!(
            "Start threshold ({}) must be <= end threshold ({})",
            start, end
        )));
    }

    if steps == 1 {
        return Ok(vec![start]);
    }

    let step_size = (end - start) / (steps - 1) as f64;
    Ok((0..steps)
        .map(|i| {
            if i == steps - 1 {
                end
            } else {
                start + step_size * i as f64
            }
        })
        .collect())
}

/// Validate that a threshold is in the valid range [0.0, 1.0].
pub fn validate_threshold(threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(AnalysisError::InvalidThreshold(format!(
            "Threshold must be between 0.0 and 1.0, got {}",
            threshold
        )));
    }
    Ok(())
}
