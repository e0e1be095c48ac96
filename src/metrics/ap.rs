//! Average Precision (AP) with per-error-type attribution.
//!
//! AP is the mean of the interpolated precision over a fixed recall grid. The
//! raw precision-recall curve is padded with `(recall 0, precision 1)` and
//! `(recall 1, precision 0)`, sampled at the first point whose recall reaches
//! each grid value, and turned into a non-increasing envelope.

use crate::metrics::precision_recall::TypeRatio;
use crate::taxonomy::ErrorType;
use crate::types::{AreaBucket, BoxRecord, CategorySelector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw precision-recall curve, one point per detection in descending score order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrecisionRecallCurve {
    pub scores: Vec<f64>,
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
}

/// AP of one (category, area) partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApResult {
    /// Category name, or `all` for every category combined.
    pub category: String,
    /// `None` for every category combined.
    pub category_id: Option<u64>,
    /// Area bucket label.
    pub area: String,
    pub ap: f64,
    /// Normalized AP gain per error type, see [`normalize_attribution`].
    pub ratio: TypeRatio,
    pub scores: Vec<f64>,
    pub precision_raw: Vec<f64>,
    pub recall_raw: Vec<f64>,
    pub recall_inter: Vec<f64>,
    pub precision_inter: Vec<f64>,
}

/// Whether `record` counts as a true positive, treating `relabel` as one too.
fn counts_as_true_positive(record: &BoxRecord, relabel: Option<ErrorType>) -> bool {
    record.is_true_positive() || (relabel.is_some() && record.error_type() == relabel)
}

/// Build the raw precision-recall curve.
///
/// Detections are walked by descending score (stable). With `relabel` set,
/// every detection classified as that type also counts as a true positive;
/// the records themselves are never modified.
///
/// Returns an empty curve when there are no ground truths.
pub fn precision_recall_curve(
    detections: &[&BoxRecord],
    num_ground_truths: usize,
    relabel: Option<ErrorType>,
) -> PrecisionRecallCurve {
    if num_ground_truths == 0 {
        return PrecisionRecallCurve::default();
    }

    let mut sorted: Vec<&BoxRecord> = detections.to_vec();
    sorted.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));

    let mut curve = PrecisionRecallCurve {
        scores: Vec::with_capacity(sorted.len()),
        precision: Vec::with_capacity(sorted.len()),
        recall: Vec::with_capacity(sorted.len()),
    };
    let mut tp = 0usize;
    for (k, detection) in sorted.iter().enumerate() {
        if counts_as_true_positive(detection, relabel) {
            tp += 1;
        }
        curve.scores.push(detection.confidence());
        curve.precision.push(tp as f64 / (k + 1) as f64);
        curve.recall.push(tp as f64 / num_ground_truths as f64);
    }
    curve
}

/// Interpolate precision at every value of `recall_points`.
///
/// For each grid value the precision of the first padded point whose recall
/// is at least that value is taken, then the sequence is made non-increasing
/// by scanning backward from the high-recall end.
///
/// # Example
///
/// ```
/// use analytical_map::metrics::ap::interpolate_precision;
///
/// let precision = vec![1.0, 0.5, 0.67];
/// let recall = vec![0.5, 0.5, 1.0];
/// let interpolated = interpolate_precision(&precision, &recall, &[0.0, 0.5, 1.0]);
/// assert_eq!(interpolated, vec![1.0, 1.0, 0.67]);
/// ```
pub fn interpolate_precision(precision: &[f64], recall: &[f64], recall_points: &[f64]) -> Vec<f64> {
    let padded_precision: Vec<f64> = std::iter::once(1.0)
        .chain(precision.iter().copied())
        .chain(std::iter::once(0.0))
        .collect();
    let padded_recall: Vec<f64> = std::iter::once(0.0)
        .chain(recall.iter().copied())
        .chain(std::iter::once(1.0))
        .collect();

    let mut interpolated: Vec<f64> = recall_points
        .iter()
        .map(|&r| {
            let idx = padded_recall.partition_point(|&x| x < r);
            padded_precision.get(idx).copied().unwrap_or(0.0)
        })
        .collect();

    for i in (0..interpolated.len().saturating_sub(1)).rev() {
        interpolated[i] = interpolated[i].max(interpolated[i + 1]);
    }
    interpolated
}

/// Calculate Average Precision as the mean of interpolated precision values.
///
/// # Example
///
/// ```
/// use analytical_map::metrics::ap::calculate_ap;
///
/// assert_eq!(calculate_ap(&[1.0, 1.0, 0.5, 0.5]), 0.75);
/// assert_eq!(calculate_ap(&[]), 0.0);
/// ```
pub fn calculate_ap(interpolated_precision: &[f64]) -> f64 {
    if interpolated_precision.is_empty() {
        return 0.0;
    }
    interpolated_precision.iter().sum::<f64>() / interpolated_precision.len() as f64
}

/// Calculate mean Average Precision (mAP) across multiple classes.
///
/// # Example
///
/// ```
/// use analytical_map::metrics::ap::calculate_map;
///
/// let class_aps = vec![0.8, 0.9, 0.75, 0.85];
/// let map = calculate_map(&class_aps);
/// assert!((map - 0.825).abs() < 1e-10);
/// ```
pub fn calculate_map(class_aps: &[f64]) -> f64 {
    if class_aps.is_empty() {
        return 0.0;
    }

    class_aps.iter().sum::<f64>() / class_aps.len() as f64
}

/// Interpolated curve and AP for one labeling of the detections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApCurve {
    pub raw: PrecisionRecallCurve,
    pub precision_inter: Vec<f64>,
    pub ap: f64,
}

/// Compute the interpolated curve and AP, zero-filled when there are no ground truths.
pub fn calculate_ap_curve(
    detections: &[&BoxRecord],
    num_ground_truths: usize,
    recall_points: &[f64],
    relabel: Option<ErrorType>,
) -> ApCurve {
    if num_ground_truths == 0 {
        return ApCurve {
            raw: PrecisionRecallCurve::default(),
            precision_inter: vec![0.0; recall_points.len()],
            ap: 0.0,
        };
    }

    let raw = precision_recall_curve(detections, num_ground_truths, relabel);
    let precision_inter = interpolate_precision(&raw.precision, &raw.recall, recall_points);
    let ap = calculate_ap(&precision_inter);
    ApCurve {
        raw,
        precision_inter,
        ap,
    }
}

/// Turn per-type AP values into a proportional cost breakdown.
///
/// `Match` keeps its own AP, every other type gets `AP_T - AP_Match`. Nonzero
/// entries are divided by the sum of all entries so the breakdown sums to 1;
/// zero entries, and every entry of an all-zero input, stay 0.
pub fn normalize_attribution(ap_by_type: &BTreeMap<ErrorType, f64>) -> TypeRatio {
    let ap_match = ap_by_type.get(&ErrorType::Match).copied().unwrap_or(0.0);
    let gains: TypeRatio = ErrorType::ALL
        .iter()
        .map(|&t| {
            let ap = ap_by_type.get(&t).copied().unwrap_or(ap_match);
            let gain = if t == ErrorType::Match { ap } else { ap - ap_match };
            (t, gain)
        })
        .collect();

    let total: f64 = gains.values().sum();
    gains
        .into_iter()
        .map(|(t, gain)| {
            let share = if gain != 0.0 && total != 0.0 {
                gain / total
            } else {
                0.0
            };
            (t, share)
        })
        .collect()
}

/// AP of one (category, area) partition, with per-error-type attribution.
///
/// Only records admitted by both `selector` and `bucket` take part.
pub fn calculate_ap_result(
    ground_truths: &[BoxRecord],
    detections: &[BoxRecord],
    selector: CategorySelector,
    bucket: AreaBucket,
    category: impl Into<String>,
    recall_points: &[f64],
) -> ApResult {
    let admitted = |record: &&BoxRecord| {
        selector.admits(record.category_id) && bucket.contains(record.area)
    };
    let num_ground_truths = ground_truths.iter().filter(admitted).count();
    let selected: Vec<&BoxRecord> = detections.iter().filter(admitted).collect();

    let base = calculate_ap_curve(&selected, num_ground_truths, recall_points, None);
    let ap_by_type: BTreeMap<ErrorType, f64> = ErrorType::ALL
        .iter()
        .map(|&t| {
            let ap = if t == ErrorType::Match {
                base.ap
            } else {
                calculate_ap_curve(&selected, num_ground_truths, recall_points, Some(t)).ap
            };
            (t, ap)
        })
        .collect();

    ApResult {
        category: category.into(),
        category_id: selector.category_id(),
        area: bucket.label(),
        ap: base.ap,
        ratio: normalize_attribution(&ap_by_type),
        scores: base.raw.scores,
        precision_raw: base.raw.precision,
        recall_raw: base.raw.recall,
        recall_inter: recall_points.to_vec(),
        precision_inter: base.precision_inter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, Outcome};

    const ELEVEN_POINTS: [f64; 11] = [0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];

    fn detection(id: u64, score: f64, error_type: ErrorType) -> BoxRecord {
        let outcome = if error_type == ErrorType::Match {
            Outcome::TruePositive
        } else {
            Outcome::FalsePositive
        };
        let mut record = BoxRecord {
            id,
            image_id: 1,
            category_id: 1,
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            area: 100.0,
            score: Some(score),
            classification: None,
        };
        record.classify(outcome, error_type, None, None);
        record
    }

    #[test]
    fn test_curve_sorted_by_score() {
        let dts = vec![
            detection(1, 0.3, ErrorType::Background),
            detection(2, 0.9, ErrorType::Match),
            detection(3, 0.6, ErrorType::Match),
        ];
        let refs: Vec<&BoxRecord> = dts.iter().collect();
        let curve = precision_recall_curve(&refs, 2, None);

        assert_eq!(curve.scores, vec![0.9, 0.6, 0.3]);
        assert_eq!(curve.recall, vec![0.5, 1.0, 1.0]);
        assert!((curve.precision[2] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_curve_without_ground_truths_is_empty() {
        let dts = vec![detection(1, 0.3, ErrorType::Background)];
        let refs: Vec<&BoxRecord> = dts.iter().collect();
        assert_eq!(precision_recall_curve(&refs, 0, None), PrecisionRecallCurve::default());
    }

    #[test]
    fn test_interpolation_envelope() {
        // Sawtooth: FP then TP, TP at half recall
        let precision = vec![0.0, 0.5, 2.0 / 3.0];
        let recall = vec![0.0, 0.5, 1.0];
        let interpolated = interpolate_precision(&precision, &recall, &ELEVEN_POINTS);

        assert_eq!(interpolated.len(), 11);
        // recall 0.0 hits the padded sentinel (precision 1.0)
        assert_eq!(interpolated[0], 1.0);
        for window in interpolated.windows(2) {
            assert!(window[0] >= window[1]);
        }
        assert!((interpolated[1] - 2.0 / 3.0).abs() < 1e-12);
        assert!((interpolated[10] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_interpolation_falls_back_to_end_sentinel() {
        // Recall never reaches 1.0, so the last grid point takes the 0.0 sentinel.
        let interpolated = interpolate_precision(&[1.0], &[0.5], &[0.0, 0.5, 1.0]);
        assert_eq!(interpolated, vec![1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_calculate_map_empty() {
        assert_eq!(calculate_map(&[]), 0.0);
    }

    #[test]
    fn test_perfect_ap() {
        let dts = vec![detection(1, 0.9, ErrorType::Match)];
        let refs: Vec<&BoxRecord> = dts.iter().collect();
        let curve = calculate_ap_curve(&refs, 1, &ELEVEN_POINTS, None);
        assert!((curve.ap - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_ground_truths_zero_filled() {
        let dts = vec![detection(1, 0.9, ErrorType::Background)];
        let refs: Vec<&BoxRecord> = dts.iter().collect();
        let curve = calculate_ap_curve(&refs, 0, &ELEVEN_POINTS, None);
        assert_eq!(curve.ap, 0.0);
        assert!(curve.raw.scores.is_empty());
        assert_eq!(curve.precision_inter, vec![0.0; 11]);
    }

    #[test]
    fn test_relabel_raises_ap_without_touching_records() {
        let dts = vec![
            detection(1, 0.9, ErrorType::Localization),
            detection(2, 0.8, ErrorType::Match),
        ];
        let refs: Vec<&BoxRecord> = dts.iter().collect();
        let base = calculate_ap_curve(&refs, 2, &ELEVEN_POINTS, None);
        let relabeled = calculate_ap_curve(&refs, 2, &ELEVEN_POINTS, Some(ErrorType::Localization));

        assert!(relabeled.ap > base.ap);
        assert!((relabeled.ap - 1.0).abs() < 1e-12);
        assert_eq!(dts[0].error_type(), Some(ErrorType::Localization));
        assert!(!dts[0].is_true_positive());
    }

    #[test]
    fn test_normalize_attribution() {
        let ap_by_type: BTreeMap<ErrorType, f64> = ErrorType::ALL
            .iter()
            .map(|&t| match t {
                ErrorType::Match => (t, 0.5),
                ErrorType::Localization => (t, 0.75),
                ErrorType::Background => (t, 0.75),
                _ => (t, 0.5),
            })
            .collect();
        let ratio = normalize_attribution(&ap_by_type);

        assert!((ratio[&ErrorType::Match] - 0.5).abs() < 1e-12);
        assert!((ratio[&ErrorType::Localization] - 0.25).abs() < 1e-12);
        assert!((ratio[&ErrorType::Background] - 0.25).abs() < 1e-12);
        assert_eq!(ratio[&ErrorType::Class], 0.0);
        assert!((ratio.values().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_attribution_all_zero() {
        let ap_by_type: BTreeMap<ErrorType, f64> =
            ErrorType::ALL.iter().map(|&t| (t, 0.0)).collect();
        let ratio = normalize_attribution(&ap_by_type);
        assert!(ratio.values().all(|&v| v == 0.0));
    }

    #[test]
    fn test_ap_result_respects_area_bucket() {
        let mut small = detection(1, 0.9, ErrorType::Match);
        small.area = 10.0;
        let large = detection(2, 0.8, ErrorType::Background);
        let dts = vec![small.clone(), large];
        let gts = vec![small];

        let result = calculate_ap_result(
            &gts,
            &dts,
            CategorySelector::Specific(1),
            AreaBucket::Range { lo: 0.0, hi: 50.0 },
            "person",
            &ELEVEN_POINTS,
        );
        assert_eq!(result.area, "area_0_50");
        assert_eq!(result.scores, vec![0.9]);
        assert!((result.ap - 1.0).abs() < 1e-12);

        let empty = calculate_ap_result(
            &gts,
            &dts,
            CategorySelector::Specific(1),
            AreaBucket::Range { lo: 50.0, hi: 1e10 },
            "person",
            &ELEVEN_POINTS,
        );
        assert_eq!(empty.ap, 0.0);
        assert!(empty.precision_raw.is_empty());
        assert_eq!(empty.recall_inter.len(), 11);
    }
}
