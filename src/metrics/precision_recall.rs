//! Precision and recall over classified records, with a per-type breakdown.

use crate::taxonomy::ErrorType;
use crate::types::{BoxRecord, CategorySelector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Share of a denominator attributable to each error type.
pub type TypeRatio = BTreeMap<ErrorType, f64>;

/// Precision or recall of one category selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Category name, or `all` for every category combined.
    pub category: String,
    /// `None` for every category combined.
    pub category_id: Option<u64>,
    pub score: f64,
    pub ratio: TypeRatio,
}

/// Count records per error type; unclassified records are not counted.
pub fn count_types<'a, I>(records: I) -> BTreeMap<ErrorType, usize>
where
    I: IntoIterator<Item = &'a BoxRecord>,
{
    let mut counts: BTreeMap<ErrorType, usize> = ErrorType::ALL.iter().map(|&t| (t, 0)).collect();
    for error_type in records.into_iter().filter_map(BoxRecord::error_type) {
        *counts.entry(error_type).or_insert(0) += 1;
    }
    counts
}

/// Fraction of `Match` records and the per-type ratio over `records`.
///
/// An empty selection yields a score of 0.0 and an all-zero ratio.
///
/// # Example
///
/// ```
/// use analytical_map::metrics::precision_recall::match_ratio;
/// use analytical_map::types::BoxRecord;
///
/// let (score, ratio) = match_ratio(std::iter::empty::<&BoxRecord>());
/// assert_eq!(score, 0.0);
/// assert!(ratio.values().all(|&v| v == 0.0));
/// ```
pub fn match_ratio<'a, I>(records: I) -> (f64, TypeRatio)
where
    I: IntoIterator<Item = &'a BoxRecord>,
{
    let records: Vec<&BoxRecord> = records.into_iter().collect();
    let total = records.len();
    let counts = count_types(records);

    if total == 0 {
        return (0.0, counts.keys().map(|&t| (t, 0.0)).collect());
    }

    let ratio: TypeRatio = counts
        .iter()
        .map(|(&t, &count)| (t, count as f64 / total as f64))
        .collect();
    (ratio[&ErrorType::Match], ratio)
}

/// Precision of the detections admitted by `selector`.
///
/// `precision = Match detections / all selected detections`.
pub fn calculate_precision(
    detections: &[BoxRecord],
    selector: CategorySelector,
    category: impl Into<String>,
) -> ScoreResult {
    let (score, ratio) = match_ratio(detections.iter().filter(|d| selector.admits(d.category_id)));
    ScoreResult {
        category: category.into(),
        category_id: selector.category_id(),
        score,
        ratio,
    }
}

/// Recall of the ground truths admitted by `selector`.
///
/// `recall = Match ground truths / all selected ground truths`.
pub fn calculate_recall(
    ground_truths: &[BoxRecord],
    selector: CategorySelector,
    category: impl Into<String>,
) -> ScoreResult {
    let (score, ratio) =
        match_ratio(ground_truths.iter().filter(|g| selector.admits(g.category_id)));
    ScoreResult {
        category: category.into(),
        category_id: selector.category_id(),
        score,
        ratio,
    }
}
