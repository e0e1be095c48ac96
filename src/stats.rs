//! Classification tallies collected after a matching pass.
//!
//! Used to log a summary of the pass and to check that every record was
//! classified with a type that belongs to its side.

use crate::metrics::precision_recall::count_types;
use crate::taxonomy::ErrorType;
use crate::types::BoxRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Error types a ground truth can end with.
pub const GROUND_TRUTH_TYPES: [ErrorType; 5] = [
    ErrorType::Match,
    ErrorType::LessCount,
    ErrorType::Class,
    ErrorType::Localization,
    ErrorType::Miss,
];

/// Error types a detection can end with.
pub const DETECTION_TYPES: [ErrorType; 5] = [
    ErrorType::Match,
    ErrorType::DoubleCount,
    ErrorType::Class,
    ErrorType::Localization,
    ErrorType::Background,
];

/// Per-type counts on both sides of a matching pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationStats {
    /// Number of images matched
    pub images: usize,

    /// Number of detections dropped by the score threshold
    pub dropped_detections: usize,

    pub total_ground_truths: usize,
    pub total_detections: usize,

    pub ground_truths: BTreeMap<ErrorType, usize>,
    pub detections: BTreeMap<ErrorType, usize>,
}

impl ClassificationStats {
    /// Create a new `ClassificationStats` with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally the classifications of both record collections.
    pub fn from_records(ground_truths: &[BoxRecord], detections: &[BoxRecord]) -> Self {
        Self {
            total_ground_truths: ground_truths.len(),
            total_detections: detections.len(),
            ground_truths: count_types(ground_truths),
            detections: count_types(detections),
            ..Self::default()
        }
    }

    /// Set the number of matched images
    pub fn set_images(&mut self, count: usize) {
        self.images = count;
    }

    /// Set the number of detections dropped before matching
    pub fn set_dropped_detections(&mut self, count: usize) {
        self.dropped_detections = count;
    }

    /// Ground truths still lacking a classification
    pub fn unclassified_ground_truths(&self) -> usize {
        self.total_ground_truths
            .saturating_sub(self.ground_truths.values().sum::<usize>())
    }

    /// Detections still lacking a classification
    pub fn unclassified_detections(&self) -> usize {
        self.total_detections
            .saturating_sub(self.detections.values().sum::<usize>())
    }

    /// Number of Match pairs, taken from the ground-truth side
    pub fn matched_pairs(&self) -> usize {
        self.ground_truths.get(&ErrorType::Match).copied().unwrap_or(0)
    }

    /// Whether the tallies describe a complete, consistent pass.
    ///
    /// Every record must be classified with a type of its own side, and both
    /// sides must hold the same number of Match records.
    pub fn is_consistent(&self) -> bool {
        let side_total = |counts: &BTreeMap<ErrorType, usize>, allowed: &[ErrorType]| -> usize {
            allowed
                .iter()
                .map(|t| counts.get(t).copied().unwrap_or(0))
                .sum()
        };

        side_total(&self.ground_truths, &GROUND_TRUTH_TYPES) == self.total_ground_truths
            && side_total(&self.detections, &DETECTION_TYPES) == self.total_detections
            && self.ground_truths.get(&ErrorType::Match) == self.detections.get(&ErrorType::Match)
    }

    /// Get a formatted string summary of the statistics
    pub fn summary_string(&self) -> String {
        let render = |counts: &BTreeMap<ErrorType, usize>, allowed: &[ErrorType]| -> String {
            allowed
                .iter()
                .map(|t| format!("{}={}", t, counts.get(t).copied().unwrap_or(0)))
                .collect::<Vec<_>>()
                .join(" ")
        };

        format!(
            "ClassificationStats {{ images: {}, ground_truths: {} [{}], detections: {} [{}], dropped: {} }}",
            self.images,
            self.total_ground_truths,
            render(&self.ground_truths, &GROUND_TRUTH_TYPES),
            self.total_detections,
            render(&self.detections, &DETECTION_TYPES),
            self.dropped_detections
        )
    }
}
