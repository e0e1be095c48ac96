//! # analytical-map
//!
//! Object detection evaluation that explains *why* a detector loses AP.
//!
//! Every ground truth and every detection is classified into a closed error
//! taxonomy:
//! - **Match**: correct category, IoU above the strict threshold
//! - **LC** (less count): several ground truths claimed by one detection
//! - **DC** (double count): a ground truth already claimed by a stronger detection
//! - **Cls**: right place, wrong category
//! - **Loc**: right category, only loosely overlapping
//! - **Bkg** / **Miss**: unmatched detection / unmatched ground truth
//!
//! From these classifications the library computes per-category precision and
//! recall, interpolated AP per (category, area) partition, and the share of
//! AP each error type would recover if it were forgiven.
//!
//! ## Quick Start
//!
//! ```rust
//! use analytical_map::evaluator::evaluate;
//! use analytical_map::loader::{load_detections_from_string, load_from_string};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ground_truth = load_from_string(r#"{
//!     "annotations": [
//!         {"id": 1, "image_id": 1, "category_id": 1, "bbox": [10, 10, 50, 50]}
//!     ],
//!     "categories": [{"id": 1, "name": "person"}]
//! }"#)?;
//! let detections = load_detections_from_string(r#"[
//!     {"image_id": 1, "category_id": 1, "bbox": [12, 10, 50, 50], "score": 0.9}
//! ]"#)?;
//!
//! let analysis = evaluate(&ground_truth, &detections, None)?;
//! println!("mAP: {:.4}", analysis.results.map());
//! println!("{}", analysis.stats.summary_string());
//! # Ok(())
//! # }
//! ```
//!
//! ## Two-stage workflow
//!
//! [`Evaluator::evaluate`] classifies the records and
//! [`Evaluator::calculate`] aggregates them. The classified records can be
//! dumped with [`report::write_middle_file`] and re-loaded later with
//! [`Evaluator::from_middle_file`] to aggregate again without re-matching.
//!
//! ## Logging
//!
//! The library emits `tracing` events and never installs a subscriber.

pub mod error;
pub mod types;
pub mod taxonomy;
pub mod params;
pub mod loader;
pub mod threshold;
pub mod metrics;
pub mod matching;
pub mod stats;
pub mod evaluator;
pub mod report;

// Re-export commonly used types and functions
pub use error::{AnalysisError, Result};
pub use evaluator::{evaluate, Analysis, AnalysisResults, Evaluator};
pub use loader::{load_detections_from_file, load_from_file, load_from_string};
pub use params::AnalysisParams;
pub use stats::ClassificationStats;
pub use taxonomy::ErrorType;
pub use types::{
    Annotation, AreaBucket, BoundingBox, BoxRecord, Category, CategorySelector, CocoDataset,
    DetectionResult, Image,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_compiles() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(bbox.is_valid());
        assert_eq!(ErrorType::Match.rank(), 0);
    }
}
