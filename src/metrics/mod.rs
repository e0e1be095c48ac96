//! Geometry and aggregate metrics over classified records.

pub mod iou;
pub mod ap;
pub mod precision_recall;

pub use iou::{calculate_iou, iou_one_to_many};
pub use ap::{calculate_ap, calculate_ap_result, calculate_map, interpolate_precision, ApResult};
pub use precision_recall::{calculate_precision, calculate_recall, ScoreResult, TypeRatio};
