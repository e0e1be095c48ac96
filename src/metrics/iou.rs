//! Intersection over Union (IoU) calculation.
//!
//! Boxes follow the pixel-inclusive convention: a box of width `w` covers
//! `w + 1` pixel units, so every box has an area of at least 1 and the union
//! can never be zero.

use crate::types::BoundingBox;

/// Calculate the Intersection over Union (IoU) between two bounding boxes.
///
/// # Arguments
///
/// * `bbox1` - First bounding box
/// * `bbox2` - Second bounding box
///
/// # Returns
///
/// Returns a value between 0.0 (no overlap) and 1.0 (perfect overlap).
///
/// # Example
///
/// ```
/// use analytical_map::metrics::iou::calculate_iou;
/// use analytical_map::types::BoundingBox;
///
/// let bbox1 = BoundingBox::new(0.0, 0.0, 9.0, 9.0);
/// let bbox2 = BoundingBox::new(5.0, 5.0, 9.0, 9.0);
/// let iou = calculate_iou(&bbox1, &bbox2);
/// // 5x5 pixels shared out of 100 + 100 - 25
/// assert!((iou - 25.0 / 175.0).abs() < 1e-12);
/// ```
pub fn calculate_iou(bbox1: &BoundingBox, bbox2: &BoundingBox) -> f64 {
    let x_left = bbox1.x.max(bbox2.x);
    let y_top = bbox1.y.max(bbox2.y);
    let x_right = bbox1.right().min(bbox2.right());
    let y_bottom = bbox1.bottom().min(bbox2.bottom());

    let overlap_w = (x_right - x_left + 1.0).max(0.0);
    let overlap_h = (y_bottom - y_top + 1.0).max(0.0);
    let intersection_area = overlap_w * overlap_h;

    let union_area = bbox1.pixel_area() + bbox2.pixel_area() - intersection_area;
    if union_area <= 0.0 {
        return 0.0;
    }

    intersection_area / union_area
}

/// Calculate the IoU of one box against many, one value per element of `bboxes`.
///
/// # Example
///
/// ```
/// use analytical_map::metrics::iou::iou_one_to_many;
/// use analytical_map::types::BoundingBox;
///
/// let gt = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
/// let dts = vec![gt, BoundingBox::new(100.0, 100.0, 10.0, 10.0)];
/// assert_eq!(iou_one_to_many(&gt, &dts), vec![1.0, 0.0]);
/// ```
pub fn iou_one_to_many(bbox: &BoundingBox, bboxes: &[BoundingBox]) -> Vec<f64> {
    bboxes.iter().map(|other| calculate_iou(bbox, other)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_boxes() {
        let bbox1 = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let bbox2 = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let iou = calculate_iou(&bbox1, &bbox2);
        assert!((iou - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_no_overlap() {
        let bbox1 = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let bbox2 = BoundingBox::new(20.0, 20.0, 10.0, 10.0);
        assert_eq!(calculate_iou(&bbox1, &bbox2), 0.0);
    }

    #[test]
    fn test_touching_edges_share_a_pixel_row() {
        // x spans [0, 10] and [10, 20]: one shared pixel column of height 11
        let bbox1 = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let bbox2 = BoundingBox::new(10.0, 0.0, 10.0, 10.0);
        let iou = calculate_iou(&bbox1, &bbox2);
        assert!((iou - 11.0 / (121.0 + 121.0 - 11.0)).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_boxes() {
        let point = BoundingBox::new(5.0, 5.0, 0.0, 0.0);
        assert_eq!(calculate_iou(&point, &point), 1.0);

        let far = BoundingBox::new(50.0, 50.0, 0.0, 0.0);
        assert_eq!(calculate_iou(&point, &far), 0.0);
    }

    #[test]
    fn test_partial_overlap() {
        let bbox1 = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let bbox2 = BoundingBox::new(5.0, 5.0, 10.0, 10.0);
        // Intersection: 6x6 = 36, union: 121 + 121 - 36 = 206
        let iou = calculate_iou(&bbox1, &bbox2);
        assert!((iou - 36.0 / 206.0).abs() < 1e-12);
    }

    #[test]
    fn test_one_to_many_empty() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(iou_one_to_many(&bbox, &[]).is_empty());
    }
}
