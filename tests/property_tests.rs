//! Property-based tests using proptest
//!
//! These tests verify invariants of matching and aggregation that should hold
//! for any image content.

use analytical_map::matching::{match_image, ImageGroup};
use analytical_map::metrics::ap::{calculate_ap_result, interpolate_precision};
use analytical_map::metrics::{calculate_iou, calculate_precision, calculate_recall};
use analytical_map::stats::ClassificationStats;
use analytical_map::taxonomy::{ErrorType, UNSET_RANK};
use analytical_map::types::{AreaBucket, BoundingBox, BoxRecord, CategorySelector};
use proptest::prelude::*;

const IOU_THRESH: f64 = 0.5;
const IOU_LOC: f64 = 0.2;

fn record(id: u64, category_id: u64, bbox: [f64; 4], score: Option<f64>) -> BoxRecord {
    let bbox = BoundingBox::from(bbox);
    BoxRecord {
        id,
        image_id: 1,
        category_id,
        bbox,
        area: bbox.area(),
        score,
        classification: None,
    }
}

// Integer coordinates on a small canvas keep overlaps and score ties frequent.
fn arb_box() -> impl Strategy<Value = [f64; 4]> {
    (0u32..60, 0u32..60, 0u32..30, 0u32..30)
        .prop_map(|(x, y, w, h)| [x as f64, y as f64, w as f64, h as f64])
}

fn arb_records(max: usize, scored: bool) -> impl Strategy<Value = Vec<BoxRecord>> {
    prop::collection::vec((arb_box(), 1u64..4, 1u32..20), 0..max).prop_map(move |items| {
        items
            .into_iter()
            .enumerate()
            .map(|(i, (bbox, category_id, score))| {
                record(
                    i as u64 + 1,
                    category_id,
                    bbox,
                    scored.then(|| score as f64 / 20.0),
                )
            })
            .collect()
    })
}

fn arb_group() -> impl Strategy<Value = ImageGroup> {
    (arb_records(12, false), arb_records(12, true)).prop_map(|(ground_truths, detections)| {
        ImageGroup {
            image_id: 1,
            ground_truths,
            detections,
        }
    })
}

fn matched(group: &ImageGroup) -> ImageGroup {
    let mut group = group.clone();
    match_image(&mut group, IOU_THRESH, IOU_LOC).unwrap();
    group
}

/// Best rank a record was offered by any pair it takes part in.
fn offered_rank(iou: f64, same_category: bool) -> u8 {
    match (iou >= IOU_THRESH, same_category) {
        (true, true) => ErrorType::DoubleCount.rank(),
        (true, false) => ErrorType::Class.rank(),
        (false, true) if iou >= IOU_LOC => ErrorType::Localization.rank(),
        _ => ErrorType::Background.rank(),
    }
}

// Property: matching is deterministic
proptest! {
    #[test]
    fn prop_matching_deterministic(group in arb_group()) {
        let first = matched(&group);
        let second = matched(&group);
        prop_assert_eq!(first, second);
    }
}

// Property: every record ends classified, with a type of its own side
proptest! {
    #[test]
    fn prop_totals(group in arb_group()) {
        let group = matched(&group);
        prop_assert!(group
            .ground_truths
            .iter()
            .chain(&group.detections)
            .all(|r| r.rank() < UNSET_RANK));

        let stats = ClassificationStats::from_records(&group.ground_truths, &group.detections);
        prop_assert!(stats.is_consistent(), "{}", stats.summary_string());
    }
}

// Property: Match pairs reference each other
proptest! {
    #[test]
    fn prop_match_conservation(group in arb_group()) {
        let group = matched(&group);

        for gt in group.ground_truths.iter().filter(|r| r.error_type() == Some(ErrorType::Match)) {
            let partner_id = gt.classification.as_ref().unwrap().matched_id.unwrap();
            let partner = group.detections.iter().find(|d| d.id == partner_id).unwrap();
            prop_assert_eq!(partner.error_type(), Some(ErrorType::Match));
            prop_assert_eq!(partner.classification.as_ref().unwrap().matched_id, Some(gt.id));
            prop_assert_eq!(partner.category_id, gt.category_id);
        }

        let gt_matches = group.ground_truths.iter().filter(|r| r.error_type() == Some(ErrorType::Match)).count();
        let dt_matches = group.detections.iter().filter(|r| r.error_type() == Some(ErrorType::Match)).count();
        prop_assert_eq!(gt_matches, dt_matches);
    }
}

// Property: no record ends worse than the best candidate it was offered
proptest! {
    #[test]
    fn prop_rank_monotonicity(group in arb_group()) {
        let result = matched(&group);

        for gt in &result.ground_truths {
            let best = group
                .detections
                .iter()
                .map(|dt| offered_rank(calculate_iou(&gt.bbox, &dt.bbox), gt.category_id == dt.category_id))
                .min()
                .unwrap_or(ErrorType::Miss.rank());
            prop_assert!(gt.rank() <= best, "ground truth {} has rank {} > {}", gt.id, gt.rank(), best);
        }

        for dt in &result.detections {
            let best = group
                .ground_truths
                .iter()
                .map(|gt| offered_rank(calculate_iou(&gt.bbox, &dt.bbox), gt.category_id == dt.category_id))
                .min()
                .unwrap_or(ErrorType::Background.rank());
            prop_assert!(dt.rank() <= best, "detection {} has rank {} > {}", dt.id, dt.rank(), best);
        }
    }
}

// Property: AP lies in [0, 1] and the interpolated precision never increases
proptest! {
    #[test]
    fn prop_ap_bounds(group in arb_group()) {
        let group = matched(&group);
        let recall_points: Vec<f64> = (0..=10).map(|i| i as f64 * 0.1).collect();

        let result = calculate_ap_result(
            &group.ground_truths,
            &group.detections,
            CategorySelector::All,
            AreaBucket::All,
            "all",
            &recall_points,
        );

        prop_assert!((0.0..=1.0).contains(&result.ap), "AP out of range: {}", result.ap);
        prop_assert_eq!(result.precision_inter.len(), recall_points.len());
        prop_assert!(result.precision_inter.windows(2).all(|w| w[0] >= w[1]));

        if group.ground_truths.is_empty() {
            prop_assert_eq!(result.ap, 0.0);
            prop_assert!(result.precision_raw.is_empty());
        }
    }

    #[test]
    fn prop_interpolation_envelope(
        points in prop::collection::vec((0.0f64..=1.0, 0.0f64..=1.0), 0..30)
    ) {
        let mut recall: Vec<f64> = points.iter().map(|p| p.0).collect();
        recall.sort_by(|a, b| a.total_cmp(b));
        let precision: Vec<f64> = points.iter().map(|p| p.1).collect();
        let grid: Vec<f64> = (0..=20).map(|i| i as f64 / 20.0).collect();

        let interpolated = interpolate_precision(&precision, &recall, &grid);
        prop_assert_eq!(interpolated.len(), grid.len());
        prop_assert!(interpolated.iter().all(|p| (0.0..=1.0).contains(p)));
        prop_assert!(interpolated.windows(2).all(|w| w[0] >= w[1]));
        // The padded (0, 1) point always wins at recall 0
        prop_assert_eq!(interpolated[0], 1.0);
    }
}

// Property: precision and recall are ratios, never NaN
proptest! {
    #[test]
    fn prop_precision_recall_range(group in arb_group(), category_id in 1u64..4) {
        let group = matched(&group);
        for selector in [CategorySelector::Specific(category_id), CategorySelector::All] {
            let precision = calculate_precision(&group.detections, selector, "c");
            let recall = calculate_recall(&group.ground_truths, selector, "c");
            prop_assert!((0.0..=1.0).contains(&precision.score));
            prop_assert!((0.0..=1.0).contains(&recall.score));

            let ratio_sum: f64 = precision.ratio.values().sum();
            prop_assert!(ratio_sum == 0.0 || (ratio_sum - 1.0).abs() < 1e-9);
        }
    }
}

// Property: IoU is symmetric, bounded, and 1 for identical boxes
proptest! {
    #[test]
    fn prop_iou_symmetric(a in arb_box(), b in arb_box()) {
        let a = BoundingBox::from(a);
        let b = BoundingBox::from(b);
        let ab = calculate_iou(&a, &b);
        let ba = calculate_iou(&b, &a);
        prop_assert!((ab - ba).abs() < 1e-12, "IoU should be symmetric: {} vs {}", ab, ba);
    }

    #[test]
    fn prop_iou_range(
        x1 in -100.0f64..100.0, y1 in -100.0f64..100.0, w1 in 0.0f64..100.0, h1 in 0.0f64..100.0,
        x2 in -100.0f64..100.0, y2 in -100.0f64..100.0, w2 in 0.0f64..100.0, h2 in 0.0f64..100.0
    ) {
        let iou = calculate_iou(&BoundingBox::new(x1, y1, w1, h1), &BoundingBox::new(x2, y2, w2, h2));
        prop_assert!((0.0..=1.0 + 1e-12).contains(&iou), "IoU should be in [0,1], got {}", iou);
    }

    #[test]
    fn prop_iou_identical(bbox in arb_box()) {
        let bbox = BoundingBox::from(bbox);
        prop_assert_eq!(calculate_iou(&bbox, &bbox), 1.0);
    }

    #[test]
    fn prop_bbox_area_non_negative(bbox in arb_box()) {
        let bbox = BoundingBox::from(bbox);
        prop_assert!(bbox.area() >= 0.0);
        prop_assert!(bbox.pixel_area() >= 1.0);
    }
}
