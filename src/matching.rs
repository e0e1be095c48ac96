//! Per-image classification of detections and ground truths into the error taxonomy.

use crate::error::{AnalysisError, Result};
use crate::metrics::iou::iou_one_to_many;
use crate::taxonomy::{is_upgrade, ErrorType};
use crate::types::{BoundingBox, BoxRecord, Outcome};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// All ground truths and detections of one image; the unit of matching.
///
/// The group owns its records, so matching one group never touches another.
/// Records are addressed by their index inside the group.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageGroup {
    pub image_id: u64,
    pub ground_truths: Vec<BoxRecord>,
    pub detections: Vec<BoxRecord>,
}

impl ImageGroup {
    /// Create an empty group for `image_id`.
    pub fn new(image_id: u64) -> Self {
        Self {
            image_id,
            ground_truths: Vec::new(),
            detections: Vec::new(),
        }
    }

    /// Check that every record belongs to this image and ids are unique per side.
    pub fn validate(&self) -> Result<()> {
        for (collection, records) in [
            ("ground truth", &self.ground_truths),
            ("detection", &self.detections),
        ] {
            let mut seen = HashSet::with_capacity(records.len());
            for record in records {
                if record.image_id != self.image_id {
                    return Err(AnalysisError::MixedImageGroup {
                        expected: self.image_id,
                        found: record.image_id,
                    });
                }
                if !seen.insert(record.id) {
                    return Err(AnalysisError::DuplicateId {
                        collection,
                        id: record.id,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Split records into one [`ImageGroup`] per entry of `image_ids`, in that order.
///
/// Records keep their relative input order inside each group.
///
/// # Errors
///
/// Returns [`AnalysisError::UnknownImage`] if a record references an image
/// that is not listed.
pub fn group_by_image(
    image_ids: &[u64],
    ground_truths: Vec<BoxRecord>,
    detections: Vec<BoxRecord>,
) -> Result<Vec<ImageGroup>> {
    let mut groups: Vec<ImageGroup> = image_ids.iter().map(|&id| ImageGroup::new(id)).collect();
    let slots: HashMap<u64, usize> = image_ids
        .iter()
        .enumerate()
        .map(|(slot, &id)| (id, slot))
        .collect();

    for record in ground_truths {
        let slot = *slots
            .get(&record.image_id)
            .ok_or(AnalysisError::UnknownImage {
                collection: "ground truth",
                image_id: record.image_id,
            })?;
        groups[slot].ground_truths.push(record);
    }
    for record in detections {
        let slot = *slots
            .get(&record.image_id)
            .ok_or(AnalysisError::UnknownImage {
                collection: "detection",
                image_id: record.image_id,
            })?;
        groups[slot].detections.push(record);
    }

    Ok(groups)
}

/// Concatenate the records of all groups, in group order.
pub fn ungroup(groups: Vec<ImageGroup>) -> (Vec<BoxRecord>, Vec<BoxRecord>) {
    let mut ground_truths = Vec::new();
    let mut detections = Vec::new();
    for group in groups {
        ground_truths.extend(group.ground_truths);
        detections.extend(group.detections);
    }
    (ground_truths, detections)
}

/// Validate the strict/loose IoU threshold pair.
pub fn check_iou_thresholds(iou_thresh: f64, iou_loc: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&iou_thresh) || !(0.0..=1.0).contains(&iou_loc) {
        return Err(AnalysisError::InvalidThreshold(format!(
            "IoU thresholds must be between 0.0 and 1.0, got iou_thresh={} iou_loc={}",
            iou_thresh, iou_loc
        )));
    }
    if iou_loc >= iou_thresh {
        return Err(AnalysisError::InvalidParams(format!(
            "iou_loc ({}) must be lower than iou_thresh ({})",
            iou_loc, iou_thresh
        )));
    }
    Ok(())
}

/// Indices of `detections` sorted by descending score; ties keep input order.
pub fn score_order(detections: &[BoxRecord]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..detections.len()).collect();
    // sort_by is stable
    order.sort_by(|&a, &b| {
        detections[b]
            .confidence()
            .total_cmp(&detections[a].confidence())
    });
    order
}

/// Classify every ground truth and detection of one image.
///
/// Ground truths are visited in input order, detections in descending score
/// order. For each ground truth, detections are split into three sets:
///
/// * same category and IoU >= `iou_thresh`: Match, DC or LC
/// * different category and IoU >= `iou_thresh`: Cls
/// * same category and `iou_loc` <= IoU < `iou_thresh`: Loc
///
/// Cls and Loc only replace a strictly worse classification. Ground truths
/// left unclassified become Miss; detections left unclassified become Bkg.
///
/// # Errors
///
/// Fails before mutating anything if the thresholds are inconsistent, the
/// group mixes images, or an id repeats within one side.
pub fn match_image(group: &mut ImageGroup, iou_thresh: f64, iou_loc: f64) -> Result<()> {
    check_iou_thresholds(iou_thresh, iou_loc)?;
    group.validate()?;

    debug!(
        image_id = group.image_id,
        ground_truths = group.ground_truths.len(),
        detections = group.detections.len(),
        "matching image"
    );

    let ImageGroup {
        ground_truths: gts,
        detections: dts,
        ..
    } = group;

    match (gts.is_empty(), dts.is_empty()) {
        (true, true) => return Ok(()),
        (false, true) => {
            for gt in gts.iter_mut() {
                gt.classify(Outcome::FalseNegative, ErrorType::Miss, None, None);
            }
            return Ok(());
        }
        (true, false) => {
            for dt in dts.iter_mut() {
                dt.classify(Outcome::FalsePositive, ErrorType::Background, None, None);
            }
            return Ok(());
        }
        (false, false) => {}
    }

    let order = score_order(dts);
    let dt_boxes: Vec<BoundingBox> = order.iter().map(|&d| dts[d].bbox).collect();

    for gt in gts.iter_mut() {
        let ious = iou_one_to_many(&gt.bbox, &dt_boxes);

        // Positions into `order`, ascending, i.e. by descending score.
        let mut match_set = Vec::new();
        let mut cls_set = Vec::new();
        let mut loc_set = Vec::new();
        for (k, &iou) in ious.iter().enumerate() {
            let same_category = dts[order[k]].category_id == gt.category_id;
            if iou >= iou_thresh {
                if same_category {
                    match_set.push(k);
                } else {
                    cls_set.push(k);
                }
            } else if iou >= iou_loc && same_category {
                loc_set.push(k);
            }
        }

        if let (Some(&first), Some(&last)) = (match_set.first(), match_set.last()) {
            for &k in &match_set {
                let dt = &mut dts[order[k]];
                let iou = Some(ious[k]);
                let gt_matched = gt.error_type() == Some(ErrorType::Match);
                let dt_matched = dt.error_type() == Some(ErrorType::Match);

                if !gt_matched && !dt_matched {
                    dt.classify(Outcome::TruePositive, ErrorType::Match, Some(gt.id), iou);
                    gt.classify(Outcome::TruePositive, ErrorType::Match, Some(dt.id), iou);
                    continue;
                } else if gt_matched && !dt_matched {
                    dt.classify(Outcome::FalsePositive, ErrorType::DoubleCount, Some(gt.id), iou);
                }

                // Only the lowest-score qualifying detection can turn the ground truth into LC.
                if k == last
                    && gt.error_type() != Some(ErrorType::Match)
                    && dt.error_type() == Some(ErrorType::Match)
                {
                    let claimed_id = dts[order[first]].id;
                    gt.classify(
                        Outcome::FalseNegative,
                        ErrorType::LessCount,
                        Some(claimed_id),
                        iou,
                    );
                }
            }
        }

        for (set, error_type) in [(&cls_set, ErrorType::Class), (&loc_set, ErrorType::Localization)] {
            for &k in set {
                let dt = &mut dts[order[k]];
                let iou = Some(ious[k]);
                if is_upgrade(dt.error_type(), error_type) {
                    dt.classify(Outcome::FalsePositive, error_type, Some(gt.id), iou);
                }
                if is_upgrade(gt.error_type(), error_type) {
                    gt.classify(Outcome::FalseNegative, error_type, Some(dt.id), iou);
                }
            }
        }

        if gt.classification.is_none() {
            gt.classify(Outcome::FalseNegative, ErrorType::Miss, None, None);
        }
    }

    for dt in dts.iter_mut().filter(|dt| dt.classification.is_none()) {
        dt.classify(Outcome::FalsePositive, ErrorType::Background, None, None);
    }

    Ok(())
}

/// Match every group, in parallel across images.
///
/// Thresholds are checked once up front; the first failing group aborts the pass.
pub fn match_all(groups: &mut [ImageGroup], iou_thresh: f64, iou_loc: f64) -> Result<()> {
    check_iou_thresholds(iou_thresh, iou_loc)?;
    groups
        .par_iter_mut()
        .try_for_each(|group| match_image(group, iou_thresh, iou_loc))
}
