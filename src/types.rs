//! Core data types for COCO input, classified box records and partitions.

use crate::error::{AnalysisError, Result};
use crate::taxonomy::{rank_of, ErrorType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a bounding box in COCO format (x, y, width, height).
///
/// Serialized as the COCO `[x, y, width, height]` array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Build a bounding box from a COCO `[x, y, width, height]` slice.
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        match values {
            [x, y, w, h] => Ok(Self::new(*x, *y, *w, *h)),
            _ => Err(AnalysisError::InvalidBoundingBox(format!(
                "Expected 4 values, got {}",
                values.len()
            ))),
        }
    }

    /// Get the area of the bounding box (width * height).
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Area under the pixel-inclusive convention, `(width + 1) * (height + 1)`.
    pub fn pixel_area(&self) -> f64 {
        (self.width + 1.0) * (self.height + 1.0)
    }

    /// Get the right coordinate (x + width).
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Get the bottom coordinate (y + height).
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Check that all coordinates are finite and the dimensions non-negative.
    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width >= 0.0
            && self.height >= 0.0
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([x, y, width, height]: [f64; 4]) -> Self {
        Self::new(x, y, width, height)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bbox: BoundingBox) -> Self {
        [bbox.x, bbox.y, bbox.width, bbox.height]
    }
}

/// Represents a category in the COCO dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supercategory: Option<String>,
}

/// Represents an image in the COCO dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: u64,
    pub file_name: String,
    pub height: u32,
    pub width: u32,
}

/// Represents an annotation in COCO format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: u64,
    pub image_id: u64,
    pub category_id: u64,
    /// Bounding box in [x, y, width, height] format
    pub bbox: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iscrowd: Option<u8>,
    /// Confidence score (for detections)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Annotation {
    /// Convert the bbox array to a BoundingBox struct.
    pub fn to_bbox(&self) -> Result<BoundingBox> {
        BoundingBox::from_slice(&self.bbox)
    }
}

/// Represents a complete COCO ground-truth dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CocoDataset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<Image>>,
    pub annotations: Vec<Annotation>,
    pub categories: Vec<Category>,
}

/// One entry of a COCO detection results file.
///
/// Results files usually omit `id`; the loader numbers such entries from 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub image_id: u64,
    pub category_id: u64,
    pub bbox: Vec<f64>,
    #[serde(default)]
    pub score: Option<f64>,
}

impl From<&Annotation> for DetectionResult {
    fn from(annotation: &Annotation) -> Self {
        Self {
            id: Some(annotation.id),
            image_id: annotation.image_id,
            category_id: annotation.category_id,
            bbox: annotation.bbox.clone(),
            score: annotation.score,
        }
    }
}

/// Counting outcome of a classified record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "TP")]
    TruePositive,
    #[serde(rename = "FP")]
    FalsePositive,
    #[serde(rename = "FN")]
    FalseNegative,
}

/// Matching verdict stored on a [`BoxRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub outcome: Outcome,
    pub error_type: ErrorType,
    /// Id of the counterpart record in the other collection.
    pub matched_id: Option<u64>,
    pub iou: Option<f64>,
}

/// One ground truth or one detection, together with its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxRecord {
    pub id: u64,
    pub image_id: u64,
    pub category_id: u64,
    pub bbox: BoundingBox,
    pub area: f64,
    /// Confidence score, present on detections only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default)]
    pub classification: Option<Classification>,
}

impl BoxRecord {
    /// Build an unclassified ground-truth record.
    ///
    /// The annotation's explicit `area` wins over `width * height`.
    pub fn from_ground_truth(annotation: &Annotation) -> Result<Self> {
        let bbox = checked_bbox(annotation.id, &annotation.bbox)?;
        Ok(Self {
            id: annotation.id,
            image_id: annotation.image_id,
            category_id: annotation.category_id,
            bbox,
            area: annotation.area.unwrap_or_else(|| bbox.area()),
            score: None,
            classification: None,
        })
    }

    /// Build an unclassified detection record with the given id.
    pub fn from_detection(id: u64, detection: &DetectionResult) -> Result<Self> {
        let bbox = checked_bbox(id, &detection.bbox)?;
        let score = detection
            .score
            .ok_or_else(|| AnalysisError::MissingField(format!("score on detection {}", id)))?;
        if !(0.0..=1.0).contains(&score) {
            return Err(AnalysisError::InvalidAnnotation(format!(
                "Detection {} has a score outside [0, 1]: {}",
                id, score
            )));
        }
        Ok(Self {
            id,
            image_id: detection.image_id,
            category_id: detection.category_id,
            bbox,
            area: bbox.area(),
            score: Some(score),
            classification: None,
        })
    }

    /// Confidence score, 0.0 for ground truths.
    pub fn confidence(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }

    /// Current error type, `None` while unclassified.
    pub fn error_type(&self) -> Option<ErrorType> {
        self.classification.as_ref().map(|c| c.error_type)
    }

    /// Current priority rank.
    pub fn rank(&self) -> u8 {
        rank_of(self.error_type())
    }

    pub fn is_true_positive(&self) -> bool {
        matches!(
            self.classification,
            Some(Classification {
                outcome: Outcome::TruePositive,
                ..
            })
        )
    }

    pub(crate) fn classify(
        &mut self,
        outcome: Outcome,
        error_type: ErrorType,
        matched_id: Option<u64>,
        iou: Option<f64>,
    ) {
        self.classification = Some(Classification {
            outcome,
            error_type,
            matched_id,
            iou,
        });
    }
}

/// Parse and check a raw `[x, y, w, h]` box belonging to record `id`.
pub(crate) fn checked_bbox(id: u64, values: &[f64]) -> Result<BoundingBox> {
    let bbox = BoundingBox::from_slice(values).map_err(|_| {
        AnalysisError::InvalidAnnotation(format!(
            "Annotation {} has invalid bbox length: {}",
            id,
            values.len()
        ))
    })?;
    if !bbox.is_valid() {
        return Err(AnalysisError::InvalidBoundingBox(format!(
            "Annotation {} has negative or non-finite dimensions",
            id
        )));
    }
    Ok(bbox)
}

/// Selects one category or all categories combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategorySelector {
    Specific(u64),
    All,
}

impl CategorySelector {
    pub fn admits(&self, category_id: u64) -> bool {
        match self {
            CategorySelector::Specific(id) => *id == category_id,
            CategorySelector::All => true,
        }
    }

    pub fn category_id(&self) -> Option<u64> {
        match self {
            CategorySelector::Specific(id) => Some(*id),
            CategorySelector::All => None,
        }
    }
}

/// Object-size partition over record `area`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AreaBucket {
    /// Synthetic bucket admitting every record.
    All,
    /// Half-open interval `[lo, hi)`.
    Range { lo: f64, hi: f64 },
}

impl AreaBucket {
    pub fn contains(&self, area: f64) -> bool {
        match self {
            AreaBucket::All => true,
            AreaBucket::Range { lo, hi } => *lo <= area && area < *hi,
        }
    }

    /// Report label, `area_all` or `area_{lo}_{hi}`.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AreaBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AreaBucket::All => f.write_str("area_all"),
            AreaBucket::Range { lo, hi } => write!(f, "area_{}_{}", lo, hi),
        }
    }
}
