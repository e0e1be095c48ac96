//! JSON loading utilities for COCO ground truth, detection results,
//! parameters and middle files.

use crate::error::{AnalysisError, Result};
use crate::params::AnalysisParams;
use crate::report::MiddleFile;
use crate::types::{checked_bbox, CocoDataset, DetectionResult};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// Load a COCO ground-truth dataset from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or fails validation.
///
/// # Example
///
/// ```no_run
/// use analytical_map::loader::load_from_file;
///
/// let dataset = load_from_file("annotations.json").unwrap();
/// println!("Loaded {} annotations", dataset.annotations.len());
/// ```
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<CocoDataset> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);
    let dataset: CocoDataset = serde_json::from_reader(reader)?;

    validate_dataset(&dataset)?;
    info!(
        path = %path.as_ref().display(),
        annotations = dataset.annotations.len(),
        categories = dataset.categories.len(),
        "loaded ground truth"
    );

    Ok(dataset)
}

/// Load a COCO ground-truth dataset from a JSON string.
///
/// # Example
///
/// ```
/// use analytical_map::loader::load_from_string;
///
/// let json = r#"{
///     "annotations": [],
///     "categories": [{"id": 1, "name": "person"}]
/// }"#;
/// let dataset = load_from_string(json).unwrap();
/// assert_eq!(dataset.categories.len(), 1);
/// ```
pub fn load_from_string(json_str: &str) -> Result<CocoDataset> {
    let dataset: CocoDataset = serde_json::from_str(json_str)?;
    validate_dataset(&dataset)?;
    Ok(dataset)
}

/// Detection input: a bare COCO results array or a full COCO document.
#[derive(Deserialize)]
#[serde(untagged)]
enum DetectionsFile {
    Results(Vec<DetectionResult>),
    Dataset(CocoDataset),
}

/// Load detections from a JSON file, see [`load_detections_from_string`].
pub fn load_detections_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<DetectionResult>> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);
    let parsed: DetectionsFile = serde_json::from_reader(reader)?;
    let detections = finish_detections(parsed)?;
    info!(
        path = %path.as_ref().display(),
        detections = detections.len(),
        "loaded detections"
    );
    Ok(detections)
}

/// Load detections from a JSON string.
///
/// Accepts a COCO results array or a COCO document whose annotations carry
/// scores. Every entry is renumbered by position, starting at 1.
///
/// # Example
///
/// ```
/// use analytical_map::loader::load_detections_from_string;
///
/// let json = r#"[
///     {"image_id": 1, "category_id": 1, "bbox": [0, 0, 10, 10], "score": 0.9},
///     {"image_id": 1, "category_id": 2, "bbox": [5, 5, 10, 10], "score": 0.4}
/// ]"#;
/// let detections = load_detections_from_string(json).unwrap();
/// assert_eq!(detections[1].id, Some(2));
/// ```
pub fn load_detections_from_string(json_str: &str) -> Result<Vec<DetectionResult>> {
    let parsed: DetectionsFile = serde_json::from_str(json_str)?;
    finish_detections(parsed)
}

fn finish_detections(parsed: DetectionsFile) -> Result<Vec<DetectionResult>> {
    let mut detections: Vec<DetectionResult> = match parsed {
        DetectionsFile::Results(results) => results,
        DetectionsFile::Dataset(dataset) => dataset
            .annotations
            .iter()
            .map(DetectionResult::from)
            .collect(),
    };

    for (index, detection) in detections.iter_mut().enumerate() {
        let id = index as u64 + 1;
        detection.id = Some(id);
        checked_bbox(id, &detection.bbox)?;
        if detection.score.is_none() {
            return Err(AnalysisError::MissingField(format!(
                "score on detection {}",
                id
            )));
        }
    }

    Ok(detections)
}

/// Load analysis parameters from a JSON file.
pub fn load_params_from_file<P: AsRef<Path>>(path: P) -> Result<AnalysisParams> {
    let file = File::open(path)?;
    let params: AnalysisParams = serde_json::from_reader(BufReader::new(file))?;
    params.validate()?;
    Ok(params)
}

/// Load analysis parameters from a JSON string; missing fields take defaults.
pub fn load_params_from_string(json_str: &str) -> Result<AnalysisParams> {
    let params: AnalysisParams = serde_json::from_str(json_str)?;
    params.validate()?;
    Ok(params)
}

/// Load a middle file previously written by [`crate::report::write_middle_file`].
pub fn load_middle_file_from_file<P: AsRef<Path>>(path: P) -> Result<MiddleFile> {
    let file = File::open(path)?;
    let middle: MiddleFile = serde_json::from_reader(BufReader::new(file))?;
    Ok(middle)
}

/// Load a middle file from a JSON string.
pub fn load_middle_file_from_string(json_str: &str) -> Result<MiddleFile> {
    Ok(serde_json::from_str(json_str)?)
}

/// Validate that a COCO dataset has the required structure.
fn validate_dataset(dataset: &CocoDataset) -> Result<()> {
    if dataset.categories.is_empty() {
        return Err(AnalysisError::EmptyDataset(
            "Dataset must contain at least one category".to_string(),
        ));
    }

    for annotation in &dataset.annotations {
        checked_bbox(annotation.id, &annotation.bbox)?;
    }

    Ok(())
}
