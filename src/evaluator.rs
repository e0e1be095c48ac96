//! Analysis orchestrator: record construction, matching and aggregation.

use crate::error::{AnalysisError, Result};
use crate::matching::{group_by_image, match_all, ungroup};
use crate::metrics::ap::{calculate_ap_result, calculate_map, ApResult};
use crate::metrics::precision_recall::{calculate_precision, calculate_recall, ScoreResult};
use crate::params::AnalysisParams;
use crate::report::{FinalResults, MiddleFile};
use crate::stats::ClassificationStats;
use crate::threshold::filter_by_score;
use crate::types::{
    AreaBucket, BoxRecord, Category, CategorySelector, CocoDataset, DetectionResult, Image,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};

/// Label of the every-category selector in reports.
pub const ALL_CATEGORIES: &str = "all";

/// Precision, recall and AP of every partition.
///
/// Entries follow the category list in id order, then the every-category
/// entry. AP entries repeat that order for each area bucket, all-areas first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub precision: Vec<ScoreResult>,
    pub recall: Vec<ScoreResult>,
    pub ap: Vec<ApResult>,
}

impl AnalysisResults {
    /// Mean AP over the individual categories in the all-areas bucket.
    ///
    /// The every-category entry is excluded so it is not counted twice.
    pub fn map(&self) -> f64 {
        let all_areas = AreaBucket::All.label();
        let aps: Vec<f64> = self
            .ap
            .iter()
            .filter(|r| r.category_id.is_some() && r.area == all_areas)
            .map(|r| r.ap)
            .collect();
        calculate_map(&aps)
    }

    /// AP entry for a category (`None` for every category) and area bucket.
    pub fn ap_for(&self, category_id: Option<u64>, bucket: AreaBucket) -> Option<&ApResult> {
        let area = bucket.label();
        self.ap
            .iter()
            .find(|r| r.category_id == category_id && r.area == area)
    }

    pub fn precision_for(&self, category_id: Option<u64>) -> Option<&ScoreResult> {
        self.precision.iter().find(|r| r.category_id == category_id)
    }

    pub fn recall_for(&self, category_id: Option<u64>) -> Option<&ScoreResult> {
        self.recall.iter().find(|r| r.category_id == category_id)
    }
}

/// Everything produced by a full run of [`evaluate`].
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Classified ground truths, in image-id order.
    pub ground_truths: Vec<BoxRecord>,
    /// Classified detections, in image-id order.
    pub detections: Vec<BoxRecord>,
    pub stats: ClassificationStats,
    pub results: AnalysisResults,
}

/// Runs the two stages of an analysis: [`Evaluator::evaluate`] classifies
/// every record, [`Evaluator::calculate`] aggregates the classifications.
#[derive(Debug, Clone)]
pub struct Evaluator {
    params: AnalysisParams,
    categories: Vec<Category>,
    images: Option<Vec<Image>>,
    image_ids: Vec<u64>,
    ground_truths: Vec<BoxRecord>,
    detections: Vec<BoxRecord>,
    stats: ClassificationStats,
    evaluated: bool,
}

impl Evaluator {
    /// Build an evaluator over a ground-truth dataset and detection results.
    ///
    /// Detections scoring below `params.score_thresh` are dropped, then the
    /// rest are numbered by position starting at 1. Ids carried by the input
    /// are not used.
    ///
    /// # Errors
    ///
    /// Fails on invalid parameters, an empty category list, malformed boxes,
    /// detections without a score, duplicate ground-truth ids, or
    /// records whose image is missing from the dataset's image list.
    pub fn new(
        ground_truth: &CocoDataset,
        detections: &[DetectionResult],
        params: AnalysisParams,
    ) -> Result<Self> {
        params.validate()?;
        if ground_truth.categories.is_empty() {
            return Err(AnalysisError::EmptyDataset(
                "Ground truth must contain at least one category".to_string(),
            ));
        }

        let gts = ground_truth
            .annotations
            .iter()
            .map(BoxRecord::from_ground_truth)
            .collect::<Result<Vec<_>>>()?;

        // Kept detections are renumbered 1..=N; input ids are ignored.
        let kept = filter_by_score(detections, params.score_thresh)?;
        let dropped = detections.len() - kept.len();
        let dts = kept
            .iter()
            .enumerate()
            .map(|(index, det)| BoxRecord::from_detection(index as u64 + 1, det))
            .collect::<Result<Vec<_>>>()?;

        info!(
            ground_truths = gts.len(),
            detections = dts.len(),
            dropped,
            score_thresh = params.score_thresh,
            "built records"
        );

        let mut evaluator = Self::assemble(
            params,
            ground_truth.categories.clone(),
            ground_truth.images.clone(),
            gts,
            dts,
        )?;
        evaluator.stats.set_dropped_detections(dropped);
        Ok(evaluator)
    }

    /// Rebuild an evaluated analyzer from a middle file.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::NotEvaluated`] if any record lacks a
    /// classification, plus every structural error of [`Evaluator::new`].
    pub fn from_middle_file(middle: MiddleFile) -> Result<Self> {
        middle.params.validate()?;
        let unclassified = middle
            .annotations
            .iter()
            .chain(&middle.detections)
            .filter(|r| r.classification.is_none())
            .count();
        if unclassified > 0 {
            return Err(AnalysisError::NotEvaluated(format!(
                "middle file has {} unclassified records",
                unclassified
            )));
        }

        let mut evaluator = Self::assemble(
            middle.params,
            middle.categories,
            middle.images,
            middle.annotations,
            middle.detections,
        )?;
        evaluator.stats = ClassificationStats::from_records(
            &evaluator.ground_truths,
            &evaluator.detections,
        );
        evaluator.stats.set_images(evaluator.image_ids.len());
        evaluator.evaluated = true;
        info!(summary = %evaluator.stats.summary_string(), "loaded middle file");
        Ok(evaluator)
    }

    fn assemble(
        params: AnalysisParams,
        categories: Vec<Category>,
        images: Option<Vec<Image>>,
        ground_truths: Vec<BoxRecord>,
        detections: Vec<BoxRecord>,
    ) -> Result<Self> {
        check_unique_ids("ground truth", &ground_truths)?;
        check_unique_ids("detection", &detections)?;

        let image_ids: Vec<u64> = match &images {
            Some(images) => images
                .iter()
                .map(|image| image.id)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            None => ground_truths
                .iter()
                .chain(&detections)
                .map(|r| r.image_id)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        };
        check_known_images("ground truth", &image_ids, &ground_truths)?;
        check_known_images("detection", &image_ids, &detections)?;

        let category_ids: HashSet<u64> = categories.iter().map(|c| c.id).collect();
        let stray = ground_truths
            .iter()
            .chain(&detections)
            .filter(|r| !category_ids.contains(&r.category_id))
            .count();
        if stray > 0 {
            warn!(
                records = stray,
                "records reference categories missing from the category list"
            );
        }

        let mut categories = categories;
        categories.sort_by_key(|c| c.id);

        Ok(Self {
            params,
            categories,
            images,
            image_ids,
            ground_truths,
            detections,
            stats: ClassificationStats::new(),
            evaluated: false,
        })
    }

    pub fn params(&self) -> &AnalysisParams {
        &self.params
    }

    /// Categories in id order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Images taking part in matching, in id order.
    pub fn image_ids(&self) -> &[u64] {
        &self.image_ids
    }

    pub fn ground_truths(&self) -> &[BoxRecord] {
        &self.ground_truths
    }

    pub fn detections(&self) -> &[BoxRecord] {
        &self.detections
    }

    pub fn stats(&self) -> &ClassificationStats {
        &self.stats
    }

    pub fn is_evaluated(&self) -> bool {
        self.evaluated
    }

    /// Classify every ground truth and detection, one image at a time.
    ///
    /// Images are matched in parallel and their records concatenated back in
    /// image-id order. Calling this again once it has succeeded does nothing.
    /// On error the records are left untouched.
    pub fn evaluate(&mut self) -> Result<()> {
        if self.evaluated {
            info!("records already classified, skipping matching");
            return Ok(());
        }

        let mut groups = group_by_image(
            &self.image_ids,
            self.ground_truths.clone(),
            self.detections.clone(),
        )?;
        match_all(&mut groups, self.params.iou_thresh, self.params.iou_loc)?;

        let (ground_truths, detections) = ungroup(groups);
        let dropped = self.stats.dropped_detections;
        self.stats = ClassificationStats::from_records(&ground_truths, &detections);
        self.stats.set_images(self.image_ids.len());
        self.stats.set_dropped_detections(dropped);
        debug_assert!(self.stats.is_consistent());

        self.ground_truths = ground_truths;
        self.detections = detections;
        self.evaluated = true;

        info!(summary = %self.stats.summary_string(), "matching finished");
        Ok(())
    }

    /// Aggregate precision, recall and AP over every partition.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::NotEvaluated`] before [`Evaluator::evaluate`]
    /// has succeeded.
    pub fn calculate(&self) -> Result<AnalysisResults> {
        if !self.evaluated {
            return Err(AnalysisError::NotEvaluated(
                "call evaluate() before calculate()".to_string(),
            ));
        }

        let selectors: Vec<(CategorySelector, String)> = self
            .categories
            .iter()
            .map(|c| (CategorySelector::Specific(c.id), category_label(c)))
            .chain(std::iter::once((
                CategorySelector::All,
                ALL_CATEGORIES.to_string(),
            )))
            .collect();

        let precision: Vec<ScoreResult> = selectors
            .par_iter()
            .map(|(selector, label)| calculate_precision(&self.detections, *selector, label.as_str()))
            .collect();
        let recall: Vec<ScoreResult> = selectors
            .par_iter()
            .map(|(selector, label)| calculate_recall(&self.ground_truths, *selector, label.as_str()))
            .collect();

        let buckets = self.params.area_buckets();
        let partitions: Vec<(AreaBucket, &(CategorySelector, String))> = selectors
            .iter()
            .flat_map(|selector| buckets.iter().map(move |&bucket| (bucket, selector)))
            .collect();

        let ap: Vec<ApResult> = partitions
            .par_iter()
            .map(|(bucket, (selector, label))| {
                let result = calculate_ap_result(
                    &self.ground_truths,
                    &self.detections,
                    *selector,
                    *bucket,
                    label.as_str(),
                    &self.params.recall_points,
                );
                debug!(category = %label, area = %bucket, ap = result.ap, "partition done");
                result
            })
            .collect();

        let results = AnalysisResults {
            precision,
            recall,
            ap,
        };
        info!(map = results.map(), partitions = partitions.len(), "aggregation finished");
        Ok(results)
    }

    /// Snapshot of the current records for [`crate::report::write_middle_file`].
    pub fn to_middle_file(&self) -> MiddleFile {
        MiddleFile {
            categories: self.categories.clone(),
            images: self.images.clone(),
            annotations: self.ground_truths.clone(),
            detections: self.detections.clone(),
            params: self.params.clone(),
        }
    }

    /// Bundle `results` for [`crate::report::write_final_results`].
    pub fn final_results(&self, results: AnalysisResults) -> FinalResults {
        FinalResults {
            categories: self.categories.clone(),
            params: self.params.clone(),
            results,
        }
    }

    /// Consume the evaluator, pairing its records with `results`.
    pub fn into_analysis(self, results: AnalysisResults) -> Analysis {
        Analysis {
            ground_truths: self.ground_truths,
            detections: self.detections,
            stats: self.stats,
            results,
        }
    }
}

/// Match and aggregate in one call.
///
/// Uses [`AnalysisParams::default`] when `params` is `None`.
///
/// # Example
///
/// ```
/// use analytical_map::evaluator::evaluate;
/// use analytical_map::types::{Annotation, Category, CocoDataset, DetectionResult};
///
/// let ground_truth = CocoDataset {
///     images: None,
///     annotations: vec![Annotation {
///         id: 1,
///         image_id: 1,
///         category_id: 1,
///         bbox: vec![0.0, 0.0, 10.0, 10.0],
///         area: None,
///         iscrowd: None,
///         score: None,
///     }],
///     categories: vec![Category { id: 1, name: "cat".to_string(), supercategory: None }],
/// };
/// let detections = vec![DetectionResult {
///     id: None,
///     image_id: 1,
///     category_id: 1,
///     bbox: vec![0.0, 0.0, 10.0, 10.0],
///     score: Some(0.9),
/// }];
///
/// let analysis = evaluate(&ground_truth, &detections, None).unwrap();
/// assert_eq!(analysis.results.map(), 1.0);
/// ```
pub fn evaluate(
    ground_truth: &CocoDataset,
    detections: &[DetectionResult],
    params: Option<AnalysisParams>,
) -> Result<Analysis> {
    let mut evaluator = Evaluator::new(ground_truth, detections, params.unwrap_or_default())?;
    evaluator.evaluate()?;
    let results = evaluator.calculate()?;
    Ok(evaluator.into_analysis(results))
}

fn category_label(category: &Category) -> String {
    if category.name.is_empty() {
        category.id.to_string()
    } else {
        category.name.clone()
    }
}

fn check_unique_ids(collection: &'static str, records: &[BoxRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    match records.iter().find(|r| !seen.insert(r.id)) {
        Some(record) => Err(AnalysisError::DuplicateId {
            collection,
            id: record.id,
        }),
        None => Ok(()),
    }
}

fn check_known_images(collection: &'static str, image_ids: &[u64], records: &[BoxRecord]) -> Result<()> {
    match records
        .iter()
        .find(|r| image_ids.binary_search(&r.image_id).is_err())
    {
        Some(record) => Err(AnalysisError::UnknownImage {
            collection,
            image_id: record.image_id,
        }),
        None => Ok(()),
    }
}
