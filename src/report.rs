//! JSON dumps of classified records and aggregated results.

use crate::error::Result;
use crate::evaluator::AnalysisResults;
use crate::params::AnalysisParams;
use crate::types::{BoxRecord, Category, Image};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Classified records of a finished matching pass.
///
/// Re-loading a middle file lets aggregation run again without re-matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiddleFile {
    pub categories: Vec<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<Image>>,
    /// Classified ground truths.
    pub annotations: Vec<BoxRecord>,
    /// Classified detections.
    pub detections: Vec<BoxRecord>,
    #[serde(default)]
    pub params: AnalysisParams,
}

/// Aggregated results together with the inputs that shaped them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResults {
    pub categories: Vec<Category>,
    pub params: AnalysisParams,
    pub results: AnalysisResults,
}

/// Write a middle file as pretty JSON.
pub fn write_middle_file<W: Write>(writer: W, middle: &MiddleFile) -> Result<()> {
    write_pretty(writer, middle)
}

/// Create `path` and write a middle file into it.
pub fn write_middle_file_to_path<P: AsRef<Path>>(path: P, middle: &MiddleFile) -> Result<()> {
    write_middle_file(File::create(path)?, middle)
}

/// Write final results as pretty JSON.
pub fn write_final_results<W: Write>(writer: W, results: &FinalResults) -> Result<()> {
    write_pretty(writer, results)
}

/// Create `path` and write final results into it.
pub fn write_final_results_to_path<P: AsRef<Path>>(path: P, results: &FinalResults) -> Result<()> {
    write_final_results(File::create(path)?, results)
}

fn write_pretty<W: Write, T: Serialize>(writer: W, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
