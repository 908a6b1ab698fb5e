use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::evaluation::{CategoryScore, EvaluationReport};
use crate::export::ReportExporter;

/// One CSV row per category. Undefined metrics are written as empty cells.
#[derive(Debug, Serialize)]
struct CategoryRow<'a> {
    category: &'a str,
    observations: usize,
    mean_iou: Option<f64>,
    predicted: usize,
    ground_truth: usize,
    tp_iou: usize,
    precision_iou: Option<f64>,
    recall_iou: Option<f64>,
    f1_iou: Option<f64>,
    tp_coverage: usize,
    precision_coverage: Option<f64>,
    recall_coverage: Option<f64>,
    f1_coverage: Option<f64>,
}

impl<'a> From<&'a CategoryScore> for CategoryRow<'a> {
    fn from(score: &'a CategoryScore) -> Self {
        Self {
            category: score.category.as_str(),
            observations: score.ious.len(),
            mean_iou: score.mean_iou,
            predicted: score.predicted,
            ground_truth: score.ground_truth,
            tp_iou: score.tp_iou,
            precision_iou: score.iou_rule.precision,
            recall_iou: score.iou_rule.recall,
            f1_iou: score.iou_rule.f1,
            tp_coverage: score.tp_coverage,
            precision_coverage: score.coverage_rule.precision,
            recall_coverage: score.coverage_rule.recall,
            f1_coverage: score.coverage_rule.f1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CsvExporter {
    out_dir: PathBuf,
}

impl CsvExporter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }

    pub fn render(report: &EvaluationReport) -> Result<String> {
        let mut buffer = Vec::<u8>::new();
        {
            let mut wtr = csv::Writer::from_writer(&mut buffer);
            for score in &report.categories {
                wtr.serialize(CategoryRow::from(score))
                    .context("error serializing evaluation row")?;
            }
            wtr.flush()?;
        }
        Ok(String::from_utf8(buffer)?)
    }
}

impl ReportExporter for CsvExporter {
    fn export(&self, report: &EvaluationReport) -> Result<()> {
        fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join("evaluation.csv");
        fs::write(path, Self::render(report)?)?;
        Ok(())
    }
}
