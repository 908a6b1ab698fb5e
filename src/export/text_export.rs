use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use anyhow::Result;

use crate::evaluation::{EvaluationReport, Prf};
use crate::export::ReportExporter;

#[derive(Debug, Clone)]
pub struct TextExporter {
    out_dir: PathBuf,
}

impl TextExporter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }

    /// Plain-text table: one row per category followed by the corpus scalars.
    pub fn render(report: &EvaluationReport) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<18} {:>5} {:>7} {:>5} {:>5} | {:>6} {:>6} {:>6} | {:>6} {:>6} {:>6}",
            "Category", "Obs", "mIoU", "Pred", "GT", "P(1)", "R(1)", "F1(1)", "P(2)", "R(2)", "F1(2)"
        );
        let _ = writeln!(out, "{}", "-".repeat(98));
        for score in &report.categories {
            let _ = writeln!(
                out,
                "{:<18} {:>5} {:>7} {:>5} {:>5} | {} | {}",
                score.category.as_str(),
                score.ious.len(),
                fmt_value(score.mean_iou),
                score.predicted,
                score.ground_truth,
                fmt_prf(&score.iou_rule),
                fmt_prf(&score.coverage_rule),
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Documents evaluated: {}", report.documents);
        if !report.skipped.is_empty() {
            let _ = writeln!(out, "Document pairs skipped: {}", report.skipped.len());
        }
        if report.unlabeled_predicted + report.unlabeled_ground_truth > 0 {
            let _ = writeln!(
                out,
                "Unlabeled lines: {} predicted, {} ground truth",
                report.unlabeled_predicted, report.unlabeled_ground_truth
            );
        }
        let scalars = [
            ("mIoU", report.miou),
            ("Macro mIoU", report.macro_miou),
            ("Macro precision (IoU >= 0.5)", report.iou_rule.precision),
            ("Macro recall (IoU >= 0.5)", report.iou_rule.recall),
            ("Macro F1 (IoU >= 0.5)", report.iou_rule.f1),
            ("Macro precision (area >= 0.9)", report.coverage_rule.precision),
            ("Macro recall (area >= 0.9)", report.coverage_rule.recall),
            ("Macro F1 (area >= 0.9)", report.coverage_rule.f1),
        ];
        for (name, value) in scalars {
            let _ = writeln!(out, "{name:<30} {}", fmt_value(value));
        }
        out
    }
}

fn fmt_value(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}

fn fmt_prf(prf: &Prf) -> String {
    format!(
        "{:>6} {:>6} {:>6}",
        fmt_value(prf.precision),
        fmt_value(prf.recall),
        fmt_value(prf.f1)
    )
}

impl ReportExporter for TextExporter {
    fn export(&self, report: &EvaluationReport) -> Result<()> {
        fs::create_dir_all(&self.out_dir)?;
        fs::write(self.out_dir.join("evaluation.txt"), Self::render(report))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::CorpusAccumulator;

    #[test]
    fn renders_all_rows_and_scalars() {
        let report = CorpusAccumulator::new().finish();
        let table = TextExporter::render(&report);
        assert!(table.contains("Marriage Location"));
        assert!(table.contains("Death Place"));
        assert!(table.lines().any(|line| line.starts_with("mIoU") && line.ends_with('-')));
        assert_eq!(table.lines().filter(|l| l.starts_with("Macro")).count(), 7);
    }
}
