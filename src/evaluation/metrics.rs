//! Corpus-level aggregation of per-document scores.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::model::Category;
use crate::evaluation::matching::DocumentScore;

/// Raw counts for one category, summed over any number of documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryTally {
    pub ious: Vec<f64>,
    pub predicted: usize,
    pub ground_truth: usize,
    pub tp_iou: usize,
    pub tp_coverage: usize,
}

impl CategoryTally {
    fn merge(&mut self, other: CategoryTally) {
        self.ious.extend(other.ious);
        self.predicted += other.predicted;
        self.ground_truth += other.ground_truth;
        self.tp_iou += other.tp_iou;
        self.tp_coverage += other.tp_coverage;
    }
}

/// Precision, recall and F1. A value is `None` when its denominator is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Prf {
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1: Option<f64>,
}

impl Prf {
    pub fn from_counts(true_positives: usize, predicted: usize, ground_truth: usize) -> Self {
        let precision = ratio(true_positives, predicted);
        let recall = ratio(true_positives, ground_truth);
        Self {
            precision,
            recall,
            f1: harmonic_mean(precision, recall),
        }
    }

    /// Mean of the defined values of each component.
    pub fn macro_average<'a>(scores: impl IntoIterator<Item = &'a Prf> + Clone) -> Self {
        Self {
            precision: mean(scores.clone().into_iter().filter_map(|s| s.precision)),
            recall: mean(scores.clone().into_iter().filter_map(|s| s.recall)),
            f1: mean(scores.into_iter().filter_map(|s| s.f1)),
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

fn harmonic_mean(precision: Option<f64>, recall: Option<f64>) -> Option<f64> {
    let (p, r) = (precision?, recall?);
    if p + r == 0.0 {
        Some(0.0)
    } else {
        Some(2.0 * p * r / (p + r))
    }
}

pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryScore {
    pub category: Category,
    pub ious: Vec<f64>,
    pub mean_iou: Option<f64>,
    pub predicted: usize,
    pub ground_truth: usize,
    pub tp_iou: usize,
    pub tp_coverage: usize,
    /// Evaluation 1: a match needs IoU of at least 0.5.
    pub iou_rule: Prf,
    /// Evaluation 2: a match needs an intersection area of at least 0.9.
    pub coverage_rule: Prf,
}

impl CategoryScore {
    fn new(category: Category, tally: CategoryTally) -> Self {
        Self {
            category,
            mean_iou: mean(tally.ious.iter().copied()),
            iou_rule: Prf::from_counts(tally.tp_iou, tally.predicted, tally.ground_truth),
            coverage_rule: Prf::from_counts(tally.tp_coverage, tally.predicted, tally.ground_truth),
            ious: tally.ious,
            predicted: tally.predicted,
            ground_truth: tally.ground_truth,
            tp_iou: tally.tp_iou,
            tp_coverage: tally.tp_coverage,
        }
    }
}

/// A document pair left out of the corpus totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPair {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    /// One row per category, in category order.
    pub categories: Vec<CategoryScore>,
    /// Mean over every IoU observation.
    pub miou: Option<f64>,
    /// Mean of the per-category mean IoUs.
    pub macro_miou: Option<f64>,
    pub iou_rule: Prf,
    pub coverage_rule: Prf,
    pub documents: usize,
    pub unlabeled_predicted: usize,
    pub unlabeled_ground_truth: usize,
    pub skipped: Vec<SkippedPair>,
}

#[derive(Debug, Default)]
pub struct CorpusAccumulator {
    tallies: BTreeMap<Category, CategoryTally>,
    documents: usize,
    unlabeled_predicted: usize,
    unlabeled_ground_truth: usize,
    skipped: Vec<SkippedPair>,
}

impl CorpusAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, score: DocumentScore) {
        self.documents += 1;
        self.unlabeled_predicted += score.unlabeled_predicted;
        self.unlabeled_ground_truth += score.unlabeled_ground_truth;
        for (category, tally) in score.tallies {
            self.tallies.entry(category).or_default().merge(tally);
        }
    }

    pub fn skip(&mut self, file: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(SkippedPair {
            file: file.into(),
            reason: reason.into(),
        });
    }

    pub fn documents(&self) -> usize {
        self.documents
    }

    pub fn finish(mut self) -> EvaluationReport {
        let categories: Vec<CategoryScore> = Category::ALL
            .iter()
            .map(|&category| {
                let tally = self.tallies.remove(&category).unwrap_or_default();
                CategoryScore::new(category, tally)
            })
            .collect();

        EvaluationReport {
            miou: mean(categories.iter().flat_map(|c| c.ious.iter().copied())),
            macro_miou: mean(categories.iter().filter_map(|c| c.mean_iou)),
            iou_rule: Prf::macro_average(categories.iter().map(|c| &c.iou_rule)),
            coverage_rule: Prf::macro_average(categories.iter().map(|c| &c.coverage_rule)),
            categories,
            documents: self.documents,
            unlabeled_predicted: self.unlabeled_predicted,
            unlabeled_ground_truth: self.unlabeled_ground_truth,
            skipped: self.skipped,
        }
    }
}
