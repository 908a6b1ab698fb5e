//! Polygon-overlap evaluation of labeled documents against ground truth.

pub mod matching;
pub mod metrics;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::page;

pub use matching::{score_document, DocumentScore};
pub use metrics::{CategoryScore, CorpusAccumulator, EvaluationReport, Prf, SkippedPair};

/// Scores every `*.xml` document in `predicted_dir` against the file of the
/// same name in `ground_truth_dir`.
///
/// Pairs without a ground-truth counterpart, and pairs where either side
/// fails to load, are skipped with a warning and listed in the report.
pub fn evaluate_corpus(predicted_dir: &Path, ground_truth_dir: &Path) -> Result<EvaluationReport> {
    let files = page::xml_files(predicted_dir)
        .with_context(|| format!("Failed to list predictions in {}", predicted_dir.display()))?;
    if !ground_truth_dir.is_dir() {
        anyhow::bail!(
            "Ground truth directory does not exist: {}",
            ground_truth_dir.display()
        );
    }

    let mut corpus = CorpusAccumulator::new();
    for path in &files {
        let Some(name) = path.file_name() else { continue };
        let name_str = name.to_string_lossy().into_owned();
        let truth_path = ground_truth_dir.join(name);

        if !truth_path.is_file() {
            warn!(file = %name_str, "no ground truth counterpart, skipping");
            corpus.skip(name_str, "no ground truth counterpart");
            continue;
        }

        let pair = page::load(path).and_then(|pred| Ok((pred, page::load(&truth_path)?)));
        match pair {
            Ok((predicted, truth)) => {
                let score = score_document(&predicted, &truth);
                debug!(file = %name_str, unlabeled = score.unlabeled_predicted, "scored");
                corpus.add(score);
            }
            Err(err) => {
                warn!(file = %name_str, error = %err, "failed to load document pair, skipping");
                corpus.skip(name_str, err.to_string());
            }
        }
    }

    let report = corpus.finish();
    info!(
        documents = report.documents,
        skipped = report.skipped.len(),
        "evaluation finished"
    );
    Ok(report)
}
