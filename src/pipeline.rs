use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::evaluation::{evaluate_corpus, EvaluationReport};
use crate::export::{CsvExporter, JsonExporter, ReportExporter, TextExporter};
use crate::labeling::{LabelStats, RegionLabeler};
use crate::page::{self, transcript};

#[derive(Debug, Clone)]
pub struct LabelConfig {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl LabelConfig {
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        Self { input, output }
    }
}

#[derive(Debug, Clone)]
pub struct EvalConfig {
    pub predicted: PathBuf,
    pub ground_truth: PathBuf,
    /// Where the `evaluation.{json,csv,txt}` reports go; nothing is written
    /// when unset.
    pub output: Option<PathBuf>,
}

impl EvalConfig {
    pub fn new(predicted: PathBuf, ground_truth: PathBuf, output: Option<PathBuf>) -> Self {
        Self {
            predicted,
            ground_truth,
            output,
        }
    }
}

/// A document that could not be processed, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub succeeded: Vec<PathBuf>,
    pub failures: Vec<BatchFailure>,
}

impl BatchSummary {
    fn record(&mut self, input: &Path, result: Result<PathBuf>) {
        match result {
            Ok(written) => {
                info!(input = %input.display(), output = %written.display(), "document done");
                self.succeeded.push(written);
            }
            Err(err) => {
                warn!(input = %input.display(), error = %format!("{err:#}"), "document failed");
                self.failures.push(BatchFailure {
                    path: input.to_path_buf(),
                    reason: format!("{err:#}"),
                });
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// `<stem>_labeled.xml`, dropping a `_fixed` suffix left by the transcript fixer.
pub fn labeled_file_name(input: &Path) -> String {
    let stem = file_stem(input);
    let stem = stem.strip_suffix("_fixed").unwrap_or(&stem);
    format!("{stem}_labeled.xml")
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn label_file(input: &Path, output_dir: &Path, labeler: &dyn RegionLabeler) -> Result<PathBuf> {
    let mut document =
        page::load(input).with_context(|| format!("Failed to load {}", input.display()))?;
    let stats: LabelStats = labeler
        .label_document(&mut document)
        .with_context(|| format!("Failed to label {}", input.display()))?;
    info!(
        input = %input.display(),
        matched = stats.matched,
        fallback = stats.fallback,
        preexisting = stats.preexisting,
        "labeled"
    );

    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(labeled_file_name(input));
    page::save(&document, &path).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Labels every document under the configured input. A failing document is
/// recorded and the batch moves on.
pub fn label_batch(config: &LabelConfig, labeler: &dyn RegionLabeler) -> Result<BatchSummary> {
    let inputs = input_files(&config.input)?;
    info!(count = inputs.len(), "labeling documents");

    let mut summary = BatchSummary::default();
    for input in &inputs {
        summary.record(input, label_file(input, &config.output, labeler));
    }
    Ok(summary)
}

/// Repairs shifted transcripts, writing `<stem>_fixed.xml` per document.
pub fn fix_batch(input: &Path, output_dir: &Path) -> Result<BatchSummary> {
    let inputs = input_files(input)?;
    fs::create_dir_all(output_dir)?;

    let mut summary = BatchSummary::default();
    for path in &inputs {
        let result = fix_file(path, output_dir);
        summary.record(path, result);
    }
    Ok(summary)
}

fn fix_file(input: &Path, output_dir: &Path) -> Result<PathBuf> {
    let xml = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let fixed = transcript::fix_transcript(&xml)?;
    let path = output_dir.join(format!("{}_fixed.xml", file_stem(input)));
    fs::write(&path, fixed)?;
    Ok(path)
}

#[derive(Debug, Clone, Default)]
pub struct FolioSummary {
    /// Documents with a transcription, listed in the mapping file.
    pub mapped: usize,
    /// Documents without any `PlainText`.
    pub htr_errors: Vec<PathBuf>,
    pub failures: Vec<BatchFailure>,
}

/// Writes `image_to_folio_mapping.csv` and `image_htr_error.txt` into
/// `output_dir`.
pub fn extract_folios(input: &Path, output_dir: &Path) -> Result<FolioSummary> {
    let inputs = input_files(input)?;
    fs::create_dir_all(output_dir)?;

    let mut summary = FolioSummary::default();
    let mut wtr = csv::Writer::from_path(output_dir.join("image_to_folio_mapping.csv"))?;
    wtr.write_record(["image", "folio"])?;

    for path in &inputs {
        let scan = fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|xml| Ok(transcript::find_folios(&xml)?));
        let scan = match scan {
            Ok(scan) => scan,
            Err(err) => {
                warn!(input = %path.display(), error = %err, "failed to scan for folios");
                summary.failures.push(BatchFailure {
                    path: path.clone(),
                    reason: err.to_string(),
                });
                continue;
            }
        };

        if !scan.has_transcription {
            warn!(input = %path.display(), "no transcription found");
            summary.htr_errors.push(path.clone());
            continue;
        }
        let image = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        wtr.write_record([image.as_str(), scan.folios.join(", ").as_str()])?;
        summary.mapped += 1;
    }
    wtr.flush()?;

    let errors: String = summary
        .htr_errors
        .iter()
        .map(|path| format!("{}\n", path.display()))
        .collect();
    fs::write(output_dir.join("image_htr_error.txt"), errors)?;
    Ok(summary)
}

/// Evaluates and, when an output directory is configured, exports the report.
pub fn run_evaluation(config: &EvalConfig) -> Result<EvaluationReport> {
    let report = evaluate_corpus(&config.predicted, &config.ground_truth)?;
    if let Some(output) = &config.output {
        export_report(&report, output)?;
    }
    Ok(report)
}

pub fn export_report(report: &EvaluationReport, output: &Path) -> Result<()> {
    let json_exporter = JsonExporter::new(output.to_path_buf());
    json_exporter.export(report)?;

    let csv_exporter = CsvExporter::new(output.to_path_buf());
    csv_exporter.export(report)?;

    let text_exporter = TextExporter::new(output.to_path_buf());
    text_exporter.export(report)?;

    Ok(())
}

fn input_files(input: &Path) -> Result<Vec<PathBuf>> {
    if !input.exists() {
        anyhow::bail!("Input does not exist: {}", input.display());
    }
    page::xml_files(input).with_context(|| format!("Failed to list {}", input.display()))
}
