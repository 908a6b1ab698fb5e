use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use stamboek::export::TextExporter;
use stamboek::labeling::ner::{
    CapitalizationRecognizer, CommandRecognizer, EntityRecognizer, NoEntities,
};
use stamboek::labeling::RuleEngine;
use stamboek::pipeline::{
    extract_folios, fix_batch, label_batch, run_evaluation, BatchSummary, EvalConfig, LabelConfig,
};

#[derive(Parser, Debug)]
#[command(name = "stamboek")]
#[command(version, about = "Region labeling and polygon evaluation for Dutch military registers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Label every text line of PAGE-XML documents
    Label {
        /// Input PAGE-XML file or directory
        input: PathBuf,

        /// Output directory for `<name>_labeled.xml` files
        #[arg(short, long, default_value = "labeled")]
        output: PathBuf,

        /// Entity recognizer used by the name / death place fallback
        #[arg(long, value_enum, default_value_t = NerBackend::Heuristic)]
        ner: NerBackend,

        /// Script for `--ner command`, called as `<script> --text <line>`
        #[arg(long, env = "STAMBOEK_NER_SCRIPT")]
        ner_script: Option<PathBuf>,

        /// Interpreter used to run the NER script
        #[arg(long, default_value = "python3")]
        ner_program: PathBuf,
    },

    /// Score labeled documents against ground truth
    Evaluate {
        /// Directory of predicted (labeled) documents
        predicted: PathBuf,

        /// Directory of ground-truth documents with the same file names
        ground_truth: PathBuf,

        /// Directory for evaluation.json, evaluation.csv and evaluation.txt
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Repair transcripts whose characters are shifted one code point up
    Fix {
        /// Input PAGE-XML file or directory
        input: PathBuf,

        /// Output directory for `<name>_fixed.xml` files
        #[arg(short, long, default_value = "fixed")]
        output: PathBuf,
    },

    /// Map images to the folio numbers mentioned in their transcripts
    Folios {
        /// Input PAGE-XML file or directory
        input: PathBuf,

        /// Output directory for the mapping and error log
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum NerBackend {
    /// Capitalization heuristic
    Heuristic,
    /// External script returning JSON entities
    Command,
    /// Disable the entity fallback
    None,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Label {
            input,
            output,
            ner,
            ner_script,
            ner_program,
        } => label(input, output, ner, ner_script, ner_program),
        Commands::Evaluate {
            predicted,
            ground_truth,
            output,
        } => evaluate(predicted, ground_truth, output),
        Commands::Fix { input, output } => fix(input, output),
        Commands::Folios { input, output } => folios(input, output),
    }
}

fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn recognizer(
    backend: NerBackend,
    script: Option<PathBuf>,
    program: PathBuf,
) -> Result<Box<dyn EntityRecognizer>> {
    Ok(match backend {
        NerBackend::Heuristic => Box::new(CapitalizationRecognizer::new()),
        NerBackend::None => Box::new(NoEntities),
        NerBackend::Command => {
            let script = script.context(
                "--ner command needs --ner-script or STAMBOEK_NER_SCRIPT to be set",
            )?;
            if !script.is_file() {
                anyhow::bail!("NER script does not exist: {}", script.display());
            }
            Box::new(CommandRecognizer::new(script).with_program(program))
        }
    })
}

fn label(
    input: PathBuf,
    output: PathBuf,
    ner: NerBackend,
    ner_script: Option<PathBuf>,
    ner_program: PathBuf,
) -> Result<()> {
    let engine = RuleEngine::new(recognizer(ner, ner_script, ner_program)?);
    let config = LabelConfig::new(input, output);

    println!("[*] Labeling: {}", config.input.display());
    println!("[*] Output: {}", config.output.display());

    let summary = label_batch(&config, &engine)?;
    finish_batch(&summary)
}

fn evaluate(predicted: PathBuf, ground_truth: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let config = EvalConfig::new(predicted, ground_truth, output);
    let report = run_evaluation(&config).with_context(|| {
        format!(
            "Failed to evaluate {} against {}",
            config.predicted.display(),
            config.ground_truth.display()
        )
    })?;

    println!("{}", TextExporter::render(&report));
    for skipped in &report.skipped {
        eprintln!("  [!] Skipped {}: {}", skipped.file, skipped.reason);
    }
    if let Some(output) = &config.output {
        println!("[✓] Reports saved to: {}", output.display());
    }
    Ok(())
}

fn fix(input: PathBuf, output: PathBuf) -> Result<()> {
    println!("[*] Fixing transcripts: {}", input.display());
    let summary = fix_batch(&input, &output)?;
    finish_batch(&summary)
}

fn folios(input: PathBuf, output: PathBuf) -> Result<()> {
    let summary = extract_folios(&input, &output)?;

    println!("[*] Documents mapped: {}", summary.mapped);
    println!("[*] Documents without transcription: {}", summary.htr_errors.len());
    for failure in &summary.failures {
        eprintln!("  [✗] {}: {}", failure.path.display(), failure.reason);
    }
    println!("[✓] Results saved to: {}", output.display());
    Ok(())
}

fn finish_batch(summary: &BatchSummary) -> Result<()> {
    for failure in &summary.failures {
        eprintln!("  [✗] {}: {}", failure.path.display(), failure.reason);
    }
    println!(
        "\n[*] Summary: {} succeeded, {} failed",
        summary.succeeded.len(),
        summary.failures.len()
    );

    if !summary.is_clean() {
        anyhow::bail!("{} file(s) failed to process", summary.failures.len());
    }
    Ok(())
}
