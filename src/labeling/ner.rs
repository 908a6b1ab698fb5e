//! Named-entity recognition behind a small trait, so the rule engine can run
//! against a real model, a heuristic or a test stub.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityLabel {
    Person,
    Gpe,
    Date,
    Other(String),
}

impl EntityLabel {
    /// Maps spaCy-style label names (`PERSON`, `GPE`, `DATE`, ...).
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_uppercase().as_str() {
            "PERSON" | "PER" => EntityLabel::Person,
            "GPE" | "LOC" => EntityLabel::Gpe,
            "DATE" => EntityLabel::Date,
            other => EntityLabel::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub label: EntityLabel,
    pub text: String,
}

impl EntitySpan {
    pub fn new(label: EntityLabel, text: impl Into<String>) -> Self {
        Self {
            label,
            text: text.into(),
        }
    }
}

pub trait EntityRecognizer {
    fn classify_entities(&self, text: &str) -> Vec<EntitySpan>;
}

/// Finds nothing; the NER fallback never fires.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEntities;

impl EntityRecognizer for NoEntities {
    fn classify_entities(&self, _text: &str) -> Vec<EntitySpan> {
        Vec::new()
    }
}

const PLACE_PREPOSITIONS: &[&str] = &["te", "in", "naar", "uit"];
const NAME_PARTICLES: &[&str] = &["van", "de", "der", "den", "ter", "ten", "la", "le"];

/// Capitalization heuristic for register text.
///
/// Two or more consecutive capitalized words (name particles allowed in
/// between) are a person; a capitalized word after a place preposition is a
/// place.
#[derive(Debug, Default, Clone, Copy)]
pub struct CapitalizationRecognizer;

impl CapitalizationRecognizer {
    pub fn new() -> Self {
        Self
    }
}

impl EntityRecognizer for CapitalizationRecognizer {
    fn classify_entities(&self, text: &str) -> Vec<EntitySpan> {
        let words: Vec<&str> = text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| !w.is_empty())
            .collect();
        let mut spans = Vec::new();

        let mut run: Vec<&str> = Vec::new();
        let mut capitals = 0;
        for (idx, &word) in words.iter().enumerate() {
            let after_preposition = idx > 0
                && PLACE_PREPOSITIONS.contains(&words[idx - 1].to_lowercase().as_str());
            if is_capitalized(word) && after_preposition {
                flush_person(&mut run, &mut capitals, &mut spans);
                spans.push(EntitySpan::new(EntityLabel::Gpe, word));
            } else if is_capitalized(word) {
                run.push(word);
                capitals += 1;
            } else if !run.is_empty() && NAME_PARTICLES.contains(&word) {
                run.push(word);
            } else {
                flush_person(&mut run, &mut capitals, &mut spans);
            }
        }
        flush_person(&mut run, &mut capitals, &mut spans);
        spans
    }
}

fn is_capitalized(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(chars.next(), Some(c) if c.is_uppercase()) && chars.all(|c| !c.is_ascii_digit())
}

fn flush_person(run: &mut Vec<&str>, capitals: &mut usize, spans: &mut Vec<EntitySpan>) {
    while run.last().is_some_and(|w| NAME_PARTICLES.contains(w)) {
        run.pop();
    }
    if *capitals >= 2 {
        spans.push(EntitySpan::new(EntityLabel::Person, run.join(" ")));
    }
    run.clear();
    *capitals = 0;
}

#[derive(Debug, Deserialize)]
struct ScriptEntity {
    label: String,
    text: String,
}

/// Runs an external NER script once per line.
///
/// The script receives `--text <line>` and prints a JSON array of
/// `{"label": ..., "text": ...}` objects. Failures are logged and treated as
/// "no entities" so one bad line does not abort a document.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: PathBuf,
    script_path: PathBuf,
}

impl CommandRecognizer {
    pub fn new(script_path: PathBuf) -> Self {
        Self {
            program: PathBuf::from("python3"),
            script_path,
        }
    }

    pub fn with_program(mut self, program: PathBuf) -> Self {
        self.program = program;
        self
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    fn run(&self, text: &str) -> Result<Vec<EntitySpan>> {
        let output = Command::new(&self.program)
            .arg(&self.script_path)
            .arg("--text")
            .arg(text)
            .output()
            .with_context(|| format!("failed to invoke NER script {}", self.script_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("NER script failed: {stderr}");
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let entities: Vec<ScriptEntity> =
            serde_json::from_str(&stdout).with_context(|| "failed to parse NER JSON response")?;
        Ok(entities
            .into_iter()
            .map(|e| EntitySpan::new(EntityLabel::from_tag(&e.label), e.text))
            .collect())
    }
}

impl EntityRecognizer for CommandRecognizer {
    fn classify_entities(&self, text: &str) -> Vec<EntitySpan> {
        match self.run(text) {
            Ok(spans) => spans,
            Err(err) => {
                warn!(error = %err, "entity recognition failed, continuing without entities");
                Vec::new()
            }
        }
    }
}

impl<R: EntityRecognizer + ?Sized> EntityRecognizer for Box<R> {
    fn classify_entities(&self, text: &str) -> Vec<EntitySpan> {
        (**self).classify_entities(text)
    }
}
