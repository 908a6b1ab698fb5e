pub mod context;
pub mod engine;
pub mod ner;
pub mod rules;

use crate::core::model::Document;
use crate::error::Result;

pub use engine::{classify_line, LabelStats, RuleEngine};

/// Assigns a category to every line of a document.
pub trait RegionLabeler {
    fn label_document(&self, document: &mut Document) -> Result<LabelStats>;
}
