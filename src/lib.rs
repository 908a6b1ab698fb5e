pub mod core;
pub mod error;
pub mod evaluation;
pub mod export;
pub mod labeling;
pub mod page;
pub mod pipeline;

pub use crate::core::model::{Category, Document, Label, Line, Region};
pub use crate::error::DocumentError;
