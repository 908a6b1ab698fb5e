pub mod csv_export;
pub mod json_export;
pub mod text_export;

use anyhow::Result;

use crate::evaluation::EvaluationReport;

pub use csv_export::CsvExporter;
pub use json_export::JsonExporter;
pub use text_export::TextExporter;

pub trait ReportExporter {
    fn export(&self, report: &EvaluationReport) -> Result<()>;
}
