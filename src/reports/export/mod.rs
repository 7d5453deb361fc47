// src/reports/export/mod.rs
//! Serializers from a [`ReportDocument`] to file bytes.

mod delimited;
mod pdf;
mod spreadsheet;

use super::document::ReportDocument;
use crate::error::ApiResult;
use crate::models::ReportFormat;

pub use self::delimited::{render_csv, table_csv};
pub use self::pdf::render_pdf;
pub use self::spreadsheet::render_xlsx;

pub fn render(document: &ReportDocument, format: ReportFormat) -> ApiResult<Vec<u8>> {
    match format {
        ReportFormat::Csv => render_csv(document),
        ReportFormat::Xlsx => render_xlsx(document),
        ReportFormat::Pdf => Ok(render_pdf(document)),
    }
}

/// Bytes to kilobytes, rounded half up.
pub fn size_in_kb(bytes: usize) -> i64 {
    ((bytes as f64) / 1024.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_in_kb_rounds() {
        assert_eq!(size_in_kb(0), 0);
        assert_eq!(size_in_kb(511), 0);
        assert_eq!(size_in_kb(512), 1);
        assert_eq!(size_in_kb(2048), 2);
        assert_eq!(size_in_kb(2600), 3);
    }
}
