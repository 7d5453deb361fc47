// src/reports/export/delimited.rs
use crate::error::{ApiError, ApiResult};
use crate::reports::document::{ReportDocument, ReportTable};

/// Flat table: header line plus one line per collection.
pub fn render_csv(document: &ReportDocument) -> ApiResult<Vec<u8>> {
    table_csv(&document.records)
}

pub fn table_csv(table: &ReportTable) -> ApiResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.display()))?;
    }

    writer
        .into_inner()
        .map_err(|e| ApiError::ExportError(format!("Failed to finish CSV: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReportType, Shift};
    use crate::reports::aggregate::aggregate;
    use crate::reports::document::{build, DocumentHeader};
    use crate::test_fixtures::{collection, date};

    #[test]
    fn test_csv_one_line_per_record_and_totals_match() {
        let rows = vec![
            collection("a", ("Daisy", "T-001"), date(2024, 3, 4), Shift::Morning, 12.5, Default::default()),
            collection("b", ("Bella, the second", "T-002"), date(2024, 3, 4), Shift::Evening, 9.75, Default::default()),
            collection("c", ("Molly", "T-003"), date(2024, 3, 5), Shift::Morning, 11.0, Default::default()),
        ];
        let agg = aggregate(ReportType::Weekly, &rows, false);
        let doc = build(
            DocumentHeader {
                title: "Weekly",
                report_type: ReportType::Weekly,
                date_range_start: date(2024, 3, 4),
                date_range_end: date(2024, 3, 10),
            },
            &agg,
            &rows,
        );

        let bytes = render_csv(&doc).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert_eq!(text.lines().count(), rows.len() + 1);

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let headers = reader.headers().unwrap().clone();
        let amount_idx = headers.iter().position(|h| h == "Amount (L)").unwrap();
        let mut sum = 0.0;
        let mut names = Vec::new();
        for record in reader.records() {
            let record = record.unwrap();
            sum += record[amount_idx].parse::<f64>().unwrap();
            names.push(record[2].to_string());
        }
        assert!((sum - 33.25).abs() < 1e-9);
        assert!(names.contains(&"Bella, the second".to_string()));
    }

    #[test]
    fn test_csv_amounts_keep_full_precision() {
        let rows: Vec<_> = (0..10)
            .map(|i| {
                collection(&format!("r{}", i), ("Daisy", "T-001"), date(2024, 3, 4), Shift::Morning, 12.345, Default::default())
            })
            .collect();
        let agg = aggregate(ReportType::Daily, &rows, false);
        let doc = build(
            DocumentHeader {
                title: "Daily",
                report_type: ReportType::Daily,
                date_range_start: date(2024, 3, 4),
                date_range_end: date(2024, 3, 4),
            },
            &agg,
            &rows,
        );

        let bytes = render_csv(&doc).unwrap();
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let amount_idx = reader.headers().unwrap().iter().position(|h| h == "Amount (L)").unwrap();
        let parsed: Vec<f64> = reader
            .records()
            .map(|r| r.unwrap()[amount_idx].parse::<f64>().unwrap())
            .collect();

        assert!(parsed.iter().all(|&a| a == 12.345));
        let expected: f64 = rows.iter().map(|r| r.record.amount).sum();
        assert!((parsed.iter().sum::<f64>() - expected).abs() < 1e-9);
    }
}
