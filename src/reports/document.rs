// src/reports/document.rs
//! Format-neutral layout of a report: a summary block, titled tables for
//! the paged/sheeted outputs and one flat record table for CSV.

use chrono::{DateTime, NaiveDate, Utc};

use super::aggregate::{Aggregation, CowTotal, QualityReport};
use crate::models::{MilkCollectionWithCow, ReportType};
use crate::quality::{format_number, Parameter};

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    /// Rendered with two decimals.
    Number(f64),
    /// Rendered as a whole number.
    Count(f64),
    /// Always two decimals.
    Percent(f64),
    /// A recorded value, written out unrounded.
    Measured(f64),
    Date(NaiveDate),
    Empty,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn opt_number(value: Option<f64>) -> Self {
        value.map(Cell::Number).unwrap_or(Cell::Empty)
    }

    pub fn opt_count(value: Option<f64>) -> Self {
        value.map(Cell::Count).unwrap_or(Cell::Empty)
    }

    pub fn display(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(v) => format_number(*v),
            Cell::Count(v) => format!("{:.0}", v),
            Cell::Percent(v) => format!("{:.2}", v),
            Cell::Measured(v) => v.to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
            Cell::Empty => String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl ReportTable {
    pub fn new(name: &str, headers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportDocument {
    pub title: String,
    pub report_type: ReportType,
    pub date_range_start: NaiveDate,
    pub date_range_end: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub summary: Vec<(String, String)>,
    pub sections: Vec<ReportTable>,
    /// One row per underlying collection.
    pub records: ReportTable,
}

impl ReportDocument {
    pub fn period(&self) -> String {
        format!(
            "{} to {}",
            self.date_range_start.format("%Y-%m-%d"),
            self.date_range_end.format("%Y-%m-%d")
        )
    }
}

fn litres(value: f64) -> String {
    format!("{} L", format_number(value))
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value)
}

fn cow_table(name: &str, cows: &[CowTotal], detailed: bool) -> ReportTable {
    let mut table = if detailed {
        ReportTable::new(
            name,
            &["Rank", "Cow", "Tag", "Total (L)", "Collections", "Days Collected", "Avg per Collection (L)", "Avg per Day (L)"],
        )
    } else {
        ReportTable::new(name, &["Rank", "Cow", "Tag", "Total (L)", "Collections"])
    };

    for (i, cow) in cows.iter().enumerate() {
        let mut row = vec![
            Cell::Count((i + 1) as f64),
            Cell::text(&cow.cow_name),
            Cell::text(&cow.tag_number),
            Cell::Number(cow.total),
            Cell::Count(cow.collections as f64),
        ];
        if detailed {
            row.push(Cell::Count(cow.days_collected as f64));
            row.push(Cell::Number(cow.average_per_collection));
            row.push(Cell::Number(cow.average_per_day));
        }
        table.rows.push(row);
    }
    table
}

const COLLECTION_HEADERS: [&str; 5] = ["Date", "Shift", "Cow", "Tag", "Amount (L)"];

fn collection_cells(c: &MilkCollectionWithCow) -> Vec<Cell> {
    vec![
        Cell::Date(c.record.date),
        Cell::text(c.record.shift.to_string()),
        Cell::text(c.cow_name.clone().unwrap_or_default()),
        Cell::text(c.cow_tag.clone().unwrap_or_default()),
        Cell::Measured(c.record.amount),
    ]
}

fn collection_table<'a>(name: &str, rows: impl Iterator<Item = &'a MilkCollectionWithCow>) -> ReportTable {
    let mut table = ReportTable::new(name, &COLLECTION_HEADERS);
    table.rows.extend(rows.map(collection_cells));
    table
}

fn quality_records(report: &QualityReport, with_violations: bool) -> ReportTable {
    let mut headers = COLLECTION_HEADERS.to_vec();
    headers.extend([
        "Fat %", "Protein %", "Lactose %", "SNF %", "Somatic Cells (x1000/ml)",
        "Bacteria (CFU/ml)", "Grade", "Simulated",
    ]);
    if with_violations {
        headers.push("Violations");
    }
    let mut table = ReportTable::new("Samples", &headers);

    for s in &report.samples {
        let p = &s.parameters;
        let mut row = collection_cells(&s.collection);
        row.extend([
            Cell::opt_number(p.fat),
            Cell::opt_number(p.protein),
            Cell::opt_number(p.lactose),
            Cell::opt_number(p.snf),
            Cell::opt_count(p.somatic_cell_count),
            Cell::opt_count(p.bacteria_count),
            Cell::text(s.grade.to_string()),
            Cell::text(if s.simulated { "Yes" } else { "No" }),
        ]);
        if with_violations {
            row.push(Cell::text(s.violations.join("; ")));
        }
        table.rows.push(row);
    }
    table
}

fn parameter_cell(parameter: Parameter, value: f64) -> Cell {
    match parameter {
        Parameter::SomaticCellCount | Parameter::BacteriaCount => Cell::Count(value),
        _ => Cell::Percent(value),
    }
}

fn quality_sections(report: &QualityReport, compliance: bool) -> Vec<ReportTable> {
    let mut sections = Vec::new();

    let mut averages = ReportTable::new("Parameter Averages", &["Parameter", "Average", "Samples"]);
    for a in &report.averages {
        averages.rows.push(vec![
            Cell::text(a.parameter.to_string()),
            parameter_cell(a.parameter, a.average),
            Cell::Count(a.samples as f64),
        ]);
    }

    let mut rates = ReportTable::new("Compliance", &["Parameter", "Compliant Samples", "Samples", "Compliance %"]);
    for r in &report.compliance {
        rates.rows.push(vec![
            Cell::text(r.parameter.to_string()),
            Cell::Count(r.compliant as f64),
            Cell::Count(r.samples as f64),
            Cell::Percent(r.rate),
        ]);
    }

    if compliance {
        sections.push(rates);
        let mut violations = ReportTable::new("Violations", &["Date", "Shift", "Cow", "Tag", "Violation"]);
        for s in report.violating_samples() {
            for message in &s.violations {
                let mut row = collection_cells(&s.collection);
                row.truncate(4);
                row.push(Cell::text(message));
                violations.rows.push(row);
            }
        }
        sections.push(violations);
        sections.push(averages);
    } else {
        sections.push(averages);
        let mut trend = ReportTable::new(
            "Daily Trend",
            &["Date", "Samples", "Fat %", "Protein %", "Lactose %", "Somatic Cells", "Bacteria"],
        );
        for point in &report.trend {
            let avg = |p: Parameter| {
                point
                    .averages
                    .iter()
                    .find(|a| a.parameter == p)
                    .map(|a| parameter_cell(p, a.average))
                    .unwrap_or(Cell::Empty)
            };
            trend.rows.push(vec![
                Cell::Date(point.date),
                Cell::Count(point.samples as f64),
                avg(Parameter::Fat),
                avg(Parameter::Protein),
                avg(Parameter::Lactose),
                avg(Parameter::SomaticCellCount),
                avg(Parameter::BacteriaCount),
            ]);
        }
        sections.push(trend);
        sections.push(rates);
    }

    sections.push(quality_records(report, compliance));
    sections
}

fn quality_summary(report: &QualityReport) -> Vec<(String, String)> {
    let mut summary = vec![
        ("Samples".to_string(), report.samples.len().to_string()),
        ("Overall Compliance".to_string(), percent(report.overall_compliance)),
        ("Samples with Violations".to_string(), report.violating_samples().count().to_string()),
    ];
    for (grade, count) in &report.grade_distribution {
        summary.push((format!("Grade {}", grade), count.to_string()));
    }
    if report.simulated_count > 0 {
        summary.push(("Samples with Estimated Readings".to_string(), report.simulated_count.to_string()));
    }
    summary
}

pub struct DocumentHeader<'a> {
    pub title: &'a str,
    pub report_type: ReportType,
    pub date_range_start: NaiveDate,
    pub date_range_end: NaiveDate,
}

pub fn build(
    header: DocumentHeader<'_>,
    aggregation: &Aggregation,
    collections: &[MilkCollectionWithCow],
) -> ReportDocument {
    let (summary, sections, records) = match aggregation {
        Aggregation::Daily(r) => (
            vec![
                ("Total Collected".to_string(), litres(r.total)),
                ("Morning Shift".to_string(), litres(r.morning_total)),
                ("Evening Shift".to_string(), litres(r.evening_total)),
                ("Collections".to_string(), r.collection_count.to_string()),
            ],
            vec![
                cow_table("Top Producers", &r.top_cows, false),
                collection_table("Collections", r.collections.iter()),
            ],
            collection_table("Collections", collections.iter()),
        ),
        Aggregation::Weekly(r) => {
            let mut days = ReportTable::new("Daily Totals", &["Date", "Morning (L)", "Evening (L)", "Total (L)", "Collections"]);
            for d in &r.days {
                days.rows.push(vec![
                    Cell::Date(d.date),
                    Cell::Number(d.morning),
                    Cell::Number(d.evening),
                    Cell::Number(d.total),
                    Cell::Count(d.collections as f64),
                ]);
            }
            (
                vec![
                    ("Week Total".to_string(), litres(r.total)),
                    ("Average per Day".to_string(), litres(r.average_per_day)),
                    ("Days with Collections".to_string(), r.days.len().to_string()),
                    ("Collections".to_string(), r.collection_count.to_string()),
                ],
                vec![days, cow_table("Top Producers", &r.top_cows, false)],
                collection_table("Collections", collections.iter()),
            )
        }
        Aggregation::Monthly(r) => {
            let mut weeks = ReportTable::new(
                "Weekly Totals",
                &["ISO Week", "From", "To", "Total (L)", "Days", "Collections"],
            );
            for w in &r.weeks {
                weeks.rows.push(vec![
                    Cell::text(w.label()),
                    Cell::Date(w.first_date),
                    Cell::Date(w.last_date),
                    Cell::Number(w.total),
                    Cell::Count(w.days as f64),
                    Cell::Count(w.collections as f64),
                ]);
            }
            (
                vec![
                    ("Month Total".to_string(), litres(r.total)),
                    ("Average per Day".to_string(), litres(r.average_per_day)),
                    ("Days with Collections".to_string(), r.days_collected.to_string()),
                    ("Collections".to_string(), r.collection_count.to_string()),
                    ("Cows".to_string(), r.cow_stats.len().to_string()),
                ],
                vec![weeks, cow_table("Cow Statistics", &r.cow_stats, true)],
                collection_table("Collections", collections.iter()),
            )
        }
        Aggregation::Quality(r) => (quality_summary(r), quality_sections(r, false), quality_records(r, false)),
        Aggregation::Compliance(r) => (quality_summary(r), quality_sections(r, true), quality_records(r, true)),
    };

    ReportDocument {
        title: header.title.to_string(),
        report_type: header.report_type,
        date_range_start: header.date_range_start,
        date_range_end: header.date_range_end,
        generated_at: Utc::now(),
        summary,
        sections,
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Shift;
    use crate::reports::aggregate::aggregate;
    use crate::test_fixtures::{collection, date, quality};

    fn header(report_type: ReportType) -> DocumentHeader<'static> {
        DocumentHeader {
            title: "Test Report",
            report_type,
            date_range_start: date(2024, 3, 4),
            date_range_end: date(2024, 3, 10),
        }
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Number(12.0).display(), "12");
        assert_eq!(Cell::Number(3.456).display(), "3.46");
        assert_eq!(Cell::Count(15234.6).display(), "15235");
        assert_eq!(Cell::Percent(80.0).display(), "80.00");
        assert_eq!(Cell::Measured(12.345).display(), "12.345");
        assert_eq!(Cell::Date(date(2024, 3, 4)).display(), "2024-03-04");
        assert_eq!(Cell::Empty.display(), "");
    }

    #[test]
    fn test_compliance_document_lists_each_violation() {
        let rows = vec![
            collection("a", ("Daisy", "T-001"), date(2024, 3, 4), Shift::Morning, 10.0, quality(3.2, 3.3, 4.8, 250.0, 12000.0)),
            collection("b", ("Bella", "T-002"), date(2024, 3, 4), Shift::Morning, 11.0, quality(3.8, 3.3, 4.8, 150.0, 12000.0)),
        ];
        let agg = aggregate(ReportType::Compliance, &rows, false);
        let doc = build(header(ReportType::Compliance), &agg, &rows);

        let violations = doc.sections.iter().find(|s| s.name == "Violations").unwrap();
        assert_eq!(violations.rows.len(), 2);
        assert_eq!(violations.rows[1][4].display(), "Somatic cell count too high: 250 (max: 200)");
        assert_eq!(doc.records.rows.len(), 2);
        assert_eq!(doc.records.headers.last().map(String::as_str), Some("Violations"));

        let rates = doc.sections.iter().find(|s| s.name == "Compliance").unwrap();
        assert_eq!(rates.rows[0][3].display(), "50.00");
        assert_eq!(doc.summary[1], ("Overall Compliance".to_string(), "80.00%".to_string()));
    }

    #[test]
    fn test_weekly_document_keeps_flat_records() {
        let rows = vec![
            collection("a", ("Daisy", "T-001"), date(2024, 3, 4), Shift::Morning, 10.0, Default::default()),
            collection("b", ("Daisy", "T-001"), date(2024, 3, 5), Shift::Evening, 9.0, Default::default()),
        ];
        let agg = aggregate(ReportType::Weekly, &rows, false);
        let doc = build(header(ReportType::Weekly), &agg, &rows);

        assert_eq!(doc.sections[0].name, "Daily Totals");
        assert_eq!(doc.sections[0].rows.len(), 2);
        assert_eq!(doc.records.rows.len(), 2);
        assert_eq!(doc.summary[0], ("Week Total".to_string(), "19 L".to_string()));
        assert_eq!(doc.period(), "2024-03-04 to 2024-03-10");
    }
}
