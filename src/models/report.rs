// src/models/report.rs
use serde::{Deserialize, Serialize};
use validator::Validate;
use chrono::{DateTime, NaiveDate, Utc};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, sqlx::Type, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ReportType {
    Daily,
    Weekly,
    Monthly,
    Quality,
    Compliance,
}

impl ReportType {
    pub fn default_title(self) -> &'static str {
        match self {
            ReportType::Daily => "Daily Milk Collection Report",
            ReportType::Weekly => "Weekly Production Report",
            ReportType::Monthly => "Monthly Production Summary",
            ReportType::Quality => "Milk Quality Analysis Report",
            ReportType::Compliance => "Quality Compliance Report",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, sqlx::Type, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ReportFormat {
    Pdf,
    Xlsx,
    Csv,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Xlsx => "xlsx",
            ReportFormat::Csv => "csv",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "application/pdf",
            ReportFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ReportFormat::Csv => "text/csv; charset=utf-8",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq,
    Serialize, Deserialize, sqlx::Type, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReportStatus {
    Generating,
    Completed,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Report {
    pub id: String,
    pub title: String,
    pub report_type: ReportType,
    pub date_range_start: NaiveDate,
    pub date_range_end: NaiveDate,
    pub format: ReportFormat,
    pub status: ReportStatus,
    pub file_path: Option<String>,
    /// Rounded kilobytes.
    pub file_size: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Report {
    /// `{reportType}-report-{YYYY-MM-DD}-{reportId}.{ext}`
    pub fn file_name(&self) -> String {
        report_file_name(self.report_type, self.created_at.date_naive(), &self.id, self.format)
    }
}

pub fn report_file_name(report_type: ReportType, date: NaiveDate, id: &str, format: ReportFormat) -> String {
    format!(
        "{}-report-{}-{}.{}",
        report_type,
        date.format("%Y-%m-%d"),
        id,
        format.extension()
    )
}

#[derive(Debug, Deserialize, Validate, Clone)]
pub struct GenerateReportRequest {
    #[validate(length(max = 255, message = "Title cannot exceed 255 characters"))]
    pub title: Option<String>,
    pub report_type: ReportType,
    pub date_range_start: NaiveDate,
    pub date_range_end: NaiveDate,
    pub format: ReportFormat,
}

/// Data needed to open a `generating` report row.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub title: String,
    pub report_type: ReportType,
    pub date_range_start: NaiveDate,
    pub date_range_end: NaiveDate,
    pub format: ReportFormat,
}

#[derive(Debug, Deserialize, Default)]
pub struct ReportQuery {
    pub report_type: Option<ReportType>,
    pub status: Option<ReportStatus>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(
            report_file_name(ReportType::Weekly, date, "abc123", ReportFormat::Xlsx),
            "weekly-report-2024-06-01-abc123.xlsx"
        );
    }

    #[test]
    fn test_enum_serialization() {
        assert_eq!(serde_json::to_value(ReportType::Compliance).unwrap(), serde_json::json!("compliance"));
        assert_eq!("PDF".parse::<ReportFormat>().unwrap(), ReportFormat::Pdf);
        assert_eq!(ReportStatus::Generating.to_string(), "generating");
    }
}
