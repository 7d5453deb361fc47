// src/reports/mod.rs
//! Report generation: fetch collections, aggregate, lay out, serialize,
//! store the file and keep the `reports` row in step.

pub mod aggregate;
pub mod document;
pub mod export;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::config::ReportsConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{report_file_name, GenerateReportRequest, NewReport, Report};
use crate::repositories::{MilkRecordSource, ReportStore};

use self::document::DocumentHeader;

/// A finished report together with its bytes.
#[derive(Debug)]
pub struct GeneratedReport {
    pub report: Report,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct ReportService {
    source: Arc<dyn MilkRecordSource>,
    store: Arc<dyn ReportStore>,
    config: ReportsConfig,
}

pub fn validate_range(start: NaiveDate, end: NaiveDate, max_days: i64) -> ApiResult<()> {
    if end < start {
        return Err(ApiError::invalid_date_range(
            &start.format("%Y-%m-%d").to_string(),
            &end.format("%Y-%m-%d").to_string(),
        ));
    }
    let days = (end - start).num_days() + 1;
    if max_days > 0 && days > max_days {
        return Err(ApiError::bad_request(&format!(
            "Date range spans {} days, the maximum is {}",
            days, max_days
        )));
    }
    Ok(())
}

impl ReportService {
    pub fn new(source: Arc<dyn MilkRecordSource>, store: Arc<dyn ReportStore>, config: ReportsConfig) -> Self {
        Self { source, store, config }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.config.output_path()
    }

    /// The report row exists as `generating` before any work starts. Any
    /// failure afterwards flips it to `failed` and is returned to the caller.
    #[tracing::instrument(
        skip(self, request),
        fields(report_type = %request.report_type, format = %request.format)
    )]
    pub async fn generate(&self, request: GenerateReportRequest) -> ApiResult<GeneratedReport> {
        validate_range(request.date_range_start, request.date_range_end, self.config.max_range_days)?;

        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| request.report_type.default_title())
            .to_string();

        let report = self
            .store
            .create_generating(NewReport {
                title,
                report_type: request.report_type,
                date_range_start: request.date_range_start,
                date_range_end: request.date_range_end,
                format: request.format,
            })
            .await?;

        log::info!(
            "Generating {} report {} ({} to {}, {})",
            report.report_type, report.id, report.date_range_start, report.date_range_end, report.format
        );

        match self.produce(&report).await {
            Ok((path, file_name, bytes)) => {
                let size_kb = export::size_in_kb(bytes.len());
                let report = self
                    .store
                    .mark_completed(&report.id, &path.to_string_lossy(), size_kb)
                    .await?;
                log::info!("Report {} completed: {} ({} KB)", report.id, file_name, size_kb);
                Ok(GeneratedReport { report, file_name, bytes })
            }
            Err(e) => {
                log::error!("Report {} failed: {}", report.id, e);
                if let Err(mark_err) = self.store.mark_failed(&report.id, &e.to_string()).await {
                    log::error!("Could not mark report {} as failed: {}", report.id, mark_err);
                }
                Err(e)
            }
        }
    }

    async fn produce(&self, report: &Report) -> ApiResult<(PathBuf, String, Vec<u8>)> {
        let collections = self
            .source
            .collections_in_range(report.date_range_start, report.date_range_end)
            .await?;

        let aggregation = aggregate::aggregate(
            report.report_type,
            &collections,
            self.config.simulate_missing_quality,
        );
        let document = document::build(
            DocumentHeader {
                title: &report.title,
                report_type: report.report_type,
                date_range_start: report.date_range_start,
                date_range_end: report.date_range_end,
            },
            &aggregation,
            &collections,
        );
        let bytes = export::render(&document, report.format)?;

        let file_name = report_file_name(report.report_type, Utc::now().date_naive(), &report.id, report.format);
        let path = write_report_file(&self.output_dir(), &file_name, &bytes).await?;

        Ok((path, file_name, bytes))
    }
}

async fn write_report_file(dir: &Path, file_name: &str, bytes: &[u8]) -> ApiResult<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use crate::models::{MilkCollectionWithCow, ReportFormat, ReportStatus, ReportType, Shift};
    use crate::test_fixtures::{collection, date, quality};

    struct FakeSource {
        rows: Vec<MilkCollectionWithCow>,
        fail: bool,
    }

    #[async_trait]
    impl MilkRecordSource for FakeSource {
        async fn collections_in_range(&self, start: NaiveDate, end: NaiveDate) -> ApiResult<Vec<MilkCollectionWithCow>> {
            if self.fail {
                return Err(ApiError::InternalServerError("connection reset".into()));
            }
            Ok(self
                .rows
                .iter()
                .filter(|r| r.record.date >= start && r.record.date <= end)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct FakeStore {
        reports: Mutex<Vec<Report>>,
    }

    impl FakeStore {
        fn status_of(&self, id: &str) -> ReportStatus {
            self.reports.lock().unwrap().iter().find(|r| r.id == id).unwrap().status
        }
    }

    #[async_trait]
    impl ReportStore for FakeStore {
        async fn create_generating(&self, new: NewReport) -> ApiResult<Report> {
            let mut reports = self.reports.lock().unwrap();
            let report = Report {
                id: format!("rep-{}", reports.len() + 1),
                title: new.title,
                report_type: new.report_type,
                date_range_start: new.date_range_start,
                date_range_end: new.date_range_end,
                format: new.format,
                status: ReportStatus::Generating,
                file_path: None,
                file_size: None,
                error_message: None,
                created_at: Utc.with_ymd_and_hms(2024, 3, 11, 8, 0, 0).unwrap(),
                completed_at: None,
            };
            reports.push(report.clone());
            Ok(report)
        }

        async fn mark_completed(&self, id: &str, file_path: &str, file_size_kb: i64) -> ApiResult<Report> {
            let mut reports = self.reports.lock().unwrap();
            let report = reports.iter_mut().find(|r| r.id == id).ok_or_else(|| ApiError::report_not_found(id))?;
            report.status = ReportStatus::Completed;
            report.file_path = Some(file_path.to_string());
            report.file_size = Some(file_size_kb);
            report.completed_at = Some(Utc::now());
            Ok(report.clone())
        }

        async fn mark_failed(&self, id: &str, error_message: &str) -> ApiResult<()> {
            let mut reports = self.reports.lock().unwrap();
            if let Some(report) = reports.iter_mut().find(|r| r.id == id) {
                report.status = ReportStatus::Failed;
                report.error_message = Some(error_message.to_string());
            }
            Ok(())
        }
    }

    fn rows() -> Vec<MilkCollectionWithCow> {
        vec![
            collection("a", ("Daisy", "T-001"), date(2024, 3, 4), Shift::Morning, 12.0, quality(3.8, 3.3, 4.8, 150.0, 12000.0)),
            collection("b", ("Bella", "T-002"), date(2024, 3, 4), Shift::Evening, 9.5, quality(3.1, 3.3, 4.8, 150.0, 12000.0)),
            collection("c", ("Daisy", "T-001"), date(2024, 3, 20), Shift::Morning, 11.0, Default::default()),
        ]
    }

    fn service(dir: &Path, fail: bool) -> (ReportService, Arc<FakeStore>) {
        let store = Arc::new(FakeStore::default());
        let config = ReportsConfig {
            output_dir: dir.to_string_lossy().into_owned(),
            simulate_missing_quality: false,
            max_range_days: 366,
        };
        let service = ReportService::new(Arc::new(FakeSource { rows: rows(), fail }), store.clone(), config);
        (service, store)
    }

    fn request(report_type: ReportType, format: ReportFormat) -> GenerateReportRequest {
        GenerateReportRequest {
            title: None,
            report_type,
            date_range_start: date(2024, 3, 4),
            date_range_end: date(2024, 3, 10),
            format,
        }
    }

    #[actix_rt::test]
    async fn test_generate_writes_file_and_completes() {
        let dir = tempfile::tempdir().unwrap();
        let (service, store) = service(dir.path(), false);

        let generated = service.generate(request(ReportType::Weekly, ReportFormat::Csv)).await.unwrap();

        assert_eq!(generated.report.status, ReportStatus::Completed);
        assert_eq!(generated.report.title, "Weekly Production Report");
        assert!(generated.file_name.starts_with("weekly-report-"));
        assert!(generated.file_name.ends_with(&format!("-{}.csv", generated.report.id)));

        let on_disk = std::fs::read(dir.path().join(&generated.file_name)).unwrap();
        assert_eq!(on_disk, generated.bytes);
        assert_eq!(generated.report.file_size, Some(export::size_in_kb(on_disk.len())));

        // the out-of-range row on 2024-03-20 is not part of the file
        let text = String::from_utf8(on_disk).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert_eq!(store.status_of(&generated.report.id), ReportStatus::Completed);
    }

    #[actix_rt::test]
    async fn test_every_type_and_format_renders() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service(dir.path(), false);

        for report_type in [
            ReportType::Daily,
            ReportType::Weekly,
            ReportType::Monthly,
            ReportType::Quality,
            ReportType::Compliance,
        ] {
            for format in [ReportFormat::Pdf, ReportFormat::Xlsx, ReportFormat::Csv] {
                let generated = service.generate(request(report_type, format)).await.unwrap();
                assert!(!generated.bytes.is_empty(), "{} {}", report_type, format);
                assert_eq!(generated.report.format, format);
            }
        }
    }

    #[actix_rt::test]
    async fn test_source_failure_marks_report_failed() {
        let dir = tempfile::tempdir().unwrap();
        let (service, store) = service(dir.path(), true);

        let err = service.generate(request(ReportType::Daily, ReportFormat::Pdf)).await.unwrap_err();
        assert!(matches!(err, ApiError::InternalServerError(_)));

        let reports = store.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, ReportStatus::Failed);
        assert!(reports[0].error_message.as_deref().unwrap().contains("connection reset"));
    }

    #[actix_rt::test]
    async fn test_inverted_range_is_rejected_before_any_row() {
        let dir = tempfile::tempdir().unwrap();
        let (service, store) = service(dir.path(), false);

        let mut req = request(ReportType::Daily, ReportFormat::Csv);
        req.date_range_start = date(2024, 3, 10);
        req.date_range_end = date(2024, 3, 4);
        assert!(matches!(service.generate(req).await, Err(ApiError::BadRequest(_))));
        assert!(store.reports.lock().unwrap().is_empty());
    }

    #[test]
    fn test_validate_range_limits() {
        assert!(validate_range(date(2024, 1, 1), date(2024, 1, 1), 366).is_ok());
        assert!(validate_range(date(2024, 1, 1), date(2024, 12, 31), 366).is_ok());
        assert!(validate_range(date(2024, 1, 1), date(2025, 1, 1), 366).is_err());
        assert!(validate_range(date(2020, 1, 1), date(2025, 1, 1), 0).is_ok());
    }
}
