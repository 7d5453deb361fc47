// src/repositories/report.rs
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::CrudRepository;
use crate::error::{ApiError, ApiResult};
use crate::models::{NewReport, Report, ReportQuery, ReportStatus};

/// Write side of the report lifecycle: `generating` -> `completed` | `failed`.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn create_generating(&self, report: NewReport) -> ApiResult<Report>;

    async fn mark_completed(&self, id: &str, file_path: &str, file_size_kb: i64) -> ApiResult<Report>;

    async fn mark_failed(&self, id: &str, error_message: &str) -> ApiResult<()>;
}

#[derive(Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl CrudRepository<Report> for ReportRepository {
    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn table_name(&self) -> &'static str {
        "reports"
    }

    fn entity_name(&self) -> &'static str {
        "Report"
    }
}

#[async_trait]
impl ReportStore for ReportRepository {
    async fn create_generating(&self, report: NewReport) -> ApiResult<Report> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"INSERT INTO reports (
                id, title, report_type, date_range_start, date_range_end, format, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&report.title)
        .bind(report.report_type)
        .bind(report.date_range_start)
        .bind(report.date_range_end)
        .bind(report.format)
        .bind(ReportStatus::Generating)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get_required(&id).await
    }

    async fn mark_completed(&self, id: &str, file_path: &str, file_size_kb: i64) -> ApiResult<Report> {
        let result = sqlx::query(
            r#"UPDATE reports SET status = ?, file_path = ?, file_size = ?, error_message = NULL, completed_at = ?
               WHERE id = ?"#,
        )
        .bind(ReportStatus::Completed)
        .bind(file_path)
        .bind(file_size_kb)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::report_not_found(id));
        }
        self.get_required(id).await
    }

    async fn mark_failed(&self, id: &str, error_message: &str) -> ApiResult<()> {
        sqlx::query("UPDATE reports SET status = ?, error_message = ?, completed_at = ? WHERE id = ?")
            .bind(ReportStatus::Failed)
            .bind(error_message)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, query: &ReportQuery) -> ApiResult<Vec<Report>> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(report_type) = query.report_type {
            conditions.push("report_type = ?");
            params.push(report_type.to_string());
        }
        if let Some(status) = query.status {
            conditions.push("status = ?");
            params.push(status.to_string());
        }

        let mut sql = String::from("SELECT * FROM reports");
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ?");

        let mut q = sqlx::query_as::<_, Report>(&sql);
        for param in &params {
            q = q.bind(param);
        }
        let reports = q
            .bind(query.limit.unwrap_or(100).clamp(1, 1000))
            .fetch_all(&self.pool)
            .await?;
        Ok(reports)
    }

    pub async fn completed_count(&self) -> ApiResult<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reports WHERE status = 'completed'")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;
    use crate::models::{ReportFormat, ReportType};
    use crate::test_fixtures::date;

    fn new_report() -> NewReport {
        NewReport {
            title: "Weekly Production Report".into(),
            report_type: ReportType::Weekly,
            date_range_start: date(2024, 3, 4),
            date_range_end: date(2024, 3, 10),
            format: ReportFormat::Csv,
        }
    }

    #[actix_rt::test]
    async fn test_report_status_transitions() {
        let repo = ReportRepository::new(memory_pool().await);

        let report = repo.create_generating(new_report()).await.unwrap();
        assert_eq!(report.status, ReportStatus::Generating);
        assert!(report.completed_at.is_none());

        let done = repo.mark_completed(&report.id, "reports/x.csv", 3).await.unwrap();
        assert_eq!(done.status, ReportStatus::Completed);
        assert_eq!(done.file_size, Some(3));
        assert!(done.completed_at.is_some());

        let broken = repo.create_generating(new_report()).await.unwrap();
        repo.mark_failed(&broken.id, "disk full").await.unwrap();
        let broken = repo.get_required(&broken.id).await.unwrap();
        assert_eq!(broken.status, ReportStatus::Failed);
        assert_eq!(broken.error_message.as_deref(), Some("disk full"));

        let failed = repo
            .list(&ReportQuery { status: Some(ReportStatus::Failed), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(repo.completed_count().await.unwrap(), 1);
    }
}
