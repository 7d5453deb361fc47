// src/repositories/mod.rs
//! Data access layer. Every repository owns a clone of the injected pool.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::SqlitePool;
use crate::error::{ApiError, ApiResult};

pub mod cow;
pub mod inventory;
pub mod milk;
pub mod order;
pub mod report;
pub mod revenue;
pub mod supplier;

pub use cow::CowRepository;
pub use inventory::InventoryRepository;
pub use milk::{MilkRecordSource, MilkRepository};
pub use order::OrderRepository;
pub use report::{ReportRepository, ReportStore};
pub use revenue::RevenueRepository;
pub use supplier::SupplierRepository;

/// Базовый trait для CRUD операций
#[async_trait]
pub trait CrudRepository<T>: Send + Sync
where
    T: Send + Unpin + 'static + for<'r> sqlx::FromRow<'r, SqliteRow>,
{
    fn pool(&self) -> &SqlitePool;

    /// Имя таблицы в базе данных
    fn table_name(&self) -> &'static str;

    /// Имя поля с ID (по умолчанию "id")
    fn id_field(&self) -> &'static str {
        "id"
    }

    /// Сортировка по умолчанию
    fn default_order(&self) -> &'static str {
        "created_at DESC"
    }

    /// Human readable entity name for error messages
    fn entity_name(&self) -> &'static str;

    async fn get_by_id(&self, id: &str) -> ApiResult<Option<T>> {
        let query = format!(
            "SELECT * FROM {} WHERE {} = ?",
            self.table_name(),
            self.id_field()
        );

        let result = sqlx::query_as::<_, T>(&query)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(result)
    }

    async fn get_required(&self, id: &str) -> ApiResult<T> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("{} with ID '{}' not found", self.entity_name(), id)))
    }

    async fn list_all(&self) -> ApiResult<Vec<T>> {
        let query = format!(
            "SELECT * FROM {} ORDER BY {}",
            self.table_name(),
            self.default_order()
        );

        let rows = sqlx::query_as::<_, T>(&query)
            .fetch_all(self.pool())
            .await?;

        Ok(rows)
    }

    async fn count(&self) -> ApiResult<i64> {
        let query = format!("SELECT COUNT(*) FROM {}", self.table_name());
        let total: i64 = sqlx::query_scalar(&query)
            .fetch_one(self.pool())
            .await?;
        Ok(total)
    }

    async fn delete(&self, id: &str) -> ApiResult<()> {
        let query = format!(
            "DELETE FROM {} WHERE {} = ?",
            self.table_name(),
            self.id_field()
        );

        let result = sqlx::query(&query)
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("{} with ID '{}' not found", self.entity_name(), id)));
        }

        Ok(())
    }
}

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 500;

/// Normalized `(page, per_page, offset)`; pages start at 1.
pub fn page_bounds(page: Option<i64>, per_page: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, per_page, (page - 1) * per_page)
}

/// Экранирование спецсимволов LIKE
pub fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("hay"), "%hay%");
        assert_eq!(like_pattern("50%_mix"), "%50\\%\\_mix%");
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(page_bounds(None, None), (1, 50, 0));
        assert_eq!(page_bounds(Some(3), Some(20)), (3, 20, 40));
        assert_eq!(page_bounds(Some(0), Some(10_000)), (1, 500, 0));
    }
}
