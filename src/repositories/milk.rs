// src/repositories/milk.rs
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{page_bounds, CrudRepository};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    duplicate_record_message, CreateMilkRecordRequest, DailyMilkTotal, MilkCollectionRecord,
    MilkCollectionWithCow, MilkInsertOutcome, MilkQuery, Shift, UpdateMilkRecordRequest,
};

const SELECT_WITH_COW: &str = r#"
    SELECT m.*, c.name AS cow_name, c.tag_number AS cow_tag
    FROM milk_production m
    LEFT JOIN cows c ON c.id = m.cow_id
"#;

const ORDER_BY_COLLECTION: &str =
    " ORDER BY m.date ASC, CASE m.shift WHEN 'Morning' THEN 0 ELSE 1 END, c.tag_number ASC";

/// Read side the report pipeline depends on.
#[async_trait]
pub trait MilkRecordSource: Send + Sync {
    /// Collections dated within `[start, end]` (inclusive), joined with cow identity.
    async fn collections_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApiResult<Vec<MilkCollectionWithCow>>;
}

#[derive(Clone)]
pub struct MilkRepository {
    pool: SqlitePool,
}

impl CrudRepository<MilkCollectionRecord> for MilkRepository {
    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn table_name(&self) -> &'static str {
        "milk_production"
    }

    fn default_order(&self) -> &'static str {
        "date DESC, shift ASC"
    }

    fn entity_name(&self) -> &'static str {
        "Milk collection record"
    }
}

#[async_trait]
impl MilkRecordSource for MilkRepository {
    async fn collections_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApiResult<Vec<MilkCollectionWithCow>> {
        let sql = format!("{} WHERE m.date >= ? AND m.date <= ?{}", SELECT_WITH_COW, ORDER_BY_COLLECTION);
        let rows = sqlx::query_as::<_, MilkCollectionWithCow>(&sql)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

impl MilkRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Existing record for the `(cow, date, shift)` key, ignoring `exclude_id`.
    pub async fn find_by_key(
        &self,
        cow_id: &str,
        date: NaiveDate,
        shift: Shift,
        exclude_id: Option<&str>,
    ) -> ApiResult<Option<MilkCollectionRecord>> {
        let record = sqlx::query_as::<_, MilkCollectionRecord>(
            r#"SELECT * FROM milk_production
               WHERE cow_id = ? AND date = ? AND shift = ? AND (? IS NULL OR id != ?)
               LIMIT 1"#,
        )
        .bind(cow_id)
        .bind(date)
        .bind(shift)
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Check-then-insert. Two concurrent inserts of the same key can both pass
    /// the check; the schema carries no unique constraint to stop them.
    pub async fn create(&self, data: CreateMilkRecordRequest) -> ApiResult<MilkInsertOutcome> {
        let cow_exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cows WHERE id = ?")
            .bind(&data.cow_id)
            .fetch_one(&self.pool)
            .await?;
        if cow_exists == 0 {
            return Err(ApiError::NotFound(format!("Cow with ID '{}' not found", data.cow_id)));
        }

        if self.find_by_key(&data.cow_id, data.date, data.shift, None).await?.is_some() {
            log::warn!(
                "Rejected duplicate milk record: cow={} date={} shift={}",
                data.cow_id, data.date, data.shift
            );
            return Ok(MilkInsertOutcome::duplicate(data.date, data.shift));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let quality = data.quality.normalize();

        sqlx::query(
            r#"INSERT INTO milk_production (
                id, cow_id, date, shift, amount,
                fat_percentage, protein_percentage, lactose_percentage, snf_percentage,
                somatic_cell_count, bacteria_count, notes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&data.cow_id)
        .bind(data.date)
        .bind(data.shift)
        .bind(data.amount)
        .bind(quality.fat)
        .bind(quality.protein)
        .bind(quality.lactose)
        .bind(quality.snf)
        .bind(quality.somatic_cell_count)
        .bind(quality.bacteria_count)
        .bind(&data.notes)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let record = self.get_required(&id).await?;
        Ok(MilkInsertOutcome::inserted(record))
    }

    pub async fn update(&self, id: &str, data: UpdateMilkRecordRequest) -> ApiResult<MilkCollectionRecord> {
        let current = self.get_required(id).await?;

        let cow_id = data.cow_id.unwrap_or(current.cow_id);
        let date = data.date.unwrap_or(current.date);
        let shift = data.shift.unwrap_or(current.shift);

        if self.find_by_key(&cow_id, date, shift, Some(id)).await?.is_some() {
            return Err(ApiError::Conflict(duplicate_record_message(date, shift)));
        }

        let quality = data.quality.normalize().or(current.quality_parameters);

        sqlx::query(
            r#"UPDATE milk_production SET
                cow_id = ?, date = ?, shift = ?, amount = ?,
                fat_percentage = ?, protein_percentage = ?, lactose_percentage = ?, snf_percentage = ?,
                somatic_cell_count = ?, bacteria_count = ?, notes = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&cow_id)
        .bind(date)
        .bind(shift)
        .bind(data.amount.unwrap_or(current.amount))
        .bind(quality.fat)
        .bind(quality.protein)
        .bind(quality.lactose)
        .bind(quality.snf)
        .bind(quality.somatic_cell_count)
        .bind(quality.bacteria_count)
        .bind(data.notes.or(current.notes))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_required(id).await
    }

    pub async fn list(&self, query: &MilkQuery) -> ApiResult<(Vec<MilkCollectionWithCow>, i64)> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(start) = query.start_date {
            conditions.push("m.date >= ?");
            params.push(start.format("%Y-%m-%d").to_string());
        }
        if let Some(end) = query.end_date {
            conditions.push("m.date <= ?");
            params.push(end.format("%Y-%m-%d").to_string());
        }
        if let Some(ref cow_id) = query.cow_id {
            conditions.push("m.cow_id = ?");
            params.push(cow_id.clone());
        }
        if let Some(shift) = query.shift {
            conditions.push("m.shift = ?");
            params.push(shift.to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM milk_production m{}", where_clause);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for param in &params {
            count_query = count_query.bind(param);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let (_, per_page, offset) = page_bounds(query.page, query.per_page);

        let sql = format!(
            "{}{} ORDER BY m.date DESC, CASE m.shift WHEN 'Morning' THEN 0 ELSE 1 END, c.tag_number ASC LIMIT ? OFFSET ?",
            SELECT_WITH_COW, where_clause
        );
        let mut data_query = sqlx::query_as::<_, MilkCollectionWithCow>(&sql);
        for param in &params {
            data_query = data_query.bind(param);
        }
        let rows = data_query
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((rows, total))
    }

    /// Per-day production totals for the dashboard chart.
    pub async fn daily_totals(&self, start: NaiveDate, end: NaiveDate) -> ApiResult<Vec<DailyMilkTotal>> {
        let rows = sqlx::query_as::<_, DailyMilkTotal>(
            r#"SELECT date,
                      TOTAL(amount) AS total_amount,
                      TOTAL(CASE WHEN shift = 'Morning' THEN amount END) AS morning_amount,
                      TOTAL(CASE WHEN shift = 'Evening' THEN amount END) AS evening_amount,
                      COUNT(*) AS collection_count
               FROM milk_production
               WHERE date >= ? AND date <= ?
               GROUP BY date
               ORDER BY date ASC"#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn total_between(&self, start: NaiveDate, end: NaiveDate) -> ApiResult<f64> {
        let total: f64 = sqlx::query_scalar(
            "SELECT TOTAL(amount) FROM milk_production WHERE date >= ? AND date <= ?"
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;
    use crate::models::{QualityParameters, QualityPayload};
    use crate::test_fixtures::{date, seed_cow};

    fn request(cow_id: &str, day: NaiveDate, shift: Shift, amount: f64) -> CreateMilkRecordRequest {
        CreateMilkRecordRequest {
            cow_id: cow_id.to_string(),
            date: day,
            shift,
            amount,
            notes: None,
            quality: QualityPayload::default(),
        }
    }

    #[actix_rt::test]
    async fn test_duplicate_key_rejected_with_message() {
        let pool = memory_pool().await;
        let cow = seed_cow(&pool, "Daisy", "T-001").await;
        let repo = MilkRepository::new(pool);
        let day = date(2024, 3, 5);

        let first = repo.create(request(&cow, day, Shift::Morning, 12.0)).await.unwrap();
        assert!(first.success);
        assert!(first.record.is_some());

        let second = repo.create(request(&cow, day, Shift::Morning, 9.0)).await.unwrap();
        assert!(!second.success);
        assert!(second.record.is_none());
        assert_eq!(
            second.message,
            "Milk collection record already exists for this cow on 2024-03-05 for Morning shift. Duplicate records are not allowed."
        );
        assert_eq!(repo.count().await.unwrap(), 1);

        // other shift on the same day is a different key
        let evening = repo.create(request(&cow, day, Shift::Evening, 8.0)).await.unwrap();
        assert!(evening.success);
    }

    #[actix_rt::test]
    async fn test_unknown_cow_is_not_found() {
        let repo = MilkRepository::new(memory_pool().await);
        let err = repo.create(request("missing", date(2024, 3, 5), Shift::Morning, 1.0)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[actix_rt::test]
    async fn test_update_onto_existing_key_conflicts() {
        let pool = memory_pool().await;
        let cow = seed_cow(&pool, "Daisy", "T-001").await;
        let repo = MilkRepository::new(pool);
        let day = date(2024, 3, 5);

        repo.create(request(&cow, day, Shift::Morning, 12.0)).await.unwrap();
        let evening = repo.create(request(&cow, day, Shift::Evening, 8.0)).await.unwrap().record.unwrap();

        let err = repo
            .update(&evening.id, UpdateMilkRecordRequest { shift: Some(Shift::Morning), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m.contains("Duplicate records are not allowed")));

        // re-saving the record under its own key is fine
        let updated = repo
            .update(&evening.id, UpdateMilkRecordRequest { amount: Some(9.5), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.amount, 9.5);
        assert_eq!(updated.shift, Shift::Evening);
    }

    #[actix_rt::test]
    async fn test_quality_round_trip_and_range_query() {
        let pool = memory_pool().await;
        let cow = seed_cow(&pool, "Daisy", "T-001").await;
        let repo = MilkRepository::new(pool);

        let mut req = request(&cow, date(2024, 3, 5), Shift::Morning, 12.0);
        req.quality.quality_parameters = Some(QualityParameters {
            fat: Some(3.9),
            bacteria_count: Some(15000.0),
            ..Default::default()
        });
        repo.create(req).await.unwrap();
        repo.create(request(&cow, date(2024, 3, 6), Shift::Evening, 10.0)).await.unwrap();
        repo.create(request(&cow, date(2024, 3, 9), Shift::Morning, 11.0)).await.unwrap();

        let rows = repo.collections_in_range(date(2024, 3, 5), date(2024, 3, 6)).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].record.quality_parameters.fat, Some(3.9));
        assert_eq!(rows[0].record.quality_parameters.protein, None);
        assert_eq!(rows[0].cow_tag.as_deref(), Some("T-001"));

        let totals = repo.daily_totals(date(2024, 3, 1), date(2024, 3, 31)).await.unwrap();
        assert_eq!(totals.len(), 3);
        assert_eq!(totals[0].morning_amount, 12.0);
        assert_eq!(totals[1].evening_amount, 10.0);

        assert_eq!(repo.total_between(date(2024, 3, 1), date(2024, 3, 31)).await.unwrap(), 33.0);
        assert_eq!(repo.total_between(date(2025, 1, 1), date(2025, 1, 31)).await.unwrap(), 0.0);

        let (page, total) = repo
            .list(&MilkQuery { shift: Some(Shift::Morning), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(page[0].record.date, date(2024, 3, 9));
    }
}
