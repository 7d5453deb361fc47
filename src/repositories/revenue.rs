// src/repositories/revenue.rs
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::CrudRepository;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    CategoryRevenue, CreateRevenueCategoryRequest, CreateRevenueRequest, MonthlyRevenue,
    RevenueCategory, RevenueQuery, RevenueRecord, RevenueSummary,
};

#[derive(Clone)]
pub struct RevenueRepository {
    pool: SqlitePool,
}

impl CrudRepository<RevenueRecord> for RevenueRepository {
    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn table_name(&self) -> &'static str {
        "revenue_data"
    }

    fn default_order(&self) -> &'static str {
        "date DESC"
    }

    fn entity_name(&self) -> &'static str {
        "Revenue record"
    }
}

/// Shared WHERE clause for list and summary queries over `revenue_data r`.
fn filter(query: &RevenueQuery) -> (String, Vec<String>) {
    let mut conditions: Vec<&str> = Vec::new();
    let mut params = Vec::new();

    if let Some(start) = query.start_date {
        conditions.push("r.date >= ?");
        params.push(start.format("%Y-%m-%d").to_string());
    }
    if let Some(end) = query.end_date {
        conditions.push("r.date <= ?");
        params.push(end.format("%Y-%m-%d").to_string());
    }
    if let Some(ref category_id) = query.category_id {
        conditions.push("r.category_id = ?");
        params.push(category_id.clone());
    }

    if conditions.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), params)
    }
}

impl RevenueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn categories(&self) -> ApiResult<Vec<RevenueCategory>> {
        let rows = sqlx::query_as::<_, RevenueCategory>("SELECT * FROM revenue_categories ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn create_category(&self, data: CreateRevenueCategoryRequest) -> ApiResult<RevenueCategory> {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM revenue_categories WHERE name = ?")
            .bind(&data.name)
            .fetch_one(&self.pool)
            .await?;
        if exists > 0 {
            return Err(ApiError::Conflict(format!("Revenue category '{}' already exists", data.name)));
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO revenue_categories (id, name, description, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(&data.name)
            .bind(&data.description)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        let category = sqlx::query_as::<_, RevenueCategory>("SELECT * FROM revenue_categories WHERE id = ?")
            .bind(&id)
            .fetch_one(&self.pool)
            .await?;
        Ok(category)
    }

    pub async fn create(&self, data: CreateRevenueRequest) -> ApiResult<RevenueRecord> {
        let category: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM revenue_categories WHERE id = ?")
            .bind(&data.category_id)
            .fetch_one(&self.pool)
            .await?;
        if category == 0 {
            return Err(ApiError::NotFound(format!("Revenue category with ID '{}' not found", data.category_id)));
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO revenue_data (id, category_id, amount, date, description, created_at) VALUES (?, ?, ?, ?, ?, ?)"
        )
            .bind(&id)
            .bind(&data.category_id)
            .bind(data.amount)
            .bind(data.date)
            .bind(&data.description)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        self.get_required(&id).await
    }

    pub async fn list(&self, query: &RevenueQuery) -> ApiResult<Vec<RevenueRecord>> {
        let (where_clause, params) = filter(query);
        let sql = format!("SELECT r.* FROM revenue_data r{} ORDER BY r.date DESC", where_clause);
        let mut q = sqlx::query_as::<_, RevenueRecord>(&sql);
        for param in &params {
            q = q.bind(param);
        }
        Ok(q.fetch_all(&self.pool).await?)
    }

    pub async fn summary(&self, query: &RevenueQuery) -> ApiResult<RevenueSummary> {
        let (where_clause, params) = filter(query);

        let by_category_sql = format!(
            r#"SELECT r.category_id, COALESCE(c.name, 'Unknown') AS category_name,
                      TOTAL(r.amount) AS total_amount, COUNT(*) AS entries
               FROM revenue_data r
               LEFT JOIN revenue_categories c ON c.id = r.category_id{}
               GROUP BY r.category_id
               ORDER BY total_amount DESC"#,
            where_clause
        );
        let mut q = sqlx::query_as::<_, CategoryRevenue>(&by_category_sql);
        for param in &params {
            q = q.bind(param);
        }
        let by_category = q.fetch_all(&self.pool).await?;

        let by_month_sql = format!(
            r#"SELECT strftime('%Y-%m', r.date) AS month, TOTAL(r.amount) AS total_amount
               FROM revenue_data r{}
               GROUP BY month
               ORDER BY month ASC"#,
            where_clause
        );
        let mut q = sqlx::query_as::<_, MonthlyRevenue>(&by_month_sql);
        for param in &params {
            q = q.bind(param);
        }
        let by_month = q.fetch_all(&self.pool).await?;

        let total_amount = by_category.iter().map(|c| c.total_amount).sum();

        Ok(RevenueSummary { total_amount, by_category, by_month })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;
    use crate::test_fixtures::date;

    #[actix_rt::test]
    async fn test_summary_groups_by_category_and_month() {
        let repo = RevenueRepository::new(memory_pool().await);
        let milk = repo
            .create_category(CreateRevenueCategoryRequest { name: "Milk sales".into(), description: None })
            .await
            .unwrap();
        let calves = repo
            .create_category(CreateRevenueCategoryRequest { name: "Calf sales".into(), description: None })
            .await
            .unwrap();

        for (category, amount, day) in [
            (&milk.id, 1200.0, date(2024, 1, 15)),
            (&milk.id, 1300.0, date(2024, 2, 15)),
            (&calves.id, 800.0, date(2024, 2, 20)),
        ] {
            repo.create(CreateRevenueRequest {
                category_id: category.clone(),
                amount,
                date: day,
                description: None,
            })
            .await
            .unwrap();
        }

        let summary = repo.summary(&RevenueQuery::default()).await.unwrap();
        assert_eq!(summary.total_amount, 3300.0);
        assert_eq!(summary.by_category[0].category_name, "Milk sales");
        assert_eq!(summary.by_category[0].entries, 2);
        assert_eq!(summary.by_month.len(), 2);
        assert_eq!(summary.by_month[1].month, "2024-02");
        assert_eq!(summary.by_month[1].total_amount, 2100.0);

        let feb = repo
            .list(&RevenueQuery { start_date: Some(date(2024, 2, 1)), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(feb.len(), 2);

        let dup = repo
            .create_category(CreateRevenueCategoryRequest { name: "Milk sales".into(), description: None })
            .await;
        assert!(matches!(dup, Err(ApiError::Conflict(_))));
    }
}
