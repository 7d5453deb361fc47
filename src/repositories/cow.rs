// src/repositories/cow.rs
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::CrudRepository;
use crate::error::{ApiError, ApiResult};
use crate::models::{Cow, CreateCowRequest, UpdateCowRequest};

#[derive(Clone)]
pub struct CowRepository {
    pool: SqlitePool,
}

impl CrudRepository<Cow> for CowRepository {
    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn table_name(&self) -> &'static str {
        "cows"
    }

    fn default_order(&self) -> &'static str {
        "tag_number ASC"
    }

    fn entity_name(&self) -> &'static str {
        "Cow"
    }
}

impl CowRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, data: CreateCowRequest) -> ApiResult<Cow> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cows WHERE tag_number = ?")
            .bind(&data.tag_number)
            .fetch_one(&self.pool)
            .await?;
        if existing > 0 {
            return Err(ApiError::Conflict(format!("Cow with tag '{}' already exists", data.tag_number)));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"INSERT INTO cows (id, name, tag_number, breed, status, date_of_birth, created_at, updated_at)
               VALUES (?, ?, ?, ?, 'active', ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&data.name)
        .bind(&data.tag_number)
        .bind(&data.breed)
        .bind(data.date_of_birth)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_required(&id).await
    }

    pub async fn update(&self, id: &str, data: UpdateCowRequest) -> ApiResult<Cow> {
        let current = self.get_required(id).await?;

        sqlx::query(
            r#"UPDATE cows SET name = ?, tag_number = ?, breed = ?, status = ?, date_of_birth = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(data.name.unwrap_or(current.name))
        .bind(data.tag_number.unwrap_or(current.tag_number))
        .bind(data.breed.or(current.breed))
        .bind(data.status.unwrap_or(current.status))
        .bind(data.date_of_birth.or(current.date_of_birth))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_required(id).await
    }

    pub async fn active_count(&self) -> ApiResult<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cows WHERE status = 'active'")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    /// Cows with recorded collections are kept for the production history.
    pub async fn delete_unreferenced(&self, id: &str) -> ApiResult<()> {
        let records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM milk_production WHERE cow_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if records > 0 {
            return Err(ApiError::Conflict(format!(
                "Cow has {} milk collection record(s) and cannot be deleted",
                records
            )));
        }
        self.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;

    pub fn cow_request(name: &str, tag: &str) -> CreateCowRequest {
        CreateCowRequest {
            name: name.to_string(),
            tag_number: tag.to_string(),
            breed: Some("Holstein".to_string()),
            date_of_birth: None,
        }
    }

    #[actix_rt::test]
    async fn test_create_update_delete_cow() {
        let repo = CowRepository::new(memory_pool().await);
        let cow = repo.create(cow_request("Daisy", "T-001")).await.unwrap();
        assert_eq!(cow.status, "active");

        let updated = repo
            .update(&cow.id, UpdateCowRequest { name: Some("Daisy II".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.name, "Daisy II");
        assert_eq!(updated.tag_number, "T-001");

        repo.delete(&cow.id).await.unwrap();
        assert!(repo.get_by_id(&cow.id).await.unwrap().is_none());
        assert!(matches!(repo.delete(&cow.id).await, Err(ApiError::NotFound(_))));
    }

    #[actix_rt::test]
    async fn test_duplicate_tag_rejected() {
        let repo = CowRepository::new(memory_pool().await);
        repo.create(cow_request("Daisy", "T-001")).await.unwrap();
        let err = repo.create(cow_request("Bella", "T-001")).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }
}
