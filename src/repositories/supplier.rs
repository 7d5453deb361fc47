// src/repositories/supplier.rs
use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::CrudRepository;
use crate::error::{ApiError, ApiResult};
use crate::models::{CreateSupplierRequest, Supplier, UpdateSupplierRequest};

#[derive(Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl CrudRepository<Supplier> for SupplierRepository {
    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn table_name(&self) -> &'static str {
        "suppliers"
    }

    fn default_order(&self) -> &'static str {
        "name ASC"
    }

    fn entity_name(&self) -> &'static str {
        "Supplier"
    }
}

impl SupplierRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, data: CreateSupplierRequest) -> ApiResult<Supplier> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"INSERT INTO suppliers (
                id, name, contact_person, email, phone, address, category, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 'active', ?, ?)"#,
        )
        .bind(&id)
        .bind(&data.name)
        .bind(&data.contact_person)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(&data.address)
        .bind(&data.category)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_required(&id).await
    }

    pub async fn update(&self, id: &str, data: UpdateSupplierRequest) -> ApiResult<Supplier> {
        let current = self.get_required(id).await?;

        let status = data.status.unwrap_or(current.status);
        if status != "active" && status != "inactive" {
            return Err(ApiError::bad_request("Supplier status must be 'active' or 'inactive'"));
        }

        sqlx::query(
            r#"UPDATE suppliers SET
                name = ?, contact_person = ?, email = ?, phone = ?, address = ?, category = ?,
                status = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(data.name.unwrap_or(current.name))
        .bind(data.contact_person.or(current.contact_person))
        .bind(data.email.or(current.email))
        .bind(data.phone.or(current.phone))
        .bind(data.address.or(current.address))
        .bind(data.category.or(current.category))
        .bind(&status)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_required(id).await
    }

    pub async fn touch_last_order(&self, id: &str, order_date: NaiveDate) -> ApiResult<()> {
        sqlx::query("UPDATE suppliers SET last_order_date = ?, updated_at = ? WHERE id = ?")
            .bind(order_date)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn active_count(&self) -> ApiResult<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM suppliers WHERE status = 'active'")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    pub async fn find_by_name(&self, name: &str) -> ApiResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>(
            "SELECT * FROM suppliers WHERE LOWER(name) = LOWER(?) LIMIT 1"
        )
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(supplier)
    }

    /// Suppliers referenced by orders cannot be removed.
    pub async fn delete_unreferenced(&self, id: &str) -> ApiResult<()> {
        let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM purchase_orders WHERE supplier_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if orders > 0 {
            return Err(ApiError::Conflict(format!(
                "Supplier has {} purchase order(s) and cannot be deleted",
                orders
            )));
        }
        self.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;
    use crate::test_fixtures::{date, supplier_request};

    #[actix_rt::test]
    async fn test_supplier_lifecycle() {
        let repo = SupplierRepository::new(memory_pool().await);
        let supplier = repo.create(supplier_request("Green Pastures Feed")).await.unwrap();
        assert_eq!(supplier.status, "active");
        assert!(supplier.last_order_date.is_none());

        repo.touch_last_order(&supplier.id, date(2024, 4, 2)).await.unwrap();
        let updated = repo
            .update(&supplier.id, UpdateSupplierRequest { status: Some("inactive".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.last_order_date, Some(date(2024, 4, 2)));
        assert_eq!(repo.active_count().await.unwrap(), 0);

        let bad = repo
            .update(&supplier.id, UpdateSupplierRequest { status: Some("paused".into()), ..Default::default() })
            .await;
        assert!(matches!(bad, Err(ApiError::BadRequest(_))));

        repo.delete_unreferenced(&supplier.id).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
