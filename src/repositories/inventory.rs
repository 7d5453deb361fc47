// src/repositories/inventory.rs
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{like_pattern, page_bounds, CrudRepository};
use crate::error::{validate_quantity, ApiError, ApiResult};
use crate::models::{
    AdjustStockRequest, AdjustmentType, CreateInventoryItemRequest, Department, InventoryItem, InventoryQuery,
    StockAdjustment, StockStatus, UpdateInventoryItemRequest,
};

#[derive(Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl CrudRepository<InventoryItem> for InventoryRepository {
    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn table_name(&self) -> &'static str {
        "inventory_items"
    }

    fn default_order(&self) -> &'static str {
        "name ASC"
    }

    fn entity_name(&self) -> &'static str {
        "Inventory item"
    }
}

/// SQL condition matching a derived stock status.
fn status_condition(status: StockStatus) -> &'static str {
    match status {
        StockStatus::OutOfStock => "current_stock <= 0",
        StockStatus::LowStock => "(current_stock > 0 AND current_stock <= reorder_level)",
        StockStatus::InStock => "current_stock > reorder_level AND current_stock > 0",
    }
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, query: &InventoryQuery) -> ApiResult<(Vec<InventoryItem>, i64)> {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(department) = query.department {
            conditions.push("department = ?".to_string());
            params.push(department.to_string());
        }
        if let Some(ref status) = query.status {
            let status: StockStatus = status
                .parse()
                .map_err(|_| ApiError::bad_request(&format!("Unknown stock status '{}'", status)))?;
            conditions.push(status_condition(status).to_string());
        }
        if let Some(ref search) = query.search {
            if !search.trim().is_empty() {
                conditions.push("(name LIKE ? ESCAPE '\\' OR description LIKE ? ESCAPE '\\')".to_string());
                let pattern = like_pattern(search.trim());
                params.push(pattern.clone());
                params.push(pattern);
            }
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM inventory_items{}", where_clause);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for param in &params {
            count_query = count_query.bind(param);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let (_, per_page, offset) = page_bounds(query.page, query.per_page);

        let sql = format!(
            "SELECT * FROM inventory_items{} ORDER BY name ASC LIMIT ? OFFSET ?",
            where_clause
        );
        let mut data_query = sqlx::query_as::<_, InventoryItem>(&sql);
        for param in &params {
            data_query = data_query.bind(param);
        }
        let items = data_query
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((items, total))
    }

    pub async fn low_stock(&self) -> ApiResult<Vec<InventoryItem>> {
        let items = sqlx::query_as::<_, InventoryItem>(
            "SELECT * FROM inventory_items WHERE current_stock <= reorder_level ORDER BY current_stock ASC, name ASC"
        )
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    pub async fn create(&self, data: CreateInventoryItemRequest) -> ApiResult<InventoryItem> {
        validate_quantity(data.current_stock)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"INSERT INTO inventory_items (
                id, name, department, current_stock, reorder_level, unit, unit_price,
                supplier_id, description, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&data.name)
        .bind(data.department)
        .bind(data.current_stock)
        .bind(data.reorder_level)
        .bind(&data.unit)
        .bind(data.unit_price)
        .bind(&data.supplier_id)
        .bind(&data.description)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_required(&id).await
    }

    /// Stock is not editable here; it moves only through adjustments and deliveries.
    pub async fn update(&self, id: &str, data: UpdateInventoryItemRequest) -> ApiResult<InventoryItem> {
        let current = self.get_required(id).await?;

        sqlx::query(
            r#"UPDATE inventory_items SET
                name = ?, department = ?, reorder_level = ?, unit = ?, unit_price = ?,
                supplier_id = ?, description = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(data.name.unwrap_or(current.name))
        .bind(data.department.unwrap_or(current.department))
        .bind(data.reorder_level.unwrap_or(current.reorder_level))
        .bind(data.unit.unwrap_or(current.unit))
        .bind(data.unit_price.unwrap_or(current.unit_price))
        .bind(data.supplier_id.or(current.supplier_id))
        .bind(data.description.or(current.description))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_required(id).await
    }

    /// Manual adjustment: `Addition`/`Removal` move stock by `quantity`,
    /// `Correction` sets it to `quantity`.
    pub async fn adjust_stock(&self, id: &str, data: &AdjustStockRequest) -> ApiResult<StockAdjustment> {
        validate_quantity(data.quantity)?;
        let item = self.get_required(id).await?;

        let (delta, new_stock) = match data.adjustment_type {
            AdjustmentType::Addition => (data.quantity, item.current_stock + data.quantity),
            AdjustmentType::Removal => {
                if data.quantity > item.current_stock {
                    return Err(ApiError::insufficient_stock(item.current_stock, data.quantity));
                }
                (data.quantity, item.current_stock - data.quantity)
            }
            AdjustmentType::Correction => ((data.quantity - item.current_stock).abs(), data.quantity),
        };

        self.apply_stock_change(&item, data.adjustment_type, delta, new_stock, data.reason.as_deref(), None)
            .await
    }

    /// Writes the new stock level, then the audit row. Two statements, no transaction.
    pub async fn apply_stock_change(
        &self,
        item: &InventoryItem,
        adjustment_type: AdjustmentType,
        quantity: f64,
        new_stock: f64,
        reason: Option<&str>,
        reference_id: Option<&str>,
    ) -> ApiResult<StockAdjustment> {
        let now = Utc::now();

        sqlx::query("UPDATE inventory_items SET current_stock = ?, updated_at = ? WHERE id = ?")
            .bind(new_stock)
            .bind(now)
            .bind(&item.id)
            .execute(&self.pool)
            .await?;

        let adjustment = StockAdjustment {
            id: Uuid::new_v4().to_string(),
            item_id: item.id.clone(),
            adjustment_type,
            quantity,
            previous_stock: item.current_stock,
            new_stock,
            reason: reason.map(str::to_string),
            reference_id: reference_id.map(str::to_string),
            created_at: now,
        };

        sqlx::query(
            r#"INSERT INTO stock_adjustments (
                id, item_id, adjustment_type, quantity, previous_stock, new_stock,
                reason, reference_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&adjustment.id)
        .bind(&adjustment.item_id)
        .bind(adjustment.adjustment_type)
        .bind(adjustment.quantity)
        .bind(adjustment.previous_stock)
        .bind(adjustment.new_stock)
        .bind(&adjustment.reason)
        .bind(&adjustment.reference_id)
        .bind(adjustment.created_at)
        .execute(&self.pool)
        .await?;

        log::info!(
            "Stock {} for item {}: {} -> {}",
            adjustment.adjustment_type, item.id, adjustment.previous_stock, adjustment.new_stock
        );

        Ok(adjustment)
    }

    pub async fn adjustments(&self, item_id: &str) -> ApiResult<Vec<StockAdjustment>> {
        let rows = sqlx::query_as::<_, StockAdjustment>(
            "SELECT * FROM stock_adjustments WHERE item_id = ? ORDER BY created_at DESC"
        )
            .bind(item_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn status_counts(&self) -> ApiResult<(i64, i64, f64)> {
        let row: (i64, i64, f64) = sqlx::query_as(
            r#"SELECT
                 COUNT(CASE WHEN current_stock > 0 AND current_stock <= reorder_level THEN 1 END),
                 COUNT(CASE WHEN current_stock <= 0 THEN 1 END),
                 TOTAL(CASE WHEN current_stock > 0 THEN current_stock * unit_price END)
               FROM inventory_items"#,
        )
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    /// Case-insensitive name match within a department.
    pub async fn find_by_name(&self, name: &str, department: Department) -> ApiResult<Option<InventoryItem>> {
        let item = sqlx::query_as::<_, InventoryItem>(
            "SELECT * FROM inventory_items WHERE LOWER(name) = LOWER(?) AND department = ? LIMIT 1"
        )
            .bind(name.trim())
            .bind(department)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    /// Items that appear on purchase orders cannot be removed.
    pub async fn delete_unreferenced(&self, id: &str) -> ApiResult<()> {
        let lines: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM purchase_order_items WHERE item_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if lines > 0 {
            return Err(ApiError::Conflict(format!(
                "Inventory item is referenced by {} purchase order line(s) and cannot be deleted",
                lines
            )));
        }
        self.delete(id).await
    }
}
