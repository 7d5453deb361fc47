// src/repositories/order.rs
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{CrudRepository, InventoryRepository, SupplierRepository};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AdjustmentType, CreateOrderRequest, OrderItem, OrderQuery, OrderStatus, PurchaseOrder,
    PurchaseOrderWithItems, StockAdjustment,
};

#[derive(Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
    inventory: InventoryRepository,
    suppliers: SupplierRepository,
}

impl CrudRepository<PurchaseOrder> for OrderRepository {
    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn table_name(&self) -> &'static str {
        "purchase_orders"
    }

    fn default_order(&self) -> &'static str {
        "order_date DESC, created_at DESC"
    }

    fn entity_name(&self) -> &'static str {
        "Purchase order"
    }
}

/// `PO-YYYYMMDD-XXXXXX`, suffix taken from the order id.
fn order_number(id: &str, created: chrono::DateTime<Utc>) -> String {
    let suffix: String = id.chars().filter(|c| c.is_ascii_hexdigit()).take(6).collect();
    format!("PO-{}-{}", created.format("%Y%m%d"), suffix.to_uppercase())
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            inventory: InventoryRepository::new(pool.clone()),
            suppliers: SupplierRepository::new(pool.clone()),
            pool,
        }
    }

    /// Header first, then one insert per line. A failing line leaves the
    /// header and earlier lines in place.
    pub async fn create(&self, data: CreateOrderRequest) -> ApiResult<PurchaseOrderWithItems> {
        self.suppliers.get_required(&data.supplier_id).await?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let order_date = data.order_date.unwrap_or_else(|| now.date_naive());

        sqlx::query(
            r#"INSERT INTO purchase_orders (
                id, order_number, supplier_id, department, status, order_date,
                expected_delivery, total_amount, notes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(order_number(&id, now))
        .bind(&data.supplier_id)
        .bind(data.department)
        .bind(OrderStatus::Pending)
        .bind(order_date)
        .bind(data.expected_delivery)
        .bind(data.total_amount())
        .bind(&data.notes)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        for line in &data.items {
            sqlx::query(
                r#"INSERT INTO purchase_order_items (id, order_id, item_id, quantity, unit_price, total_price)
                   VALUES (?, ?, ?, ?, ?, ?)"#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&id)
            .bind(&line.item_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.total_price())
            .execute(&self.pool)
            .await?;
        }

        self.suppliers.touch_last_order(&data.supplier_id, order_date).await?;

        log::info!("Created purchase order {} with {} line(s)", id, data.items.len());
        self.get_with_items(&id).await
    }

    pub async fn items(&self, order_id: &str) -> ApiResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM purchase_order_items WHERE order_id = ? ORDER BY rowid ASC"
        )
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    pub async fn get_with_items(&self, id: &str) -> ApiResult<PurchaseOrderWithItems> {
        let order = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| ApiError::order_not_found(id))?;
        let items = self.items(id).await?;
        Ok(PurchaseOrderWithItems { order, items })
    }

    pub async fn list(&self, query: &OrderQuery) -> ApiResult<Vec<PurchaseOrder>> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(status) = query.status {
            conditions.push("status = ?");
            params.push(status.to_string());
        }
        if let Some(department) = query.department {
            conditions.push("department = ?");
            params.push(department.to_string());
        }
        if let Some(ref supplier_id) = query.supplier_id {
            conditions.push("supplier_id = ?");
            params.push(supplier_id.clone());
        }

        let mut sql = String::from("SELECT * FROM purchase_orders");
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY order_date DESC, created_at DESC");

        let mut q = sqlx::query_as::<_, PurchaseOrder>(&sql);
        for param in &params {
            q = q.bind(param);
        }
        Ok(q.fetch_all(&self.pool).await?)
    }

    /// Whether stock has already been booked in for this order.
    async fn goods_received(&self, id: &str) -> ApiResult<bool> {
        let booked: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM stock_adjustments WHERE reference_id = ? AND adjustment_type = 'Addition'"
        )
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(booked > 0)
    }

    /// The first move into `Delivered` or `Completed` adds each line's
    /// quantity to stock and records an `Addition`. Later moves, including
    /// a revert and re-delivery, add nothing.
    pub async fn update_status(
        &self,
        id: &str,
        status: OrderStatus,
    ) -> ApiResult<(PurchaseOrderWithItems, Vec<StockAdjustment>)> {
        let current = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| ApiError::order_not_found(id))?;

        if current.status == OrderStatus::Cancelled && status != OrderStatus::Cancelled {
            return Err(ApiError::bad_request("Cancelled orders cannot change status"));
        }

        sqlx::query("UPDATE purchase_orders SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        let mut adjustments = Vec::new();
        if status.has_received_goods() && !self.goods_received(id).await? {
            for line in self.items(id).await? {
                let item = self.inventory.get_required(&line.item_id).await?;
                let new_stock = item.current_stock + line.quantity;
                let reason = format!("Delivery of order {}", current.order_number);
                let adjustment = self
                    .inventory
                    .apply_stock_change(
                        &item,
                        AdjustmentType::Addition,
                        line.quantity,
                        new_stock,
                        Some(&reason),
                        Some(id),
                    )
                    .await?;
                adjustments.push(adjustment);
            }
            log::info!("Order {} delivered, {} stock line(s) received", id, adjustments.len());
        }

        Ok((self.get_with_items(id).await?, adjustments))
    }

    pub async fn pending_count(&self) -> ApiResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM purchase_orders WHERE status IN ('Pending', 'Ordered')"
        )
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;
    use crate::models::{CreateOrderItemRequest, Department};
    use crate::test_fixtures::{date, item_request, seed_supplier};

    async fn setup() -> (OrderRepository, InventoryRepository, String, String, String) {
        let pool = memory_pool().await;
        let supplier = seed_supplier(&pool, "Green Pastures Feed").await;
        let inventory = InventoryRepository::new(pool.clone());
        let hay = inventory.create(item_request("Hay bales", Department::Feed, 10.0, 5.0)).await.unwrap();
        let mix = inventory.create(item_request("Mineral mix", Department::Feed, 0.0, 2.0)).await.unwrap();
        (OrderRepository::new(pool), inventory, supplier, hay.id, mix.id)
    }

    fn order(supplier: &str, hay: &str, mix: &str) -> CreateOrderRequest {
        CreateOrderRequest {
            supplier_id: supplier.to_string(),
            department: Department::Feed,
            order_date: Some(date(2024, 4, 2)),
            expected_delivery: None,
            notes: None,
            items: vec![
                CreateOrderItemRequest { item_id: hay.to_string(), quantity: 20.0, unit_price: 3.0 },
                CreateOrderItemRequest { item_id: mix.to_string(), quantity: 4.0, unit_price: 12.5 },
            ],
        }
    }

    #[actix_rt::test]
    async fn test_create_order_sets_totals_and_supplier_date() {
        let (repo, _, supplier, hay, mix) = setup().await;
        let created = repo.create(order(&supplier, &hay, &mix)).await.unwrap();

        assert_eq!(created.order.status, OrderStatus::Pending);
        assert_eq!(created.items.len(), 2);
        assert!((created.order.total_amount - 110.0).abs() < 1e-9);
        assert!(created.order.order_number.starts_with("PO-"));

        let supplier = repo.suppliers.get_required(&supplier).await.unwrap();
        assert_eq!(supplier.last_order_date, Some(date(2024, 4, 2)));
        assert_eq!(repo.pending_count().await.unwrap(), 1);
    }

    #[actix_rt::test]
    async fn test_delivery_increases_stock_once() {
        let (repo, inventory, supplier, hay, mix) = setup().await;
        let created = repo.create(order(&supplier, &hay, &mix)).await.unwrap();
        let id = created.order.id.clone();

        let (delivered, adjustments) = repo.update_status(&id, OrderStatus::Delivered).await.unwrap();
        assert_eq!(delivered.order.status, OrderStatus::Delivered);
        assert_eq!(adjustments.len(), 2);
        assert!(adjustments.iter().all(|a| a.adjustment_type == AdjustmentType::Addition));
        assert!(adjustments.iter().all(|a| a.reference_id.as_deref() == Some(id.as_str())));

        assert_eq!(inventory.get_required(&hay).await.unwrap().current_stock, 30.0);
        assert_eq!(inventory.get_required(&mix).await.unwrap().current_stock, 4.0);

        // delivering again must not double count
        let (_, again) = repo.update_status(&id, OrderStatus::Delivered).await.unwrap();
        assert!(again.is_empty());
        assert_eq!(inventory.get_required(&hay).await.unwrap().current_stock, 30.0);
        assert_eq!(inventory.adjustments(&hay).await.unwrap().len(), 1);
    }

    #[actix_rt::test]
    async fn test_list_and_unknown_order() {
        let (repo, _, supplier, hay, mix) = setup().await;
        repo.create(order(&supplier, &hay, &mix)).await.unwrap();

        let pending = repo.list(&OrderQuery { status: Some(OrderStatus::Pending), ..Default::default() }).await.unwrap();
        assert_eq!(pending.len(), 1);
        let delivered = repo.list(&OrderQuery { status: Some(OrderStatus::Delivered), ..Default::default() }).await.unwrap();
        assert!(delivered.is_empty());

        assert!(matches!(repo.update_status("nope", OrderStatus::Ordered).await, Err(ApiError::NotFound(_))));
    }

    #[actix_rt::test]
    async fn test_revert_and_redeliver_adds_stock_once() {
        let (repo, inventory, supplier, hay, mix) = setup().await;
        let id = repo.create(order(&supplier, &hay, &mix)).await.unwrap().order.id;

        repo.update_status(&id, OrderStatus::Delivered).await.unwrap();
        let (_, reverted) = repo.update_status(&id, OrderStatus::Ordered).await.unwrap();
        assert!(reverted.is_empty());
        let (_, again) = repo.update_status(&id, OrderStatus::Delivered).await.unwrap();
        assert!(again.is_empty());

        assert_eq!(inventory.get_required(&hay).await.unwrap().current_stock, 30.0);
        assert_eq!(inventory.adjustments(&hay).await.unwrap().len(), 1);
    }

    #[actix_rt::test]
    async fn test_completed_without_delivery_receives_goods() {
        let (repo, inventory, supplier, hay, mix) = setup().await;
        let id = repo.create(order(&supplier, &hay, &mix)).await.unwrap().order.id;

        let (_, completed) = repo.update_status(&id, OrderStatus::Completed).await.unwrap();
        assert_eq!(completed.len(), 2);
        assert_eq!(inventory.get_required(&hay).await.unwrap().current_stock, 30.0);

        let (_, delivered) = repo.update_status(&id, OrderStatus::Delivered).await.unwrap();
        assert!(delivered.is_empty());
        assert_eq!(inventory.get_required(&hay).await.unwrap().current_stock, 30.0);
        assert_eq!(inventory.adjustments(&mix).await.unwrap().len(), 1);
    }
}
