// src/models/order.rs
use serde::{Deserialize, Serialize};
use validator::Validate;
use chrono::{DateTime, NaiveDate, Utc};

use super::inventory::Department;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq,
    Serialize, Deserialize, sqlx::Type, strum::Display, strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum OrderStatus {
    Pending,
    Ordered,
    Delivered,
    Cancelled,
    Completed,
}

impl OrderStatus {
    /// Delivered and Completed orders have their goods on the shelf.
    pub fn has_received_goods(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Completed)
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct PurchaseOrder {
    pub id: String,
    pub order_number: String,
    pub supplier_id: String,
    pub department: Department,
    pub status: OrderStatus,
    pub order_date: NaiveDate,
    pub expected_delivery: Option<NaiveDate>,
    pub total_amount: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub item_id: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_price: f64,
}

#[derive(Debug, Serialize, Clone)]
pub struct PurchaseOrderWithItems {
    #[serde(flatten)]
    pub order: PurchaseOrder,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct CreateOrderItemRequest {
    #[validate(length(min = 1, message = "Inventory item is required"))]
    pub item_id: String,
    #[validate(range(min = 0.001, message = "Quantity must be positive"))]
    pub quantity: f64,
    #[validate(range(min = 0.0, message = "Unit price must be non-negative"))]
    pub unit_price: f64,
}

impl CreateOrderItemRequest {
    pub fn total_price(&self) -> f64 {
        self.quantity * self.unit_price
    }
}

#[derive(Debug, Deserialize, Validate, Clone)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Supplier is required"))]
    pub supplier_id: String,
    pub department: Department,
    pub order_date: Option<NaiveDate>,
    pub expected_delivery: Option<NaiveDate>,
    #[validate(length(max = 1000, message = "Notes cannot exceed 1000 characters"))]
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "Order must contain at least one item"), nested)]
    pub items: Vec<CreateOrderItemRequest>,
}

impl CreateOrderRequest {
    pub fn total_amount(&self) -> f64 {
        self.items.iter().map(|i| i.total_price()).sum()
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize, Default)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub department: Option<Department>,
    pub supplier_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_order_total() {
        let req = CreateOrderRequest {
            supplier_id: "s1".into(),
            department: Department::Feed,
            order_date: None,
            expected_delivery: None,
            notes: None,
            items: vec![
                CreateOrderItemRequest { item_id: "a".into(), quantity: 2.0, unit_price: 10.5 },
                CreateOrderItemRequest { item_id: "b".into(), quantity: 4.0, unit_price: 2.25 },
            ],
        };
        assert!((req.total_amount() - 30.0).abs() < 1e-9);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_order_requires_items() {
        let req = CreateOrderRequest {
            supplier_id: "s1".into(),
            department: Department::Milking,
            order_date: None,
            expected_delivery: None,
            notes: None,
            items: vec![],
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_order_lines_are_validated() {
        let req = CreateOrderRequest {
            supplier_id: "s1".into(),
            department: Department::Feed,
            order_date: None,
            expected_delivery: None,
            notes: None,
            items: vec![CreateOrderItemRequest { item_id: "i1".into(), quantity: 0.0, unit_price: 2.0 }],
        };
        assert!(req.validate().is_err());

        let line = serde_json::to_value(&req.items[0]).unwrap();
        assert_eq!(line["item_id"], "i1");
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("delivered".parse::<OrderStatus>().unwrap(), OrderStatus::Delivered);
        assert!(OrderStatus::Completed.has_received_goods());
        assert!(!OrderStatus::Ordered.has_received_goods());
    }
}
