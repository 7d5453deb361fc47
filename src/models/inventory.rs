// src/models/inventory.rs
use serde::{Deserialize, Serialize};
use validator::Validate;
use chrono::{DateTime, Utc};

// ==================== DEPARTMENT ====================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, sqlx::Type, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Department {
    Feed,
    Milking,
    Equipment,
    Health,
}

// ==================== STOCK STATUS ====================

/// Derived from stock levels, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
pub enum StockStatus {
    #[serde(rename = "In Stock")]
    #[strum(serialize = "In Stock")]
    InStock,
    #[serde(rename = "Low Stock")]
    #[strum(serialize = "Low Stock")]
    LowStock,
    #[serde(rename = "Out of Stock")]
    #[strum(serialize = "Out of Stock")]
    OutOfStock,
}

impl StockStatus {
    pub fn derive(current_stock: f64, reorder_level: f64) -> Self {
        if current_stock <= 0.0 {
            StockStatus::OutOfStock
        } else if current_stock <= reorder_level {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }
}

// ==================== INVENTORY ITEM ====================

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    pub department: Department,
    pub current_stock: f64,
    pub reorder_level: f64,
    pub unit: String,
    pub unit_price: f64,
    pub supplier_id: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn status(&self) -> StockStatus {
        StockStatus::derive(self.current_stock, self.reorder_level)
    }

    pub fn stock_value(&self) -> f64 {
        self.current_stock.max(0.0) * self.unit_price
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct InventoryItemResponse {
    #[serde(flatten)]
    pub item: InventoryItem,
    pub status: StockStatus,
}

impl From<InventoryItem> for InventoryItemResponse {
    fn from(item: InventoryItem) -> Self {
        let status = item.status();
        Self { item, status }
    }
}

#[derive(Debug, Deserialize, Validate, Clone)]
pub struct CreateInventoryItemRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: String,
    pub department: Department,
    #[validate(range(min = 0.0, message = "Stock must be non-negative"))]
    pub current_stock: f64,
    #[validate(range(min = 0.0, message = "Reorder level must be non-negative"))]
    pub reorder_level: f64,
    #[validate(length(min = 1, max = 20, message = "Unit must be between 1 and 20 characters"))]
    pub unit: String,
    #[validate(range(min = 0.0, message = "Unit price must be non-negative"))]
    pub unit_price: f64,
    pub supplier_id: Option<String>,
    #[validate(length(max = 1000, message = "Description cannot exceed 1000 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateInventoryItemRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: Option<String>,
    pub department: Option<Department>,
    #[validate(range(min = 0.0, message = "Reorder level must be non-negative"))]
    pub reorder_level: Option<f64>,
    #[validate(length(min = 1, max = 20, message = "Unit must be between 1 and 20 characters"))]
    pub unit: Option<String>,
    #[validate(range(min = 0.0, message = "Unit price must be non-negative"))]
    pub unit_price: Option<f64>,
    pub supplier_id: Option<String>,
    #[validate(length(max = 1000, message = "Description cannot exceed 1000 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct InventoryQuery {
    pub department: Option<Department>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

// ==================== STOCK ADJUSTMENT ====================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq,
    Serialize, Deserialize, sqlx::Type, strum::Display, strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum AdjustmentType {
    Addition,
    Removal,
    Correction,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct StockAdjustment {
    pub id: String,
    pub item_id: String,
    pub adjustment_type: AdjustmentType,
    pub quantity: f64,
    pub previous_stock: f64,
    pub new_stock: f64,
    pub reason: Option<String>,
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustStockRequest {
    pub adjustment_type: AdjustmentType,
    /// Amount added or removed; for `Correction` the new absolute stock level.
    #[validate(range(min = 0.0, message = "Quantity must be non-negative"))]
    pub quantity: f64,
    #[validate(length(max = 500, message = "Reason cannot exceed 500 characters"))]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_status_derivation() {
        assert_eq!(StockStatus::derive(0.0, 10.0), StockStatus::OutOfStock);
        assert_eq!(StockStatus::derive(-3.0, 10.0), StockStatus::OutOfStock);
        assert_eq!(StockStatus::derive(0.5, 10.0), StockStatus::LowStock);
        assert_eq!(StockStatus::derive(10.0, 10.0), StockStatus::LowStock);
        assert_eq!(StockStatus::derive(10.01, 10.0), StockStatus::InStock);
        // zero reorder level: any positive stock is in stock
        assert_eq!(StockStatus::derive(1.0, 0.0), StockStatus::InStock);
    }

    #[test]
    fn test_stock_status_labels() {
        assert_eq!(StockStatus::OutOfStock.to_string(), "Out of Stock");
        assert_eq!("Low Stock".parse::<StockStatus>().unwrap(), StockStatus::LowStock);
        assert_eq!(
            serde_json::to_value(StockStatus::InStock).unwrap(),
            serde_json::json!("In Stock")
        );
    }

    #[test]
    fn test_department_round_trip() {
        assert_eq!("Feed".parse::<Department>().unwrap(), Department::Feed);
        assert_eq!(Department::Milking.to_string(), "milking");
        let d: Department = serde_json::from_value(serde_json::json!("health")).unwrap();
        assert_eq!(d, Department::Health);
    }
}
