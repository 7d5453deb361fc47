// src/models/mod.rs

pub mod cow;
pub mod inventory;
pub mod milk;
pub mod order;
pub mod report;
pub mod revenue;
pub mod supplier;

pub use cow::*;
pub use inventory::*;
pub use milk::*;
pub use order::*;
pub use report::*;
pub use revenue::*;
pub use supplier::*;

use serde::Serialize;

// ==================== COMMON / SHARED ====================

/// Общая статистика для дашборда
#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_inventory_items: i64,
    pub low_stock_items: i64,
    pub out_of_stock_items: i64,
    pub inventory_value: f64,
    pub pending_orders: i64,
    pub active_suppliers: i64,
    pub total_cows: i64,
    pub milk_today: f64,
    pub milk_last_7_days: f64,
    pub reports_generated: i64,
}
