// src/handlers.rs
use actix_web::{web, HttpResponse};
use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use crate::AppState;
use crate::error::ApiResult;
use crate::models::DashboardStats;
use crate::repositories::{page_bounds, CrudRepository};

// ==================== COMMON STRUCTURES ====================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T> PaginatedResponse<T> {
    /// Page numbers are normalized the same way the repositories normalize them.
    pub fn new(data: Vec<T>, total: i64, page: Option<i64>, per_page: Option<i64>) -> Self {
        let (page, per_page, _) = page_bounds(page, per_page);
        Self {
            data,
            total,
            page,
            per_page,
            total_pages: (total + per_page - 1) / per_page,
        }
    }
}

// ==================== DASHBOARD STATISTICS ====================

pub async fn get_dashboard_stats(
    app_state: web::Data<Arc<AppState>>,
) -> ApiResult<HttpResponse> {
    let today = Utc::now().date_naive();

    let (low_stock_items, out_of_stock_items, inventory_value) = app_state.inventory.status_counts().await?;

    let stats = DashboardStats {
        total_inventory_items: app_state.inventory.count().await?,
        low_stock_items,
        out_of_stock_items,
        inventory_value,
        pending_orders: app_state.orders.pending_count().await?,
        active_suppliers: app_state.suppliers.active_count().await?,
        total_cows: app_state.cows.active_count().await?,
        milk_today: app_state.milk.total_between(today, today).await?,
        milk_last_7_days: app_state.milk.total_between(today - Duration::days(6), today).await?,
        reports_generated: app_state.reports.completed_count().await?,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(stats)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginated_response_pages() {
        let page = PaginatedResponse::new(vec![1, 2, 3], 101, Some(2), Some(50));
        assert_eq!(page.page, 2);
        assert_eq!(page.per_page, 50);
        assert_eq!(page.total_pages, 3);

        let empty: PaginatedResponse<i32> = PaginatedResponse::new(vec![], 0, None, None);
        assert_eq!(empty.total_pages, 0);
        assert_eq!(empty.per_page, 50);
    }

    #[test]
    fn test_message_response_shape() {
        let body = serde_json::to_value(ApiResponse::message("Cow deleted")).unwrap();
        assert_eq!(body["success"], true);
        assert!(body["data"].is_null());
        assert_eq!(body["message"], "Cow deleted");
    }
}
