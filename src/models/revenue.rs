// src/models/revenue.rs
use serde::{Deserialize, Serialize};
use validator::Validate;
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct RevenueCategory {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct RevenueRecord {
    pub id: String,
    pub category_id: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRevenueCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(max = 500, message = "Description cannot exceed 500 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRevenueRequest {
    #[validate(length(min = 1, message = "Category is required"))]
    pub category_id: String,
    #[validate(range(min = 0.0, message = "Amount must be non-negative"))]
    pub amount: f64,
    pub date: NaiveDate,
    #[validate(length(max = 500, message = "Description cannot exceed 500 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RevenueQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub category_id: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct CategoryRevenue {
    pub category_id: String,
    pub category_name: String,
    pub total_amount: f64,
    pub entries: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`
    pub month: String,
    pub total_amount: f64,
}

#[derive(Debug, Serialize)]
pub struct RevenueSummary {
    pub total_amount: f64,
    pub by_category: Vec<CategoryRevenue>,
    pub by_month: Vec<MonthlyRevenue>,
}
