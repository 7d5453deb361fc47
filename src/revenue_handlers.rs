// src/revenue_handlers.rs
use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use validator::Validate;
use crate::AppState;
use crate::audit::audit;
use crate::error::{ApiError, ApiResult};
use crate::handlers::ApiResponse;
use crate::models::*;
use crate::repositories::CrudRepository;
use crate::validator::CustomValidate;

fn check_range(query: &RevenueQuery) -> ApiResult<()> {
    match (query.start_date, query.end_date) {
        (Some(start), Some(end)) if end < start => {
            Err(ApiError::invalid_date_range(&start.to_string(), &end.to_string()))
        }
        _ => Ok(()),
    }
}

pub async fn get_revenue(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<RevenueQuery>,
) -> ApiResult<HttpResponse> {
    check_range(&query)?;
    let records = app_state.revenue.list(&query).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(records)))
}

pub async fn get_revenue_summary(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<RevenueQuery>,
) -> ApiResult<HttpResponse> {
    check_range(&query)?;
    let summary = app_state.revenue.summary(&query).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(summary)))
}

pub async fn create_revenue(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<CreateRevenueRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let data = body.into_inner();
    data.validate()?;
    data.custom_validate().into_result()?;

    let record = app_state.revenue.create(data).await?;
    audit(
        &app_state.db_pool, "create", "revenue", &record.id,
        &format!("Recorded revenue {:.2} on {}", record.amount, record.date),
        &http_request,
    ).await;

    Ok(HttpResponse::Created().json(ApiResponse::success(record)))
}

pub async fn delete_revenue(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    app_state.revenue.delete(&id).await?;
    audit(&app_state.db_pool, "delete", "revenue", &id, "Deleted revenue entry", &http_request).await;
    Ok(HttpResponse::Ok().json(ApiResponse::message("Revenue entry deleted")))
}

pub async fn get_categories(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let categories = app_state.revenue.categories().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(categories)))
}

pub async fn create_category(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<CreateRevenueCategoryRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let data = body.into_inner();
    data.validate()?;

    let category = app_state.revenue.create_category(data).await?;
    audit(
        &app_state.db_pool, "create", "revenue_category", &category.id,
        &format!("Created revenue category {}", category.name),
        &http_request,
    ).await;

    Ok(HttpResponse::Created().json(ApiResponse::success(category)))
}
