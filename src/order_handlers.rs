// src/order_handlers.rs
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;
use std::sync::Arc;
use validator::Validate;
use crate::AppState;
use crate::audit::audit;
use crate::error::{ApiError, ApiResult};
use crate::handlers::ApiResponse;
use crate::models::*;
use crate::repositories::CrudRepository;
use crate::validator::CustomValidate;

#[derive(Debug, Serialize)]
pub struct StatusChangeResponse {
    pub order: PurchaseOrderWithItems,
    /// Stock movements caused by the change; empty unless the order was delivered.
    pub stock_adjustments: Vec<StockAdjustment>,
}

pub async fn get_orders(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<OrderQuery>,
) -> ApiResult<HttpResponse> {
    let orders = app_state.orders.list(&query).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(orders)))
}

pub async fn get_order(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let order = app_state.orders.get_with_items(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(order)))
}

pub async fn create_order(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<CreateOrderRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let data = body.into_inner();
    data.validate()?;
    data.custom_validate().into_result()?;

    for line in &data.items {
        if app_state.inventory.get_by_id(&line.item_id).await?.is_none() {
            return Err(ApiError::item_not_found(&line.item_id));
        }
    }

    let order = app_state.orders.create(data).await?;
    audit(
        &app_state.db_pool, "create", "purchase_order", &order.order.id,
        &format!(
            "Created order {} with {} line(s), total {:.2}",
            order.order.order_number, order.items.len(), order.order.total_amount
        ),
        &http_request,
    ).await;

    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        order,
        "Purchase order created".to_string(),
    )))
}

pub async fn update_order_status(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<UpdateOrderStatusRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let status = body.into_inner().status;

    let (order, stock_adjustments) = app_state.orders.update_status(&id, status).await?;
    audit(
        &app_state.db_pool, "status", "purchase_order", &id,
        &format!("Order {} set to {}", order.order.order_number, status),
        &http_request,
    ).await;

    Ok(HttpResponse::Ok().json(ApiResponse::success(StatusChangeResponse {
        order,
        stock_adjustments,
    })))
}

pub async fn delete_order(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    app_state.orders.delete(&id).await?;
    audit(&app_state.db_pool, "delete", "purchase_order", &id, "Deleted purchase order", &http_request).await;
    Ok(HttpResponse::Ok().json(ApiResponse::message("Purchase order deleted")))
}
