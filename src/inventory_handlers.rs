// src/inventory_handlers.rs
//! Обработчики для складских позиций

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;
use std::sync::Arc;
use validator::Validate;
use crate::AppState;
use crate::audit::audit;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{ApiResponse, PaginatedResponse};
use crate::models::*;
use crate::repositories::CrudRepository;
use crate::validator::CustomValidate;

#[derive(Debug, Serialize)]
pub struct AdjustmentResponse {
    pub item: InventoryItemResponse,
    pub adjustment: StockAdjustment,
}

pub async fn get_inventory(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<InventoryQuery>,
) -> ApiResult<HttpResponse> {
    let (items, total) = app_state.inventory.list(&query).await?;
    let data: Vec<InventoryItemResponse> = items.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(PaginatedResponse::new(
        data,
        total,
        query.page,
        query.per_page,
    ))))
}

pub async fn get_inventory_item(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let item = app_state
        .inventory
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::item_not_found(&id))?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(InventoryItemResponse::from(item))))
}

pub async fn get_low_stock(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let items: Vec<InventoryItemResponse> = app_state
        .inventory
        .low_stock()
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(items)))
}

pub async fn create_inventory_item(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<CreateInventoryItemRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let data = body.into_inner();
    data.validate()?;
    data.custom_validate().into_result()?;

    if let Some(ref supplier_id) = data.supplier_id {
        app_state.suppliers.get_required(supplier_id).await?;
    }

    let item = app_state.inventory.create(data).await?;
    audit(
        &app_state.db_pool, "create", "inventory_item", &item.id,
        &format!("Created inventory item {} ({})", item.name, item.department),
        &http_request,
    ).await;

    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        InventoryItemResponse::from(item),
        "Inventory item created".to_string(),
    )))
}

pub async fn update_inventory_item(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<UpdateInventoryItemRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let data = body.into_inner();
    data.validate()?;
    data.custom_validate().into_result()?;

    if let Some(ref supplier_id) = data.supplier_id {
        app_state.suppliers.get_required(supplier_id).await?;
    }

    let item = app_state.inventory.update(&id, data).await?;
    audit(
        &app_state.db_pool, "edit", "inventory_item", &id,
        &format!("Updated inventory item {}", item.name),
        &http_request,
    ).await;

    Ok(HttpResponse::Ok().json(ApiResponse::success(InventoryItemResponse::from(item))))
}

pub async fn delete_inventory_item(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    app_state.inventory.delete_unreferenced(&id).await?;
    audit(&app_state.db_pool, "delete", "inventory_item", &id, "Deleted inventory item", &http_request).await;
    Ok(HttpResponse::Ok().json(ApiResponse::message("Inventory item deleted")))
}

pub async fn adjust_stock(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<AdjustStockRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let data = body.into_inner();
    data.validate()?;
    data.custom_validate().into_result()?;

    let adjustment = app_state.inventory.adjust_stock(&id, &data).await?;
    let item = app_state.inventory.get_required(&id).await?;

    audit(
        &app_state.db_pool, "adjust", "inventory_item", &id,
        &format!(
            "{} of {}: {} -> {}",
            adjustment.adjustment_type, adjustment.quantity, adjustment.previous_stock, adjustment.new_stock
        ),
        &http_request,
    ).await;

    Ok(HttpResponse::Ok().json(ApiResponse::success(AdjustmentResponse {
        item: item.into(),
        adjustment,
    })))
}

pub async fn get_adjustments(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    app_state
        .inventory
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::item_not_found(&id))?;
    let adjustments = app_state.inventory.adjustments(&id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(adjustments)))
}
