// src/supplier_handlers.rs
use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use validator::Validate;
use crate::AppState;
use crate::audit::audit;
use crate::error::ApiResult;
use crate::handlers::ApiResponse;
use crate::models::*;
use crate::repositories::CrudRepository;
use crate::validator::CustomValidate;

pub async fn get_suppliers(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let suppliers = app_state.suppliers.list_all().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(suppliers)))
}

pub async fn get_supplier(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let supplier = app_state.suppliers.get_required(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(supplier)))
}

pub async fn create_supplier(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<CreateSupplierRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let data = body.into_inner();
    data.validate()?;
    data.custom_validate().into_result()?;

    let supplier = app_state.suppliers.create(data).await?;
    audit(
        &app_state.db_pool, "create", "supplier", &supplier.id,
        &format!("Created supplier {}", supplier.name),
        &http_request,
    ).await;

    Ok(HttpResponse::Created().json(ApiResponse::success(supplier)))
}

pub async fn update_supplier(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<UpdateSupplierRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let data = body.into_inner();
    data.validate()?;
    data.custom_validate().into_result()?;

    let supplier = app_state.suppliers.update(&id, data).await?;
    audit(
        &app_state.db_pool, "edit", "supplier", &id,
        &format!("Updated supplier {} ({})", supplier.name, supplier.status),
        &http_request,
    ).await;

    Ok(HttpResponse::Ok().json(ApiResponse::success(supplier)))
}

pub async fn delete_supplier(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    app_state.suppliers.delete_unreferenced(&id).await?;
    audit(&app_state.db_pool, "delete", "supplier", &id, "Deleted supplier", &http_request).await;
    Ok(HttpResponse::Ok().json(ApiResponse::message("Supplier deleted")))
}
