// src/cow_handlers.rs
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

const COW_STATUSES: &[&str] = &["active", "dry", "sold", "deceased"];

pub async fn get_cows(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let cows = app_state.cows.list_all().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(cows)))
}

pub async fn get_cow(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let cow = app_state.cows.get_required(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(cow)))
}

pub async fn create_cow(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<CreateCowRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let data = body.into_inner();
    data.validate()?;
    data.custom_validate().into_result()?;

    let cow = app_state.cows.create(data).await?;
    audit(
        &app_state.db_pool, "create", "cow", &cow.id,
        &format!("Added cow {} ({})", cow.name, cow.tag_number),
        &http_request,
    ).await;

    Ok(HttpResponse::Created().json(ApiResponse::success(cow)))
}

pub async fn update_cow(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<UpdateCowRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let data = body.into_inner();
    data.validate()?;
    data.custom_validate().into_result()?;

    if let Some(ref status) = data.status {
        if !COW_STATUSES.contains(&status.as_str()) {
            return Err(ApiError::bad_request(&format!(
                "Unknown cow status '{}'. Expected one of: {}",
                status,
                COW_STATUSES.join(", ")
            )));
        }
    }

    let cow = app_state.cows.update(&id, data).await?;
    audit(
        &app_state.db_pool, "edit", "cow", &id,
        &format!("Updated cow {} ({})", cow.name, cow.status),
        &http_request,
    ).await;

    Ok(HttpResponse::Ok().json(ApiResponse::success(cow)))
}

pub async fn delete_cow(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    app_state.cows.delete_unreferenced(&id).await?;
    audit(&app_state.db_pool, "delete", "cow", &id, "Deleted cow", &http_request).await;
    Ok(HttpResponse::Ok().json(ApiResponse::message("Cow deleted")))
}
