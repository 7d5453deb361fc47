// src/milk_handlers.rs
//! Milk collection records and the dashboard production chart.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
use crate::AppState;
use crate::audit::audit;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{ApiResponse, PaginatedResponse};
use crate::models::*;
use crate::quality::{self, QualityGrade};
use crate::repositories::CrudRepository;
use crate::validator::CustomValidate;

const DEFAULT_CHART_DAYS: i64 = 30;

#[derive(Debug, Serialize)]
pub struct ParameterStatus {
    pub parameter: &'static str,
    pub value: f64,
    pub status: QualityGrade,
}

/// A collection as listed: the joined row plus its grade when quality was measured.
#[derive(Debug, Serialize)]
pub struct MilkRecordView {
    #[serde(flatten)]
    pub collection: MilkCollectionWithCow,
    pub quality_grade: Option<QualityGrade>,
    pub parameter_statuses: Vec<ParameterStatus>,
}

impl From<MilkCollectionWithCow> for MilkRecordView {
    fn from(collection: MilkCollectionWithCow) -> Self {
        let params = &collection.record.quality_parameters;
        let quality_grade = (!params.is_empty()).then(|| quality::grade(params));
        let parameter_statuses = quality::parameter_statuses(params)
            .into_iter()
            .map(|(parameter, value, status)| ParameterStatus {
                parameter: parameter.field_name(),
                value,
                status,
            })
            .collect();
        Self { collection, quality_grade, parameter_statuses }
    }
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

pub async fn get_milk_records(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<MilkQuery>,
) -> ApiResult<HttpResponse> {
    if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
        if end < start {
            return Err(ApiError::invalid_date_range(&start.to_string(), &end.to_string()));
        }
    }

    let (rows, total) = app_state.milk.list(&query).await?;
    let data: Vec<MilkRecordView> = rows.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(PaginatedResponse::new(
        data,
        total,
        query.page,
        query.per_page,
    ))))
}

pub async fn get_milk_record(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let record = app_state.milk.get_required(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(record)))
}

/// Duplicates come back as `409` with `{ success: false, message }`.
pub async fn create_milk_record(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<CreateMilkRecordRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let data = body.into_inner();
    data.validate()?;
    data.custom_validate().into_result()?;

    let outcome = app_state.milk.create(data).await?;
    match outcome.record {
        Some(record) => {
            audit(
                &app_state.db_pool, "create", "milk_record", &record.id,
                &format!("{} L from cow {} on {} ({})", record.amount, record.cow_id, record.date, record.shift),
                &http_request,
            ).await;
            Ok(HttpResponse::Created().json(ApiResponse::success_with_message(record, outcome.message)))
        }
        None => Ok(HttpResponse::Conflict().json(ApiResponse::<()> {
            success: false,
            data: None,
            message: Some(outcome.message),
        })),
    }
}

pub async fn update_milk_record(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<UpdateMilkRecordRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let data = body.into_inner();
    data.validate()?;
    data.custom_validate().into_result()?;

    if let Some(ref cow_id) = data.cow_id {
        app_state.cows.get_required(cow_id).await?;
    }

    let record = app_state.milk.update(&id, data).await?;
    audit(
        &app_state.db_pool, "edit", "milk_record", &id,
        &format!("Updated collection of {} on {} ({})", record.cow_id, record.date, record.shift),
        &http_request,
    ).await;

    Ok(HttpResponse::Ok().json(ApiResponse::success(record)))
}

pub async fn delete_milk_record(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    app_state.milk.delete(&id).await?;
    audit(&app_state.db_pool, "delete", "milk_record", &id, "Deleted milk collection record", &http_request).await;
    Ok(HttpResponse::Ok().json(ApiResponse::message("Milk collection record deleted")))
}

/// Per-day totals, last 30 days unless a range is given.
pub async fn get_daily_summary(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<SummaryQuery>,
) -> ApiResult<HttpResponse> {
    let end = query.end_date.unwrap_or_else(|| Utc::now().date_naive());
    let start = query.start_date.unwrap_or(end - Duration::days(DEFAULT_CHART_DAYS - 1));
    if end < start {
        return Err(ApiError::invalid_date_range(&start.to_string(), &end.to_string()));
    }

    let totals = app_state.milk.daily_totals(start, end).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(totals)))
}
