// src/report_handlers.rs
//! Отчёты: генерация, список, скачивание

use actix_files::NamedFile;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};
use std::path::PathBuf;
use std::sync::Arc;
use validator::Validate;
use crate::AppState;
use crate::audit::audit;
use crate::error::{ApiError, ApiResult};
use crate::handlers::ApiResponse;
use crate::models::*;
use crate::repositories::CrudRepository;

fn attachment(file_name: &str) -> ContentDisposition {
    ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(file_name.to_string())],
    }
}

pub async fn get_reports(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<ReportQuery>,
) -> ApiResult<HttpResponse> {
    let reports = app_state.reports.list(&query).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(reports)))
}

pub async fn get_report(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let report = app_state
        .reports
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::report_not_found(&id))?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(report)))
}

/// Generates synchronously and answers with the file itself.
pub async fn generate_report(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<GenerateReportRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let request = body.into_inner();
    request.validate()?;

    let generated = app_state.report_service.generate(request).await?;
    let report = &generated.report;

    audit(
        &app_state.db_pool, "generate", "report", &report.id,
        &format!(
            "Generated {} report {} for {} to {}",
            report.report_type, report.format, report.date_range_start, report.date_range_end
        ),
        &http_request,
    ).await;

    Ok(HttpResponse::Ok()
        .content_type(report.format.content_type())
        .insert_header(attachment(&generated.file_name))
        .insert_header(("X-Report-Id", report.id.clone()))
        .body(generated.bytes))
}

pub async fn download_report(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let report = app_state
        .reports
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::report_not_found(&id))?;

    if report.status != ReportStatus::Completed {
        return Err(ApiError::bad_request(&format!("Report is {}, not ready for download", report.status)));
    }
    let file_path = report
        .file_path
        .as_deref()
        .map(PathBuf::from)
        .ok_or_else(|| ApiError::not_found("Report file"))?;

    let file = NamedFile::open_async(&file_path)
        .await
        .map_err(|_| ApiError::not_found("Report file"))?;

    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| report.file_name());

    Ok(file
        .set_content_disposition(attachment(&file_name))
        .into_response(&http_request))
}

pub async fn delete_report(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let report = app_state
        .reports
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::report_not_found(&id))?;

    app_state.reports.delete(&id).await?;

    if let Some(ref file_path) = report.file_path {
        if let Err(e) = tokio::fs::remove_file(file_path).await {
            log::warn!("Could not remove report file {}: {}", file_path, e);
        }
    }

    audit(&app_state.db_pool, "delete", "report", &id, &format!("Deleted report {}", report.title), &http_request).await;
    Ok(HttpResponse::Ok().json(ApiResponse::message("Report deleted")))
}
