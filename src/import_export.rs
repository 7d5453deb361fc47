// src/import_export.rs
//! Ad hoc dataset exports (CSV, JSON, plain text) and inventory import
//! from JSON or an uploaded Excel workbook.

use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};
use calamine::{Data, Range, Reader, Xlsx};
use chrono::{Duration, NaiveDate, Utc};
use futures_util::stream::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::AppState;
use crate::audit::audit;
use crate::error::{ApiError, ApiResult};
use crate::handlers::ApiResponse;
use crate::models::*;
use crate::quality;
use crate::reports::document::{Cell, ReportTable};
use crate::reports::export::table_csv;
use crate::reports::validate_range;
use crate::repositories::{CrudRepository, InventoryRepository, MilkRecordSource, SupplierRepository};
use crate::validator::{FieldValidator, UnitValidator};

const DEFAULT_MILK_EXPORT_DAYS: i64 = 365;
const INVENTORY_SHEET: &str = "Inventory";

// ==================== EXPORT ====================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default,
    Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    Txt,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
            ExportFormat::Txt => "text/plain; charset=utf-8",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Dataset {
    Inventory,
    Milk,
    Suppliers,
}

#[derive(Debug, Deserialize, Default)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
    pub department: Option<Department>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// `{dataset}-{department?}-{YYYY-MM-DD}.{ext}`
pub fn export_file_name(dataset: Dataset, department: Option<Department>, date: NaiveDate, format: ExportFormat) -> String {
    match department {
        Some(d) => format!("{}-{}-{}.{}", dataset, d, date.format("%Y-%m-%d"), format),
        None => format!("{}-{}.{}", dataset, date.format("%Y-%m-%d"), format),
    }
}

/// A dataset ready for any of the export formats.
struct ExportData {
    table: ReportTable,
    json: serde_json::Value,
}

fn inventory_export(items: Vec<InventoryItem>) -> ApiResult<ExportData> {
    let mut table = ReportTable::new(
        "Inventory",
        &["Name", "Department", "Current Stock", "Unit", "Reorder Level", "Unit Price", "Status", "Value", "Description"],
    );
    for item in &items {
        table.rows.push(vec![
            Cell::text(&item.name),
            Cell::text(item.department.to_string()),
            Cell::Number(item.current_stock),
            Cell::text(&item.unit),
            Cell::Number(item.reorder_level),
            Cell::Number(item.unit_price),
            Cell::text(item.status().to_string()),
            Cell::Number(item.stock_value()),
            Cell::text(item.description.clone().unwrap_or_default()),
        ]);
    }
    let views: Vec<InventoryItemResponse> = items.into_iter().map(Into::into).collect();
    Ok(ExportData { table, json: serde_json::to_value(views).map_err(export_error)? })
}

fn milk_export(rows: Vec<MilkCollectionWithCow>) -> ApiResult<ExportData> {
    let mut table = ReportTable::new(
        "Milk Collections",
        &[
            "Date", "Shift", "Cow", "Tag", "Amount (L)", "Fat %", "Protein %", "Lactose %", "SNF %",
            "Somatic Cells", "Bacteria", "Grade", "Notes",
        ],
    );
    for row in &rows {
        let q = &row.record.quality_parameters;
        let grade = if q.is_empty() { String::new() } else { quality::grade(q).to_string() };
        table.rows.push(vec![
            Cell::Date(row.record.date),
            Cell::text(row.record.shift.to_string()),
            Cell::text(row.cow_name.clone().unwrap_or_default()),
            Cell::text(row.cow_tag.clone().unwrap_or_default()),
            Cell::Number(row.record.amount),
            Cell::opt_number(q.fat),
            Cell::opt_number(q.protein),
            Cell::opt_number(q.lactose),
            Cell::opt_number(q.snf),
            Cell::opt_count(q.somatic_cell_count),
            Cell::opt_count(q.bacteria_count),
            Cell::text(grade),
            Cell::text(row.record.notes.clone().unwrap_or_default()),
        ]);
    }
    Ok(ExportData { table, json: serde_json::to_value(&rows).map_err(export_error)? })
}

fn supplier_export(suppliers: Vec<Supplier>) -> ApiResult<ExportData> {
    let mut table = ReportTable::new(
        "Suppliers",
        &["Name", "Contact Person", "Email", "Phone", "Category", "Status", "Last Order Date"],
    );
    for s in &suppliers {
        table.rows.push(vec![
            Cell::text(&s.name),
            Cell::text(s.contact_person.clone().unwrap_or_default()),
            Cell::text(s.email.clone().unwrap_or_default()),
            Cell::text(s.phone.clone().unwrap_or_default()),
            Cell::text(s.category.clone().unwrap_or_default()),
            Cell::text(&s.status),
            s.last_order_date.map(Cell::Date).unwrap_or(Cell::Empty),
        ]);
    }
    Ok(ExportData { table, json: serde_json::to_value(&suppliers).map_err(export_error)? })
}

fn export_error(e: serde_json::Error) -> ApiError {
    ApiError::ExportError(e.to_string())
}

/// Columns padded to their widest cell, a dashed rule under the header.
pub fn table_txt(table: &ReportTable) -> Vec<u8> {
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| row.iter().map(Cell::display).collect())
        .collect();

    let mut widths: Vec<usize> = table.headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (i, value) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(value.chars().count());
            }
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(value, &width)| format!("{:<width$}", value, width = width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(&table.headers));
    out.push('\n');
    out.push_str(&widths.iter().map(|&w| "-".repeat(w)).collect::<Vec<_>>().join("  "));
    out.push('\n');
    for row in &rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out.into_bytes()
}

fn render_export(data: &ExportData, format: ExportFormat) -> ApiResult<Vec<u8>> {
    match format {
        ExportFormat::Csv => table_csv(&data.table),
        ExportFormat::Json => serde_json::to_vec_pretty(&data.json).map_err(export_error),
        ExportFormat::Txt => Ok(table_txt(&data.table)),
    }
}

pub async fn export_dataset(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    query: web::Query<ExportQuery>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let raw = path.into_inner();
    let dataset: Dataset = raw
        .parse()
        .map_err(|_| ApiError::bad_request(&format!("Unknown dataset '{}'. Expected inventory, milk or suppliers", raw)))?;

    if query.department.is_some() && dataset != Dataset::Inventory {
        return Err(ApiError::bad_request("Department filter applies to inventory exports only"));
    }

    let data = match dataset {
        Dataset::Inventory => {
            let items: Vec<InventoryItem> = app_state
                .inventory
                .list_all()
                .await?
                .into_iter()
                .filter(|item| query.department.map_or(true, |d| item.department == d))
                .collect();
            inventory_export(items)?
        }
        Dataset::Milk => {
            let end = query.end_date.unwrap_or_else(|| Utc::now().date_naive());
            let start = query.start_date.unwrap_or(end - Duration::days(DEFAULT_MILK_EXPORT_DAYS - 1));
            validate_range(start, end, 0)?;
            milk_export(app_state.milk.collections_in_range(start, end).await?)?
        }
        Dataset::Suppliers => supplier_export(app_state.suppliers.list_all().await?)?,
    };

    let bytes = render_export(&data, query.format)?;
    let file_name = export_file_name(dataset, query.department, Utc::now().date_naive(), query.format);

    log::info!("Exported {} {} row(s) as {}", data.table.rows.len(), dataset, query.format);
    audit(
        &app_state.db_pool, "export", &dataset.to_string(), &file_name,
        &format!("Exported {} row(s)", data.table.rows.len()),
        &http_request,
    ).await;

    Ok(HttpResponse::Ok()
        .content_type(query.format.content_type())
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(file_name)],
        })
        .body(bytes))
}

// ==================== IMPORT ====================

#[derive(Debug, Deserialize, Clone)]
pub struct ImportInventoryItem {
    pub name: String,
    pub department: String,
    #[serde(default)]
    pub current_stock: f64,
    #[serde(default)]
    pub reorder_level: f64,
    pub unit: String,
    #[serde(default)]
    pub unit_price: f64,
    /// Supplier name, matched case-insensitively.
    pub supplier: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Default)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

/// Rows are independent: a bad row is reported and the rest still import.
pub async fn import_inventory_rows(
    inventory: &InventoryRepository,
    suppliers: &SupplierRepository,
    rows: Vec<ImportInventoryItem>,
) -> ApiResult<ImportSummary> {
    let mut summary = ImportSummary::default();

    for (idx, row) in rows.into_iter().enumerate() {
        let line = idx + 1;

        if let Err(e) = FieldValidator::not_empty(&row.name, "Name") {
            summary.errors.push(format!("Row {}: {}", line, e));
            continue;
        }
        let department: Department = match row.department.trim().parse() {
            Ok(d) => d,
            Err(_) => {
                summary.errors.push(format!("Row {}: Unknown department '{}'", line, row.department));
                continue;
            }
        };
        let checks = [
            UnitValidator::validate_unit(row.unit.trim()),
            FieldValidator::quantity(row.current_stock),
            FieldValidator::quantity(row.reorder_level),
            FieldValidator::range(row.unit_price, "Unit price", Some(0.0), None),
        ];
        if let Some(e) = checks.into_iter().find_map(Result::err) {
            summary.errors.push(format!("Row {}: {}", line, e));
            continue;
        }

        if inventory.find_by_name(&row.name, department).await?.is_some() {
            summary.skipped += 1;
            summary.errors.push(format!("Row {}: '{}' already exists in {}", line, row.name.trim(), department));
            continue;
        }

        let supplier_id = match row.supplier.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(name) => match suppliers.find_by_name(name).await? {
                Some(s) => Some(s.id),
                None => {
                    summary.errors.push(format!("Row {}: Supplier '{}' not found, imported without supplier", line, name));
                    None
                }
            },
            None => None,
        };

        inventory
            .create(CreateInventoryItemRequest {
                name: row.name.trim().to_string(),
                department,
                current_stock: row.current_stock,
                reorder_level: row.reorder_level,
                unit: row.unit.trim().to_string(),
                unit_price: row.unit_price,
                supplier_id,
                description: row.description.filter(|d| !d.trim().is_empty()),
            })
            .await?;
        summary.imported += 1;
    }

    log::info!("Inventory import: {} imported, {} skipped, {} message(s)", summary.imported, summary.skipped, summary.errors.len());
    Ok(summary)
}

fn cell_text(cell: Option<&Data>) -> String {
    match cell {
        Some(Data::Empty) | None => String::new(),
        Some(Data::Float(f)) => quality::format_number(*f),
        Some(other) => other.to_string().trim().to_string(),
    }
}

fn cell_number(cell: Option<&Data>) -> Option<f64> {
    match cell {
        Some(Data::Float(f)) => Some(*f),
        Some(Data::Int(i)) => Some(*i as f64),
        Some(Data::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

fn rows_from_range(range: &Range<Data>) -> ApiResult<Vec<ImportInventoryItem>> {
    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .ok_or_else(|| ApiError::bad_request("Sheet is empty"))?
        .iter()
        .map(|c| c.to_string().trim().to_lowercase())
        .collect();

    let column = |names: &[&str]| header.iter().position(|h| names.contains(&h.as_str()));
    let name_col = column(&["name", "item", "item name"])
        .ok_or_else(|| ApiError::bad_request("Missing 'Name' column"))?;
    let department_col = column(&["department"])
        .ok_or_else(|| ApiError::bad_request("Missing 'Department' column"))?;
    let unit_col = column(&["unit"])
        .ok_or_else(|| ApiError::bad_request("Missing 'Unit' column"))?;
    let stock_col = column(&["current stock", "current_stock", "stock", "quantity"]);
    let reorder_col = column(&["reorder level", "reorder_level"]);
    let price_col = column(&["unit price", "unit_price", "price"]);
    let supplier_col = column(&["supplier"]);
    let description_col = column(&["description"]);

    let optional = |row: &[Data], col: Option<usize>| {
        col.map(|c| cell_text(row.get(c))).filter(|s| !s.is_empty())
    };

    Ok(rows
        .filter(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|row| ImportInventoryItem {
            name: cell_text(row.get(name_col)),
            department: cell_text(row.get(department_col)),
            current_stock: stock_col.and_then(|c| cell_number(row.get(c))).unwrap_or(0.0),
            reorder_level: reorder_col.and_then(|c| cell_number(row.get(c))).unwrap_or(0.0),
            unit: cell_text(row.get(unit_col)),
            unit_price: price_col.and_then(|c| cell_number(row.get(c))).unwrap_or(0.0),
            supplier: optional(row, supplier_col),
            description: optional(row, description_col),
        })
        .collect())
}

/// Reads the `Inventory` sheet when present, otherwise the first sheet.
/// Columns are matched by header name.
pub fn parse_inventory_workbook(bytes: &[u8]) -> ApiResult<Vec<ImportInventoryItem>> {
    let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(std::io::Cursor::new(bytes))
        .map_err(|e| ApiError::bad_request(&format!("Failed to read Excel file: {}", e)))?;

    let sheet_names = workbook.sheet_names();
    let sheet_name = sheet_names
        .iter()
        .find(|n| n.eq_ignore_ascii_case(INVENTORY_SHEET))
        .or_else(|| sheet_names.first())
        .cloned()
        .ok_or_else(|| ApiError::bad_request("Excel file has no sheets"))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ApiError::bad_request(&format!("Failed to read sheet '{}': {}", sheet_name, e)))?;

    rows_from_range(&range)
}

pub async fn import_inventory_json(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<Vec<ImportInventoryItem>>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let summary = import_inventory_rows(&app_state.inventory, &app_state.suppliers, body.into_inner()).await?;
    audit(
        &app_state.db_pool, "import", "inventory_item", "json",
        &format!("Imported {} item(s) from JSON", summary.imported),
        &http_request,
    ).await;
    Ok(HttpResponse::Ok().json(ApiResponse::success(summary)))
}

pub async fn import_inventory_excel(
    app_state: web::Data<Arc<AppState>>,
    mut payload: Multipart,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let limit = app_state.config.security.max_request_size;
    let mut file_bytes: Option<Vec<u8>> = None;

    while let Some(field) = payload.next().await {
        let mut field = field.map_err(|e| ApiError::bad_request(&format!("Invalid upload: {}", e)))?;
        let is_file = field.content_disposition().get_filename().is_some();

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::bad_request(&format!("Invalid upload: {}", e)))?;
            if data.len() + chunk.len() > limit {
                return Err(ApiError::bad_request(&format!("Upload exceeds {} bytes", limit)));
            }
            data.extend_from_slice(&chunk);
        }

        if is_file && file_bytes.is_none() {
            file_bytes = Some(data);
        }
    }

    let bytes = file_bytes.ok_or_else(|| ApiError::bad_request("No file found in upload"))?;
    let rows = parse_inventory_workbook(&bytes)?;
    let summary = import_inventory_rows(&app_state.inventory, &app_state.suppliers, rows).await?;

    audit(
        &app_state.db_pool, "import", "inventory_item", "excel",
        &format!("Imported {} item(s) from Excel", summary.imported),
        &http_request,
    ).await;
    Ok(HttpResponse::Ok().json(ApiResponse::success(summary)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;
    use crate::reports::document::ReportDocument;
    use crate::reports::export::render_xlsx;
    use crate::test_fixtures::{date, item_request, supplier_request};

    fn import_row(name: &str, department: &str, unit: &str) -> ImportInventoryItem {
        ImportInventoryItem {
            name: name.to_string(),
            department: department.to_string(),
            current_stock: 12.0,
            reorder_level: 4.0,
            unit: unit.to_string(),
            unit_price: 3.5,
            supplier: None,
            description: None,
        }
    }

    #[test]
    fn test_export_file_name() {
        let day = date(2024, 5, 2);
        assert_eq!(
            export_file_name(Dataset::Inventory, Some(Department::Feed), day, ExportFormat::Csv),
            "inventory-feed-2024-05-02.csv"
        );
        assert_eq!(export_file_name(Dataset::Milk, None, day, ExportFormat::Txt), "milk-2024-05-02.txt");
        assert_eq!("Suppliers".parse::<Dataset>().unwrap(), Dataset::Suppliers);
        assert!("cows".parse::<Dataset>().is_err());
    }

    #[test]
    fn test_txt_columns_are_aligned() {
        let mut table = ReportTable::new("T", &["Name", "Qty"]);
        table.rows.push(vec![Cell::text("Hay"), Cell::Number(12.5)]);
        table.rows.push(vec![Cell::text("Mineral lick"), Cell::Number(3.0)]);

        let text = String::from_utf8(table_txt(&table)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Name          Qty");
        assert_eq!(lines[1], "------------  ----");
        assert_eq!(lines[2], "Hay           12.5");
        assert_eq!(lines[3], "Mineral lick  3");
    }

    #[actix_rt::test]
    async fn test_import_reports_bad_rows_and_skips_existing() {
        let pool = memory_pool().await;
        let inventory = InventoryRepository::new(pool.clone());
        let suppliers = SupplierRepository::new(pool);
        suppliers.create(supplier_request("Valley Feeds")).await.unwrap();
        inventory.create(item_request("Hay bales", Department::Feed, 5.0, 2.0)).await.unwrap();

        let mut with_supplier = import_row("Silage", "feed", "kg");
        with_supplier.supplier = Some("valley feeds".into());
        let rows = vec![
            with_supplier,
            import_row("hay bales", "Feed", "kg"),
            import_row("Teat dip", "parlour", "L"),
            import_row("Gloves", "milking", "furlongs"),
            import_row("  ", "health", "pcs"),
        ];

        let summary = import_inventory_rows(&inventory, &suppliers, rows).await.unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.errors.len(), 4);
        assert!(summary.errors[1].contains("Unknown department 'parlour'"));

        let silage = inventory.find_by_name("SILAGE", Department::Feed).await.unwrap().unwrap();
        assert!(silage.supplier_id.is_some());
        assert_eq!(silage.current_stock, 12.0);
    }

    #[test]
    fn test_parse_workbook_by_header_names() {
        let mut sheet = ReportTable::new("Inventory", &["Unit", "Name", "Department", "Current Stock", "Unit Price"]);
        sheet.rows.push(vec![
            Cell::text("kg"),
            Cell::text("Dairy meal"),
            Cell::text("feed"),
            Cell::Number(250.0),
            Cell::Number(0.8),
        ]);
        sheet.rows.push(vec![Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty]);
        let doc = ReportDocument {
            title: "Stock".into(),
            report_type: ReportType::Daily,
            date_range_start: date(2024, 1, 1),
            date_range_end: date(2024, 1, 1),
            generated_at: Utc::now(),
            summary: vec![],
            sections: vec![sheet.clone()],
            records: sheet,
        };
        let bytes = render_xlsx(&doc).unwrap();

        let rows = parse_inventory_workbook(&bytes).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Dairy meal");
        assert_eq!(rows[0].department, "feed");
        assert_eq!(rows[0].unit, "kg");
        assert_eq!(rows[0].current_stock, 250.0);
        assert_eq!(rows[0].unit_price, 0.8);
        assert_eq!(rows[0].reorder_level, 0.0);
    }

    #[test]
    fn test_garbage_upload_is_bad_request() {
        assert!(matches!(parse_inventory_workbook(b"not a zip"), Err(ApiError::BadRequest(_))));
    }
}
