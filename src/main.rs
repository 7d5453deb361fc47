// src/main.rs
use actix_web::{
    middleware::{Compress, DefaultHeaders, Logger},
    web, App, HttpServer,
};
use actix_web::http::header;
use actix_cors::Cors;
use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod audit;
mod config;
mod cow_handlers;
mod db;
mod error;
mod handlers;
mod import_export;
mod inventory_handlers;
mod milk_handlers;
mod models;
mod monitoring;
mod order_handlers;
mod quality;
mod report_handlers;
mod reports;
mod repositories;
mod revenue_handlers;
mod supplier_handlers;
pub mod validator;
#[cfg(test)]
mod test_fixtures;

use config::{load_config, Config, DatabaseConfig};
use monitoring::{Metrics, RequestLogger};
use reports::ReportService;
use repositories::{
    CowRepository, InventoryRepository, MilkRepository, OrderRepository, ReportRepository,
    RevenueRepository, SupplierRepository,
};

pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Config,
    pub inventory: InventoryRepository,
    pub orders: OrderRepository,
    pub suppliers: SupplierRepository,
    pub cows: CowRepository,
    pub milk: MilkRepository,
    pub reports: ReportRepository,
    pub revenue: RevenueRepository,
    pub report_service: ReportService,
}

impl AppState {
    /// Every repository gets its own clone of the pool.
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let milk = MilkRepository::new(pool.clone());
        let reports = ReportRepository::new(pool.clone());
        let report_service = ReportService::new(
            Arc::new(milk.clone()),
            Arc::new(reports.clone()),
            config.reports.clone(),
        );

        Self {
            inventory: InventoryRepository::new(pool.clone()),
            orders: OrderRepository::new(pool.clone()),
            suppliers: SupplierRepository::new(pool.clone()),
            cows: CowRepository::new(pool.clone()),
            revenue: RevenueRepository::new(pool.clone()),
            milk,
            reports,
            report_service,
            db_pool: pool,
            config,
        }
    }
}

// ==================== ROUTES ====================

fn configure_health(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/health")
            .route("", web::get().to(monitoring::health_check))
            .route("/ready", web::get().to(monitoring::readiness_check))
            .route("/metrics", web::get().to(monitoring::metrics_endpoint)),
    );
}

fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/dashboard/stats", web::get().to(handlers::get_dashboard_stats))

            // Inventory
            .service(
                web::scope("/inventory")
                    .route("", web::get().to(inventory_handlers::get_inventory))
                    .route("", web::post().to(inventory_handlers::create_inventory_item))
                    .route("/low-stock", web::get().to(inventory_handlers::get_low_stock))
                    .route("/{id}", web::get().to(inventory_handlers::get_inventory_item))
                    .route("/{id}", web::put().to(inventory_handlers::update_inventory_item))
                    .route("/{id}", web::delete().to(inventory_handlers::delete_inventory_item))
                    .route("/{id}/adjust", web::post().to(inventory_handlers::adjust_stock))
                    .route("/{id}/adjustments", web::get().to(inventory_handlers::get_adjustments))
            )

            // Purchase orders
            .service(
                web::scope("/orders")
                    .route("", web::get().to(order_handlers::get_orders))
                    .route("", web::post().to(order_handlers::create_order))
                    .route("/{id}", web::get().to(order_handlers::get_order))
                    .route("/{id}", web::delete().to(order_handlers::delete_order))
                    .route("/{id}/status", web::put().to(order_handlers::update_order_status))
            )

            .service(
                web::scope("/suppliers")
                    .route("", web::get().to(supplier_handlers::get_suppliers))
                    .route("", web::post().to(supplier_handlers::create_supplier))
                    .route("/{id}", web::get().to(supplier_handlers::get_supplier))
                    .route("/{id}", web::put().to(supplier_handlers::update_supplier))
                    .route("/{id}", web::delete().to(supplier_handlers::delete_supplier))
            )

            .service(
                web::scope("/cows")
                    .route("", web::get().to(cow_handlers::get_cows))
                    .route("", web::post().to(cow_handlers::create_cow))
                    .route("/{id}", web::get().to(cow_handlers::get_cow))
                    .route("/{id}", web::put().to(cow_handlers::update_cow))
                    .route("/{id}", web::delete().to(cow_handlers::delete_cow))
            )

            // Milk collection
            .service(
                web::scope("/milk")
                    .route("", web::get().to(milk_handlers::get_milk_records))
                    .route("", web::post().to(milk_handlers::create_milk_record))
                    .route("/summary/daily", web::get().to(milk_handlers::get_daily_summary))
                    .route("/{id}", web::get().to(milk_handlers::get_milk_record))
                    .route("/{id}", web::put().to(milk_handlers::update_milk_record))
                    .route("/{id}", web::delete().to(milk_handlers::delete_milk_record))
            )

            // Reports
            .service(
                web::scope("/reports")
                    .route("", web::get().to(report_handlers::get_reports))
                    .route("/generate", web::post().to(report_handlers::generate_report))
                    .route("/{id}", web::get().to(report_handlers::get_report))
                    .route("/{id}", web::delete().to(report_handlers::delete_report))
                    .route("/{id}/download", web::get().to(report_handlers::download_report))
            )

            .service(
                web::scope("/revenue")
                    .route("", web::get().to(revenue_handlers::get_revenue))
                    .route("", web::post().to(revenue_handlers::create_revenue))
                    .route("/summary", web::get().to(revenue_handlers::get_revenue_summary))
                    .route("/categories", web::get().to(revenue_handlers::get_categories))
                    .route("/categories", web::post().to(revenue_handlers::create_category))
                    .route("/{id}", web::delete().to(revenue_handlers::delete_revenue))
            )

            // Import / export
            .route("/export/{dataset}", web::get().to(import_export::export_dataset))
            .route("/import/inventory", web::post().to(import_export::import_inventory_json))
            .route("/import/inventory/excel", web::post().to(import_export::import_inventory_excel)),
    );
}

fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| {
            let message = err.to_string();
            error::ApiError::bad_request(&format!("Invalid JSON payload: {}", message)).into()
        })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        error::ApiError::bad_request(&format!("Invalid query parameters: {}", err)).into()
    })
}

// ==================== MAIN ====================

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;

    setup_logging(&config)?;
    config.print_startup_info();

    if config.is_production() && config.security.allowed_origins.iter().any(|o| o == "*") {
        anyhow::bail!("Wildcard CORS origins not allowed in production!");
    }

    let pool = create_database_pool(&config.database).await?;
    db::run_migrations(&pool).await?;

    tokio::fs::create_dir_all(config.reports.output_path())
        .await
        .with_context(|| format!("Failed to create reports directory {}", config.reports.output_dir))?;

    let app_state = Arc::new(AppState::new(pool, config.clone()));
    let metrics = Metrics::new();

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    log::info!("Starting server at http://{}", bind_address);

    let server_config = config.clone();
    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(setup_cors(&server_config.security.allowed_origins))
            .wrap(setup_security_headers())
            .wrap(Logger::default())
            .wrap(Compress::default())
            .wrap(RequestLogger::new(metrics.clone()))
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(metrics.clone()))
            .app_data(json_config(server_config.security.max_request_size))
            .app_data(query_config())
            .configure(configure_health)
            .configure(configure_api)
    })
    .keep_alive(Duration::from_secs(config.server.keep_alive))
    .client_request_timeout(Duration::from_secs(config.server.client_timeout))
    .client_disconnect_timeout(Duration::from_secs(config.server.client_shutdown));

    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run()
        .await
        .context("Server failed to run")?;

    Ok(())
}

// ==================== HELPER FUNCTIONS ====================

pub fn setup_cors(allowed_origins: &[String]) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ])
        .expose_headers(vec![
            header::CONTENT_LENGTH,
            header::CONTENT_DISPOSITION,
            header::HeaderName::from_static("x-report-id"),
        ])
        .max_age(3600);

    if allowed_origins.iter().any(|o| o == "*") {
        log::warn!("Using wildcard CORS (*) in development mode");
        cors = cors.allow_any_origin();
    } else {
        for origin in allowed_origins.iter().filter(|o| !o.is_empty()) {
            cors = cors.allowed_origin(origin);
        }
    }

    cors
}

fn setup_logging(config: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("dairy={},sqlx=warn,actix_web=info", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false).compact())
            .try_init()
    }
    .context("Failed to initialize logging")?;

    Ok(())
}

async fn create_database_pool(db_config: &DatabaseConfig) -> anyhow::Result<SqlitePool> {
    let url = if db_config.url.starts_with("sqlite:") {
        db_config.url.clone()
    } else {
        format!("sqlite:{}", db_config.url)
    };

    let options = SqliteConnectOptions::from_str(&url)
        .with_context(|| format!("Invalid database URL: {}", db_config.url))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .acquire_timeout(Duration::from_secs(db_config.connect_timeout))
        .idle_timeout(Duration::from_secs(db_config.idle_timeout))
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database {}", db_config.url))?;

    log::info!("Database connection established ({})", db_config.url);
    Ok(pool)
}

fn setup_security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"))
}
