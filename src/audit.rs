// src/audit.rs - audit trail helpers

use sqlx::SqlitePool;
use uuid::Uuid;
use chrono::Utc;
use actix_web::HttpRequest;

/// Записать событие в audit_logs
pub async fn log_activity(
    pool: &SqlitePool,
    action: &str,
    entity_type: &str,
    entity_id: Option<&str>,
    description: Option<&str>,
    request: Option<&HttpRequest>,
) -> Result<(), sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    let ip_address = request.and_then(|req| {
        req.connection_info()
            .realip_remote_addr()
            .map(|s| s.to_string())
    });

    let user_agent = request.and_then(|req| {
        req.headers()
            .get("User-Agent")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    });

    sqlx::query(
        r#"INSERT INTO audit_logs
           (id, action, entity_type, entity_id, description, ip_address, user_agent, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#
    )
    .bind(&id)
    .bind(action)
    .bind(entity_type)
    .bind(entity_id)
    .bind(description)
    .bind(&ip_address)
    .bind(&user_agent)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Audit failures are logged and never fail the request.
pub async fn audit(
    pool: &SqlitePool,
    action: &str,
    entity_type: &str,
    entity_id: &str,
    description: &str,
    request: &HttpRequest,
) {
    if let Err(e) = log_activity(
        pool,
        action,
        entity_type,
        Some(entity_id),
        Some(description),
        Some(request),
    ).await {
        log::error!("Failed to write audit log: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;

    #[actix_rt::test]
    async fn test_log_activity_without_request() {
        let pool = memory_pool().await;
        log_activity(&pool, "create", "cow", Some("c1"), Some("Added cow Daisy"), None)
            .await
            .unwrap();

        let row: (String, String, Option<String>) = sqlx::query_as(
            "SELECT action, entity_type, ip_address FROM audit_logs"
        )
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.0, "create");
        assert_eq!(row.1, "cow");
        assert!(row.2.is_none());
    }
}
