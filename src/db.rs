// src/db.rs - Database migrations and setup

use sqlx::SqlitePool;
use anyhow::Result;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS suppliers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL CHECK(length(name) > 0 AND length(name) <= 255),
            contact_person TEXT,
            email TEXT,
            phone TEXT,
            address TEXT,
            category TEXT,
            status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active', 'inactive')),
            last_order_date DATE,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS inventory_items (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL CHECK(length(name) > 0 AND length(name) <= 255),
            department TEXT NOT NULL CHECK(department IN ('feed', 'milking', 'equipment', 'health')),
            current_stock REAL NOT NULL DEFAULT 0,
            reorder_level REAL NOT NULL DEFAULT 0 CHECK(reorder_level >= 0),
            unit TEXT NOT NULL CHECK(length(unit) > 0 AND length(unit) <= 20),
            unit_price REAL NOT NULL DEFAULT 0 CHECK(unit_price >= 0),
            supplier_id TEXT,
            description TEXT,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (supplier_id) REFERENCES suppliers (id) ON DELETE SET NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS purchase_orders (
            id TEXT PRIMARY KEY,
            order_number TEXT NOT NULL UNIQUE,
            supplier_id TEXT NOT NULL,
            department TEXT NOT NULL CHECK(department IN ('feed', 'milking', 'equipment', 'health')),
            status TEXT NOT NULL DEFAULT 'Pending' CHECK(
                status IN ('Pending', 'Ordered', 'Delivered', 'Cancelled', 'Completed')
            ),
            order_date DATE NOT NULL,
            expected_delivery DATE,
            total_amount REAL NOT NULL DEFAULT 0,
            notes TEXT,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (supplier_id) REFERENCES suppliers (id)
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS purchase_order_items (
            id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL,
            item_id TEXT NOT NULL,
            quantity REAL NOT NULL CHECK(quantity > 0),
            unit_price REAL NOT NULL CHECK(unit_price >= 0),
            total_price REAL NOT NULL,
            FOREIGN KEY (order_id) REFERENCES purchase_orders (id) ON DELETE CASCADE,
            FOREIGN KEY (item_id) REFERENCES inventory_items (id)
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stock_adjustments (
            id TEXT PRIMARY KEY,
            item_id TEXT NOT NULL,
            adjustment_type TEXT NOT NULL CHECK(adjustment_type IN ('Addition', 'Removal', 'Correction')),
            quantity REAL NOT NULL,
            previous_stock REAL NOT NULL,
            new_stock REAL NOT NULL,
            reason TEXT,
            reference_id TEXT,
            created_at DATETIME NOT NULL,
            FOREIGN KEY (item_id) REFERENCES inventory_items (id) ON DELETE CASCADE
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cows (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL CHECK(length(name) > 0 AND length(name) <= 100),
            tag_number TEXT NOT NULL UNIQUE,
            breed TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            date_of_birth DATE,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    // No UNIQUE(cow_id, date, shift): duplicates are rejected by the
    // check-then-insert in the milk repository.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS milk_production (
            id TEXT PRIMARY KEY,
            cow_id TEXT NOT NULL,
            date DATE NOT NULL,
            shift TEXT NOT NULL CHECK(shift IN ('Morning', 'Evening')),
            amount REAL NOT NULL CHECK(amount >= 0),
            fat_percentage REAL,
            protein_percentage REAL,
            lactose_percentage REAL,
            snf_percentage REAL,
            somatic_cell_count REAL,
            bacteria_count REAL,
            notes TEXT,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (cow_id) REFERENCES cows (id)
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reports (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            report_type TEXT NOT NULL CHECK(
                report_type IN ('daily', 'weekly', 'monthly', 'quality', 'compliance')
            ),
            date_range_start DATE NOT NULL,
            date_range_end DATE NOT NULL,
            format TEXT NOT NULL CHECK(format IN ('pdf', 'xlsx', 'csv')),
            status TEXT NOT NULL DEFAULT 'generating' CHECK(
                status IN ('generating', 'completed', 'failed')
            ),
            file_path TEXT,
            file_size INTEGER,
            error_message TEXT,
            created_at DATETIME NOT NULL,
            completed_at DATETIME
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS revenue_categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            created_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS revenue_data (
            id TEXT PRIMARY KEY,
            category_id TEXT NOT NULL,
            amount REAL NOT NULL CHECK(amount >= 0),
            date DATE NOT NULL,
            description TEXT,
            created_at DATETIME NOT NULL,
            FOREIGN KEY (category_id) REFERENCES revenue_categories (id)
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_logs (
            id TEXT PRIMARY KEY,
            action TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT,
            description TEXT,
            ip_address TEXT,
            user_agent TEXT,
            created_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_milk_production_date ON milk_production(date)",
        "CREATE INDEX IF NOT EXISTS idx_milk_production_key ON milk_production(cow_id, date, shift)",
        "CREATE INDEX IF NOT EXISTS idx_inventory_items_department ON inventory_items(department)",
        "CREATE INDEX IF NOT EXISTS idx_purchase_order_items_order ON purchase_order_items(order_id)",
        "CREATE INDEX IF NOT EXISTS idx_stock_adjustments_item ON stock_adjustments(item_id)",
        "CREATE INDEX IF NOT EXISTS idx_revenue_data_date ON revenue_data(date)",
        "CREATE INDEX IF NOT EXISTS idx_reports_created ON reports(created_at)",
    ];

    for index in indexes.iter() {
        sqlx::query(index).execute(pool).await?;
    }

    log::info!("Database migrations completed");
    Ok(())
}

#[cfg(test)]
pub mod test_support {
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    /// In-memory database with the full schema. One connection, since every
    /// `:memory:` connection opens its own database.
    pub async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("open in-memory database");
        super::run_migrations(&pool).await.expect("run migrations");
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn test_migrations_are_idempotent() {
        let pool = test_support::memory_pool().await;
        run_migrations(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name"
        )
            .fetch_all(&pool)
            .await
            .unwrap();
        let names: Vec<String> = tables.into_iter().map(|t| t.0).collect();

        for expected in [
            "audit_logs", "cows", "inventory_items", "milk_production", "purchase_order_items",
            "purchase_orders", "reports", "revenue_categories", "revenue_data",
            "stock_adjustments", "suppliers",
        ] {
            assert!(names.contains(&expected.to_string()), "missing table {}", expected);
        }
    }
}
