// src/test_fixtures.rs - shared builders for unit tests
use chrono::{NaiveDate, TimeZone, Utc};
use sqlx::SqlitePool;

use crate::models::{
    CreateCowRequest, CreateInventoryItemRequest, CreateSupplierRequest, Department,
    MilkCollectionRecord, MilkCollectionWithCow, QualityParameters, Shift,
};
use crate::repositories::{CowRepository, SupplierRepository};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub async fn seed_cow(pool: &SqlitePool, name: &str, tag: &str) -> String {
    CowRepository::new(pool.clone())
        .create(CreateCowRequest {
            name: name.to_string(),
            tag_number: tag.to_string(),
            breed: Some("Holstein".to_string()),
            date_of_birth: None,
        })
        .await
        .unwrap()
        .id
}

pub async fn seed_supplier(pool: &SqlitePool, name: &str) -> String {
    SupplierRepository::new(pool.clone())
        .create(supplier_request(name))
        .await
        .unwrap()
        .id
}

pub fn supplier_request(name: &str) -> CreateSupplierRequest {
    CreateSupplierRequest {
        name: name.to_string(),
        contact_person: Some("J. Miller".to_string()),
        email: Some("orders@example.com".to_string()),
        phone: None,
        address: None,
        category: Some("feed".to_string()),
    }
}

pub fn item_request(name: &str, department: Department, stock: f64, reorder: f64) -> CreateInventoryItemRequest {
    CreateInventoryItemRequest {
        name: name.to_string(),
        department,
        current_stock: stock,
        reorder_level: reorder,
        unit: "kg".to_string(),
        unit_price: 2.5,
        supplier_id: None,
        description: None,
    }
}

/// In-memory collection row, no database involved.
pub fn collection(
    id: &str,
    cow: (&str, &str),
    day: NaiveDate,
    shift: Shift,
    amount: f64,
    quality: QualityParameters,
) -> MilkCollectionWithCow {
    let stamp = Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap();
    MilkCollectionWithCow {
        record: MilkCollectionRecord {
            id: id.to_string(),
            cow_id: format!("cow-{}", cow.1),
            date: day,
            shift,
            amount,
            quality_parameters: quality,
            notes: None,
            created_at: stamp,
            updated_at: stamp,
        },
        cow_name: Some(cow.0.to_string()),
        cow_tag: Some(cow.1.to_string()),
    }
}

pub fn quality(fat: f64, protein: f64, lactose: f64, somatic: f64, bacteria: f64) -> QualityParameters {
    QualityParameters {
        fat: Some(fat),
        protein: Some(protein),
        lactose: Some(lactose),
        snf: None,
        somatic_cell_count: Some(somatic),
        bacteria_count: Some(bacteria),
    }
}
