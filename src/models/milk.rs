// src/models/milk.rs
use serde::{Deserialize, Serialize};
use validator::Validate;
use chrono::{DateTime, NaiveDate, Utc};

// ==================== SHIFT ====================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    Serialize, Deserialize, sqlx::Type, strum::Display, strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum Shift {
    Morning,
    Evening,
}

// ==================== QUALITY PARAMETERS ====================

/// Quality readings of a single collection. Every reading is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct QualityParameters {
    #[sqlx(rename = "fat_percentage")]
    #[serde(alias = "fat_percentage")]
    pub fat: Option<f64>,
    #[sqlx(rename = "protein_percentage")]
    #[serde(alias = "protein_percentage")]
    pub protein: Option<f64>,
    #[sqlx(rename = "lactose_percentage")]
    #[serde(alias = "lactose_percentage")]
    pub lactose: Option<f64>,
    #[sqlx(rename = "snf_percentage")]
    #[serde(alias = "snf_percentage")]
    pub snf: Option<f64>,
    #[serde(alias = "somaticCellCount", alias = "somatic")]
    pub somatic_cell_count: Option<f64>,
    #[serde(alias = "bacteriaCount", alias = "bacteria")]
    pub bacteria_count: Option<f64>,
}

impl QualityParameters {
    pub fn is_empty(&self) -> bool {
        self.fat.is_none()
            && self.protein.is_none()
            && self.lactose.is_none()
            && self.snf.is_none()
            && self.somatic_cell_count.is_none()
            && self.bacteria_count.is_none()
    }

    /// Fields set in `self` win, the rest come from `other`.
    pub fn or(self, other: QualityParameters) -> QualityParameters {
        QualityParameters {
            fat: self.fat.or(other.fat),
            protein: self.protein.or(other.protein),
            lactose: self.lactose.or(other.lactose),
            snf: self.snf.or(other.snf),
            somatic_cell_count: self.somatic_cell_count.or(other.somatic_cell_count),
            bacteria_count: self.bacteria_count.or(other.bacteria_count),
        }
    }
}

/// Quality readings as clients send them: either top-level fields or nested
/// under `quality_parameters` / `qualityParameters`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QualityPayload {
    #[serde(alias = "fat_percentage")]
    pub fat: Option<f64>,
    #[serde(alias = "protein_percentage")]
    pub protein: Option<f64>,
    #[serde(alias = "lactose_percentage")]
    pub lactose: Option<f64>,
    #[serde(alias = "snf_percentage")]
    pub snf: Option<f64>,
    #[serde(alias = "somaticCellCount", alias = "somatic")]
    pub somatic_cell_count: Option<f64>,
    #[serde(alias = "bacteriaCount", alias = "bacteria")]
    pub bacteria_count: Option<f64>,
    #[serde(alias = "qualityParameters")]
    pub quality_parameters: Option<QualityParameters>,
}

impl QualityPayload {
    pub fn normalize(self) -> QualityParameters {
        let flat = QualityParameters {
            fat: self.fat,
            protein: self.protein,
            lactose: self.lactose,
            snf: self.snf,
            somatic_cell_count: self.somatic_cell_count,
            bacteria_count: self.bacteria_count,
        };
        match self.quality_parameters {
            Some(nested) => nested.or(flat),
            None => flat,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.quality_parameters.map_or(true, |q| q.is_empty())
            && self.fat.is_none()
            && self.protein.is_none()
            && self.lactose.is_none()
            && self.snf.is_none()
            && self.somatic_cell_count.is_none()
            && self.bacteria_count.is_none()
    }
}

// ==================== MILK COLLECTION ====================

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct MilkCollectionRecord {
    pub id: String,
    pub cow_id: String,
    pub date: NaiveDate,
    pub shift: Shift,
    pub amount: f64,
    #[sqlx(flatten)]
    pub quality_parameters: QualityParameters,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Collection row joined with the identity fields of its cow.
#[derive(Debug, Serialize, sqlx::FromRow, Clone)]
pub struct MilkCollectionWithCow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub record: MilkCollectionRecord,
    pub cow_name: Option<String>,
    pub cow_tag: Option<String>,
}

#[derive(Debug, Deserialize, Validate, Clone)]
pub struct CreateMilkRecordRequest {
    #[validate(length(min = 1, message = "Cow is required"))]
    pub cow_id: String,
    pub date: NaiveDate,
    pub shift: Shift,
    #[validate(range(min = 0.0, max = 200.0, message = "Amount must be between 0 and 200 liters"))]
    pub amount: f64,
    #[validate(length(max = 1000, message = "Notes cannot exceed 1000 characters"))]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub quality: QualityPayload,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateMilkRecordRequest {
    #[validate(length(min = 1, message = "Cow is required"))]
    pub cow_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub shift: Option<Shift>,
    #[validate(range(min = 0.0, max = 200.0, message = "Amount must be between 0 and 200 liters"))]
    pub amount: Option<f64>,
    #[validate(length(max = 1000, message = "Notes cannot exceed 1000 characters"))]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub quality: QualityPayload,
}

/// Outcome of a collection insert. Duplicates are reported here, not as errors.
#[derive(Debug, Serialize)]
pub struct MilkInsertOutcome {
    pub success: bool,
    pub message: String,
    pub record: Option<MilkCollectionRecord>,
}

impl MilkInsertOutcome {
    pub fn inserted(record: MilkCollectionRecord) -> Self {
        Self {
            success: true,
            message: "Milk collection record added successfully".to_string(),
            record: Some(record),
        }
    }

    pub fn duplicate(date: NaiveDate, shift: Shift) -> Self {
        Self {
            success: false,
            message: duplicate_record_message(date, shift),
            record: None,
        }
    }
}

pub fn duplicate_record_message(date: NaiveDate, shift: Shift) -> String {
    format!(
        "Milk collection record already exists for this cow on {} for {} shift. Duplicate records are not allowed.",
        date.format("%Y-%m-%d"),
        shift
    )
}

#[derive(Debug, Deserialize, Default)]
pub struct MilkQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub cow_id: Option<String>,
    pub shift: Option<Shift>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// One point of the dashboard production chart.
#[derive(Debug, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct DailyMilkTotal {
    pub date: NaiveDate,
    pub total_amount: f64,
    pub morning_amount: f64,
    pub evening_amount: f64,
    pub collection_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_message_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(
            duplicate_record_message(date, Shift::Evening),
            "Milk collection record already exists for this cow on 2024-03-05 for Evening shift. Duplicate records are not allowed."
        );
    }

    #[test]
    fn test_flat_quality_payload() {
        let req: CreateMilkRecordRequest = serde_json::from_value(serde_json::json!({
            "cow_id": "c1",
            "date": "2024-03-05",
            "shift": "Morning",
            "amount": 12.5,
            "fat": 3.9,
            "somatic_cell_count": 150
        }))
        .unwrap();
        let q = req.quality.normalize();
        assert_eq!(q.fat, Some(3.9));
        assert_eq!(q.somatic_cell_count, Some(150.0));
        assert_eq!(q.protein, None);
    }

    #[test]
    fn test_nested_quality_payload_wins_over_flat() {
        let req: CreateMilkRecordRequest = serde_json::from_value(serde_json::json!({
            "cow_id": "c1",
            "date": "2024-03-05",
            "shift": "Evening",
            "amount": 10,
            "fat": 3.1,
            "lactose": 4.7,
            "qualityParameters": { "fat": 3.8, "somaticCellCount": 120, "bacteriaCount": 9000 }
        }))
        .unwrap();
        let q = req.quality.normalize();
        assert_eq!(q.fat, Some(3.8));
        assert_eq!(q.lactose, Some(4.7));
        assert_eq!(q.somatic_cell_count, Some(120.0));
        assert_eq!(q.bacteria_count, Some(9000.0));
    }

    #[test]
    fn test_shift_parsing() {
        assert_eq!("morning".parse::<Shift>().unwrap(), Shift::Morning);
        assert_eq!("Evening".parse::<Shift>().unwrap(), Shift::Evening);
        assert!("night".parse::<Shift>().is_err());
        assert_eq!(Shift::Morning.to_string(), "Morning");
    }
}
