// src/validator.rs - Centralized validation module
//! Cross-field checks that `validator` derives cannot express.

use std::collections::HashMap;
use serde::Serialize;
use regex::Regex;
use lazy_static::lazy_static;
use chrono::{NaiveDate, Utc};
use crate::error::ApiError;
use crate::models::*;
use crate::quality::{Parameter, COMPLIANCE_PARAMETERS};

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9 ()-]{6,20}$").unwrap();
    static ref TAG_REGEX: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").unwrap();
}

// ==================== VALIDATION RESULT ====================

#[derive(Debug, Default, Serialize)]
pub struct ValidationResult {
    pub errors: HashMap<String, Vec<String>>,
    pub warnings: HashMap<String, Vec<String>>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn merge(&mut self, other: ValidationResult) {
        for (field, errors) in other.errors {
            self.errors.entry(field).or_default().extend(errors);
        }
        for (field, warnings) in other.warnings {
            self.warnings.entry(field).or_default().extend(warnings);
        }
    }

    fn check(&mut self, field: &str, outcome: Result<(), String>) {
        if let Err(e) = outcome {
            self.add_error(field, e);
        }
    }

    pub fn to_api_error(&self) -> ApiError {
        let mut fields: Vec<_> = self.errors.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));
        let message = fields
            .iter()
            .map(|(field, errors)| format!("{}: {}", field, errors.join(", ")))
            .collect::<Vec<_>>()
            .join("; ");

        ApiError::ValidationError(message)
    }

    /// `Err` with every collected error, warnings are logged.
    pub fn into_result(self) -> Result<(), ApiError> {
        for (field, warnings) in &self.warnings {
            log::warn!("Validation warning on {}: {}", field, warnings.join(", "));
        }
        if self.is_valid() {
            Ok(())
        } else {
            Err(self.to_api_error())
        }
    }
}

// ==================== FIELD VALIDATORS ====================

pub struct FieldValidator;

impl FieldValidator {
    pub fn not_empty(value: &str, field: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            Err(format!("{} cannot be empty", field))
        } else {
            Ok(())
        }
    }

    pub fn range<T: PartialOrd + std::fmt::Display>(
        value: T,
        field: &str,
        min: Option<T>,
        max: Option<T>
    ) -> Result<(), String> {
        if let Some(min_val) = min {
            if value < min_val {
                return Err(format!("{} must be at least {}", field, min_val));
            }
        }

        if let Some(max_val) = max {
            if value > max_val {
                return Err(format!("{} must not exceed {}", field, max_val));
            }
        }

        Ok(())
    }

    pub fn email(value: &str) -> Result<(), String> {
        if EMAIL_REGEX.is_match(value) {
            Ok(())
        } else {
            Err("Invalid email format".to_string())
        }
    }

    pub fn phone(value: &str) -> Result<(), String> {
        if PHONE_REGEX.is_match(value.trim()) {
            Ok(())
        } else {
            Err("Invalid phone number format".to_string())
        }
    }

    pub fn tag_number(value: &str) -> Result<(), String> {
        if TAG_REGEX.is_match(value) {
            Ok(())
        } else {
            Err("Tag number may only contain letters, digits, '-' and '_'".to_string())
        }
    }

    pub fn quantity(value: f64) -> Result<(), String> {
        if !value.is_finite() {
            Err("Quantity must be a finite number".to_string())
        } else if value < 0.0 {
            Err("Quantity cannot be negative".to_string())
        } else if value > 1e9 {
            Err("Quantity too large".to_string())
        } else {
            Ok(())
        }
    }

    pub fn date_order(start: NaiveDate, end: NaiveDate, field: &str) -> Result<(), String> {
        if end < start {
            Err(format!("{} cannot be before {}", field, start.format("%Y-%m-%d")))
        } else {
            Ok(())
        }
    }

    /// Collection dates in the future are rejected, very old ones only warned about.
    pub fn collection_date(date: NaiveDate, warn_days: i64) -> ValidationResult {
        let mut result = ValidationResult::new();
        let today = Utc::now().date_naive();
        let age = (today - date).num_days();

        if age < 0 {
            result.add_error("date", "Collection date cannot be in the future");
        } else if age > warn_days {
            result.add_warning("date", format!("Collection recorded {} days after the fact", age));
        }

        result
    }

    /// Percentages stay within 0..=100, counts are non-negative.
    pub fn quality(params: &QualityParameters) -> ValidationResult {
        let mut result = ValidationResult::new();

        for parameter in [Parameter::Fat, Parameter::Protein, Parameter::Lactose, Parameter::Snf] {
            if let Some(value) = parameter.value(params) {
                result.check(parameter.field_name(), Self::range(value, &parameter.to_string(), Some(0.0), Some(100.0)));
            }
        }
        for parameter in [Parameter::SomaticCellCount, Parameter::BacteriaCount] {
            if let Some(value) = parameter.value(params) {
                result.check(parameter.field_name(), Self::range(value, &parameter.to_string(), Some(0.0), None));
            }
        }

        if !params.is_empty() && COMPLIANCE_PARAMETERS.iter().any(|p| p.value(params).is_none()) {
            result.add_warning("quality_parameters", "Some quality readings are missing");
        }

        result
    }
}

// ==================== UNIT VALIDATION ====================

pub const VALID_UNITS: &[&str] = &[
    // Масса
    "g", "kg", "t",
    // Объем
    "L", "mL", "l", "ml",
    // Штуки
    "pcs", "units", "bags", "bales", "doses", "boxes", "rolls",
];

pub struct UnitValidator;

impl UnitValidator {
    pub fn validate_unit(unit: &str) -> Result<(), String> {
        if VALID_UNITS.contains(&unit) {
            Ok(())
        } else {
            Err(format!("Invalid unit '{}'. Valid units: {}", unit, VALID_UNITS.join(", ")))
        }
    }
}

// ==================== CUSTOM VALIDATION ====================

pub trait CustomValidate {
    fn custom_validate(&self) -> ValidationResult;
}

impl CustomValidate for CreateInventoryItemRequest {
    fn custom_validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.check("name", FieldValidator::not_empty(&self.name, "Name"));
        result.check("unit", UnitValidator::validate_unit(&self.unit));
        result.check("current_stock", FieldValidator::quantity(self.current_stock));
        result.check("reorder_level", FieldValidator::quantity(self.reorder_level));

        if self.current_stock <= self.reorder_level {
            result.add_warning("current_stock", "Item starts at or below its reorder level");
        }

        result
    }
}

impl CustomValidate for UpdateInventoryItemRequest {
    fn custom_validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        if let Some(ref name) = self.name {
            result.check("name", FieldValidator::not_empty(name, "Name"));
        }
        if let Some(ref unit) = self.unit {
            result.check("unit", UnitValidator::validate_unit(unit));
        }
        result
    }
}

impl CustomValidate for AdjustStockRequest {
    fn custom_validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.check("quantity", FieldValidator::quantity(self.quantity));
        if self.adjustment_type != AdjustmentType::Correction && self.quantity == 0.0 {
            result.add_error("quantity", "Quantity must be greater than zero");
        }
        result
    }
}

impl CustomValidate for CreateSupplierRequest {
    fn custom_validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.check("name", FieldValidator::not_empty(&self.name, "Name"));
        if let Some(ref email) = self.email {
            result.check("email", FieldValidator::email(email));
        }
        if let Some(ref phone) = self.phone {
            result.check("phone", FieldValidator::phone(phone));
        }
        if self.email.is_none() && self.phone.is_none() {
            result.add_warning("contact", "Supplier has no email or phone");
        }
        result
    }
}

impl CustomValidate for UpdateSupplierRequest {
    fn custom_validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        if let Some(ref email) = self.email {
            result.check("email", FieldValidator::email(email));
        }
        if let Some(ref phone) = self.phone {
            result.check("phone", FieldValidator::phone(phone));
        }
        result
    }
}

impl CustomValidate for CreateCowRequest {
    fn custom_validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        result.check("tag_number", FieldValidator::tag_number(&self.tag_number));
        if let Some(born) = self.date_of_birth {
            if born > Utc::now().date_naive() {
                result.add_error("date_of_birth", "Date of birth cannot be in the future");
            }
        }
        result
    }
}

impl CustomValidate for UpdateCowRequest {
    fn custom_validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        if let Some(ref tag) = self.tag_number {
            result.check("tag_number", FieldValidator::tag_number(tag));
        }
        result
    }
}

impl CustomValidate for CreateMilkRecordRequest {
    fn custom_validate(&self) -> ValidationResult {
        let mut result = FieldValidator::collection_date(self.date, 30);
        result.merge(FieldValidator::quality(&self.quality.clone().normalize()));
        result
    }
}

impl CustomValidate for UpdateMilkRecordRequest {
    fn custom_validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        if let Some(date) = self.date {
            result.merge(FieldValidator::collection_date(date, 30));
        }
        result.merge(FieldValidator::quality(&self.quality.clone().normalize()));
        result
    }
}

impl CustomValidate for CreateOrderRequest {
    fn custom_validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        let order_date = self.order_date.unwrap_or_else(|| Utc::now().date_naive());
        if let Some(expected) = self.expected_delivery {
            result.check("expected_delivery", FieldValidator::date_order(order_date, expected, "Expected delivery"));
        }
        for (idx, item) in self.items.iter().enumerate() {
            result.check(&format!("items[{}].quantity", idx), FieldValidator::quantity(item.quantity));
        }
        result
    }
}

impl CustomValidate for CreateRevenueRequest {
    fn custom_validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        if self.amount == 0.0 {
            result.add_warning("amount", "Revenue entry with zero amount");
        }
        if self.date > Utc::now().date_naive() {
            result.add_error("date", "Revenue date cannot be in the future");
        }
        result
    }
}
