// src/models/cow.rs
use serde::{Deserialize, Serialize};
use validator::Validate;
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Cow {
    pub id: String,
    pub name: String,
    pub tag_number: String,
    pub breed: Option<String>,
    pub status: String,
    pub date_of_birth: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, Clone)]
pub struct CreateCowRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 50, message = "Tag number must be between 1 and 50 characters"))]
    pub tag_number: String,
    #[validate(length(max = 100, message = "Breed cannot exceed 100 characters"))]
    pub breed: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateCowRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Tag number must be between 1 and 50 characters"))]
    pub tag_number: Option<String>,
    #[validate(length(max = 100, message = "Breed cannot exceed 100 characters"))]
    pub breed: Option<String>,
    pub status: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}
