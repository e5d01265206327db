use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AppError;

pub const MIN_SEMESTER: i32 = 1;
pub const MAX_SEMESTER: i32 = 8;

/// Body for responses that carry nothing but a confirmation.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    #[schema(example = true)]
    pub success: bool,
    #[schema(example = "Note deleted successfully")]
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Serde helper for PATCH semantics on nullable fields.
///
/// * JSON field absent  => `None`          (don't update)
/// * JSON field = null  => `Some(None)`    (set to NULL)
/// * JSON field = value => `Some(Some(v))` (set to value)
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

/// Trim a required text field, rejecting missing or blank values.
pub fn require_text(field: &str, value: Option<&str>) -> Result<String, AppError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AppError::Validation(format!("{field} is required"))),
    }
}

/// Trim an optional text field; blank collapses to `None`.
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn validate_semester(semester: i32) -> Result<i32, AppError> {
    if (MIN_SEMESTER..=MAX_SEMESTER).contains(&semester) {
        Ok(semester)
    } else {
        Err(AppError::Validation(format!(
            "Semester must be between {MIN_SEMESTER} and {MAX_SEMESTER}"
        )))
    }
}

/// Parse a semester submitted as form text.
pub fn parse_semester(value: Option<&str>) -> Result<i32, AppError> {
    let raw = require_text("Semester", value)?;
    let semester = raw
        .parse::<i32>()
        .map_err(|_| AppError::Validation("Semester must be a whole number".into()))?;
    validate_semester(semester)
}
