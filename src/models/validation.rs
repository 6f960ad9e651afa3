use chrono::{DateTime, Utc};
use regex::Regex;
use serde::de::{self, Deserialize, Deserializer};
use serde_json::Value;
use std::sync::LazyLock;
use validator::ValidationError;

static EMAIL_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

/// `local@domain.tld`, nothing more.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.as_ref().is_some_and(|re| re.is_match(email))
}

pub fn is_valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat)
}

pub fn is_valid_longitude(lng: f64) -> bool {
    (-180.0..=180.0).contains(&lng)
}

pub fn is_valid_coordinates(lat: f64, lng: f64) -> bool {
    is_valid_latitude(lat) && is_valid_longitude(lng)
}

pub fn parse_job_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.with_timezone(&Utc))
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_email"))
    }
}

pub fn validate_role(role: &str) -> Result<(), ValidationError> {
    if crate::models::link::Role::parse(role).is_some() {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_role"))
    }
}

pub fn validate_job_time(value: &str) -> Result<(), ValidationError> {
    match parse_job_time(value) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("invalid_job_time")),
    }
}

pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("required"))
    } else {
        Ok(())
    }
}

/// JSON numbers only. Anything else reads as absent, so the field's own
/// validation reports it instead of the body parser.
pub fn number_or_absent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        _ => None,
    })
}

/// Whole numbers, given either as JSON integers or as numeric strings (`"3"`).
pub fn whole_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => n.as_i64().map(Some).ok_or_else(|| de::Error::custom("expected a whole number")),
        Value::String(s) => s.trim().parse::<i64>().map(Some).map_err(|_| de::Error::custom("expected a whole number")),
        _ => Err(de::Error::custom("expected a whole number")),
    }
}
