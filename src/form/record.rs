//! Typed snapshots of existing records, parsed from the API's loosely-typed
//! JSON before any dialog sees them.
//!
//! Missing and `null` fields are simply absent. A present field of the wrong
//! shape is an error rather than being silently coerced.

use super::enquiry::EnquiryStatus;
use crate::catalog::OptionId;
use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("Record must be a JSON object")]
    NotAnObject,
    #[error("Field '{field}' must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
    #[error("Field '{field}' is not a valid date: {value}")]
    InvalidDate { field: &'static str, value: String },
    #[error("Unknown enquiry status: {0}")]
    UnknownStatus(String),
}

/// An existing sales enquiry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnquiryRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub institute_name: Option<String>,
    pub email: Option<String>,
    pub contact: Option<String>,
    pub product_id: Option<OptionId>,
    pub package_id: Option<OptionId>,
    pub message: Option<String>,
    pub status: Option<EnquiryStatus>,
}

impl EnquiryRecord {
    pub fn from_value(value: &Value) -> Result<Self, RecordError> {
        let map = value.as_object().ok_or(RecordError::NotAnObject)?;
        let status = match text(map, "Enquiry_Status")? {
            Some(raw) => Some(
                EnquiryStatus::from_wire(&raw).ok_or(RecordError::UnknownStatus(raw))?,
            ),
            None => None,
        };
        Ok(Self {
            id: record_id(map)?,
            name: text(map, "Name")?,
            institute_name: text(map, "Institute_Name")?,
            email: text(map, "Email")?,
            contact: text(map, "Contact")?,
            product_id: identifier(map, "Product_id")?,
            package_id: identifier(map, "Package_id")?,
            message: text(map, "Message")?,
            status,
        })
    }
}

/// An existing client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientRecord {
    pub id: Option<String>,
    pub user_name: Option<String>,
    pub institute_name: Option<String>,
    pub contact: Option<String>,
    pub email: Option<String>,
    pub product: Option<OptionId>,
    pub plan: Option<OptionId>,
    pub start_date: Option<NaiveDate>,
}

impl ClientRecord {
    pub fn from_value(value: &Value) -> Result<Self, RecordError> {
        let map = value.as_object().ok_or(RecordError::NotAnObject)?;
        Ok(Self {
            id: record_id(map)?,
            user_name: text(map, "User_Name")?,
            institute_name: text(map, "Institute_Name")?,
            contact: text(map, "Contact")?,
            email: text(map, "Email")?,
            product: identifier(map, "product")?,
            plan: identifier(map, "plan")?,
            start_date: date(map, "Start_Date")?,
        })
    }
}

fn present<'a>(map: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    map.get(field).filter(|v| !v.is_null())
}

/// Strings pass through; numbers are accepted for phone-like fields.
fn text(map: &Map<String, Value>, field: &'static str) -> Result<Option<String>, RecordError> {
    match present(map, field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(RecordError::InvalidField {
            field,
            expected: "a string",
        }),
    }
}

fn identifier(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<OptionId>, RecordError> {
    match present(map, field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(OptionId::parse(s)),
        Some(v @ Value::Number(_)) => Ok(OptionId::from_json(v)),
        Some(_) => Err(RecordError::InvalidField {
            field,
            expected: "a string or number id",
        }),
    }
}

fn record_id(map: &Map<String, Value>) -> Result<Option<String>, RecordError> {
    Ok(identifier(map, "id")?.map(|id| id.to_string()))
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD`; keeps the calendar date.
fn date(map: &Map<String, Value>, field: &'static str) -> Result<Option<NaiveDate>, RecordError> {
    let Some(raw) = text(map, field)? else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(Some(ts.naive_utc().date()));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| RecordError::InvalidDate {
            field,
            value: raw.clone(),
        })
}
