// used for timestamps in filters and in catalogue responses
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
// used to validate the textual form before handing it to chrono
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{QueryError, Result};

/// The only textual timestamp shape the catalogue filter grammar accepts.
pub const CATALOG_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

lazy_static! {
    static ref CATALOG_TIMESTAMP: Regex =
        Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z$").unwrap();
}

/// A date bound given either as a structured value or as text in [`CATALOG_FORMAT`].
#[derive(Debug, Clone, PartialEq)]
pub enum TimeInput {
    At(DateTime<Utc>),
    Text(String),
}

impl TimeInput {
    /// Renders the bound for a filter clause, rejecting text that is not in catalogue form.
    pub fn to_catalog_string(&self) -> Result<String> {
        match self {
            TimeInput::At(at) => Ok(format_catalog(at)),
            TimeInput::Text(text) => {
                validate_catalog(text)?;
                Ok(text.clone())
            }
        }
    }
}

impl From<DateTime<Utc>> for TimeInput {
    fn from(at: DateTime<Utc>) -> Self {
        TimeInput::At(at)
    }
}
impl From<NaiveDateTime> for TimeInput {
    fn from(at: NaiveDateTime) -> Self {
        TimeInput::At(at.and_utc())
    }
}
impl From<NaiveDate> for TimeInput {
    fn from(day: NaiveDate) -> Self {
        TimeInput::At(day.and_time(chrono::NaiveTime::MIN).and_utc())
    }
}
impl From<&str> for TimeInput {
    fn from(text: &str) -> Self {
        TimeInput::Text(text.to_string())
    }
}
impl From<String> for TimeInput {
    fn from(text: String) -> Self {
        TimeInput::Text(text)
    }
}

pub fn format_catalog(at: &DateTime<Utc>) -> String {
    at.format(CATALOG_FORMAT).to_string()
}

/// Checks shape and calendar validity (`2023-02-30T...` passes the regex but not chrono).
pub fn validate_catalog(text: &str) -> Result<DateTime<Utc>> {
    if !CATALOG_TIMESTAMP.is_match(text) {
        return Err(QueryError::MalformedTimestamp(text.to_string()));
    }
    NaiveDateTime::parse_from_str(text, CATALOG_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| QueryError::MalformedTimestamp(text.to_string()))
}

/// Lenient parsing of the dates found in catalogue payloads, which come with anything
/// from zero to six fractional digits. The fraction is dropped.
pub fn parse_response_date(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim().trim_end_matches('Z');
    let whole_seconds = trimmed.split('.').next()?;
    NaiveDateTime::parse_from_str(whole_seconds, "%Y-%m-%dT%H:%M:%S")
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.with_timezone(&Utc)))
}
