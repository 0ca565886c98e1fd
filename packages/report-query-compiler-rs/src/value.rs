use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::model::ScalarValue;

/// A value bound to a named placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BindValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl From<&ScalarValue> for BindValue {
    fn from(value: &ScalarValue) -> Self {
        match value {
            ScalarValue::Bool(v) => BindValue::Bool(*v),
            ScalarValue::Int(v) => BindValue::Int(*v),
            ScalarValue::Float(v) => BindValue::Float(*v),
            ScalarValue::Text(v) => BindValue::Text(v.clone()),
        }
    }
}

impl From<&str> for BindValue {
    fn from(value: &str) -> Self {
        BindValue::Text(value.to_string())
    }
}

impl From<String> for BindValue {
    fn from(value: String) -> Self {
        BindValue::Text(value)
    }
}

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses ISO-looking strings into dates; anything else binds unchanged.
pub fn coerce_date(value: &ScalarValue) -> BindValue {
    let ScalarValue::Text(text) = value else {
        return BindValue::from(value);
    };
    let text = text.trim();

    if text.len() == 10 {
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return BindValue::Date(date);
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return BindValue::Timestamp(parsed.naive_utc());
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return BindValue::Timestamp(parsed);
        }
    }

    BindValue::Text(text.to_string())
}

pub fn coerce_number(value: &ScalarValue) -> BindValue {
    let ScalarValue::Text(text) = value else {
        return BindValue::from(value);
    };
    let trimmed = text.trim();

    if let Ok(int) = trimmed.parse::<i64>() {
        BindValue::Int(int)
    } else if let Ok(float) = trimmed.parse::<f64>() {
        BindValue::Float(float)
    } else {
        BindValue::Text(text.clone())
    }
}

/// Text used inside LIKE patterns, with numeric noise such as `5.50` trimmed to `5.5`.
pub fn pattern_text(value: &ScalarValue, numeric: bool) -> String {
    let text = value.to_text();
    if numeric && text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> ScalarValue {
        ScalarValue::Text(value.to_string())
    }

    #[test]
    fn coerces_iso_dates_and_timestamps() {
        assert_eq!(
            coerce_date(&text("2026-01-31")),
            BindValue::Date(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap())
        );

        let expected = NaiveDate::from_ymd_opt(2026, 1, 31)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(
            coerce_date(&text("2026-01-31T08:30:00Z")),
            BindValue::Timestamp(expected)
        );
        assert_eq!(
            coerce_date(&text("2026-01-31 08:30:00")),
            BindValue::Timestamp(expected)
        );
        assert_eq!(coerce_date(&text("last week")), BindValue::Text("last week".into()));
        assert_eq!(coerce_date(&ScalarValue::Int(3)), BindValue::Int(3));
    }

    #[test]
    fn coerces_numeric_strings() {
        assert_eq!(coerce_number(&text(" 202601 ")), BindValue::Int(202601));
        assert_eq!(coerce_number(&text("2.5")), BindValue::Float(2.5));
        assert_eq!(coerce_number(&text("n/a")), BindValue::Text("n/a".into()));
    }

    #[test]
    fn trims_numeric_pattern_text() {
        assert_eq!(pattern_text(&text("5.500"), true), "5.5");
        assert_eq!(pattern_text(&text("10.0"), true), "10");
        assert_eq!(pattern_text(&text("10.0"), false), "10.0");
    }

    #[test]
    fn serializes_dates_as_iso_strings() {
        let value = BindValue::Date(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
        assert_eq!(serde_json::to_string(&value).unwrap(), "\"2026-02-01\"");
    }
}
