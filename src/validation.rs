//! Request validation shared by the reward writer and corporate action processor.
//! Everything here runs before a unit of work is opened.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};

/// Parse an optional JSON number or numeric string into an exact decimal.
pub fn parse_decimal(value: Option<&Value>, field: &str) -> LedgerResult<Option<Decimal>> {
    let raw = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => return Err(LedgerError::validation(format!("{} must be numeric", field))),
    };
    if raw.is_empty() {
        return Ok(None);
    }

    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map(Some)
        .map_err(|_| LedgerError::validation(format!("{} must be numeric (got {:?})", field, raw)))
}

/// Required decimal that must be strictly greater than zero.
pub fn require_positive(value: Option<&Value>, field: &str) -> LedgerResult<Decimal> {
    let parsed = parse_decimal(value, field)?
        .ok_or_else(|| LedgerError::validation(format!("{} is required", field)))?;
    if parsed <= Decimal::ZERO {
        return Err(LedgerError::validation(format!(
            "{} must be greater than zero (got {})",
            field, parsed
        )));
    }
    Ok(parsed)
}

/// Trimmed, non-empty symbol.
pub fn require_symbol(raw: &str, field: &str) -> LedgerResult<String> {
    let symbol = raw.trim();
    if symbol.is_empty() {
        return Err(LedgerError::validation(format!("{} is required", field)));
    }
    Ok(symbol.to_string())
}

/// Canonical hyphenated form of a UUID user id.
pub fn require_user_id(raw: &str) -> LedgerResult<String> {
    Uuid::parse_str(raw.trim())
        .map(|id| id.to_string())
        .map_err(|_| LedgerError::validation(format!("user_id must be a UUID (got {:?})", raw)))
}

/// Blank strings collapse to `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// RFC 3339 timestamp, or `YYYY-MM-DD` taken as UTC midnight.
pub fn parse_timestamp(raw: &str, field: &str) -> LedgerResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|day| Utc.from_utc_datetime(&day.and_time(chrono::NaiveTime::MIN)))
        .map_err(|_| {
            LedgerError::validation(format!(
                "{} must be RFC 3339 or YYYY-MM-DD (got {:?})",
                field, raw
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_quantity_accepts_numbers_and_strings() {
        assert_eq!(parse_decimal(Some(&json!(10)), "quantity").unwrap(), Some(dec!(10)));
        assert_eq!(parse_decimal(Some(&json!(0.5)), "quantity").unwrap(), Some(dec!(0.5)));
        assert_eq!(
            parse_decimal(Some(&json!(" 1.234567 ")), "quantity").unwrap(),
            Some(dec!(1.234567))
        );
        assert_eq!(parse_decimal(None, "quantity").unwrap(), None);
        assert_eq!(parse_decimal(Some(&Value::Null), "quantity").unwrap(), None);
    }

    #[test]
    fn test_json_numbers_keep_every_digit() {
        let small: Value = serde_json::from_str("0.12345678901234567891").unwrap();
        assert_eq!(
            parse_decimal(Some(&small), "quantity").unwrap().unwrap().to_string(),
            "0.12345678901234567891"
        );

        let large: Value = serde_json::from_str("12345678901234567.5").unwrap();
        assert_eq!(
            parse_decimal(Some(&large), "ratio").unwrap(),
            Some(dec!(12345678901234567.5))
        );

        let scientific: Value = serde_json::from_str("2.5e3").unwrap();
        assert_eq!(parse_decimal(Some(&scientific), "quantity").unwrap(), Some(dec!(2500)));
    }

    #[test]
    fn test_non_numeric_rejected() {
        for bad in [json!("abc"), json!(true), json!([1]), json!({"q": 1})] {
            assert!(matches!(
                parse_decimal(Some(&bad), "quantity"),
                Err(LedgerError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_require_positive() {
        assert!(require_positive(Some(&json!(0)), "ratio").is_err());
        assert!(require_positive(Some(&json!(-2)), "ratio").is_err());
        assert!(require_positive(None, "ratio").is_err());
        assert_eq!(require_positive(Some(&json!("1.5")), "ratio").unwrap(), dec!(1.5));
    }

    #[test]
    fn test_user_id_must_be_uuid() {
        assert!(require_user_id("u1").is_err());
        assert_eq!(
            require_user_id("6F1C2B1E-0000-4000-8000-000000000001").unwrap(),
            "6f1c2b1e-0000-4000-8000-000000000001"
        );
    }

    #[test]
    fn test_timestamp_formats() {
        assert_eq!(
            parse_timestamp("2025-03-01", "effective_date").unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_timestamp("2025-03-01T10:00:00+05:30", "effective_date").unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 4, 30, 0).unwrap()
        );
        assert!(parse_timestamp("yesterday", "effective_date").is_err());
    }

    #[test]
    fn test_symbol_and_blank_helpers() {
        assert_eq!(require_symbol("  TCS ", "stock_symbol").unwrap(), "TCS");
        assert!(require_symbol("   ", "stock_symbol").is_err());
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some(" key ".into())), Some("key".into()));
    }
}
