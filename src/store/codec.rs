//! Column codecs: decimals travel as canonical strings, timestamps as epoch millis.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::models::{Account, EntryType};

#[derive(Debug)]
struct DecodeError(String);

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for DecodeError {}

fn conversion_failure(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(DecodeError(msg)))
}

pub fn decimal_to_sql(value: Decimal) -> String {
    value.normalize().to_string()
}

pub fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_failure(idx, format!("{:?}: {}", raw, e)))
}

pub fn opt_decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        Decimal::from_str(&s).map_err(|e| conversion_failure(idx, format!("{:?}: {}", s, e)))
    })
    .transpose()
}

pub fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub fn time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| conversion_failure(idx, format!("timestamp out of range: {}", ms)))
}

pub fn account_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Account> {
    let raw: String = row.get(idx)?;
    Account::parse(&raw).ok_or_else(|| conversion_failure(idx, format!("unknown account {:?}", raw)))
}

pub fn entry_type_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<EntryType> {
    let raw: String = row.get(idx)?;
    EntryType::from_str(&raw)
        .ok_or_else(|| conversion_failure(idx, format!("unknown entry type {:?}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decimal_stored_in_canonical_form() {
        assert_eq!(decimal_to_sql(dec!(10.500)), "10.5");
        assert_eq!(decimal_to_sql(dec!(2600)), "2600");
        assert_eq!(decimal_to_sql(Decimal::ZERO), "0");
    }

    #[test]
    fn test_time_round_trip_keeps_millis() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 9, 15, 0).unwrap()
            + chrono::Duration::milliseconds(250);

        let back = conn
            .query_row("SELECT ?1", [to_millis(ts)], |row| time_at(row, 0))
            .unwrap();
        assert_eq!(back, ts);
    }
}
