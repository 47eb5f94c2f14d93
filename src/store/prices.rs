//! Price Store
//! Mission: Append-only price history per symbol, with "latest" and "as of day" lookups
//!
//! Ticks are never edited through this type. The only mutations after insert
//! (split rescale, delist purge) live on [`UnitOfWork`](super::UnitOfWork).

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use tracing::debug;

use super::codec::{decimal_at, decimal_to_sql, time_at, to_millis};
use super::Store;
use crate::error::{LedgerError, LedgerResult};
use crate::models::PriceTick;

/// Reporting days follow Indian Standard Time (UTC+05:30).
pub const REPORTING_UTC_OFFSET_SECS: i64 = 5 * 3600 + 30 * 60;

/// Calendar day of `ts` in the reporting timezone.
pub fn reporting_day(ts: DateTime<Utc>) -> NaiveDate {
    (ts + Duration::seconds(REPORTING_UTC_OFFSET_SECS)).date_naive()
}

/// First instant after `day` ends in the reporting timezone, as UTC.
pub fn end_of_reporting_day(day: NaiveDate) -> DateTime<Utc> {
    let next_midnight = (day + Duration::days(1)).and_time(chrono::NaiveTime::MIN);
    Utc.from_utc_datetime(&next_midnight) - Duration::seconds(REPORTING_UTC_OFFSET_SECS)
}

#[derive(Clone)]
pub struct PriceStore {
    store: Store,
}

impl PriceStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Most recent tick for `symbol`, or `NotFound`.
    pub fn latest_price(&self, symbol: &str) -> LedgerResult<Decimal> {
        self.store
            .read(|conn| latest_price_before(conn, symbol, i64::MAX))?
            .ok_or_else(|| LedgerError::NotFound(format!("no price for {}", symbol)))
    }

    /// Most recent tick fetched before the end of `day` (reporting timezone).
    pub fn latest_price_as_of(&self, symbol: &str, day: NaiveDate) -> LedgerResult<Decimal> {
        let cutoff = to_millis(end_of_reporting_day(day));
        self.store
            .read(|conn| latest_price_before(conn, symbol, cutoff))?
            .ok_or_else(|| LedgerError::NotFound(format!("no price for {} as of {}", symbol, day)))
    }

    pub fn append(&self, symbol: &str, price: Decimal, fetched_at: DateTime<Utc>) -> LedgerResult<()> {
        self.append_batch(&[PriceTick {
            stock_symbol: symbol.to_string(),
            price_inr: price,
            fetched_at,
        }])
        .map(|_| ())
    }

    /// Append all ticks in one unit of work; either every tick lands or none.
    pub fn append_batch(&self, ticks: &[PriceTick]) -> LedgerResult<usize> {
        for tick in ticks {
            validate_tick(tick)?;
        }
        let inserted = self.store.transact(|uow| {
            for tick in ticks {
                uow.append_price(tick)?;
            }
            Ok::<_, LedgerError>(ticks.len())
        })?;
        debug!(ticks = inserted, "price ticks appended");
        Ok(inserted)
    }

    /// Full history of `symbol`, oldest first.
    pub fn history(&self, symbol: &str) -> LedgerResult<Vec<PriceTick>> {
        Ok(self.store.read(|conn| price_history(conn, symbol))?)
    }
}

fn validate_tick(tick: &PriceTick) -> LedgerResult<()> {
    if tick.stock_symbol.trim().is_empty() {
        return Err(LedgerError::validation("stock_symbol must not be empty"));
    }
    if tick.price_inr < Decimal::ZERO {
        return Err(LedgerError::validation(format!(
            "price for {} must not be negative",
            tick.stock_symbol
        )));
    }
    Ok(())
}

pub(crate) fn latest_price_before(
    conn: &Connection,
    symbol: &str,
    cutoff_ms: i64,
) -> rusqlite::Result<Option<Decimal>> {
    let mut stmt = conn.prepare_cached(
        "SELECT price_inr FROM price_ticks
         WHERE stock_symbol = ?1 AND fetched_at < ?2
         ORDER BY fetched_at DESC, id DESC
         LIMIT 1",
    )?;
    stmt.query_row(params![symbol, cutoff_ms], |row| decimal_at(row, 0))
        .optional()
}

pub(crate) fn price_history(conn: &Connection, symbol: &str) -> rusqlite::Result<Vec<PriceTick>> {
    let mut stmt = conn.prepare_cached(
        "SELECT stock_symbol, price_inr, fetched_at FROM price_ticks
         WHERE stock_symbol = ?1
         ORDER BY fetched_at ASC, id ASC",
    )?;
    let rows = stmt.query_map(params![symbol], |row| {
        Ok(PriceTick {
            stock_symbol: row.get(0)?,
            price_inr: decimal_at(row, 1)?,
            fetched_at: time_at(row, 2)?,
        })
    })?;
    let ticks = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ticks)
}

pub(crate) fn insert_tick(conn: &Connection, tick: &PriceTick) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO price_ticks (stock_symbol, price_inr, fetched_at) VALUES (?1, ?2, ?3)",
        params![
            &tick.stock_symbol,
            decimal_to_sql(tick.price_inr),
            to_millis(tick.fetched_at),
        ],
    )?;
    Ok(())
}

/// Divide every tick of `symbol` by `ratio`. Returns rows touched.
pub(crate) fn rescale(conn: &Connection, symbol: &str, ratio: Decimal) -> LedgerResult<usize> {
    let ticks: Vec<(i64, Decimal)> = {
        let mut stmt =
            conn.prepare_cached("SELECT id, price_inr FROM price_ticks WHERE stock_symbol = ?1")?;
        let rows = stmt.query_map(params![symbol], |row| Ok((row.get(0)?, decimal_at(row, 1)?)))?;
        let collected = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        collected
    };

    let mut update = conn.prepare_cached("UPDATE price_ticks SET price_inr = ?1 WHERE id = ?2")?;
    for (id, price) in &ticks {
        let scaled = price.checked_div(ratio).ok_or_else(|| {
            LedgerError::validation(format!("price rescale overflow for {}", symbol))
        })?;
        update.execute(params![decimal_to_sql(scaled), id])?;
    }
    Ok(ticks.len())
}

pub(crate) fn purge(conn: &Connection, symbol: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM price_ticks WHERE stock_symbol = ?1", params![symbol])
}
