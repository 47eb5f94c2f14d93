//! Unit of Work
//! Mission: Every multi-row mutation commits together or not at all
//!
//! Wraps one `BEGIN IMMEDIATE` SQLite transaction. Dropping a unit of work
//! without calling [`UnitOfWork::commit`] rolls it back.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::codec::{decimal_at, decimal_to_sql, to_millis};
use super::prices;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    CorporateActionRecord, NewLedgerEntry, NewReward, PriceTick, DELISTED_NOTE,
};

pub struct UnitOfWork<'c> {
    tx: Transaction<'c>,
}

impl<'c> UnitOfWork<'c> {
    pub(crate) fn begin(conn: &'c mut Connection) -> rusqlite::Result<Self> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(Self { tx })
    }

    pub fn commit(self) -> rusqlite::Result<()> {
        self.tx.commit()
    }

    pub fn rollback(self) -> rusqlite::Result<()> {
        self.tx.rollback()
    }

    /// Insert a reward and return its generated id.
    /// A reused idempotency key surfaces as a UNIQUE constraint error.
    pub fn insert_reward(
        &self,
        reward: &NewReward,
        rewarded_at: DateTime<Utc>,
    ) -> rusqlite::Result<String> {
        let id = Uuid::new_v4().to_string();
        self.tx.execute(
            "INSERT INTO rewards (id, user_id, stock_symbol, quantity, rewarded_at, idempotency_key, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &id,
                &reward.user_id,
                &reward.stock_symbol,
                decimal_to_sql(reward.quantity),
                to_millis(rewarded_at),
                reward.idempotency_key.as_deref(),
                reward.notes.as_deref(),
            ],
        )?;
        Ok(id)
    }

    pub fn insert_ledger_entry(&self, entry: &NewLedgerEntry) -> rusqlite::Result<String> {
        let id = Uuid::new_v4().to_string();
        self.tx.execute(
            "INSERT INTO ledger_entries
             (id, tx_id, account, entry_type, amount_inr, stock_symbol, stock_quantity, ref_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                &id,
                &entry.tx_id,
                entry.account.to_string(),
                entry.entry_type.as_str(),
                entry.amount_inr.map(decimal_to_sql),
                entry.stock_symbol.as_deref(),
                entry.stock_quantity.map(decimal_to_sql),
                entry.ref_id.as_deref(),
                to_millis(Utc::now()),
            ],
        )?;
        Ok(id)
    }

    fn reward_quantities(&self, symbol: &str) -> rusqlite::Result<Vec<(String, Decimal)>> {
        let mut stmt = self
            .tx
            .prepare_cached("SELECT id, quantity FROM rewards WHERE stock_symbol = ?1")?;
        let rows = stmt.query_map(params![symbol], |row| Ok((row.get(0)?, decimal_at(row, 1)?)))?;
        let collected = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(collected)
    }

    /// Multiply the quantity of every reward on `symbol` by `ratio`.
    pub fn scale_reward_quantities(&self, symbol: &str, ratio: Decimal) -> LedgerResult<usize> {
        let rewards = self.reward_quantities(symbol)?;
        let mut update = self
            .tx
            .prepare_cached("UPDATE rewards SET quantity = ?1 WHERE id = ?2")?;
        for (id, quantity) in &rewards {
            let scaled = scale(*quantity, ratio, symbol)?;
            update.execute(params![decimal_to_sql(scaled), id])?;
        }
        Ok(rewards.len())
    }

    /// Move every reward on `symbol` to `new_symbol`, multiplying quantity by `ratio`.
    pub fn merge_rewards(
        &self,
        symbol: &str,
        new_symbol: &str,
        ratio: Decimal,
    ) -> LedgerResult<usize> {
        let rewards = self.reward_quantities(symbol)?;
        let mut update = self
            .tx
            .prepare_cached("UPDATE rewards SET stock_symbol = ?1, quantity = ?2 WHERE id = ?3")?;
        for (id, quantity) in &rewards {
            let scaled = scale(*quantity, ratio, symbol)?;
            update.execute(params![new_symbol, decimal_to_sql(scaled), id])?;
        }
        Ok(rewards.len())
    }

    /// Overwrites any existing note.
    pub fn mark_rewards_delisted(&self, symbol: &str) -> rusqlite::Result<usize> {
        self.tx.execute(
            "UPDATE rewards SET notes = ?1 WHERE stock_symbol = ?2",
            params![DELISTED_NOTE, symbol],
        )
    }

    pub fn append_price(&self, tick: &PriceTick) -> rusqlite::Result<()> {
        prices::insert_tick(&self.tx, tick)
    }

    /// Divide every price tick of `symbol` by `ratio`.
    pub fn rescale_prices(&self, symbol: &str, ratio: Decimal) -> LedgerResult<usize> {
        prices::rescale(&self.tx, symbol, ratio)
    }

    pub fn purge_prices(&self, symbol: &str) -> rusqlite::Result<usize> {
        prices::purge(&self.tx, symbol)
    }

    pub fn insert_corporate_action(&self, record: &CorporateActionRecord) -> LedgerResult<()> {
        let parameter = serde_json::to_string(&record.parameter)
            .map_err(|e| LedgerError::validation(format!("corporate action payload: {}", e)))?;
        self.tx.execute(
            "INSERT INTO corporate_actions (id, stock_symbol, action_type, parameter, effective_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &record.id,
                &record.stock_symbol,
                record.action_type.as_str(),
                parameter,
                to_millis(record.effective_date),
            ],
        )?;
        Ok(())
    }
}

fn scale(quantity: Decimal, ratio: Decimal, symbol: &str) -> LedgerResult<Decimal> {
    quantity
        .checked_mul(ratio)
        .ok_or_else(|| LedgerError::validation(format!("quantity overflow rescaling {}", symbol)))
}
