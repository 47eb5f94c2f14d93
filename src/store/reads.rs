//! Read-only queries over committed state

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::codec::{account_at, decimal_at, entry_type_at, opt_decimal_at, time_at, to_millis};
use super::Store;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    Account, CorporateActionKind, CorporateActionParams, CorporateActionRecord, LedgerEntry,
    Reward,
};

const REWARD_COLUMNS: &str =
    "id, user_id, stock_symbol, quantity, rewarded_at, idempotency_key, notes";

const LEDGER_COLUMNS: &str =
    "id, tx_id, account, entry_type, amount_inr, stock_symbol, stock_quantity, ref_id, created_at";

fn row_to_reward(row: &Row<'_>) -> rusqlite::Result<Reward> {
    Ok(Reward {
        id: row.get(0)?,
        user_id: row.get(1)?,
        stock_symbol: row.get(2)?,
        quantity: decimal_at(row, 3)?,
        rewarded_at: time_at(row, 4)?,
        idempotency_key: row.get(5)?,
        notes: row.get(6)?,
    })
}

fn row_to_ledger_entry(row: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
    Ok(LedgerEntry {
        id: row.get(0)?,
        tx_id: row.get(1)?,
        account: account_at(row, 2)?,
        entry_type: entry_type_at(row, 3)?,
        amount_inr: opt_decimal_at(row, 4)?,
        stock_symbol: row.get(5)?,
        stock_quantity: opt_decimal_at(row, 6)?,
        ref_id: row.get(7)?,
        created_at: time_at(row, 8)?,
    })
}

impl Store {
    pub fn reward_by_id(&self, id: &str) -> LedgerResult<Option<Reward>> {
        let sql = format!("SELECT {} FROM rewards WHERE id = ?1", REWARD_COLUMNS);
        let reward = self.read(|conn| {
            conn.prepare_cached(&sql)?
                .query_row(params![id], row_to_reward)
                .optional()
        })?;
        Ok(reward)
    }

    pub fn reward_count(&self) -> LedgerResult<i64> {
        let count = self.read(|conn| {
            conn.query_row("SELECT COUNT(*) FROM rewards", [], |row| row.get(0))
        })?;
        Ok(count)
    }

    /// All rewards of a user, oldest first.
    pub fn rewards_for_user(&self, user_id: &str) -> LedgerResult<Vec<Reward>> {
        let sql = format!(
            "SELECT {} FROM rewards WHERE user_id = ?1 ORDER BY rewarded_at ASC, id ASC",
            REWARD_COLUMNS
        );
        self.query_rewards(&sql, params![user_id])
    }

    /// Rewards of a user with `start <= rewarded_at < end`.
    pub fn rewards_for_user_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> LedgerResult<Vec<Reward>> {
        let sql = format!(
            "SELECT {} FROM rewards
             WHERE user_id = ?1 AND rewarded_at >= ?2 AND rewarded_at < ?3
             ORDER BY rewarded_at ASC, id ASC",
            REWARD_COLUMNS
        );
        self.query_rewards(&sql, params![user_id, to_millis(start), to_millis(end)])
    }

    pub fn rewards_for_symbol(&self, symbol: &str) -> LedgerResult<Vec<Reward>> {
        let sql = format!(
            "SELECT {} FROM rewards WHERE stock_symbol = ?1 ORDER BY rewarded_at ASC, id ASC",
            REWARD_COLUMNS
        );
        self.query_rewards(&sql, params![symbol])
    }

    fn query_rewards(&self, sql: &str, args: impl rusqlite::Params) -> LedgerResult<Vec<Reward>> {
        let rewards = self.read(|conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            let rows = stmt.query_map(args, row_to_reward)?;
            let collected = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(collected)
        })?;
        Ok(rewards)
    }

    /// Postings of one logical transaction in insertion order.
    pub fn ledger_for_tx(&self, tx_id: &str) -> LedgerResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM ledger_entries WHERE tx_id = ?1 ORDER BY seq ASC",
            LEDGER_COLUMNS
        );
        self.query_ledger(&sql, params![tx_id])
    }

    /// Postings that reference `reward_id`.
    pub fn ledger_for_reward(&self, reward_id: &str) -> LedgerResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM ledger_entries WHERE ref_id = ?1 ORDER BY seq ASC",
            LEDGER_COLUMNS
        );
        self.query_ledger(&sql, params![reward_id])
    }

    pub fn ledger_for_account(&self, account: &Account) -> LedgerResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM ledger_entries WHERE account = ?1 ORDER BY seq ASC",
            LEDGER_COLUMNS
        );
        self.query_ledger(&sql, params![account.to_string()])
    }

    pub fn ledger_entry_count(&self) -> LedgerResult<i64> {
        let count = self.read(|conn| {
            conn.query_row("SELECT COUNT(*) FROM ledger_entries", [], |row| row.get(0))
        })?;
        Ok(count)
    }

    fn query_ledger(
        &self,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        let entries = self.read(|conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            let rows = stmt.query_map(args, row_to_ledger_entry)?;
            let collected = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(collected)
        })?;
        Ok(entries)
    }

    /// Applied corporate actions, newest first, optionally for one symbol.
    pub fn corporate_actions(&self, symbol: Option<&str>) -> LedgerResult<Vec<CorporateActionRecord>> {
        let raw: Vec<(String, String, String, String, DateTime<Utc>)> = self.read(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, stock_symbol, action_type, parameter, effective_date
                 FROM corporate_actions
                 WHERE ?1 IS NULL OR stock_symbol = ?1
                 ORDER BY effective_date DESC, seq DESC",
            )?;
            let rows = stmt.query_map(params![symbol], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    time_at(row, 4)?,
                ))
            })?;
            let collected = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(collected)
        })?;

        raw.into_iter()
            .map(|(id, stock_symbol, action_type, parameter, effective_date)| {
                let action_type = CorporateActionKind::from_str(&action_type).ok_or_else(|| {
                    LedgerError::Corrupt(format!("unknown action type {:?}", action_type))
                })?;
                let parameter: CorporateActionParams = serde_json::from_str(&parameter)
                    .map_err(|e| LedgerError::Corrupt(format!("action parameter: {}", e)))?;
                Ok(CorporateActionRecord {
                    id,
                    stock_symbol,
                    action_type,
                    parameter,
                    effective_date,
                })
            })
            .collect()
    }
}
