//! Portfolio Reporter
//! Mission: Read-only views over committed rewards, prices and ledger postings
//!
//! Nothing here opens a unit of work. Values are priced at the latest tick;
//! a symbol without any tick is valued at zero.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::error::{LedgerError, LedgerResult};
use crate::fees::format_inr;
use crate::models::{CorporateActionRecord, LedgerEntry, PriceTick, Reward, TxBalance};
use crate::store::{end_of_reporting_day, reporting_day, PriceStore, Store};
use crate::validation::require_user_id;

/// How many reporting days back the historical valuation reaches.
pub const HISTORY_DAYS: i64 = 365;

/// Rewards of one symbol granted today
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodayStock {
    pub stock_symbol: String,
    pub quantity: Decimal,
    /// Earliest grant of the day
    pub rewarded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub stock_symbol: String,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionValue {
    #[serde(rename = "stock")]
    pub stock_symbol: String,
    pub quantity: Decimal,
    pub price_inr: String,
    pub value_inr: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Portfolio {
    pub total_value_inr: String,
    pub holdings: Vec<PositionValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub today_totals: Vec<Holding>,
    pub portfolio_value_inr: String,
    pub per_stock: Vec<PositionValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalValue {
    pub day: NaiveDate,
    pub inr_value: String,
}

/// A reward with its ledger postings
#[derive(Debug, Clone, Serialize)]
pub struct RewardLedger {
    pub reward: Reward,
    pub entries: Vec<LedgerEntry>,
    pub balance: TxBalance,
}

#[derive(Clone)]
pub struct PortfolioReporter {
    store: Store,
    prices: PriceStore,
}

impl PortfolioReporter {
    pub fn new(store: Store, prices: PriceStore) -> Self {
        Self { store, prices }
    }

    /// Rewards granted during the UTC day containing `now`, summed per symbol.
    pub fn today_stocks(&self, user_id: &str, now: DateTime<Utc>) -> LedgerResult<Vec<TodayStock>> {
        let user_id = require_user_id(user_id)?;
        let start = Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN));
        let end = start + Duration::days(1);

        let mut by_symbol: BTreeMap<String, TodayStock> = BTreeMap::new();
        for reward in self.store.rewards_for_user_between(&user_id, start, end)? {
            match by_symbol.get_mut(&reward.stock_symbol) {
                Some(row) => {
                    row.quantity = add(row.quantity, reward.quantity)?;
                    row.rewarded_at = row.rewarded_at.min(reward.rewarded_at);
                }
                None => {
                    by_symbol.insert(
                        reward.stock_symbol.clone(),
                        TodayStock {
                            stock_symbol: reward.stock_symbol,
                            quantity: reward.quantity,
                            rewarded_at: reward.rewarded_at,
                        },
                    );
                }
            }
        }
        Ok(by_symbol.into_values().collect())
    }

    /// Current position per symbol, ignoring delisted rewards.
    pub fn holdings(&self, user_id: &str) -> LedgerResult<Vec<Holding>> {
        let user_id = require_user_id(user_id)?;
        let rewards = self.store.rewards_for_user(&user_id)?;
        sum_by_symbol(rewards.iter().filter(|r| !r.is_delisted()))
    }

    pub fn portfolio(&self, user_id: &str) -> LedgerResult<Portfolio> {
        let mut total = Decimal::ZERO;
        let mut holdings = Vec::new();
        for holding in self.holdings(user_id)? {
            let price = self.price_or_zero(&holding.stock_symbol)?;
            let value = mul(price, holding.quantity)?;
            total = add(total, value)?;
            holdings.push(PositionValue {
                stock_symbol: holding.stock_symbol,
                quantity: holding.quantity,
                price_inr: format_inr(price),
                value_inr: format_inr(value),
            });
        }
        Ok(Portfolio {
            total_value_inr: format_inr(total),
            holdings,
        })
    }

    pub fn stats(&self, user_id: &str, now: DateTime<Utc>) -> LedgerResult<Stats> {
        let today_totals = self
            .today_stocks(user_id, now)?
            .into_iter()
            .map(|row| Holding {
                stock_symbol: row.stock_symbol,
                quantity: row.quantity,
            })
            .collect();
        let portfolio = self.portfolio(user_id)?;
        Ok(Stats {
            today_totals,
            portfolio_value_inr: portfolio.total_value_inr,
            per_stock: portfolio.holdings,
        })
    }

    /// Value of the user's rewards on each past reporting day, newest first.
    ///
    /// Covers `today - 365 ..= today - 1`. A day appears only once the user
    /// holds at least one reward granted on or before it. Each reward is
    /// priced at the last tick fetched before that day ended, so a day with
    /// no ticks of its own carries the previous close forward instead of
    /// valuing the reward at zero.
    pub fn historical_inr(&self, user_id: &str, today: NaiveDate) -> LedgerResult<Vec<HistoricalValue>> {
        let user_id = require_user_id(user_id)?;
        let rewards = self.store.rewards_for_user(&user_id)?;
        if rewards.is_empty() {
            return Ok(Vec::new());
        }

        let mut histories: HashMap<&str, Vec<PriceTick>> = HashMap::new();
        for reward in &rewards {
            if !histories.contains_key(reward.stock_symbol.as_str()) {
                let history = self.prices.history(&reward.stock_symbol)?;
                histories.insert(reward.stock_symbol.as_str(), history);
            }
        }

        let granted: Vec<(NaiveDate, &Reward)> = rewards
            .iter()
            .map(|r| (reporting_day(r.rewarded_at), r))
            .collect();

        let mut out = Vec::new();
        for back in 1..=HISTORY_DAYS {
            let day = today - Duration::days(back);
            let cutoff = end_of_reporting_day(day);

            let mut held_any = false;
            let mut value = Decimal::ZERO;
            for (granted_on, reward) in &granted {
                if *granted_on > day {
                    continue;
                }
                held_any = true;
                let price = histories
                    .get(reward.stock_symbol.as_str())
                    .and_then(|ticks| price_before(ticks, cutoff))
                    .unwrap_or(Decimal::ZERO);
                value = add(value, mul(reward.quantity, price)?)?;
            }

            if held_any {
                out.push(HistoricalValue {
                    day,
                    inr_value: format_inr(value),
                });
            }
        }
        Ok(out)
    }

    /// The reward and its three postings. `NotFound` for an unknown reward.
    pub fn ledger_for_reward(&self, reward_id: &str) -> LedgerResult<RewardLedger> {
        let reward = self
            .store
            .reward_by_id(reward_id)?
            .ok_or_else(|| LedgerError::NotFound(format!("reward {}", reward_id)))?;
        let entries = self.store.ledger_for_reward(reward_id)?;
        let balance = TxBalance::from_entries(&entries);
        Ok(RewardLedger {
            reward,
            entries,
            balance,
        })
    }

    pub fn ledger_for_tx(&self, tx_id: &str) -> LedgerResult<Vec<LedgerEntry>> {
        self.store.ledger_for_tx(tx_id)
    }

    pub fn tx_balance(&self, tx_id: &str) -> LedgerResult<TxBalance> {
        let entries = self.store.ledger_for_tx(tx_id)?;
        if entries.is_empty() {
            return Err(LedgerError::NotFound(format!("ledger transaction {}", tx_id)));
        }
        Ok(TxBalance::from_entries(&entries))
    }

    pub fn corporate_actions(&self, symbol: Option<&str>) -> LedgerResult<Vec<CorporateActionRecord>> {
        let symbol = symbol.map(str::trim).filter(|s| !s.is_empty());
        self.store.corporate_actions(symbol)
    }

    fn price_or_zero(&self, symbol: &str) -> LedgerResult<Decimal> {
        match self.prices.latest_price(symbol) {
            Ok(price) => Ok(price),
            Err(LedgerError::NotFound(_)) => Ok(Decimal::ZERO),
            Err(e) => Err(e),
        }
    }
}

/// Last tick strictly before `cutoff`. `ticks` must be ordered oldest first.
fn price_before(ticks: &[PriceTick], cutoff: DateTime<Utc>) -> Option<Decimal> {
    let idx = ticks.partition_point(|t| t.fetched_at < cutoff);
    idx.checked_sub(1).map(|i| ticks[i].price_inr)
}

fn sum_by_symbol<'a>(rewards: impl Iterator<Item = &'a Reward>) -> LedgerResult<Vec<Holding>> {
    let mut totals: BTreeMap<&str, Decimal> = BTreeMap::new();
    for reward in rewards {
        let total = totals.entry(reward.stock_symbol.as_str()).or_default();
        *total = add(*total, reward.quantity)?;
    }
    Ok(totals
        .into_iter()
        .map(|(symbol, quantity)| Holding {
            stock_symbol: symbol.to_string(),
            quantity,
        })
        .collect())
}

fn add(a: Decimal, b: Decimal) -> LedgerResult<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| LedgerError::Corrupt(format!("overflow adding {} and {}", a, b)))
}

fn mul(a: Decimal, b: Decimal) -> LedgerResult<Decimal> {
    a.checked_mul(b)
        .ok_or_else(|| LedgerError::Corrupt(format!("overflow multiplying {} by {}", a, b)))
}
