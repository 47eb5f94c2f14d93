//! Corporate Action Processor
//! Mission: Rewrite reward and price history for SPLIT / MERGER / DELIST in one atomic step
//!
//! Historical ledger amounts are never edited. Each applied action appends one
//! marker posting on `corporate_action:<kind>` and one audit record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    Account, CorporateActionKind, CorporateActionParams, CorporateActionRecord, NewLedgerEntry,
};
use crate::store::{Store, UnitOfWork};
use crate::validation::{non_blank, parse_timestamp, require_positive, require_symbol};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorporateActionRequest {
    #[serde(default, alias = "action_type")]
    pub action: String,
    #[serde(default, alias = "stock_symbol")]
    pub symbol: String,
    #[serde(default)]
    pub ratio: Option<Value>,
    #[serde(default)]
    pub new_symbol: Option<String>,
    /// RFC 3339 or `YYYY-MM-DD`; defaults to now
    #[serde(default)]
    pub effective_date: Option<String>,
}

/// Result of a committed corporate action
#[derive(Debug, Clone, Serialize)]
pub struct AppliedCorporateAction {
    pub id: String,
    pub action: CorporateActionKind,
    pub symbol: String,
    pub ratio: Option<Decimal>,
    pub new_symbol: Option<String>,
    pub effective_date: DateTime<Utc>,
    pub rewards_affected: usize,
    pub price_ticks_affected: usize,
}

/// A fully validated mutation. Nothing is built from a request that fails validation.
#[derive(Debug, Clone, PartialEq)]
enum Mutation {
    Split { ratio: Decimal },
    Merger { ratio: Decimal, new_symbol: String },
    Delist,
}

impl Mutation {
    fn params(&self) -> CorporateActionParams {
        match self {
            Mutation::Split { ratio } => CorporateActionParams {
                ratio: Some(*ratio),
                new_symbol: None,
            },
            Mutation::Merger { ratio, new_symbol } => CorporateActionParams {
                ratio: Some(*ratio),
                new_symbol: Some(new_symbol.clone()),
            },
            Mutation::Delist => CorporateActionParams::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RowCounts {
    rewards: usize,
    price_ticks: usize,
}

#[derive(Clone)]
pub struct CorporateActionProcessor {
    store: Store,
}

impl CorporateActionProcessor {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn apply(&self, request: CorporateActionRequest) -> LedgerResult<AppliedCorporateAction> {
        let kind = CorporateActionKind::from_str(&request.action)
            .ok_or_else(|| LedgerError::UnsupportedAction(request.action.trim().to_string()))?;
        let symbol = require_symbol(&request.symbol, "symbol")?;
        let mutation = match kind {
            CorporateActionKind::Split => Mutation::Split {
                ratio: require_positive(request.ratio.as_ref(), "ratio")?,
            },
            CorporateActionKind::Merger => {
                let ratio = require_positive(request.ratio.as_ref(), "ratio")?;
                let new_symbol = non_blank(request.new_symbol).ok_or_else(|| {
                    LedgerError::validation("new_symbol is required for MERGER")
                })?;
                if new_symbol == symbol {
                    return Err(LedgerError::validation(
                        "new_symbol must differ from symbol",
                    ));
                }
                Mutation::Merger { ratio, new_symbol }
            }
            CorporateActionKind::Delist => Mutation::Delist,
        };
        let effective_date = match non_blank(request.effective_date) {
            Some(raw) => parse_timestamp(&raw, "effective_date")?,
            None => Utc::now(),
        };

        let record = CorporateActionRecord {
            id: Uuid::new_v4().to_string(),
            stock_symbol: symbol.clone(),
            action_type: kind,
            parameter: mutation.params(),
            effective_date,
        };

        let counts = self.store.transact(|uow| {
            let counts = apply_mutation(uow, &symbol, &mutation)?;
            uow.insert_ledger_entry(&marker_entry(kind, &symbol))?;
            uow.insert_corporate_action(&record)?;
            Ok::<_, LedgerError>(counts)
        });

        let counts = counts.map_err(|e| {
            error!(action = kind.as_str(), symbol = %symbol, "Corporate action rolled back: {}", e);
            e
        })?;

        info!(
            action = kind.as_str(),
            symbol = %symbol,
            rewards = counts.rewards,
            price_ticks = counts.price_ticks,
            "🏛️ Corporate action applied"
        );

        Ok(AppliedCorporateAction {
            id: record.id,
            action: kind,
            symbol,
            ratio: record.parameter.ratio,
            new_symbol: record.parameter.new_symbol,
            effective_date,
            rewards_affected: counts.rewards,
            price_ticks_affected: counts.price_ticks,
        })
    }
}

fn apply_mutation(
    uow: &UnitOfWork<'_>,
    symbol: &str,
    mutation: &Mutation,
) -> LedgerResult<RowCounts> {
    match mutation {
        Mutation::Split { ratio } => {
            let rewards = uow.scale_reward_quantities(symbol, *ratio)?;
            info!(symbol, ratio = %ratio, rows = rewards, "Split: reward quantities scaled");
            let price_ticks = uow.rescale_prices(symbol, *ratio)?;
            info!(symbol, ratio = %ratio, rows = price_ticks, "Split: price ticks rescaled");
            Ok(RowCounts {
                rewards,
                price_ticks,
            })
        }
        Mutation::Merger { ratio, new_symbol } => {
            let rewards = uow.merge_rewards(symbol, new_symbol, *ratio)?;
            info!(
                symbol,
                new_symbol = %new_symbol,
                ratio = %ratio,
                rows = rewards,
                "Merger: rewards moved"
            );
            Ok(RowCounts {
                rewards,
                price_ticks: 0,
            })
        }
        Mutation::Delist => {
            let rewards = uow.mark_rewards_delisted(symbol)?;
            info!(symbol, rows = rewards, "Delist: rewards marked");
            let price_ticks = uow.purge_prices(symbol)?;
            info!(symbol, rows = price_ticks, "Delist: price ticks removed");
            Ok(RowCounts {
                rewards,
                price_ticks,
            })
        }
    }
}

fn marker_entry(kind: CorporateActionKind, symbol: &str) -> NewLedgerEntry {
    NewLedgerEntry {
        tx_id: Uuid::new_v4().to_string(),
        account: Account::CorporateAction(kind),
        entry_type: kind.marker_entry_type(),
        amount_inr: None,
        stock_symbol: Some(symbol.to_string()),
        stock_quantity: None,
        ref_id: None,
    }
}
