//! Reward Ledger Writer
//! Mission: Grant shares exactly once and back every grant with a balanced ledger transaction
//!
//! One reward produces one unit of work holding:
//! - the reward row
//! - DEBIT  stock:<symbol>            position value
//! - CREDIT cash:exchange             value plus fees
//! - DEBIT  fees:brokerage_stt_gst    brokerage + STT + GST

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{is_unique_violation, LedgerError, LedgerResult};
use crate::fees::{format_inr, FeeBreakdown, FeeSchedule};
use crate::models::{Account, EntryType, NewLedgerEntry, NewReward};
use crate::store::{PriceStore, Store};
use crate::validation::{non_blank, require_positive, require_symbol, require_user_id};

/// Raw reward request as received from a caller
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RewardRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub stock_symbol: String,
    /// JSON number or numeric string
    #[serde(default)]
    pub quantity: Option<Value>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl RewardRequest {
    pub fn validate(self) -> LedgerResult<NewReward> {
        Ok(NewReward {
            user_id: require_user_id(&self.user_id)?,
            stock_symbol: require_symbol(&self.stock_symbol, "stock_symbol")?,
            quantity: require_positive(self.quantity.as_ref(), "quantity")?,
            idempotency_key: non_blank(self.idempotency_key),
            notes: non_blank(self.notes),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RewardReceipt {
    pub reward_id: String,
    pub tx_id: String,
    #[serde(rename = "stock")]
    pub stock_symbol: String,
    pub quantity: Decimal,
    /// Total cash outflow rendered with four fractional digits
    #[serde(rename = "estimated_cost_inr")]
    pub estimated_cost: String,
}

#[derive(Debug, Clone)]
pub enum RewardOutcome {
    Recorded(RewardReceipt),
    /// The idempotency key was already used; nothing was written.
    Duplicate,
}

#[derive(Clone)]
pub struct RewardLedgerWriter {
    store: Store,
    prices: PriceStore,
    fees: FeeSchedule,
}

impl RewardLedgerWriter {
    pub fn new(store: Store, prices: PriceStore, fees: FeeSchedule) -> Self {
        Self { store, prices, fees }
    }

    pub fn record_reward(&self, request: RewardRequest) -> LedgerResult<RewardOutcome> {
        self.record_reward_at(request, Utc::now())
    }

    pub fn record_reward_at(
        &self,
        request: RewardRequest,
        rewarded_at: DateTime<Utc>,
    ) -> LedgerResult<RewardOutcome> {
        let reward = request.validate()?;

        let price = match self.prices.latest_price(&reward.stock_symbol) {
            Ok(price) => price,
            Err(LedgerError::NotFound(_)) => {
                warn!(
                    symbol = %reward.stock_symbol,
                    "⚠️ No price available, recording reward at zero cost"
                );
                Decimal::ZERO
            }
            Err(e) => return Err(e),
        };

        let breakdown = self.fees.apply(price, reward.quantity).ok_or_else(|| {
            LedgerError::validation(format!(
                "cost of {} {} overflows",
                reward.quantity, reward.stock_symbol
            ))
        })?;

        let committed = self.store.transact(|uow| {
            let reward_id = uow.insert_reward(&reward, rewarded_at).map_err(|e| {
                if reward.idempotency_key.is_some() && is_unique_violation(&e) {
                    LedgerError::DuplicateRequest
                } else {
                    LedgerError::from(e)
                }
            })?;

            let tx_id = Uuid::new_v4().to_string();
            for entry in reward_postings(&tx_id, &reward_id, &reward, &breakdown) {
                uow.insert_ledger_entry(&entry)?;
            }
            Ok::<_, LedgerError>((reward_id, tx_id))
        });

        match committed {
            Ok((reward_id, tx_id)) => {
                info!(
                    reward_id = %reward_id,
                    tx_id = %tx_id,
                    user_id = %reward.user_id,
                    symbol = %reward.stock_symbol,
                    quantity = %reward.quantity,
                    price = %price,
                    total_cash_outflow = %breakdown.total_cash_outflow,
                    "🎁 Reward recorded"
                );
                Ok(RewardOutcome::Recorded(RewardReceipt {
                    reward_id,
                    tx_id,
                    stock_symbol: reward.stock_symbol,
                    quantity: reward.quantity,
                    estimated_cost: format_inr(breakdown.total_cash_outflow),
                }))
            }
            Err(LedgerError::DuplicateRequest) => {
                info!(
                    user_id = %reward.user_id,
                    idempotency_key = reward.idempotency_key.as_deref().unwrap_or_default(),
                    "Duplicate reward request ignored"
                );
                Ok(RewardOutcome::Duplicate)
            }
            Err(e) => {
                error!(
                    user_id = %reward.user_id,
                    symbol = %reward.stock_symbol,
                    "Reward not recorded: {}",
                    e
                );
                Err(e)
            }
        }
    }
}

/// The three postings backing one reward. Debits equal credits by construction.
fn reward_postings(
    tx_id: &str,
    reward_id: &str,
    reward: &NewReward,
    breakdown: &FeeBreakdown,
) -> [NewLedgerEntry; 3] {
    let posting = |account, entry_type, amount_inr| NewLedgerEntry {
        tx_id: tx_id.to_string(),
        account,
        entry_type,
        amount_inr,
        stock_symbol: None,
        stock_quantity: None,
        ref_id: Some(reward_id.to_string()),
    };

    let stock_amount = (!breakdown.cost.is_zero()).then_some(breakdown.cost);

    [
        NewLedgerEntry {
            stock_symbol: Some(reward.stock_symbol.clone()),
            stock_quantity: Some(reward.quantity),
            ..posting(
                Account::Stock(reward.stock_symbol.clone()),
                EntryType::Debit,
                stock_amount,
            )
        },
        NewLedgerEntry {
            stock_symbol: Some(reward.stock_symbol.clone()),
            ..posting(
                Account::Cash,
                EntryType::Credit,
                Some(breakdown.total_cash_outflow),
            )
        },
        posting(Account::Fees, EntryType::Debit, Some(breakdown.total_fees)),
    ]
}
