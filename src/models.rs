//! Reward Ledger Models
//! Mission: Typed records for rewards, price ticks, ledger postings and corporate actions

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Note written onto every reward of a delisted symbol.
pub const DELISTED_NOTE: &str = "DELISTED";

/// Side of a ledger posting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryType {
    Debit,
    Credit,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Debit => "DEBIT",
            EntryType::Credit => "CREDIT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DEBIT" => Some(EntryType::Debit),
            "CREDIT" => Some(EntryType::Credit),
            _ => None,
        }
    }
}

/// Corporate action types understood by the processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CorporateActionKind {
    Split,
    Merger,
    Delist,
}

impl CorporateActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorporateActionKind::Split => "SPLIT",
            CorporateActionKind::Merger => "MERGER",
            CorporateActionKind::Delist => "DELIST",
        }
    }

    /// Case-insensitive; surrounding whitespace is ignored.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "SPLIT" => Some(CorporateActionKind::Split),
            "MERGER" => Some(CorporateActionKind::Merger),
            "DELIST" => Some(CorporateActionKind::Delist),
            _ => None,
        }
    }

    fn marker_suffix(&self) -> &'static str {
        match self {
            CorporateActionKind::Split => "split",
            CorporateActionKind::Merger => "merger",
            CorporateActionKind::Delist => "delist",
        }
    }

    /// Side of the audit marker appended when this action is applied.
    pub fn marker_entry_type(&self) -> EntryType {
        match self {
            CorporateActionKind::Split | CorporateActionKind::Merger => EntryType::Debit,
            CorporateActionKind::Delist => EntryType::Credit,
        }
    }
}

/// Ledger account. Stored as `stock:<symbol>`, `cash:exchange`,
/// `fees:brokerage_stt_gst` or `corporate_action:<kind>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Account {
    Stock(String),
    Cash,
    Fees,
    CorporateAction(CorporateActionKind),
}

impl Account {
    pub fn parse(s: &str) -> Option<Self> {
        let (prefix, rest) = s.split_once(':')?;
        match (prefix, rest) {
            ("stock", symbol) if !symbol.is_empty() => Some(Account::Stock(symbol.to_string())),
            ("cash", "exchange") => Some(Account::Cash),
            ("fees", "brokerage_stt_gst") => Some(Account::Fees),
            ("corporate_action", "split") => {
                Some(Account::CorporateAction(CorporateActionKind::Split))
            }
            ("corporate_action", "merger") => {
                Some(Account::CorporateAction(CorporateActionKind::Merger))
            }
            ("corporate_action", "delist") => {
                Some(Account::CorporateAction(CorporateActionKind::Delist))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Account::Stock(symbol) => write!(f, "stock:{}", symbol),
            Account::Cash => write!(f, "cash:exchange"),
            Account::Fees => write!(f, "fees:brokerage_stt_gst"),
            Account::CorporateAction(kind) => write!(f, "corporate_action:{}", kind.marker_suffix()),
        }
    }
}

impl Serialize for Account {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A stock grant to a user
#[derive(Debug, Clone, Serialize)]
pub struct Reward {
    pub id: String,
    pub user_id: String,
    pub stock_symbol: String,
    pub quantity: Decimal,
    pub rewarded_at: DateTime<Utc>,
    pub idempotency_key: Option<String>,
    pub notes: Option<String>,
}

impl Reward {
    pub fn is_delisted(&self) -> bool {
        self.notes.as_deref() == Some(DELISTED_NOTE)
    }
}

/// Validated input for a reward insert
#[derive(Debug, Clone)]
pub struct NewReward {
    pub user_id: String,
    pub stock_symbol: String,
    pub quantity: Decimal,
    pub idempotency_key: Option<String>,
    pub notes: Option<String>,
}

/// One observed price
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceTick {
    pub stock_symbol: String,
    pub price_inr: Decimal,
    pub fetched_at: DateTime<Utc>,
}

/// One side of a double-entry posting
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub id: String,
    pub tx_id: String,
    pub account: Account,
    pub entry_type: EntryType,
    pub amount_inr: Option<Decimal>,
    pub stock_symbol: Option<String>,
    pub stock_quantity: Option<Decimal>,
    pub ref_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ledger posting before it receives an id and timestamp
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub tx_id: String,
    pub account: Account,
    pub entry_type: EntryType,
    pub amount_inr: Option<Decimal>,
    pub stock_symbol: Option<String>,
    pub stock_quantity: Option<Decimal>,
    pub ref_id: Option<String>,
}

/// Structured payload stored with every applied corporate action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorporateActionParams {
    pub ratio: Option<Decimal>,
    pub new_symbol: Option<String>,
}

/// Durable audit record of an applied corporate action
#[derive(Debug, Clone, Serialize)]
pub struct CorporateActionRecord {
    pub id: String,
    pub stock_symbol: String,
    pub action_type: CorporateActionKind,
    pub parameter: CorporateActionParams,
    pub effective_date: DateTime<Utc>,
}

/// Debit and credit totals for one ledger transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TxBalance {
    pub debits: Decimal,
    pub credits: Decimal,
}

impl TxBalance {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Self {
        let mut debits = Decimal::ZERO;
        let mut credits = Decimal::ZERO;
        for entry in entries {
            let amount = entry.amount_inr.unwrap_or(Decimal::ZERO);
            match entry.entry_type {
                EntryType::Debit => debits += amount,
                EntryType::Credit => credits += amount,
            }
        }
        Self { debits, credits }
    }

    pub fn is_balanced(&self) -> bool {
        self.debits == self.credits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_account_round_trip_through_stored_form() {
        for account in [
            Account::Stock("RELIANCE".into()),
            Account::Cash,
            Account::Fees,
            Account::CorporateAction(CorporateActionKind::Split),
            Account::CorporateAction(CorporateActionKind::Merger),
            Account::CorporateAction(CorporateActionKind::Delist),
        ] {
            assert_eq!(Account::parse(&account.to_string()), Some(account));
        }
    }

    #[test]
    fn test_account_rejects_unknown_forms() {
        assert_eq!(Account::parse("stock:"), None);
        assert_eq!(Account::parse("cash:bank"), None);
        assert_eq!(Account::parse("corporate_action:dividend"), None);
        assert_eq!(Account::parse("nonsense"), None);
    }

    #[test]
    fn test_account_serializes_as_stored_form() {
        let json = serde_json::to_string(&Account::Stock("TCS".into())).unwrap();
        assert_eq!(json, r#""stock:TCS""#);
    }

    #[test]
    fn test_action_kind_parsing() {
        assert_eq!(
            CorporateActionKind::from_str("split"),
            Some(CorporateActionKind::Split)
        );
        assert_eq!(
            CorporateActionKind::from_str(" MERGER "),
            Some(CorporateActionKind::Merger)
        );
        assert_eq!(CorporateActionKind::from_str("DIVIDEND"), None);
        assert_eq!(
            CorporateActionKind::Delist.marker_entry_type(),
            EntryType::Credit
        );
    }

    #[test]
    fn test_tx_balance_treats_absent_amount_as_zero() {
        let entry = |entry_type, amount| LedgerEntry {
            id: "e".into(),
            tx_id: "t".into(),
            account: Account::Cash,
            entry_type,
            amount_inr: amount,
            stock_symbol: None,
            stock_quantity: None,
            ref_id: None,
            created_at: Utc::now(),
        };
        let entries = vec![
            entry(EntryType::Debit, None),
            entry(EntryType::Debit, Some(dec!(1.5))),
            entry(EntryType::Credit, Some(dec!(1.5))),
        ];
        let balance = TxBalance::from_entries(&entries);
        assert!(balance.is_balanced());
        assert_eq!(balance.debits, dec!(1.5));
    }
}
