/// Reward ledger schema. Decimal columns are TEXT so SQLite never coerces
/// them to REAL; timestamps are epoch milliseconds.
pub const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS rewards (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    stock_symbol TEXT NOT NULL,
    quantity TEXT NOT NULL,
    rewarded_at INTEGER NOT NULL,
    idempotency_key TEXT UNIQUE,
    notes TEXT
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_rewards_user_time
    ON rewards(user_id, rewarded_at);

CREATE INDEX IF NOT EXISTS idx_rewards_symbol
    ON rewards(stock_symbol);

CREATE TABLE IF NOT EXISTS price_ticks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    stock_symbol TEXT NOT NULL,
    price_inr TEXT NOT NULL,
    fetched_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_price_ticks_symbol_time
    ON price_ticks(stock_symbol, fetched_at DESC, id DESC);

CREATE TABLE IF NOT EXISTS ledger_entries (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    tx_id TEXT NOT NULL,
    account TEXT NOT NULL,
    entry_type TEXT NOT NULL CHECK (entry_type IN ('DEBIT', 'CREDIT')),
    amount_inr TEXT,
    stock_symbol TEXT,
    stock_quantity TEXT,
    ref_id TEXT REFERENCES rewards(id),
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ledger_entries_tx
    ON ledger_entries(tx_id);

CREATE INDEX IF NOT EXISTS idx_ledger_entries_ref
    ON ledger_entries(ref_id);

CREATE TABLE IF NOT EXISTS corporate_actions (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    stock_symbol TEXT NOT NULL,
    action_type TEXT NOT NULL,
    parameter TEXT NOT NULL,
    effective_date INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_corporate_actions_symbol
    ON corporate_actions(stock_symbol, effective_date DESC);
"#;
