//! Ledger Error Taxonomy
//! Mission: One error type for every core operation, mapped once at the API edge

use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed input. Raised before any database work starts.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Idempotency key already used. Success-shaped for callers.
    #[error("request already processed")]
    DuplicateRequest,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported corporate action: {0}")]
    UnsupportedAction(String),

    /// A stored value could not be decoded back into its domain type.
    #[error("corrupt stored value: {0}")]
    Corrupt(String),

    #[error("persistence failure: {0}")]
    Persistence(#[source] rusqlite::Error),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::FromSqlConversionFailure(column, _, source) => {
                LedgerError::Corrupt(format!("column {}: {}", column, source))
            }
            other => LedgerError::Persistence(other),
        }
    }
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        LedgerError::Validation(msg.into())
    }

    /// True when the failure happened inside the store rather than in the request.
    pub fn is_internal(&self) -> bool {
        matches!(self, LedgerError::Persistence(_) | LedgerError::Corrupt(_))
    }
}

/// True when `err` is a UNIQUE constraint violation (idempotency key race).
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, _) => {
            code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_unique_violation_detected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (k TEXT UNIQUE)", []).unwrap();
        conn.execute("INSERT INTO t (k) VALUES ('a')", []).unwrap();

        let err = conn.execute("INSERT INTO t (k) VALUES ('a')", []).unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn test_other_constraint_is_not_unique_violation() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (k TEXT NOT NULL)", []).unwrap();

        let err = conn
            .execute("INSERT INTO t (k) VALUES (NULL)", [])
            .unwrap_err();
        assert!(!is_unique_violation(&err));
    }

    #[test]
    fn test_decode_failure_maps_to_corrupt() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn
            .query_row("SELECT 'abc'", [], |row| {
                crate::store::codec::decimal_at(row, 0)
            })
            .unwrap_err();

        assert!(matches!(LedgerError::from(err), LedgerError::Corrupt(_)));
    }

    #[test]
    fn test_internal_classification() {
        assert!(LedgerError::Corrupt("x".into()).is_internal());
        assert!(!LedgerError::validation("bad").is_internal());
        assert!(!LedgerError::DuplicateRequest.is_internal());
    }
}
