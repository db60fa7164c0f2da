//! Store error type.

/// Error returned by [`Store`](crate::Store) operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A row with the same key already exists.
    #[error("Duplicate {table} key: {key}")]
    Duplicate {
        /// Table the insert targeted (`pages` or `assets`).
        table: &'static str,
        /// Offending key.
        key: String,
    },
    /// I/O error preparing the database file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Any other database failure.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl StoreError {
    /// Map an insert failure, turning constraint violations into [`StoreError::Duplicate`].
    pub(crate) fn from_insert(err: rusqlite::Error, table: &'static str, key: String) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Duplicate { table, key }
            }
            _ => Self::Database(err),
        }
    }

    /// Whether this error is a duplicate-key rejection.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}
