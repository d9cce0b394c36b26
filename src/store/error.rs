//! Error types for store operations.

use std::fmt;

use thiserror::Error;

/// Coarse classification of a failed SQL call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// Another writer held the database past the busy timeout.
    Busy,
    /// A UNIQUE, CHECK, NOT NULL or foreign-key rule rejected the write.
    Constraint,
    /// The pool could not hand out a connection, or the file could not be read.
    Unavailable,
    Other,
}

impl DbErrorKind {
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable
            }
            sqlx::Error::Database(db_err) => {
                // Extended result codes keep the primary code in the low byte:
                // 5 BUSY, 6 LOCKED, 19 CONSTRAINT.
                let primary = db_err
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);
                let message = db_err.message();
                match primary {
                    Some(5 | 6) => Self::Busy,
                    Some(19) => Self::Constraint,
                    _ if db_err.is_unique_violation()
                        || db_err.is_check_violation()
                        || db_err.is_foreign_key_violation()
                        || message.contains("constraint failed") =>
                    {
                        Self::Constraint
                    }
                    _ if message.contains("database is locked") => Self::Busy,
                    _ => Self::Other,
                }
            }
            _ => Self::Other,
        }
    }
}

impl fmt::Display for DbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Busy => "busy",
            Self::Constraint => "constraint",
            Self::Unavailable => "unavailable",
            Self::Other => "other",
        })
    }
}

/// Errors from the paper store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("database error ({kind}): {message}")]
    Database { kind: DbErrorKind, message: String },

    /// The article cannot be stored as given.
    #[error("cannot store PMID '{pmid}': {reason}")]
    InvalidRecord { pmid: String, reason: String },

    /// A stored or supplied status string is not recognized.
    #[error("invalid status '{status}'\n  Suggestion: Use one of: {expected}")]
    InvalidStatus {
        status: String,
        expected: &'static str,
    },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: DbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl StoreError {
    /// Database classification, `None` for validation errors.
    #[must_use]
    pub fn database_kind(&self) -> Option<DbErrorKind> {
        match self {
            Self::Database { kind, .. } => Some(*kind),
            Self::InvalidRecord { .. } | Self::InvalidStatus { .. } => None,
        }
    }

    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        self.database_kind() == Some(DbErrorKind::Constraint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_message_carries_kind() {
        let err = StoreError::Database {
            kind: DbErrorKind::Busy,
            message: "database is locked".to_string(),
        };
        assert_eq!(err.to_string(), "database error (busy): database is locked");
        assert!(!err.is_constraint_violation());
    }

    #[test]
    fn test_pool_failures_are_unavailable() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.database_kind(), Some(DbErrorKind::Unavailable));
        assert_eq!(
            StoreError::from(sqlx::Error::RowNotFound).database_kind(),
            Some(DbErrorKind::Other)
        );
    }

    #[test]
    fn test_validation_errors_have_no_database_kind() {
        let err = StoreError::InvalidRecord {
            pmid: "12".to_string(),
            reason: "title is empty".to_string(),
        };
        assert_eq!(err.database_kind(), None);
        assert_eq!(err.to_string(), "cannot store PMID '12': title is empty");
    }
}
