//! Persistence errors.
//!
//! sqlx reports most failures as a free-text SQLite message; this module
//! turns the ones callers act on into variants:
//!
//! ```text
//! UNIQUE constraint failed: products.sku  ──► UniqueViolation { field: "sku" }
//! CHECK constraint failed: ...            ──► ConstraintViolation
//! guarded UPDATE touched 0 rows           ──► VersionConflict   (repositories)
//! PoolTimedOut                            ──► PoolExhausted
//! anything else                           ──► QueryFailed / Internal
//! ```
//!
//! The API layer maps UniqueViolation and VersionConflict to 409.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Username, SKU, supplier name, order or receipt number already taken.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A guarded write found the row changed since it was read (loyalty
    /// `version`, order status).
    #[error("{entity} {id} was modified concurrently")]
    VersionConflict { entity: String, id: String },

    /// CHECK constraint violation (e.g. negative stock).
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Stored data could not be decoded into a domain value.
    #[error("Corrupt {entity} row: {message}")]
    Decode { entity: String, message: String },

    /// No connection became free within the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn conflict(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::VersionConflict {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }

    /// Attaches the offending value to a UniqueViolation raised by SQLite,
    /// which only reports the column.
    pub fn with_value(self, value: impl Into<String>) -> Self {
        match self {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: value.into(),
            },
            other => other,
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let message = db_err.message();
                match message.strip_prefix("UNIQUE constraint failed: ") {
                    // the value is filled in by the caller via `with_value`
                    Some(target) => {
                        let column = target.split_once('.').map_or(target, |(_, c)| c);
                        DbError::duplicate(column, "unknown")
                    }
                    None if message.contains("CHECK constraint failed") => {
                        DbError::ConstraintViolation(message.to_string())
                    }
                    None => DbError::QueryFailed(message.to_string()),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Internal(format!("snapshot serialization failed: {err}"))
    }
}

pub type DbResult<T> = Result<T, DbError>;
