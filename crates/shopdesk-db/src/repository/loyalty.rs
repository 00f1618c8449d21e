//! # Loyalty Repository
//!
//! The only collection with an optimistic concurrency guard.
//!
//! ```text
//!   reader A: version 4 ─┐                   ┌─ UPDATE ... WHERE version = 4  → 1 row ✓
//!                        ├── both read ──────┤
//!   reader B: version 4 ─┘                   └─ UPDATE ... WHERE version = 4  → 0 rows ✗
//!                                                 (VersionConflict, caller reloads)
//! ```

use chrono::Utc;
use shopdesk_core::{Tier, UserLoyalty};
use sqlx::SqlitePool;
use tracing::debug;

use super::new_id;
use crate::error::{DbError, DbResult};

const LOYALTY_COLUMNS: &str =
    "id, customer_username, points, tier, version, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct LoyaltyRepository {
    pool: SqlitePool,
}

impl LoyaltyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LoyaltyRepository { pool }
    }

    pub async fn find_by_customer(&self, username: &str) -> DbResult<Option<UserLoyalty>> {
        let sql = format!("SELECT {LOYALTY_COLUMNS} FROM user_loyalty WHERE customer_username = ?1");
        let record = sqlx::query_as::<_, UserLoyalty>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    /// Loads the customer's record, creating a zero balance one if absent.
    ///
    /// Two concurrent first accruals both end up reading the same row; the
    /// unique username makes the second insert a no-op.
    pub async fn get_or_create(&self, username: &str) -> DbResult<UserLoyalty> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO user_loyalty (id, customer_username, points, tier, version, created_at, updated_at)
            VALUES (?1, ?2, 0, ?3, 0, ?4, ?4)
            ON CONFLICT(customer_username) DO NOTHING
            "#,
        )
        .bind(new_id())
        .bind(username)
        .bind(Tier::Bronze)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_customer(username)
            .await?
            .ok_or_else(|| DbError::not_found("UserLoyalty", username))
    }

    /// Writes points and tier if the stored version still matches
    /// `record.version`, returning the record with its bumped version.
    ///
    /// ## Returns
    /// * `Err(DbError::VersionConflict)` - someone wrote in between
    pub async fn update_guarded(&self, record: &UserLoyalty) -> DbResult<UserLoyalty> {
        debug!(
            customer = %record.customer_username,
            points = record.points,
            version = record.version,
            "Updating loyalty record"
        );

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE user_loyalty SET
                points = ?3,
                tier = ?4,
                version = version + 1,
                updated_at = ?5
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(&record.id)
        .bind(record.version)
        .bind(record.points)
        .bind(record.tier)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict("UserLoyalty", &record.id));
        }

        Ok(UserLoyalty {
            version: record.version + 1,
            updated_at: now,
            ..record.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let db = test_support::db().await;
        let repo = db.loyalty();

        let first = repo.get_or_create("ana").await.unwrap();
        let second = repo.get_or_create("ana").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.points, 0);
        assert_eq!(first.tier, Tier::Bronze);
        assert_eq!(first.version, 0);
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected() {
        let db = test_support::db().await;
        let repo = db.loyalty();

        let mut a = repo.get_or_create("ana").await.unwrap();
        let mut b = a.clone();

        a.accrue(120);
        let saved = repo.update_guarded(&a).await.unwrap();
        assert_eq!(saved.version, 1);
        assert_eq!(saved.tier, Tier::Silver);

        b.accrue(7);
        let err = repo.update_guarded(&b).await.unwrap_err();
        assert!(matches!(err, DbError::VersionConflict { .. }));

        let stored = repo.find_by_customer("ana").await.unwrap().unwrap();
        assert_eq!(stored.points, 120);
    }
}
