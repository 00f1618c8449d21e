//! # Audit Repository
//!
//! Append-only. The schema rejects UPDATE and DELETE on `audit_log`, so this
//! repository exposes nothing but `append` and reads.

use shopdesk_core::AuditEntry;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

/// Narrowing for [`AuditRepository::list`]. Empty filter lists everything.
#[derive(Debug, Clone)]
pub struct AuditFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub actor: Option<String>,
    pub limit: u32,
}

impl Default for AuditFilter {
    fn default() -> Self {
        AuditFilter {
            entity_type: None,
            entity_id: None,
            actor: None,
            limit: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AuditRepository { pool }
    }

    pub async fn append(&self, entry: &AuditEntry) -> DbResult<()> {
        debug!(
            actor = %entry.actor,
            action = %entry.action,
            entity = %entry.entity_type,
            entity_id = %entry.entity_id,
            "Appending audit entry"
        );

        sqlx::query(
            r#"
            INSERT INTO audit_log (
                id, actor, action, entity_type, entity_id, before_state, after_state, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.actor)
        .bind(entry.action)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.before_state)
        .bind(&entry.after_state)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Newest first.
    pub async fn list(&self, filter: &AuditFilter) -> DbResult<Vec<AuditEntry>> {
        let entries = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, actor, action, entity_type, entity_id, before_state, after_state, created_at
            FROM audit_log
            WHERE (?1 IS NULL OR entity_type = ?1)
              AND (?2 IS NULL OR entity_id = ?2)
              AND (?3 IS NULL OR actor = ?3)
            ORDER BY created_at DESC
            LIMIT ?4
            "#,
        )
        .bind(&filter.entity_type)
        .bind(&filter.entity_id)
        .bind(&filter.actor)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{new_id, test_support};
    use chrono::Utc;
    use shopdesk_core::AuditAction;

    fn entry(actor: &str, entity_id: &str) -> AuditEntry {
        AuditEntry {
            id: new_id(),
            actor: actor.to_string(),
            action: AuditAction::Create,
            entity_type: "Product".to_string(),
            entity_id: entity_id.to_string(),
            before_state: None,
            after_state: Some(r#"{"sku":"SKU-1"}"#.to_string()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_and_filter() {
        let db = test_support::db().await;
        let repo = db.audit();
        repo.append(&entry("ana", "p-1")).await.unwrap();
        repo.append(&entry("kim", "p-2")).await.unwrap();

        let all = repo.list(&AuditFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let by_actor = repo
            .list(&AuditFilter {
                actor: Some("kim".to_string()),
                ..AuditFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(by_actor.len(), 1);
        assert_eq!(by_actor[0].entity_id, "p-2");
    }

    #[tokio::test]
    async fn test_log_is_append_only() {
        let db = test_support::db().await;
        db.audit().append(&entry("ana", "p-1")).await.unwrap();

        let update = sqlx::query("UPDATE audit_log SET actor = 'mallory'")
            .execute(db.pool())
            .await;
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM audit_log").execute(db.pool()).await;
        assert!(delete.is_err());
    }
}
