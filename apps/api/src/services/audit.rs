//! Audit trail writer.
//!
//! Snapshots are serialized to JSON text at write time. A failed audit write
//! fails the calling operation: the log is the record of who did what.
//!
//! ```rust,ignore
//! audit
//!     .record(&identity, AuditAction::Update, "Product", &id,
//!             Some(snapshot(&before)?), Some(snapshot(&after)?))
//!     .await?;
//! ```

use chrono::Utc;
use serde::Serialize;
use shopdesk_core::{AuditAction, AuditEntry, Identity};
use shopdesk_db::repository::new_id;
use shopdesk_db::{AuditFilter, Database};

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone)]
pub struct AuditService {
    db: Database,
}

impl AuditService {
    pub fn new(db: Database) -> Self {
        AuditService { db }
    }

    /// Appends one entry. `before`/`after` are JSON snapshots from [`snapshot`].
    pub async fn record(
        &self,
        actor: &Identity,
        action: AuditAction,
        entity_type: &str,
        entity_id: &str,
        before: Option<String>,
        after: Option<String>,
    ) -> ApiResult<()> {
        let entry = AuditEntry {
            id: new_id(),
            actor: actor.username.clone(),
            action,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            before_state: before,
            after_state: after,
            created_at: Utc::now(),
        };

        self.db.audit().append(&entry).await?;
        Ok(())
    }

    pub async fn list(&self, filter: &AuditFilter) -> ApiResult<Vec<AuditEntry>> {
        Ok(self.db.audit().list(filter).await?)
    }
}

/// JSON snapshot of an entity for the audit log.
pub fn snapshot<T: Serialize + ?Sized>(value: &T) -> ApiResult<String> {
    serde_json::to_string(value)
        .map_err(|e| ApiError::internal(format!("Failed to serialize audit snapshot: {e}")))
}
