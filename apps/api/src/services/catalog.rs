//! Categories and suppliers.
//!
//! Both follow the same lifecycle: create, update, archive (the DELETE
//! endpoint) and restore. Archived rows drop out of lists and search but stay
//! readable by id.

use chrono::Utc;
use serde::Deserialize;
use shopdesk_core::validation::{validate_email, validate_name, validate_search_query};
use shopdesk_core::{AuditAction, CatalogStatus, Category, Identity, Supplier, Visibility};
use shopdesk_db::repository::new_id;
use shopdesk_db::Database;
use tracing::info;

use super::audit::{snapshot, AuditService};
use super::non_empty;
use crate::error::{ApiError, ApiResult};

const NAME_MAX: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupplierInput {
    pub name: String,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl SupplierInput {
    fn validate(&self) -> ApiResult<()> {
        validate_name("name", &self.name, NAME_MAX)?;
        if let Some(email) = non_empty(self.email.clone()) {
            validate_email(&email)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CatalogService {
    db: Database,
    audit: AuditService,
}

impl CatalogService {
    pub fn new(db: Database, audit: AuditService) -> Self {
        CatalogService { db, audit }
    }

    // =========================================================================
    // Categories
    // =========================================================================

    pub async fn list_categories(&self, visibility: Visibility) -> ApiResult<Vec<Category>> {
        Ok(self.db.categories().list(visibility).await?)
    }

    pub async fn search_categories(&self, query: &str, visibility: Visibility) -> ApiResult<Vec<Category>> {
        let query = validate_search_query(query)?;
        Ok(self.db.categories().search(&query, visibility).await?)
    }

    pub async fn get_category(&self, id: &str) -> ApiResult<Category> {
        self.db
            .categories()
            .get_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Category", id))
    }

    pub async fn create_category(&self, actor: &Identity, input: CategoryInput) -> ApiResult<Category> {
        validate_name("name", &input.name, NAME_MAX)?;

        let now = Utc::now();
        let category = Category {
            id: new_id(),
            name: input.name.trim().to_string(),
            description: non_empty(input.description),
            status: CatalogStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.db.categories().insert(&category).await?;

        self.audit
            .record(actor, AuditAction::Create, "Category", &category.id, None, Some(snapshot(&category)?))
            .await?;
        info!(id = %category.id, name = %category.name, "Category created");
        Ok(category)
    }

    pub async fn update_category(
        &self,
        actor: &Identity,
        id: &str,
        input: CategoryInput,
    ) -> ApiResult<Category> {
        validate_name("name", &input.name, NAME_MAX)?;

        let before = self.get_category(id).await?;
        let after = Category {
            name: input.name.trim().to_string(),
            description: non_empty(input.description),
            updated_at: Utc::now(),
            ..before.clone()
        };
        self.db.categories().update(&after).await?;

        self.audit
            .record(actor, AuditAction::Update, "Category", id, Some(snapshot(&before)?), Some(snapshot(&after)?))
            .await?;
        Ok(after)
    }

    pub async fn archive_category(&self, actor: &Identity, id: &str) -> ApiResult<Category> {
        self.set_category_status(actor, id, CatalogStatus::Archived).await
    }

    pub async fn restore_category(&self, actor: &Identity, id: &str) -> ApiResult<Category> {
        self.set_category_status(actor, id, CatalogStatus::Active).await
    }

    async fn set_category_status(
        &self,
        actor: &Identity,
        id: &str,
        status: CatalogStatus,
    ) -> ApiResult<Category> {
        let before = self.get_category(id).await?;
        self.db.categories().set_status(id, status).await?;
        let after = Category {
            status,
            updated_at: Utc::now(),
            ..before.clone()
        };

        self.audit
            .record(
                actor,
                lifecycle_action(status),
                "Category",
                id,
                Some(snapshot(&before)?),
                Some(snapshot(&after)?),
            )
            .await?;
        info!(id = %id, ?status, "Category status changed");
        Ok(after)
    }

    // =========================================================================
    // Suppliers
    // =========================================================================

    pub async fn list_suppliers(&self, visibility: Visibility) -> ApiResult<Vec<Supplier>> {
        Ok(self.db.suppliers().list(visibility).await?)
    }

    pub async fn search_suppliers(&self, query: &str, visibility: Visibility) -> ApiResult<Vec<Supplier>> {
        let query = validate_search_query(query)?;
        Ok(self.db.suppliers().search(&query, visibility).await?)
    }

    pub async fn get_supplier(&self, id: &str) -> ApiResult<Supplier> {
        self.db
            .suppliers()
            .get_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Supplier", id))
    }

    pub async fn create_supplier(&self, actor: &Identity, input: SupplierInput) -> ApiResult<Supplier> {
        input.validate()?;

        let now = Utc::now();
        let supplier = Supplier {
            id: new_id(),
            name: input.name.trim().to_string(),
            contact_name: non_empty(input.contact_name),
            email: non_empty(input.email),
            phone: non_empty(input.phone),
            address: non_empty(input.address),
            status: CatalogStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.db.suppliers().insert(&supplier).await?;

        self.audit
            .record(actor, AuditAction::Create, "Supplier", &supplier.id, None, Some(snapshot(&supplier)?))
            .await?;
        info!(id = %supplier.id, name = %supplier.name, "Supplier created");
        Ok(supplier)
    }

    pub async fn update_supplier(
        &self,
        actor: &Identity,
        id: &str,
        input: SupplierInput,
    ) -> ApiResult<Supplier> {
        input.validate()?;

        let before = self.get_supplier(id).await?;
        let after = Supplier {
            name: input.name.trim().to_string(),
            contact_name: non_empty(input.contact_name),
            email: non_empty(input.email),
            phone: non_empty(input.phone),
            address: non_empty(input.address),
            updated_at: Utc::now(),
            ..before.clone()
        };
        self.db.suppliers().update(&after).await?;

        self.audit
            .record(actor, AuditAction::Update, "Supplier", id, Some(snapshot(&before)?), Some(snapshot(&after)?))
            .await?;
        Ok(after)
    }

    pub async fn archive_supplier(&self, actor: &Identity, id: &str) -> ApiResult<Supplier> {
        self.set_supplier_status(actor, id, CatalogStatus::Archived).await
    }

    pub async fn restore_supplier(&self, actor: &Identity, id: &str) -> ApiResult<Supplier> {
        self.set_supplier_status(actor, id, CatalogStatus::Active).await
    }

    async fn set_supplier_status(
        &self,
        actor: &Identity,
        id: &str,
        status: CatalogStatus,
    ) -> ApiResult<Supplier> {
        let before = self.get_supplier(id).await?;
        self.db.suppliers().set_status(id, status).await?;
        let after = Supplier {
            status,
            updated_at: Utc::now(),
            ..before.clone()
        };

        self.audit
            .record(
                actor,
                lifecycle_action(status),
                "Supplier",
                id,
                Some(snapshot(&before)?),
                Some(snapshot(&after)?),
            )
            .await?;
        info!(id = %id, ?status, "Supplier status changed");
        Ok(after)
    }
}

/// Archiving is logged as DELETE, restoring as RESTORE.
pub(crate) fn lifecycle_action(status: CatalogStatus) -> AuditAction {
    match status {
        CatalogStatus::Archived => AuditAction::Delete,
        CatalogStatus::Active => AuditAction::Restore,
    }
}
