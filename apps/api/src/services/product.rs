//! # Product Service
//!
//! Catalog products: CRUD with soft delete, search, manual stock adjustment
//! and product images.
//!
//! ```text
//!  create / update ── validate ──► prices > 0, selling > purchase
//!                                  category / supplier must exist
//!  adjust_stock ───────────────► stock movement (manual_adjustment) + audit
//!  upload_image ── type + size ──► ObjectStore::put ──► image_key on product
//! ```

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shopdesk_core::validation::{
    validate_name, validate_prices, validate_search_query, validate_sku, validate_stock_level,
};
use shopdesk_core::{
    AuditAction, CatalogStatus, Identity, Product, StockMovement, StockReason, ValidationError,
    Visibility,
};
use shopdesk_db::repository::new_id;
use shopdesk_db::{Database, ProductFilter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::audit::{snapshot, AuditService};
use super::catalog::lifecycle_action;
use super::non_empty;
use super::storage::{ObjectStore, StorageError};
use crate::error::{ApiError, ApiResult};

/// Largest accepted image upload.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const NAME_MAX: usize = 200;
const SEARCH_LIMIT: u32 = 50;
const MOVEMENT_LIMIT: u32 = 100;

/// File extension for an accepted image media type.
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

fn storage_error(e: StorageError) -> ApiError {
    match e {
        StorageError::InvalidKey(key) => ApiError::validation(format!("Invalid image key: {key}")),
        other => ApiError::internal(other.to_string()),
    }
}

/// Product fields accepted on create and update.
///
/// `stock_quantity` is the opening stock and is only read on create; later
/// changes go through [`ProductService::adjust_stock`].
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub supplier_id: Option<String>,
    pub purchase_price_cents: i64,
    pub selling_price_cents: i64,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default)]
    pub min_stock_level: i64,
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StockAdjustment {
    /// Positive to restock, negative to write off
    pub delta: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductImage {
    pub image_key: String,
    pub url: String,
}

#[derive(Clone)]
pub struct ProductService {
    db: Database,
    audit: AuditService,
    store: Arc<dyn ObjectStore>,
    url_ttl: Duration,
}

impl ProductService {
    pub fn new(db: Database, audit: AuditService, store: Arc<dyn ObjectStore>, url_ttl: Duration) -> Self {
        ProductService {
            db,
            audit,
            store,
            url_ttl,
        }
    }

    pub async fn list(&self, filter: &ProductFilter, visibility: Visibility) -> ApiResult<Vec<Product>> {
        Ok(self.db.products().list(filter, visibility).await?)
    }

    pub async fn search(&self, query: &str, visibility: Visibility) -> ApiResult<Vec<Product>> {
        let query = validate_search_query(query)?;
        Ok(self.db.products().search(&query, visibility, SEARCH_LIMIT).await?)
    }

    pub async fn get(&self, id: &str) -> ApiResult<Product> {
        self.db
            .products()
            .get_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Product", id))
    }

    pub async fn get_by_sku(&self, sku: &str) -> ApiResult<Product> {
        self.db
            .products()
            .get_by_sku(sku.trim())
            .await?
            .ok_or_else(|| ApiError::not_found("Product", sku))
    }

    pub async fn low_stock(&self) -> ApiResult<Vec<Product>> {
        Ok(self.db.products().low_stock().await?)
    }

    pub async fn movements(&self, id: &str) -> ApiResult<Vec<StockMovement>> {
        self.get(id).await?;
        Ok(self.db.products().movements(id, MOVEMENT_LIMIT).await?)
    }

    async fn validate(&self, input: &ProductInput) -> ApiResult<()> {
        validate_sku(&input.sku)?;
        validate_name("name", &input.name, NAME_MAX)?;
        validate_prices(input.purchase_price_cents, input.selling_price_cents)?;
        validate_stock_level("stock_quantity", input.stock_quantity)?;
        validate_stock_level("min_stock_level", input.min_stock_level)?;

        if let Some(category_id) = non_empty(input.category_id.clone()) {
            if self.db.categories().get_by_id(&category_id).await?.is_none() {
                return Err(invalid_reference("category_id", &category_id));
            }
        }
        if let Some(supplier_id) = non_empty(input.supplier_id.clone()) {
            if self.db.suppliers().get_by_id(&supplier_id).await?.is_none() {
                return Err(invalid_reference("supplier_id", &supplier_id));
            }
        }
        Ok(())
    }

    pub async fn create(&self, actor: &Identity, input: ProductInput) -> ApiResult<Product> {
        self.validate(&input).await?;

        let now = Utc::now();
        let product = Product {
            id: new_id(),
            sku: input.sku.trim().to_string(),
            name: input.name.trim().to_string(),
            description: non_empty(input.description),
            category_id: non_empty(input.category_id),
            supplier_id: non_empty(input.supplier_id),
            purchase_price_cents: input.purchase_price_cents,
            selling_price_cents: input.selling_price_cents,
            stock_quantity: input.stock_quantity,
            min_stock_level: input.min_stock_level,
            expiration_date: input.expiration_date,
            image_key: None,
            status: CatalogStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.db.products().insert(&product).await?;

        self.audit
            .record(actor, AuditAction::Create, "Product", &product.id, None, Some(snapshot(&product)?))
            .await?;
        info!(id = %product.id, sku = %product.sku, "Product created");
        Ok(product)
    }

    pub async fn update(&self, actor: &Identity, id: &str, input: ProductInput) -> ApiResult<Product> {
        self.validate(&input).await?;

        let before = self.get(id).await?;
        let after = Product {
            sku: input.sku.trim().to_string(),
            name: input.name.trim().to_string(),
            description: non_empty(input.description),
            category_id: non_empty(input.category_id),
            supplier_id: non_empty(input.supplier_id),
            purchase_price_cents: input.purchase_price_cents,
            selling_price_cents: input.selling_price_cents,
            min_stock_level: input.min_stock_level,
            expiration_date: input.expiration_date,
            updated_at: Utc::now(),
            ..before.clone()
        };
        self.db.products().update(&after).await?;

        self.audit
            .record(actor, AuditAction::Update, "Product", id, Some(snapshot(&before)?), Some(snapshot(&after)?))
            .await?;
        Ok(after)
    }

    pub async fn archive(&self, actor: &Identity, id: &str) -> ApiResult<Product> {
        self.set_status(actor, id, CatalogStatus::Archived).await
    }

    pub async fn restore(&self, actor: &Identity, id: &str) -> ApiResult<Product> {
        self.set_status(actor, id, CatalogStatus::Active).await
    }

    async fn set_status(&self, actor: &Identity, id: &str, status: CatalogStatus) -> ApiResult<Product> {
        let before = self.get(id).await?;
        self.db.products().set_status(id, status).await?;
        let after = Product {
            status,
            updated_at: Utc::now(),
            ..before.clone()
        };

        self.audit
            .record(
                actor,
                lifecycle_action(status),
                "Product",
                id,
                Some(snapshot(&before)?),
                Some(snapshot(&after)?),
            )
            .await?;
        info!(id = %id, sku = %after.sku, ?status, "Product status changed");
        Ok(after)
    }

    /// Manual restock or write-off. The result is clamped at zero.
    pub async fn adjust_stock(
        &self,
        actor: &Identity,
        id: &str,
        adjustment: StockAdjustment,
    ) -> ApiResult<StockMovement> {
        if adjustment.delta == 0 {
            return Err(ValidationError::MustBePositive {
                field: "delta".to_string(),
            }
            .into());
        }

        let product = self.get(id).await?;
        let movement = self
            .db
            .products()
            .adjust_stock(id, adjustment.delta, StockReason::ManualAdjustment, None, &actor.username)
            .await?;

        self.audit
            .record(
                actor,
                AuditAction::StockAdjust,
                "Product",
                id,
                Some(snapshot(&serde_json::json!({ "stock_quantity": movement.quantity_before }))?),
                Some(snapshot(&serde_json::json!({ "stock_quantity": movement.quantity_after }))?),
            )
            .await?;
        info!(
            sku = %product.sku,
            delta = adjustment.delta,
            stock = movement.quantity_after,
            "Stock adjusted"
        );
        Ok(movement)
    }

    // =========================================================================
    // Images
    // =========================================================================

    pub async fn upload_image(
        &self,
        actor: &Identity,
        id: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> ApiResult<ProductImage> {
        let extension = image_extension(content_type).ok_or_else(|| {
            ApiError::validation(format!(
                "Unsupported image type {content_type}; use image/png, image/jpeg or image/webp"
            ))
        })?;
        if bytes.is_empty() {
            return Err(ApiError::validation("Image is empty"));
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ApiError::validation("Image exceeds 5 MiB"));
        }

        let product = self.get(id).await?;
        let key = format!("products/{}/{}.{}", product.id, new_id(), extension);

        self.store.put(&key, bytes).await.map_err(storage_error)?;
        self.db.products().set_image_key(id, Some(&key)).await?;

        if let Some(old) = &product.image_key {
            if let Err(e) = self.store.delete(old).await {
                warn!(key = %old, error = %e, "Failed to delete replaced image");
            }
        }

        self.audit
            .record(
                actor,
                AuditAction::Update,
                "Product",
                id,
                Some(snapshot(&serde_json::json!({ "image_key": product.image_key }))?),
                Some(snapshot(&serde_json::json!({ "image_key": key }))?),
            )
            .await?;

        let url = self.store.presigned_url(&key, self.url_ttl).map_err(storage_error)?;
        info!(id = %id, key = %key, size = bytes.len(), "Product image uploaded");
        Ok(ProductImage { image_key: key, url })
    }

    pub async fn delete_image(&self, actor: &Identity, id: &str) -> ApiResult<()> {
        let product = self.get(id).await?;
        let Some(key) = product.image_key else {
            return Err(ApiError::not_found("Product image", id));
        };

        self.db.products().set_image_key(id, None).await?;
        self.store.delete(&key).await.map_err(storage_error)?;

        self.audit
            .record(
                actor,
                AuditAction::Update,
                "Product",
                id,
                Some(snapshot(&serde_json::json!({ "image_key": key }))?),
                Some(snapshot(&serde_json::json!({ "image_key": null }))?),
            )
            .await
    }

    /// Short-lived signed URL for the product's image.
    pub async fn image_url(&self, id: &str) -> ApiResult<ProductImage> {
        let product = self.get(id).await?;
        let key = product
            .image_key
            .ok_or_else(|| ApiError::not_found("Product image", id))?;
        let url = self.store.presigned_url(&key, self.url_ttl).map_err(storage_error)?;
        Ok(ProductImage { image_key: key, url })
    }
}

fn invalid_reference(field: &str, id: &str) -> ApiError {
    ApiError::validation(format!("{field} refers to an unknown record: {id}"))
}
