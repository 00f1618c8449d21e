//! # Domain Types
//!
//! The persisted records of the back office.
//!
//! ## Entity Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Category ◄──┐                                                          │
//! │              ├── Product ◄── OrderItem ──► Order (customer_username)    │
//! │  Supplier ◄──┘      ▲                                                   │
//! │                     ├─────── SaleItem ───► Sale (cashier_username)      │
//! │                     └─────── StockMovement                              │
//! │                                                                         │
//! │  References are plain string ids; nothing is enforced by foreign keys. │
//! │  Order and sale items snapshot SKU, name and price at creation time.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::identity::Role;
use crate::money::Money;
use crate::order::OrderStatus;

// =============================================================================
// Lifecycle
// =============================================================================

/// Lifecycle of catalog rows (categories, suppliers, products).
///
/// Archiving replaces deletion so that orders and sales keep resolving the
/// products they reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum CatalogStatus {
    Active,
    Archived,
}

impl Default for CatalogStatus {
    fn default() -> Self {
        CatalogStatus::Active
    }
}

/// Which catalog rows a list or search should return.
///
/// Repository list methods take this as a required argument, so a query can
/// never silently forget the archived filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    ActiveOnly,
    IncludeArchived,
}

impl Visibility {
    pub fn from_flag(include_archived: bool) -> Self {
        if include_archived {
            Visibility::IncludeArchived
        } else {
            Visibility::ActiveOnly
        }
    }
}

// =============================================================================
// User
// =============================================================================

/// A user account.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    /// argon2 PHC string. Never serialized.
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub password_hash: String,
    pub roles: Vec<Role>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Catalog
// =============================================================================

/// A product category.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: CatalogStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A supplier. Names are unique.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub status: CatalogStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A product in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit, unique across the catalog.
    pub sku: String,

    pub name: String,

    pub description: Option<String>,

    pub category_id: Option<String>,

    pub supplier_id: Option<String>,

    /// What we pay the supplier, in cents.
    pub purchase_price_cents: i64,

    /// What the customer pays, in cents. Always above the purchase price.
    pub selling_price_cents: i64,

    /// Units on hand. Never negative.
    pub stock_quantity: i64,

    /// At or below this level the product shows up as low stock.
    pub min_stock_level: i64,

    #[ts(as = "Option<String>")]
    pub expiration_date: Option<NaiveDate>,

    /// Object key in the image bucket.
    pub image_key: Option<String>,

    pub status: CatalogStatus,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    #[inline]
    pub fn purchase_price(&self) -> Money {
        Money::from_cents(self.purchase_price_cents)
    }

    pub fn is_active(&self) -> bool {
        self.status == CatalogStatus::Active
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.min_stock_level
    }

    /// Fails with `InsufficientStock` naming the SKU and shortfall.
    pub fn ensure_stock(&self, requested: i64) -> CoreResult<()> {
        if requested > self.stock_quantity {
            return Err(CoreError::InsufficientStock {
                sku: self.sku.clone(),
                available: self.stock_quantity,
                requested,
                shortfall: requested - self.stock_quantity,
            });
        }
        Ok(())
    }
}

// =============================================================================
// Payment
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Paypal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

// =============================================================================
// Order
// =============================================================================

/// An online order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub customer_username: String,
    pub customer_email: Option<String>,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    /// Always `subtotal + tax + shipping`.
    pub total_cents: i64,
    pub cancel_reason: Option<String>,
    pub paypal_order_id: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line on an order, denormalised at creation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub sku_snapshot: String,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
}

/// An order together with its lines.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

// =============================================================================
// Sale
// =============================================================================

/// A point-of-sale sale. Stock is decremented as soon as it is recorded.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub receipt_number: String,
    pub cashier_username: String,
    pub customer_username: Option<String>,
    pub payment_method: PaymentMethod,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    /// Cash handed over (cash payments only).
    pub cash_received_cents: Option<i64>,
    pub change_cents: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub sku_snapshot: String,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

// =============================================================================
// Stock Movements
// =============================================================================

/// Why a product's stock changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockReason {
    Sale,
    OrderCompleted,
    ManualAdjustment,
}

/// One stock change. Written alongside every update of `stock_quantity`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    /// Requested change (negative for decrements).
    pub delta: i64,
    /// Stock read under the same write lock as the change.
    pub quantity_before: i64,
    /// Stock after the change, clamped at zero.
    pub quantity_after: i64,
    pub reason: StockReason,
    /// Sale or order the movement belongs to.
    pub reference_id: Option<String>,
    pub actor: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Audit
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Restore,
    StatusChange,
    StockAdjust,
    Login,
    Payment,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::Restore => "RESTORE",
            AuditAction::StatusChange => "STATUS_CHANGE",
            AuditAction::StockAdjust => "STOCK_ADJUST",
            AuditAction::Login => "LOGIN",
            AuditAction::Payment => "PAYMENT",
        };
        f.write_str(s)
    }
}

/// Append-only record of a mutating action.
///
/// Snapshots are JSON text so the log stays readable without knowing the
/// entity's schema at the time it was written.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct AuditEntry {
    pub id: String,
    pub actor: String,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: String,
    pub before_state: Option<String>,
    pub after_state: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: "p-1".to_string(),
            sku: "SKU-1".to_string(),
            name: "Widget".to_string(),
            description: None,
            category_id: None,
            supplier_id: None,
            purchase_price_cents: 500,
            selling_price_cents: 1000,
            stock_quantity: stock,
            min_stock_level: 2,
            expiration_date: None,
            image_key: None,
            status: CatalogStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_ensure_stock_reports_shortfall() {
        let p = product(3);
        assert!(p.ensure_stock(3).is_ok());

        match p.ensure_stock(5) {
            Err(CoreError::InsufficientStock {
                sku,
                available,
                requested,
                shortfall,
            }) => {
                assert_eq!(sku, "SKU-1");
                assert_eq!(available, 3);
                assert_eq!(requested, 5);
                assert_eq!(shortfall, 2);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_low_stock_is_inclusive() {
        assert!(product(2).is_low_stock());
        assert!(!product(3).is_low_stock());
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let now = Utc::now();
        let user = User {
            id: "u-1".to_string(),
            username: "ana".to_string(),
            email: None,
            password_hash: "$argon2id$secret".to_string(),
            roles: vec![Role::Customer],
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"CUSTOMER\""));
    }

    #[test]
    fn test_order_detail_flattens_order_fields() {
        let now = Utc::now();
        let detail = OrderDetail {
            order: Order {
                id: "o-1".to_string(),
                order_number: "ORD-1".to_string(),
                customer_username: "ana".to_string(),
                customer_email: None,
                status: OrderStatus::Pending,
                payment_method: PaymentMethod::Card,
                payment_status: PaymentStatus::Pending,
                subtotal_cents: 2000,
                tax_cents: 400,
                shipping_cents: 500,
                total_cents: 2900,
                cancel_reason: None,
                paypal_order_id: None,
                notes: None,
                created_at: now,
                updated_at: now,
                completed_at: None,
            },
            items: vec![],
        };
        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["status"], "PENDING");
        assert_eq!(value["total_cents"], 2900);
        assert!(value["items"].is_array());
    }
}
