//! # shopdesk-db: Database Layer for Shopdesk
//!
//! All persistence goes through this crate. Services in the API never write
//! SQL; they ask a repository.
//!
//! ## Usage
//! ```rust,ignore
//! use shopdesk_db::{Database, DbConfig};
//! use shopdesk_core::Visibility;
//!
//! let db = Database::new(DbConfig::new("./shopdesk.db")).await?;
//! let products = db.products().list(&Default::default(), Visibility::ActiveOnly).await?;
//! ```
//!
//! ## Query Style
//! Queries are runtime-checked (`sqlx::query_as::<_, T>` + `bind`) so the
//! workspace builds without a prepared offline query cache.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::audit::{AuditFilter, AuditRepository};
pub use repository::category::CategoryRepository;
pub use repository::loyalty::LoyaltyRepository;
pub use repository::order::{OrderFilter, OrderRepository, StatusChange};
pub use repository::product::{ProductFilter, ProductRepository};
pub use repository::sale::SaleRepository;
pub use repository::supplier::SupplierRepository;
pub use repository::user::UserRepository;
