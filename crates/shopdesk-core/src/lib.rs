//! # shopdesk-core: Pure Business Logic for Shopdesk
//!
//! This crate is the **heart** of the back office. It contains the business
//! rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Shopdesk Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    HTTP routes (axum)                           │   │
//! │  │    /api/orders, /api/sales, /api/products, /api/loyalty ...     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    Services (apps/api)                          │   │
//! │  └───────────────┬─────────────────────────────┬───────────────────┘   │
//! │                  │                             │                        │
//! │  ┌───────────────▼─────────────────┐  ┌────────▼───────────────────┐   │
//! │  │  ★ shopdesk-core (THIS CRATE) ★ │  │       shopdesk-db          │   │
//! │  │  money · pricing · order        │  │  SQLite repositories       │   │
//! │  │  loyalty · identity · validation│  │                            │   │
//! │  └─────────────────────────────────┘  └────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//! - [`money`]: integer-cent `Money` type
//! - [`pricing`]: order and sale totals (VAT, shipping, discounts, change)
//! - [`order`]: the order status state machine and line consolidation
//! - [`loyalty`]: points accrual and tiers
//! - [`identity`]: the authenticated caller passed into every service call
//! - [`types`]: persisted records (products, orders, sales, audit entries)
//! - [`validation`]: input rules checked before any business logic runs

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod identity;
pub mod loyalty;
pub mod money;
pub mod numbering;
pub mod order;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use identity::{Identity, Role};
pub use loyalty::{LoyaltyProgress, Tier, UserLoyalty};
pub use money::Money;
pub use order::OrderStatus;
pub use pricing::{Discount, OrderTotals, PricingPolicy, SaleTotals};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single product on one order or sale line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum number of distinct lines on a single order or sale.
pub const MAX_LINES: usize = 100;

/// Highest catalog price, in cents (1,000,000.00).
///
/// A full order at this price, [`MAX_ITEM_QUANTITY`] units on each of
/// [`MAX_LINES`] lines, still fits comfortably in an `i64` of cents.
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

/// Reason recorded when an order is cancelled without one.
pub const DEFAULT_CANCEL_REASON: &str = "No reason provided";

/// Products whose expiration date falls within this many days are reported
/// as expiring on the dashboard.
pub const EXPIRY_WINDOW_DAYS: i64 = 30;
