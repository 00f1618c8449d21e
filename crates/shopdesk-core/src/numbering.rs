//! Human-facing reference numbers for orders and sales.
//!
//! Format: `PREFIX-YYYYMMDD-XXXXXXXX`, where the suffix is the first eight
//! hex digits of a fresh UUID v4, upper-cased. Unique columns in the database
//! back these up.

use chrono::{DateTime, Utc};
use uuid::Uuid;

fn reference(prefix: &str, at: DateTime<Utc>) -> String {
    let suffix: String = Uuid::new_v4().simple().to_string()[..8].to_ascii_uppercase();
    format!("{}-{}-{}", prefix, at.format("%Y%m%d"), suffix)
}

/// e.g. `ORD-20240315-9F1C02AB`
pub fn order_number(at: DateTime<Utc>) -> String {
    reference("ORD", at)
}

/// e.g. `RCP-20240315-41D7E0C3`
pub fn receipt_number(at: DateTime<Utc>) -> String {
    reference("RCP", at)
}
