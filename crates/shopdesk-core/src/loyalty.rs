//! # Loyalty Program
//!
//! Points are earned when an order completes: one point per full 5.00 of the
//! order total. The tier is a pure function of the point balance.
//!
//! ```text
//!   points:   0 ──────────── 100 ──────────────── 500 ──────────►
//!   tier:     BRONZE         SILVER               GOLD
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

/// Order value (in cents) that earns one point.
pub const CENTS_PER_POINT: i64 = 500;

/// Loyalty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
}

impl Tier {
    /// Minimum balance for the tier.
    pub const fn threshold(self) -> i64 {
        match self {
            Tier::Bronze => 0,
            Tier::Silver => 100,
            Tier::Gold => 500,
        }
    }

    /// The tier above this one, if any.
    pub const fn next(self) -> Option<Tier> {
        match self {
            Tier::Bronze => Some(Tier::Silver),
            Tier::Silver => Some(Tier::Gold),
            Tier::Gold => None,
        }
    }

    /// Highest tier whose threshold `points` reaches.
    pub fn for_points(points: i64) -> Tier {
        if points >= Tier::Gold.threshold() {
            Tier::Gold
        } else if points >= Tier::Silver.threshold() {
            Tier::Silver
        } else {
            Tier::Bronze
        }
    }
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Bronze
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Bronze => "BRONZE",
            Tier::Silver => "SILVER",
            Tier::Gold => "GOLD",
        };
        f.write_str(s)
    }
}

/// Points earned for an order total: `floor(total / 5.00)`, never negative.
///
/// ## Example
/// ```rust
/// use shopdesk_core::loyalty::points_for_amount;
/// use shopdesk_core::money::Money;
///
/// assert_eq!(points_for_amount(Money::from_cents(3700)), 7);
/// assert_eq!(points_for_amount(Money::from_cents(499)), 0);
/// ```
pub fn points_for_amount(amount: Money) -> i64 {
    if amount.cents() <= 0 {
        return 0;
    }
    amount.cents() / CENTS_PER_POINT
}

/// Percentage of the way to the next tier, capped at 100.
pub fn tier_progress(points: i64) -> f64 {
    let points = points.max(0);
    match Tier::for_points(points).next() {
        Some(next) => (points as f64 * 100.0 / next.threshold() as f64).min(100.0),
        None => 100.0,
    }
}

/// A customer's loyalty record.
///
/// `version` is the optimistic concurrency guard: every write checks the
/// version it read and bumps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct UserLoyalty {
    pub id: String,
    pub customer_username: String,
    pub points: i64,
    pub tier: Tier,
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl UserLoyalty {
    /// Adds points and recomputes the tier. Zero or negative amounts are a
    /// no-op and return false.
    pub fn accrue(&mut self, points: i64) -> bool {
        if points <= 0 {
            return false;
        }
        self.points += points;
        self.tier = Tier::for_points(self.points);
        true
    }

    pub fn progress(&self) -> LoyaltyProgress {
        LoyaltyProgress::for_points(self.points)
    }
}

/// Progress report returned by the loyalty endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoyaltyProgress {
    pub points: i64,
    pub tier: Tier,
    pub next_tier: Option<Tier>,
    pub points_to_next_tier: Option<i64>,
    pub progress_percent: f64,
}

impl LoyaltyProgress {
    pub fn for_points(points: i64) -> Self {
        let tier = Tier::for_points(points);
        let next_tier = tier.next();
        LoyaltyProgress {
            points,
            tier,
            next_tier,
            points_to_next_tier: next_tier.map(|t| t.threshold() - points),
            progress_percent: tier_progress(points),
        }
    }
}
