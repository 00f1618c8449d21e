//! Loyalty points.
//!
//! Accrual happens off the request path: the completion pipeline queues an
//! [`OrderCompleted`] and the loyalty worker calls [`LoyaltyService::try_accrue`].

use serde::Serialize;
use shopdesk_core::loyalty::points_for_amount;
use shopdesk_core::{Identity, LoyaltyProgress, Tier, UserLoyalty};
use shopdesk_db::{Database, DbResult};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::services::events::OrderCompleted;

/// A customer's balance as returned by the API. Customers without a record
/// yet read as zero points, BRONZE.
#[derive(Debug, Clone, Serialize)]
pub struct LoyaltySummary {
    pub customer_username: String,
    pub points: i64,
    pub tier: Tier,
    pub progress_percent: f64,
}

impl LoyaltySummary {
    fn from_points(customer_username: &str, points: i64) -> Self {
        let progress = LoyaltyProgress::for_points(points);
        LoyaltySummary {
            customer_username: customer_username.to_string(),
            points,
            tier: progress.tier,
            progress_percent: progress.progress_percent,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoyaltyService {
    db: Database,
}

impl LoyaltyService {
    pub fn new(db: Database) -> Self {
        LoyaltyService { db }
    }

    /// One accrual attempt for a completed order.
    ///
    /// Returns `Ok(None)` when the order earns no points. A concurrent write
    /// surfaces as `DbError::VersionConflict`; retrying is the caller's job.
    pub async fn try_accrue(&self, event: &OrderCompleted) -> DbResult<Option<UserLoyalty>> {
        let points = points_for_amount(event.amount);
        if points == 0 {
            return Ok(None);
        }

        let repo = self.db.loyalty();
        let mut record = repo.get_or_create(&event.customer_username).await?;
        let previous_tier = record.tier;
        record.accrue(points);
        let saved = repo.update_guarded(&record).await?;

        info!(
            customer = %saved.customer_username,
            order_number = %event.order_number,
            earned = points,
            balance = saved.points,
            tier = %saved.tier,
            "Loyalty points accrued"
        );
        if saved.tier != previous_tier {
            info!(customer = %saved.customer_username, from = %previous_tier, to = %saved.tier, "Loyalty tier changed");
        }

        Ok(Some(saved))
    }

    /// Balance for `username`. Customers may only read their own.
    pub async fn summary(&self, actor: &Identity, username: &str) -> ApiResult<LoyaltySummary> {
        if !actor.can_access_customer(username) {
            return Err(ApiError::forbidden("Cannot read another customer's loyalty"));
        }

        let points = self
            .db
            .loyalty()
            .find_by_customer(username)
            .await?
            .map(|record| record.points)
            .unwrap_or(0);

        Ok(LoyaltySummary::from_points(username, points))
    }

    pub async fn progress(&self, actor: &Identity, username: &str) -> ApiResult<LoyaltyProgress> {
        let summary = self.summary(actor, username).await?;
        Ok(LoyaltyProgress::for_points(summary.points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopdesk_core::{Money, Role};
    use shopdesk_db::DbConfig;

    async fn service() -> LoyaltyService {
        LoyaltyService::new(Database::new(DbConfig::in_memory()).await.unwrap())
    }

    fn completed(customer: &str, cents: i64) -> OrderCompleted {
        OrderCompleted {
            order_id: "o-1".to_string(),
            order_number: "ORD-1".to_string(),
            customer_username: customer.to_string(),
            customer_email: None,
            amount: Money::from_cents(cents),
            lines: vec![],
            completed_by: "kim".to_string(),
        }
    }

    #[tokio::test]
    async fn test_accrual_from_zero() {
        let service = service().await;

        let record = service.try_accrue(&completed("ana", 3700)).await.unwrap().unwrap();
        assert_eq!(record.points, 7);
        assert_eq!(record.tier, Tier::Bronze);
        assert_eq!(record.version, 1);
    }

    #[tokio::test]
    async fn test_small_order_is_noop() {
        let service = service().await;

        assert!(service.try_accrue(&completed("ana", 499)).await.unwrap().is_none());
        let me = Identity::new("ana", vec![Role::Customer]);
        assert_eq!(service.summary(&me, "ana").await.unwrap().points, 0);
    }

    #[tokio::test]
    async fn test_customers_only_read_their_own() {
        let service = service().await;
        service.try_accrue(&completed("bob", 60_000)).await.unwrap();

        let ana = Identity::new("ana", vec![Role::Customer]);
        assert!(service.summary(&ana, "bob").await.is_err());

        let kim = Identity::new("kim", vec![Role::Employee]);
        let summary = service.summary(&kim, "bob").await.unwrap();
        assert_eq!(summary.points, 120);
        assert_eq!(summary.tier, Tier::Silver);

        let progress = service.progress(&kim, "bob").await.unwrap();
        assert_eq!(progress.next_tier, Some(Tier::Gold));
    }
}
