//! PayPal REST client.
//!
//! ```text
//!  POST /v1/oauth2/token                   client credentials → bearer token
//!  POST /v2/checkout/orders                create, returns id + approve link
//!  POST /v2/checkout/orders/{id}/capture   capture an approved order
//! ```
//!
//! The bearer token is cached in memory and reused until 60 seconds before it
//! expires.

use chrono::{DateTime, Duration, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use shopdesk_core::Money;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::config::PaypalConfig;

/// Tokens are refreshed this long before PayPal says they expire.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum PaypalError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("PayPal returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("PayPal response is missing {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Serialize)]
struct Amount<'a> {
    currency_code: &'a str,
    value: String,
}

#[derive(Debug, Serialize)]
struct PurchaseUnit<'a> {
    reference_id: &'a str,
    amount: Amount<'a>,
}

#[derive(Debug, Serialize)]
struct ApplicationContext<'a> {
    return_url: &'a str,
    cancel_url: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    intent: &'static str,
    purchase_units: Vec<PurchaseUnit<'a>>,
    application_context: ApplicationContext<'a>,
}

/// A PayPal order awaiting buyer approval.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedPayment {
    pub paypal_order_id: String,
    pub approval_url: String,
}

/// Outcome of a capture.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureResult {
    pub paypal_order_id: String,
    pub status: String,
}

impl CaptureResult {
    pub fn is_completed(&self) -> bool {
        self.status == "COMPLETED"
    }
}

#[derive(Clone)]
pub struct PaypalClient {
    inner: Arc<PaypalClientInner>,
}

struct PaypalClientInner {
    client: reqwest::Client,
    config: PaypalConfig,
    token: RwLock<Option<AccessToken>>,
}

impl PaypalClient {
    pub fn new(config: PaypalConfig) -> Result<Self, PaypalError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(PaypalClientInner {
                client,
                config,
                token: RwLock::new(None),
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.config.base_url.trim_end_matches('/'), path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, PaypalError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(PaypalError::Api {
            status: status.as_u16(),
            body,
        })
    }

    /// Returns a cached token or exchanges the client credentials for a new one.
    #[instrument(skip(self))]
    async fn access_token(&self) -> Result<String, PaypalError> {
        let now = Utc::now();
        if let Some(token) = self.inner.token.read().await.as_ref() {
            if token.is_fresh(now) {
                return Ok(token.value.clone());
            }
        }

        let mut cached = self.inner.token.write().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(now) {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting PayPal access token");
        let config = &self.inner.config;
        let response = self
            .inner
            .client
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&config.client_id, Some(config.client_secret.expose_secret()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let token: TokenResponse = Self::check(response).await?.json().await?;

        let value = token.access_token.clone();
        *cached = Some(AccessToken {
            value: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        });
        Ok(value)
    }

    /// Creates a PayPal order for `amount`, tagged with our order id.
    #[instrument(skip(self), fields(amount = %amount))]
    pub async fn create_order(
        &self,
        reference: &str,
        amount: Money,
    ) -> Result<CreatedPayment, PaypalError> {
        let token = self.access_token().await?;
        let config = &self.inner.config;

        let request = CreateOrderRequest {
            intent: "CAPTURE",
            purchase_units: vec![PurchaseUnit {
                reference_id: reference,
                amount: Amount {
                    currency_code: &config.currency,
                    value: amount.to_string(),
                },
            }],
            application_context: ApplicationContext {
                return_url: &config.return_url,
                cancel_url: &config.cancel_url,
            },
        };

        let response = self
            .inner
            .client
            .post(self.url("/v2/checkout/orders"))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;
        let order: OrderResponse = Self::check(response).await?.json().await?;

        let approval_url = order
            .links
            .into_iter()
            .find(|link| link.rel == "approve" || link.rel == "payer-action")
            .map(|link| link.href)
            .ok_or(PaypalError::MissingField("approve link"))?;

        info!(paypal_order_id = %order.id, status = %order.status, "PayPal order created");
        Ok(CreatedPayment {
            paypal_order_id: order.id,
            approval_url,
        })
    }

    #[instrument(skip(self))]
    pub async fn capture_order(&self, paypal_order_id: &str) -> Result<CaptureResult, PaypalError> {
        let token = self.access_token().await?;

        let response = self
            .inner
            .client
            .post(self.url(&format!("/v2/checkout/orders/{paypal_order_id}/capture")))
            .bearer_auth(token)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let order: OrderResponse = Self::check(response).await?.json().await?;

        info!(paypal_order_id = %order.id, status = %order.status, "PayPal order captured");
        Ok(CaptureResult {
            paypal_order_id: order.id,
            status: order.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_freshness_margin() {
        let now = Utc::now();
        let token = AccessToken {
            value: "t".to_string(),
            expires_at: now + Duration::seconds(120),
        };
        assert!(token.is_fresh(now));
        assert!(!token.is_fresh(now + Duration::seconds(61)));
    }

    #[test]
    fn test_create_request_shape() {
        let request = CreateOrderRequest {
            intent: "CAPTURE",
            purchase_units: vec![PurchaseUnit {
                reference_id: "o-1",
                amount: Amount {
                    currency_code: "EUR",
                    value: Money::from_cents(2900).to_string(),
                },
            }],
            application_context: ApplicationContext {
                return_url: "http://localhost/return",
                cancel_url: "http://localhost/cancel",
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["purchase_units"][0]["amount"]["value"], "29.00");
        assert_eq!(value["purchase_units"][0]["amount"]["currency_code"], "EUR");
    }

    #[test]
    fn test_order_response_parses_links() {
        let order: OrderResponse = serde_json::from_str(
            r#"{"id":"5O1","status":"CREATED","links":[
                {"href":"https://api/self","rel":"self","method":"GET"},
                {"href":"https://paypal/approve","rel":"approve","method":"GET"}]}"#,
        )
        .unwrap();
        assert_eq!(order.links[1].href, "https://paypal/approve");
        assert!(CaptureResult {
            paypal_order_id: order.id,
            status: "COMPLETED".to_string()
        }
        .is_completed());
    }
}
