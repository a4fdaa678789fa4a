//! Payment gateway glue: HMAC-SHA256 signature verification for the
//! webhook and the checkout callback, and webhook event parsing. The
//! gateway's own API is not called from here; payment initiation happens
//! client-side and every confirmation flows back through these checks.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct PaymentGateway {
    key_secret: String,
    webhook_secret: String,
}

/// Event envelope as posted by the gateway.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub payload: WebhookPayload,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<PaymentEnvelope>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentEnvelope {
    pub entity: PaymentEntity,
}

#[derive(Debug, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    /// The gateway-side order id, present when checkout was initiated
    /// against a gateway order.
    pub order_id: Option<String>,
    pub amount: u64,
    pub status: String,
    /// Checkout attaches the marketplace order id under `notes.order_id`.
    #[serde(default)]
    pub notes: serde_json::Value,
}

impl PaymentEntity {
    /// Marketplace order id carried in the notes, when present.
    pub fn noted_order_id(&self) -> Option<Uuid> {
        self.notes
            .get("order_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
    }
}

impl PaymentGateway {
    pub fn new(key_secret: String, webhook_secret: String) -> Self {
        Self {
            key_secret,
            webhook_secret,
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            std::env::var("PAYMENT_KEY_SECRET").unwrap_or_default(),
            std::env::var("PAYMENT_WEBHOOK_SECRET").unwrap_or_default(),
        )
    }

    pub fn is_configured(&self) -> bool {
        !self.key_secret.is_empty() && !self.webhook_secret.is_empty()
    }

    /// Signature over the raw webhook body, keyed with the webhook secret.
    pub fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> bool {
        compute_signature(body, &self.webhook_secret) == signature
    }

    /// Checkout callback signature: HMAC over `gateway_order_id|payment_id`
    /// keyed with the API key secret.
    pub fn verify_checkout_signature(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> bool {
        let payload = format!("{gateway_order_id}|{payment_id}");
        compute_signature(payload.as_bytes(), &self.key_secret) == signature
    }

    pub fn parse_webhook_event(&self, body: &[u8]) -> Result<WebhookEvent, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

fn compute_signature(payload: &[u8], secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}
