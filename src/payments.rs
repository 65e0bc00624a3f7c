//! Payment-gateway integration.
//!
//! A thin client for the external Orders API plus verification of the signed
//! callback the client posts after completing payment. The gateway holds the
//! money side of a booking: we create an order for `price * 100` minor units,
//! the customer pays against it out-of-band, and the callback signature
//! proves the gateway saw that payment.

use anyhow::bail;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;

type HmacSha256 = Hmac<Sha256>;

/// An order created with the external gateway. Mirrors the subset of the
/// gateway's order object the frontend needs to open the checkout flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub id: String,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub status: String,
}

#[derive(Clone)]
pub struct PaymentGateway {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
    currency: String,
}

impl PaymentGateway {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.razorpay_base_url.clone(),
            key_id: config.razorpay_key_id.clone(),
            key_secret: config.razorpay_key_secret.clone(),
            currency: config.currency.clone(),
        }
    }

    /// Receipt tag correlating a gateway order back to us. Unique by
    /// construction; the gateway only echoes it.
    pub fn new_receipt() -> String {
        format!("bk_{}", Uuid::new_v4().simple())
    }

    /// Create an order for `amount_minor` minor units, tagged with `receipt`
    /// and free-form correlation `notes`.
    pub async fn create_order(
        &self,
        amount_minor: i64,
        receipt: &str,
        notes: serde_json::Value,
    ) -> anyhow::Result<PaymentOrder> {
        let response = self
            .http
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&serde_json::json!({
                "amount": amount_minor,
                "currency": self.currency,
                "receipt": receipt,
                "notes": notes,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Payment gateway returned {}: {}", status, body);
        }

        let order: PaymentOrder = response.json().await?;
        info!("Payment order {} created ({} {})", order.id, order.amount, order.currency);
        Ok(order)
    }
}

/// Check a payment callback signature: HMAC-SHA256 over `"{orderId}|{paymentId}"`
/// keyed with the shared gateway secret, hex-encoded. The comparison runs in
/// constant time.
pub fn verify_signature(secret: &str, order_id: &str, payment_id: &str, signature_hex: &str) -> bool {
    let Ok(supplied) = hex::decode(signature_hex) else {
        return false;
    };

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    mac.verify_slice(&supplied).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, order_id: &str, payment_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{order_id}|{payment_id}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_a_correctly_signed_callback() {
        let sig = sign("shared-secret", "order_abc", "pay_123");
        assert!(verify_signature("shared-secret", "order_abc", "pay_123", &sig));
    }

    #[test]
    fn rejects_a_signature_for_a_different_payment() {
        let sig = sign("shared-secret", "order_abc", "pay_123");
        assert!(!verify_signature("shared-secret", "order_abc", "pay_999", &sig));
        assert!(!verify_signature("shared-secret", "order_xyz", "pay_123", &sig));
    }

    #[test]
    fn rejects_a_signature_made_with_the_wrong_secret() {
        let sig = sign("other-secret", "order_abc", "pay_123");
        assert!(!verify_signature("shared-secret", "order_abc", "pay_123", &sig));
    }

    #[test]
    fn rejects_garbage_signatures() {
        assert!(!verify_signature("shared-secret", "order_abc", "pay_123", "not-hex"));
        assert!(!verify_signature("shared-secret", "order_abc", "pay_123", ""));
        let full = sign("shared-secret", "order_abc", "pay_123");
        assert!(!verify_signature("shared-secret", "order_abc", "pay_123", &full[..16]));
    }

    #[test]
    fn receipts_are_unique_and_short_enough_for_the_gateway() {
        let a = PaymentGateway::new_receipt();
        let b = PaymentGateway::new_receipt();
        assert_ne!(a, b);
        // Gateway receipt fields cap out at 40 characters.
        assert!(a.len() <= 40);
        assert!(a.starts_with("bk_"));
    }
}
