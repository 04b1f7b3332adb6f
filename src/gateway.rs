use async_trait::async_trait;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use tracing::{error, instrument};
use uuid::Uuid;

use crate::errors::ServiceError;

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Remote payment intent as reported by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPaymentIntent {
    pub id: String,
    pub status: String,
    pub client_secret: Option<String>,
    /// Amount in the currency's minor unit (cents).
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub last_payment_error: Option<GatewayErrorDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayErrorDetail {
    pub code: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    /// Refunded amount in minor units.
    pub amount: i64,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct CreateIntentParams {
    pub amount_minor: i64,
    pub currency: String,
    pub order_id: Uuid,
    pub customer_email: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Remote payment operations used by the payment workflow. Implemented by
/// the Stripe client in production and by a mock in tests.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;
    async fn create_intent(
        &self,
        params: CreateIntentParams,
    ) -> Result<GatewayPaymentIntent, ServiceError>;
    async fn retrieve_intent(&self, intent_id: &str) -> Result<GatewayPaymentIntent, ServiceError>;
    async fn refund(
        &self,
        intent_id: &str,
        amount_minor: Option<i64>,
    ) -> Result<GatewayRefund, ServiceError>;
}

/// Stripe REST client (form-encoded API, bearer-key auth).
pub struct StripeGateway {
    http: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeGateway {
    pub fn new(secret_key: String) -> Self {
        Self::with_base_url(secret_key, STRIPE_API_BASE.to_string())
    }

    pub fn with_base_url(secret_key: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            base_url,
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "gateway request rejected");
            return Err(ServiceError::ExternalServiceError(format!(
                "gateway returned {status}"
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("invalid gateway response: {e}")))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn name(&self) -> &'static str {
        "stripe"
    }

    #[instrument(skip(self, params), fields(order_id = %params.order_id))]
    async fn create_intent(
        &self,
        params: CreateIntentParams,
    ) -> Result<GatewayPaymentIntent, ServiceError> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".into(), params.amount_minor.to_string()),
            ("currency".into(), params.currency.to_lowercase()),
            ("metadata[order_id]".into(), params.order_id.to_string()),
            ("automatic_payment_methods[enabled]".into(), "true".into()),
        ];
        if let Some(email) = params.customer_email {
            form.push(("receipt_email".into(), email));
        }
        for (key, value) in params.metadata {
            form.push((format!("metadata[{key}]"), value));
        }

        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;
        Self::parse(response).await
    }

    #[instrument(skip(self))]
    async fn retrieve_intent(&self, intent_id: &str) -> Result<GatewayPaymentIntent, ServiceError> {
        let response = self
            .http
            .get(format!("{}/v1/payment_intents/{intent_id}", self.base_url))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;
        Self::parse(response).await
    }

    #[instrument(skip(self))]
    async fn refund(
        &self,
        intent_id: &str,
        amount_minor: Option<i64>,
    ) -> Result<GatewayRefund, ServiceError> {
        let mut form: Vec<(String, String)> =
            vec![("payment_intent".into(), intent_id.to_string())];
        if let Some(amount) = amount_minor {
            form.push(("amount".into(), amount.to_string()));
        }

        let response = self
            .http
            .post(format!("{}/v1/refunds", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;
        Self::parse(response).await
    }
}

/// Converts a decimal major-unit amount to the gateway's minor unit.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    (amount * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| ServiceError::ValidationError("amount out of range".into()))
}

/// Converts a gateway minor-unit amount back to a decimal amount.
pub fn from_minor_units(amount_minor: i64) -> Decimal {
    Decimal::new(amount_minor, 2)
}

/// Verifies the webhook signature before any payload is trusted. Supports
/// the `Stripe-Signature: t=..,v1=..` scheme and a generic
/// `x-timestamp`/`x-signature` pair; both sign `"{timestamp}.{payload}"`
/// with HMAC-SHA256. Timestamps outside the tolerance window are rejected.
pub fn verify_webhook_signature(
    headers: &HeaderMap,
    payload: &[u8],
    secret: &str,
    tolerance_secs: u64,
) -> bool {
    if let Some(sig) = headers.get("Stripe-Signature").and_then(|h| h.to_str().ok()) {
        let mut ts = "";
        let mut v1 = "";
        for part in sig.split(',') {
            let mut it = part.trim().splitn(2, '=');
            match (it.next(), it.next()) {
                (Some("t"), Some(val)) => ts = val,
                (Some("v1"), Some(val)) => v1 = val,
                _ => {}
            }
        }
        if !ts.is_empty() && !v1.is_empty() {
            return check_signature(ts, v1, payload, secret, tolerance_secs);
        }
    }

    if let (Some(ts), Some(sig)) = (headers.get("x-timestamp"), headers.get("x-signature")) {
        if let (Ok(ts), Ok(sig)) = (ts.to_str(), sig.to_str()) {
            return check_signature(ts, sig, payload, secret, tolerance_secs);
        }
    }

    false
}

fn check_signature(
    timestamp: &str,
    signature: &str,
    payload: &[u8],
    secret: &str,
    tolerance_secs: u64,
) -> bool {
    match timestamp.parse::<i64>() {
        Ok(ts) => {
            let now = chrono::Utc::now().timestamp();
            if (now - ts).unsigned_abs() > tolerance_secs {
                return false;
            }
        }
        Err(_) => return false,
    }

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, signature)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use rust_decimal_macros::dec;

    fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn minor_unit_conversion() {
        assert_eq!(to_minor_units(dec!(236.00)).unwrap(), 23600);
        assert_eq!(to_minor_units(dec!(0.01)).unwrap(), 1);
        assert_eq!(to_minor_units(dec!(19.995)).unwrap(), 2000);
        assert_eq!(from_minor_units(23600), dec!(236.00));
    }

    #[test]
    fn stripe_signature_verifies() {
        let secret = "whsec_test";
        let payload = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;
        let ts = chrono::Utc::now().timestamp();
        let sig = sign(secret, ts, payload);

        let mut headers = HeaderMap::new();
        headers.insert(
            "Stripe-Signature",
            HeaderValue::from_str(&format!("t={ts},v1={sig}")).unwrap(),
        );
        assert!(verify_webhook_signature(&headers, payload, secret, 300));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let secret = "whsec_test";
        let ts = chrono::Utc::now().timestamp();
        let sig = sign(secret, ts, b"original");

        let mut headers = HeaderMap::new();
        headers.insert(
            "Stripe-Signature",
            HeaderValue::from_str(&format!("t={ts},v1={sig}")).unwrap(),
        );
        assert!(!verify_webhook_signature(&headers, b"tampered", secret, 300));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let secret = "whsec_test";
        let payload = b"payload";
        let ts = chrono::Utc::now().timestamp() - 3600;
        let sig = sign(secret, ts, payload);

        let mut headers = HeaderMap::new();
        headers.insert(
            "Stripe-Signature",
            HeaderValue::from_str(&format!("t={ts},v1={sig}")).unwrap(),
        );
        assert!(!verify_webhook_signature(&headers, payload, secret, 300));
    }

    #[test]
    fn generic_header_scheme_verifies() {
        let secret = "shared";
        let payload = b"{}";
        let ts = chrono::Utc::now().timestamp();
        let sig = sign(secret, ts, payload);

        let mut headers = HeaderMap::new();
        headers.insert("x-timestamp", HeaderValue::from_str(&ts.to_string()).unwrap());
        headers.insert("x-signature", HeaderValue::from_str(&sig).unwrap());
        assert!(verify_webhook_signature(&headers, payload, secret, 300));
    }

    #[test]
    fn missing_headers_are_rejected() {
        let headers = HeaderMap::new();
        assert!(!verify_webhook_signature(&headers, b"{}", "secret", 300));
    }
}
