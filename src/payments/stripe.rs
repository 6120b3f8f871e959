use std::future::Future;

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

use super::{TransferGateway, TransferRequest};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
struct CreateTransferResponse {
    id: String,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    webhook_secret: String,
}

impl StripeClient {
    pub fn new(secret_key: &str, webhook_secret: &str) -> Self {
        Self {
            client: Client::new(),
            secret_key: secret_key.to_string(),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    /// Maximum age of a webhook timestamp before it's rejected (in seconds).
    /// Stripe recommends 300 seconds (5 minutes).
    const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        // Stripe signature format: t=timestamp,v1=signature
        let mut timestamp = None;
        let mut sig_v1 = None;

        for part in signature.split(',') {
            if let Some(t) = part.strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(s) = part.strip_prefix("v1=") {
                sig_v1 = Some(s);
            }
        }

        let timestamp_str = timestamp
            .ok_or_else(|| AppError::InvalidSignature("Missing timestamp in signature".into()))?;
        let sig_v1 = sig_v1
            .ok_or_else(|| AppError::InvalidSignature("Missing v1 signature".into()))?;

        // Reject stale webhooks to prevent replay of captured payloads.
        let timestamp: i64 = timestamp_str
            .parse()
            .map_err(|_| AppError::InvalidSignature("Invalid timestamp in signature".into()))?;

        let now = chrono::Utc::now().timestamp();
        let age = now - timestamp;

        if age > Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
            tracing::warn!(
                "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
                age,
                Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS
            );
            return Ok(false);
        }

        // Clock skew tolerance for timestamps from the future: 60 seconds
        if age < -60 {
            tracing::warn!(
                "Stripe webhook rejected: timestamp in the future (age={}s)",
                age
            );
            return Ok(false);
        }

        let signed_payload = format!("{}.{}", timestamp_str, String::from_utf8_lossy(payload));

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| AppError::Internal("Invalid webhook secret".into()))?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        // Constant-time comparison to prevent timing attacks. The length
        // check is not constant-time, but signature length is not secret
        // (always 64 hex chars for SHA-256).
        let expected_bytes = expected.as_bytes();
        let provided_bytes = sig_v1.as_bytes();

        if expected_bytes.len() != provided_bytes.len() {
            return Ok(false);
        }

        Ok(expected_bytes.ct_eq(provided_bytes).into())
    }
}

impl TransferGateway for StripeClient {
    /// Create a transfer to a member's connected account.
    ///
    /// The payout id rides along as metadata and the invoice id as the
    /// transfer group, so every transfer is traceable back to its ledger
    /// record from the Stripe dashboard.
    fn create_transfer(
        &self,
        request: TransferRequest,
    ) -> impl Future<Output = Result<String>> + Send {
        let client = self.client.clone();
        let secret_key = self.secret_key.clone();

        async move {
            let amount = request.amount_cents.to_string();
            let response = client
                .post("https://api.stripe.com/v1/transfers")
                .basic_auth(&secret_key, None::<&str>)
                .form(&[
                    ("amount", amount.as_str()),
                    ("currency", request.currency.as_str()),
                    ("destination", request.destination_account.as_str()),
                    ("transfer_group", request.invoice_id.as_str()),
                    ("metadata[payout_id]", request.payout_id.as_str()),
                    ("metadata[invoice_id]", request.invoice_id.as_str()),
                ])
                .send()
                .await
                .map_err(|e| AppError::Transfer(format!("Stripe API error: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                return Err(AppError::Transfer(format!(
                    "Stripe transfer rejected ({}): {}",
                    status, error_text
                )));
            }

            let transfer: CreateTransferResponse = response
                .json()
                .await
                .map_err(|e| AppError::Transfer(format!("Failed to parse Stripe response: {}", e)))?;

            Ok(transfer.id)
        }
    }
}

// ============ Webhook payload types ============

/// Generic Stripe webhook event - object is parsed based on event_type.
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// checkout.session.completed payload, reduced to the fields settlement
/// needs. The invoice id is threaded through checkout metadata when the
/// payment session is created.
#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub payment_status: String,
    pub payment_intent: Option<String>,
    pub metadata: StripeMetadata,
}

#[derive(Debug, Deserialize)]
pub struct StripeMetadata {
    pub invoice_id: Option<String>,
}
