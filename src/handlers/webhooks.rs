//! Stripe webhook endpoint: the settlement ingestor's HTTP surface.
//!
//! Response contract: 200 for handled and idempotent no-op deliveries,
//! 400 for signature/payload validation failures (the processor will not
//! usefully retry those), 500 for transient storage failures (prompting
//! processor redelivery).

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use crate::db::{queries, AppState};
use crate::models::{Invoice, InvoiceStatus, PaymentStatus};
use crate::payments::{StripeCheckoutSession, StripeWebhookEvent};
use crate::payouts;
use crate::settlement::{self, SettlementOutcome};

/// Result type for webhook operations.
pub type WebhookResult = (StatusCode, &'static str);

const PROVIDER: &str = "stripe";

pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResult {
    let signature = match extract_signature(&headers) {
        Ok(s) => s,
        Err(e) => return e,
    };

    match state.stripe.verify_webhook_signature(&body, &signature) {
        Ok(true) => {}
        Ok(false) => return (StatusCode::BAD_REQUEST, "Invalid signature"),
        Err(e) => {
            tracing::warn!("Signature verification rejected: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid signature");
        }
    }

    let event: StripeWebhookEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to parse Stripe webhook: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid JSON");
        }
    };

    match event.event_type.as_str() {
        "checkout.session.completed" => handle_checkout_completed(&state, &event)
            .await
            .unwrap_or_else(|e| e),
        // Failure and unrelated events are acknowledged and ignored; the
        // invoice stays pending.
        _ => (StatusCode::OK, "Event ignored"),
    }
}

fn extract_signature(headers: &HeaderMap) -> Result<String, WebhookResult> {
    headers
        .get("stripe-signature")
        .ok_or((StatusCode::BAD_REQUEST, "Missing stripe-signature header"))?
        .to_str()
        .map(|s| s.to_string())
        .map_err(|e| {
            tracing::debug!("Invalid UTF-8 in Stripe signature header: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid signature header")
        })
}

async fn handle_checkout_completed(
    state: &AppState,
    event: &StripeWebhookEvent,
) -> Result<WebhookResult, WebhookResult> {
    let session: StripeCheckoutSession = serde_json::from_value(event.data.object.clone())
        .map_err(|e| {
            tracing::error!("Failed to parse checkout session: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid checkout session")
        })?;

    if session.payment_status != "paid" {
        return Ok((StatusCode::OK, "Session not paid"));
    }

    let Some(invoice_id) = session.metadata.invoice_id.clone() else {
        // Not one of ours; acknowledge so the processor stops redelivering.
        return Ok((StatusCode::OK, "No invoice reference"));
    };

    let mut conn = state.db.get().map_err(|e| {
        tracing::error!("DB connection error: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
    })?;

    let invoice = match queries::get_invoice_by_id(&conn, &invoice_id) {
        Ok(Some(i)) => i,
        Ok(None) => {
            tracing::warn!("Settlement for unknown invoice: {}", invoice_id);
            return Ok((StatusCode::OK, "Unknown invoice"));
        }
        Err(e) => {
            tracing::error!("DB error: {}", e);
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Database error"));
        }
    };

    let outcome = settlement::settle_invoice(
        &mut conn,
        &invoice.id,
        PROVIDER,
        &event.id,
        session.payment_intent.as_deref(),
    )
    .map_err(|e| {
        // Surfaced as retriable: the processor's redelivery re-attempts
        // the (idempotent) settlement.
        tracing::error!("Settlement failed for invoice {}: {}", invoice.id, e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Settlement failed")
    })?;

    // Sub-invoices follow the parent on every delivery: a redelivery after
    // a partial write repairs the children and is otherwise a no-op.
    settlement::complete_settlement(&conn, &invoice.id).map_err(|e| {
        tracing::error!("Sub-invoice update failed for invoice {}: {}", invoice.id, e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Settlement failed")
    })?;

    match outcome {
        SettlementOutcome::AlreadyProcessed => Ok((StatusCode::OK, "Already processed")),
        SettlementOutcome::Settled => {
            // Collective invoices fan out into per-member payouts.
            // Distribution outcomes are recorded per member and never fail
            // the webhook response; retries go through the retry endpoint.
            if invoice.collective_id.is_some() {
                let shares = queries::list_shares_for_invoice(&conn, &invoice.id).map_err(|e| {
                    tracing::error!("DB error loading shares: {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
                })?;

                if !shares.is_empty() {
                    let paid_invoice = Invoice {
                        status: InvoiceStatus::Paid,
                        payment_status: PaymentStatus::Paid,
                        ..invoice.clone()
                    };
                    match payouts::distribute(
                        &mut conn,
                        &state.stripe,
                        &state.notifier,
                        state.transfer_timeout,
                        &paid_invoice,
                        &shares,
                    )
                    .await
                    {
                        Ok(summary) => {
                            tracing::info!(
                                "Distribution for invoice {}: {} completed, {} failed, {} skipped",
                                invoice.id,
                                summary.completed,
                                summary.failed,
                                summary.skipped
                            );
                        }
                        Err(e) => {
                            // Ledger store failure mid-fan-out; already
                            // written outcomes stand, the rest is retried
                            // via the retry endpoint.
                            tracing::error!(
                                "Distribution aborted for invoice {}: {}",
                                invoice.id,
                                e
                            );
                        }
                    }
                }
            }

            Ok((StatusCode::OK, "OK"))
        }
    }
}
