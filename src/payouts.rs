//! Payout distribution engine: fans one settled collective invoice out into
//! per-member transfers.
//!
//! Members are processed sequentially per invoice and fully independently:
//! one member's failure never blocks another's payout, and every outcome is
//! durably recorded on its (invoice, member) payout row before and after
//! the transfer call. Re-running distribution re-attempts only members that
//! have not completed - the natural-key upsert makes a duplicate completed
//! transfer impossible.

use std::time::Duration;

use chrono::Utc;
use rusqlite::Connection;

use crate::db::{queries, AppState};
use crate::error::Result;
use crate::models::{
    CollectivePayout, DistributionSummary, Invoice, InvoiceShare, PayoutStatus, NO_PAYOUT_ACCOUNT,
};
use crate::notify::{Notifier, PayoutFailedEvent};
use crate::payments::{TransferGateway, TransferRequest};

/// Distribute a settled invoice's shares to its members.
///
/// Must only be invoked for invoices confirmed paid; callers are expected
/// to have driven the settlement state machine first. The shares are
/// re-verified against the invoice total before any transfer is issued, so
/// a share set that no longer conserves the total aborts the whole pass
/// with `ShareMismatch`. For each non-issuer share the engine upserts the
/// payout to `processing`, issues the transfer under `transfer_timeout`,
/// and records the outcome. Per-member failures are captured as data and
/// never propagate past this function; only ledger store errors do.
pub async fn distribute<G: TransferGateway>(
    conn: &mut Connection,
    gateway: &G,
    notifier: &Notifier,
    transfer_timeout: Duration,
    invoice: &Invoice,
    shares: &[InvoiceShare],
) -> Result<DistributionSummary> {
    let owed = crate::shares::owed_amounts(invoice.total_cents, shares)?;

    let mut summary = DistributionSummary::default();

    for entry in &owed {
        // The issuer keeps their own cut without a transfer.
        if entry.user_id == invoice.issuer_id {
            continue;
        }

        // Never issue a second transfer for an already-completed member.
        if let Some(existing) = queries::get_payout(conn, &invoice.id, &entry.user_id)? {
            if existing.status == PayoutStatus::Completed {
                summary.skipped += 1;
                continue;
            }
        }

        let destination = match queries::get_user_by_id(conn, &entry.user_id)? {
            Some(user) => user.payout_account_id,
            None => None,
        };

        let Some(destination) = destination else {
            // Terminal business failure: recorded, notified, not retried
            // automatically. A re-run picks it up once the member has
            // completed payout onboarding.
            let payout = queries::upsert_payout_failed(
                conn,
                &invoice.id,
                &entry.user_id,
                entry.amount_cents,
                &invoice.currency,
                NO_PAYOUT_ACCOUNT,
            )?;
            tracing::warn!(
                "Payout for invoice {} member {} failed: {}",
                invoice.id,
                entry.user_id,
                NO_PAYOUT_ACCOUNT
            );
            emit_failure(notifier, &payout, NO_PAYOUT_ACCOUNT);
            summary.failed += 1;
            continue;
        };

        let payout = queries::upsert_payout_processing(
            conn,
            &invoice.id,
            &entry.user_id,
            entry.amount_cents,
            &invoice.currency,
        )?;

        let request = TransferRequest {
            destination_account: destination,
            amount_cents: entry.amount_cents,
            currency: invoice.currency.clone(),
            payout_id: payout.id.clone(),
            invoice_id: invoice.id.clone(),
        };

        let outcome = tokio::time::timeout(transfer_timeout, gateway.create_transfer(request)).await;

        match outcome {
            Ok(Ok(transfer_reference)) => {
                if queries::mark_payout_completed(conn, &payout.id, &transfer_reference)? {
                    tracing::info!(
                        "Payout {} completed: invoice {} member {} amount {} {} (transfer {})",
                        payout.id,
                        invoice.id,
                        entry.user_id,
                        entry.amount_cents,
                        invoice.currency,
                        transfer_reference
                    );
                    summary.completed += 1;
                } else {
                    // The row left `processing` while the transfer was in
                    // flight (reconciled by the stale pass). The transfer
                    // reference is logged for manual follow-up; the row's
                    // recorded state stands.
                    tracing::warn!(
                        "Payout {} no longer processing after transfer {} (invoice {}, member {})",
                        payout.id,
                        transfer_reference,
                        invoice.id,
                        entry.user_id
                    );
                    summary.failed += 1;
                }
            }
            Ok(Err(e)) => {
                let reason = e.to_string();
                if !queries::mark_payout_failed(conn, &payout.id, &reason)? {
                    tracing::warn!(
                        "Payout {} no longer processing when recording failure",
                        payout.id
                    );
                }
                tracing::warn!(
                    "Payout {} failed: invoice {} member {}: {}",
                    payout.id,
                    invoice.id,
                    entry.user_id,
                    reason
                );
                emit_failure(notifier, &payout, &reason);
                summary.failed += 1;
            }
            Err(_) => {
                // A timed-out transfer is a failure outcome, never left
                // processing indefinitely. Its true result is resolved by
                // a later retry or reconciliation, not assumed.
                let reason = format!(
                    "transfer timed out after {}s",
                    transfer_timeout.as_secs()
                );
                if !queries::mark_payout_failed(conn, &payout.id, &reason)? {
                    tracing::warn!(
                        "Payout {} no longer processing when recording timeout",
                        payout.id
                    );
                }
                tracing::warn!(
                    "Payout {} timed out: invoice {} member {}",
                    payout.id,
                    invoice.id,
                    entry.user_id
                );
                emit_failure(notifier, &payout, &reason);
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

fn emit_failure(notifier: &Notifier, payout: &CollectivePayout, reason: &str) {
    notifier.payout_failed(PayoutFailedEvent {
        invoice_id: payout.invoice_id.clone(),
        user_id: payout.user_id.clone(),
        amount_cents: payout.amount_cents,
        currency: payout.currency.clone(),
        reason: reason.to_string(),
        attempt_count: payout.attempt_count,
        timestamp: Utc::now().timestamp(),
    });
}

/// Spawn the reconciliation task for payouts stranded in `processing`.
///
/// A process crash between the processing-upsert and the outcome write
/// leaves a payout with no terminal state. On each pass, rows older than
/// `stale_after` are re-marked failed so the normal retry path picks them
/// up - a stranded payout is never assumed completed and never stuck
/// forever.
pub fn spawn_reconciliation_task(state: AppState, interval: Duration, stale_after: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            let conn = match state.db.get() {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("Failed to get db connection for reconciliation: {}", e);
                    continue;
                }
            };

            let cutoff = Utc::now().timestamp() - stale_after.as_secs() as i64;
            match queries::fail_stale_processing_payouts(&conn, cutoff) {
                Ok(stale) => {
                    for payout in &stale {
                        tracing::warn!(
                            "Reconciled stale payout {} (invoice {}, member {}): marked failed for retry",
                            payout.id,
                            payout.invoice_id,
                            payout.user_id
                        );
                        if let Some(reason) = &payout.error {
                            emit_failure(&state.notifier, payout, reason);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Payout reconciliation pass failed: {}", e);
                }
            }
        }
    });

    tracing::info!(
        "Payout reconciliation task started (every {}s, stale after {}s)",
        interval.as_secs(),
        stale_after.as_secs()
    );
}
