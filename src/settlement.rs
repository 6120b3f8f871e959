//! Settlement core: drives an invoice through its payment state machine in
//! response to processor notifications.
//!
//! Processors deliver at least once, so settling must be idempotent. Two
//! guards stack up inside one SQLite transaction: the event replay ledger
//! (per event id) and the monotonic paid-flip on the invoice itself (per
//! invoice). A redelivery trips either guard and becomes an observable
//! no-op instead of a duplicate transition.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::Result;

/// Outcome of applying one settlement notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// The invoice transitioned pending -> paid in this call.
    Settled,
    /// The event or the transition was already applied; nothing changed.
    AlreadyProcessed,
}

/// Apply a "payment succeeded" notification to an invoice.
///
/// Records the event id and flips the invoice to paid atomically. Returns
/// `AlreadyProcessed` without committing when either guard trips, so a
/// redelivered notification leaves the ledger untouched.
///
/// Child sub-invoices are intentionally NOT updated here: parent and
/// children are coupled through two sequential idempotent operations (see
/// `complete_settlement`), not one cross-aggregate transaction. A partial
/// write is a transient inconsistency repaired by the processor's
/// redelivery, which re-runs the child update.
pub fn settle_invoice(
    conn: &mut Connection,
    invoice_id: &str,
    provider: &str,
    event_id: &str,
    payment_reference: Option<&str>,
) -> Result<SettlementOutcome> {
    let tx = conn.transaction()?;

    if !queries::try_record_webhook_event(&tx, provider, event_id)? {
        // Dropped transaction rolls back; the original recording stands.
        return Ok(SettlementOutcome::AlreadyProcessed);
    }

    if !queries::mark_invoice_paid(&tx, invoice_id, payment_reference)? {
        // Same invoice settled under a different event id (processor
        // redelivery with a fresh id). Do not commit: the paid state and
        // the original event record already cover us.
        return Ok(SettlementOutcome::AlreadyProcessed);
    }

    tx.commit()?;

    tracing::info!(
        "Invoice {} settled (event {}, reference {:?})",
        invoice_id,
        event_id,
        payment_reference
    );

    Ok(SettlementOutcome::Settled)
}

/// Bring the invoice's children in line with its paid state: generate any
/// missing sub-invoices (they mirror the now-paid parent) and bulk-update
/// the rest to paid.
///
/// Safe to call on every delivery, including redeliveries: both steps are
/// idempotent and touch nothing that is already paid. This is what turns
/// "partial write then crash" into a self-healing state.
pub fn complete_settlement(conn: &Connection, invoice_id: &str) -> Result<()> {
    let generation = crate::billing::generate_sub_invoices(conn, invoice_id)?;
    let updated = queries::mark_sub_invoices_paid(conn, invoice_id)?;

    if updated > 0 || !generation.is_noop() {
        tracing::info!(
            "Invoice {}: {} sub-invoice(s) marked paid ({} generated during settlement)",
            invoice_id,
            updated,
            generation.created.len()
        );
    }

    Ok(())
}
