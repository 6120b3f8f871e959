//! Sub-invoice generation: derives one member-facing billing record per
//! non-issuer share of a collective invoice.
//!
//! Generation is idempotent under repeated and concurrent invocation - it
//! runs both explicitly (REST endpoint) and implicitly during settlement,
//! and the unique (parent, receiver) index absorbs any race between the two.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::SubInvoiceGeneration;
use crate::shares;

/// Generate sub-invoices for every share of `invoice_id` whose member is
/// not the issuer and is not already billed. Each new sub-invoice mirrors
/// the parent's current status, so generation during settlement produces
/// already-paid records.
///
/// The loaded shares are re-verified against the invoice total before any
/// record is created; a share set that no longer conserves the total fails
/// with `ShareMismatch` instead of billing misallocated amounts.
pub fn generate_sub_invoices(conn: &Connection, invoice_id: &str) -> Result<SubInvoiceGeneration> {
    let invoice = queries::get_invoice_by_id(conn, invoice_id)?
        .ok_or_else(|| AppError::NotFound(format!("Invoice {}", invoice_id)))?;

    let share_rows = queries::list_shares_for_invoice(conn, invoice_id)?;
    let owed = shares::owed_amounts(invoice.total_cents, &share_rows)?;

    let mut created = Vec::new();
    let mut existing = 0;

    for entry in &owed {
        if entry.user_id == invoice.issuer_id {
            continue;
        }
        match queries::create_sub_invoice(conn, &invoice, &entry.user_id, entry.amount_cents)? {
            Some(sub_invoice) => created.push(sub_invoice),
            None => existing += 1,
        }
    }

    if !created.is_empty() {
        tracing::info!(
            "Generated {} sub-invoice(s) for invoice {} ({} already billed)",
            created.len(),
            invoice_id,
            existing
        );
    }

    Ok(SubInvoiceGeneration { created, existing })
}
