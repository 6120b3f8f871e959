use serde::{Deserialize, Serialize};

use super::{InvoiceStatus, PaymentStatus};

/// A member-facing billing record derived from their share of a collective
/// invoice. One per non-issuer member with a share, uniquely keyed by
/// (parent_invoice_id, receiver_id). Paid in lockstep with the parent
/// invoice, never independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubInvoice {
    pub id: String,
    pub parent_invoice_id: String,
    /// The collective invoice's owner.
    pub issuer_id: String,
    /// The member this sub-invoice bills for.
    pub receiver_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: InvoiceStatus,
    pub payment_status: PaymentStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Outcome of a sub-invoice generation pass. `created` is empty when every
/// eligible member was already billed, letting callers short-circuit
/// (200 instead of 201).
#[derive(Debug, Serialize)]
pub struct SubInvoiceGeneration {
    pub created: Vec<SubInvoice>,
    /// Number of eligible members that already had a sub-invoice.
    pub existing: usize,
}

impl SubInvoiceGeneration {
    pub fn is_noop(&self) -> bool {
        self.created.is_empty()
    }
}
