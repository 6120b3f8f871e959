//! Payment processor integration.
//!
//! The core calls the processor through two narrow capabilities: webhook
//! signature verification and transfer creation. The transfer side is a
//! trait so the distribution engine can be exercised against a test double.

mod stripe;

pub use stripe::{
    StripeCheckoutSession, StripeClient, StripeEventData, StripeMetadata, StripeWebhookEvent,
};

use std::future::Future;

use crate::error::Result;

/// A request to move one member's share to their connected account.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Destination connected account (acct_xxx).
    pub destination_account: String,
    pub amount_cents: i64,
    pub currency: String,
    /// CollectivePayout id, attached as metadata for traceability.
    pub payout_id: String,
    pub invoice_id: String,
}

/// Transfer capability of the payment processor. Implementations return
/// the processor's transfer reference on success.
pub trait TransferGateway: Send + Sync {
    fn create_transfer(
        &self,
        request: TransferRequest,
    ) -> impl Future<Output = Result<String>> + Send;
}
