use serde::{Deserialize, Serialize};

/// An issued financial document. Owned by its issuing user; the total is
/// immutable after creation. Payment state only moves forward
/// (pending -> paid, never back).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub issuer_id: String,
    /// Set when the invoice is issued on behalf of a collective. Only
    /// collective invoices trigger payout distribution on settlement.
    pub collective_id: Option<String>,
    pub total_cents: i64,
    /// ISO 4217 currency code, lowercase (e.g. "eur").
    pub currency: String,
    pub status: InvoiceStatus,
    pub payment_status: PaymentStatus,
    /// Processor payment reference (Stripe payment intent), recorded at
    /// settlement time.
    pub payment_reference: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Declares that a member is owed a portion of an invoice's total.
/// Immutable once the invoice exists; the sum of all shares for one
/// invoice equals the invoice total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceShare {
    pub id: String,
    pub invoice_id: String,
    pub user_id: String,
    pub amount_cents: i64,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoice {
    pub issuer_id: String,
    pub collective_id: Option<String>,
    pub total_cents: i64,
    pub currency: String,
    pub shares: Vec<CreateShare>,
}

#[derive(Debug, Deserialize)]
pub struct CreateShare {
    pub user_id: String,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
        }
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "sent" => Ok(InvoiceStatus::Sent),
            "paid" => Ok(InvoiceStatus::Paid),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
