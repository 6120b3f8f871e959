use serde::{Deserialize, Serialize};

/// Terminal, non-retriable failure reason for members who never completed
/// payout onboarding. Matched by dashboards and the remediation flow.
pub const NO_PAYOUT_ACCOUNT: &str = "no connected payout account";

/// Reason recorded by the reconciliation task when a payout was left
/// `processing` by a crash and its transfer outcome is unknown.
pub const STALE_PROCESSING: &str = "transfer outcome unknown (stale processing)";

/// The durable record of one attempt to pay one member their share of a
/// settled invoice. At most one logical payout exists per
/// (invoice_id, user_id); retries increment `attempt_count` and overwrite
/// `status` rather than creating a second record. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectivePayout {
    pub id: String,
    pub invoice_id: String,
    pub user_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PayoutStatus,
    /// Processor transfer reference (tr_xxx), set on completion.
    pub transfer_reference: Option<String>,
    pub error: Option<String>,
    pub attempt_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Processing => "processing",
            PayoutStatus::Completed => "completed",
            PayoutStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for PayoutStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PayoutStatus::Pending),
            "processing" => Ok(PayoutStatus::Processing),
            "completed" => Ok(PayoutStatus::Completed),
            "failed" => Ok(PayoutStatus::Failed),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate outcome of one distribution pass over an invoice's shares.
#[derive(Debug, Default, Serialize)]
pub struct DistributionSummary {
    pub completed: usize,
    pub failed: usize,
    /// Members skipped because their payout was already completed.
    pub skipped: usize,
}
