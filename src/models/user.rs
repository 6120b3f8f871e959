use serde::{Deserialize, Serialize};

/// Payout-relevant projection of a member. A member with no connected
/// payout account cannot receive a transfer; that is a terminal condition
/// recorded on the payout record, not an exception.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    /// Connected payout account reference (Stripe acct_xxx), if onboarded.
    pub payout_account_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub name: String,
    pub payout_account_id: Option<String>,
}

/// Body for connecting (or disconnecting) a member's payout account.
#[derive(Debug, Deserialize)]
pub struct ConnectPayoutAccount {
    pub payout_account_id: Option<String>,
}
