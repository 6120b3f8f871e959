use serde::{Deserialize, Serialize};

/// A group of members who jointly issue invoices and split proceeds.
/// Membership is declared per-invoice through shares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collective {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateCollective {
    pub name: String,
}
