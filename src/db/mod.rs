mod from_row;
pub mod queries;
mod schema;

pub use schema::init_db;

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::notify::Notifier;
use crate::payments::StripeClient;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state holding the ledger pool and explicitly constructed
/// collaborators (no process-wide singletons).
#[derive(Clone)]
pub struct AppState {
    /// Ledger store pool (users, invoices, shares, sub-invoices, payouts).
    pub db: DbPool,
    /// Payment processor client (signature verification + transfers).
    pub stripe: StripeClient,
    /// Sink for terminal payout failure events.
    pub notifier: Notifier,
    /// Per-transfer timeout budget for the distribution engine.
    pub transfer_timeout: Duration,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
