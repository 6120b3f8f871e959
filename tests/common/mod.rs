//! Test utilities and fixtures for Splitfact integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub use splitfact::db::{init_db, queries, AppState};
pub use splitfact::error::AppError;
pub use splitfact::models::*;
pub use splitfact::notify::Notifier;
pub use splitfact::payments::{StripeClient, TransferGateway, TransferRequest};

/// Webhook signing secret used by the test AppState.
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create an AppState over a single-connection in-memory pool, for driving
/// handlers end to end. The notifier is disabled and the Stripe client uses
/// test credentials (signature verification works, transfers would not).
pub fn create_test_app_state() -> AppState {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    AppState {
        db: pool,
        stripe: StripeClient::new("sk_test_xxx", TEST_WEBHOOK_SECRET),
        notifier: Notifier::disabled(),
        transfer_timeout: Duration::from_secs(5),
    }
}

pub fn create_test_user(conn: &Connection, email: &str, payout_account: Option<&str>) -> User {
    let input = CreateUser {
        email: email.to_string(),
        name: format!("Test User {}", email),
        payout_account_id: payout_account.map(|s| s.to_string()),
    };
    queries::create_user(conn, &input).expect("Failed to create test user")
}

pub fn create_test_collective(conn: &Connection, name: &str) -> Collective {
    let input = CreateCollective {
        name: name.to_string(),
    };
    queries::create_collective(conn, &input).expect("Failed to create test collective")
}

/// Create an invoice with declared shares. Shares are (user_id, cents)
/// pairs and must sum to `total_cents`.
pub fn create_test_invoice(
    conn: &mut Connection,
    issuer_id: &str,
    collective_id: Option<&str>,
    total_cents: i64,
    shares: &[(&str, i64)],
) -> Invoice {
    let input = CreateInvoice {
        issuer_id: issuer_id.to_string(),
        collective_id: collective_id.map(|s| s.to_string()),
        total_cents,
        currency: "eur".to_string(),
        shares: shares
            .iter()
            .map(|(user_id, amount_cents)| CreateShare {
                user_id: user_id.to_string(),
                amount_cents: *amount_cents,
            })
            .collect(),
    };
    queries::create_invoice_with_shares(conn, &input).expect("Failed to create test invoice")
}

/// Test double for the processor's transfer capability. Records every
/// issued transfer and can be told to reject specific destination accounts.
pub struct MockGateway {
    transfers: Mutex<Vec<TransferRequest>>,
    fail_accounts: Mutex<HashSet<String>>,
    counter: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            transfers: Mutex::new(Vec::new()),
            fail_accounts: Mutex::new(HashSet::new()),
            counter: AtomicUsize::new(0),
        }
    }

    /// Make transfers to this destination account fail.
    pub fn fail_account(&self, account: &str) {
        self.fail_accounts.lock().unwrap().insert(account.to_string());
    }

    /// Number of transfers that were actually issued (successful calls).
    pub fn transfer_count(&self) -> usize {
        self.transfers.lock().unwrap().len()
    }

    /// Destination accounts of issued transfers, in call order.
    pub fn destinations(&self) -> Vec<String> {
        self.transfers
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.destination_account.clone())
            .collect()
    }
}

impl TransferGateway for MockGateway {
    fn create_transfer(
        &self,
        request: TransferRequest,
    ) -> impl Future<Output = splitfact::error::Result<String>> + Send {
        let should_fail = self
            .fail_accounts
            .lock()
            .unwrap()
            .contains(&request.destination_account);

        let reference = if should_fail {
            None
        } else {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            self.transfers.lock().unwrap().push(request);
            Some(format!("tr_test_{}", n))
        };

        async move {
            match reference {
                Some(r) => Ok(r),
                None => Err(AppError::Transfer("insufficient balance".into())),
            }
        }
    }
}
