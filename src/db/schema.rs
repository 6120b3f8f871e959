use rusqlite::Connection;

/// Initialize the ledger schema.
///
/// The unique indexes on (parent_invoice_id, receiver_id) and
/// (invoice_id, user_id) are load-bearing: sub-invoice generation and
/// payout distribution rely on upsert-by-natural-key for idempotency.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Members (payout-relevant projection)
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            payout_account_id TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);

        -- Collectives (groups that jointly issue invoices)
        CREATE TABLE IF NOT EXISTS collectives (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        -- Invoices (total immutable after creation; payment state monotonic)
        CREATE TABLE IF NOT EXISTS invoices (
            id TEXT PRIMARY KEY,
            issuer_id TEXT NOT NULL REFERENCES users(id),
            collective_id TEXT REFERENCES collectives(id),
            total_cents INTEGER NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('draft', 'sent', 'paid')),
            payment_status TEXT NOT NULL CHECK (payment_status IN ('pending', 'paid')),
            payment_reference TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_invoices_issuer ON invoices(issuer_id);
        CREATE INDEX IF NOT EXISTS idx_invoices_collective ON invoices(collective_id);

        -- Shares (sum per invoice equals the invoice total)
        CREATE TABLE IF NOT EXISTS invoice_shares (
            id TEXT PRIMARY KEY,
            invoice_id TEXT NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id),
            amount_cents INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(invoice_id, user_id)
        );
        CREATE INDEX IF NOT EXISTS idx_invoice_shares_invoice ON invoice_shares(invoice_id);
        CREATE INDEX IF NOT EXISTS idx_invoice_shares_user ON invoice_shares(user_id);

        -- Sub-invoices (one per non-issuer member with a share)
        CREATE TABLE IF NOT EXISTS sub_invoices (
            id TEXT PRIMARY KEY,
            parent_invoice_id TEXT NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
            issuer_id TEXT NOT NULL REFERENCES users(id),
            receiver_id TEXT NOT NULL REFERENCES users(id),
            amount_cents INTEGER NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('draft', 'sent', 'paid')),
            payment_status TEXT NOT NULL CHECK (payment_status IN ('pending', 'paid')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(parent_invoice_id, receiver_id)
        );
        CREATE INDEX IF NOT EXISTS idx_sub_invoices_parent ON sub_invoices(parent_invoice_id);
        CREATE INDEX IF NOT EXISTS idx_sub_invoices_receiver ON sub_invoices(receiver_id);

        -- Payouts (at most one logical payout per invoice/member pair;
        -- retries mutate the row, they never insert a second one)
        CREATE TABLE IF NOT EXISTS collective_payouts (
            id TEXT PRIMARY KEY,
            invoice_id TEXT NOT NULL REFERENCES invoices(id),
            user_id TEXT NOT NULL REFERENCES users(id),
            amount_cents INTEGER NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending', 'processing', 'completed', 'failed')),
            transfer_reference TEXT,
            error TEXT,
            attempt_count INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            completed_at INTEGER,
            UNIQUE(invoice_id, user_id)
        );
        CREATE INDEX IF NOT EXISTS idx_payouts_invoice ON collective_payouts(invoice_id);
        CREATE INDEX IF NOT EXISTS idx_payouts_user ON collective_payouts(user_id);
        CREATE INDEX IF NOT EXISTS idx_payouts_status ON collective_payouts(status);

        -- Processor event replay ledger (at-least-once delivery dedup)
        CREATE TABLE IF NOT EXISTS webhook_events (
            provider TEXT NOT NULL,
            event_id TEXT NOT NULL,
            received_at INTEGER NOT NULL,
            PRIMARY KEY (provider, event_id)
        );
        "#,
    )
}
