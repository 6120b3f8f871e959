use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;
use crate::shares;

use super::from_row::{
    query_all, query_one, FromRow, COLLECTIVE_COLS, INVOICE_COLS, INVOICE_SHARE_COLS, PAYOUT_COLS,
    SUB_INVOICE_COLS, USER_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

// ============ Users ============

pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<User> {
    let id = gen_id();
    let now = now();
    let email = input.email.trim().to_lowercase();

    conn.execute(
        "INSERT INTO users (id, email, name, payout_account_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![&id, &email, &input.name, &input.payout_account_id, now, now],
    )?;

    Ok(User {
        id,
        email,
        name: input.name.clone(),
        payout_account_id: input.payout_account_id.clone(),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

/// Connect or disconnect a member's payout account. Returns false if the
/// user does not exist.
pub fn set_user_payout_account(
    conn: &Connection,
    user_id: &str,
    payout_account_id: Option<&str>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE users SET payout_account_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![payout_account_id, now(), user_id],
    )?;
    Ok(affected > 0)
}

// ============ Collectives ============

pub fn create_collective(conn: &Connection, input: &CreateCollective) -> Result<Collective> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO collectives (id, name, created_at) VALUES (?1, ?2, ?3)",
        params![&id, &input.name, now],
    )?;

    Ok(Collective {
        id,
        name: input.name.clone(),
        created_at: now,
    })
}

pub fn get_collective_by_id(conn: &Connection, id: &str) -> Result<Option<Collective>> {
    query_one(
        conn,
        &format!("SELECT {} FROM collectives WHERE id = ?1", COLLECTIVE_COLS),
        &[&id],
    )
}

// ============ Invoices ============

/// Create an invoice together with its shares in one transaction.
///
/// The share sum is verified against the total before anything is written,
/// so a misdeclared split can never reach the ledger.
pub fn create_invoice_with_shares(conn: &mut Connection, input: &CreateInvoice) -> Result<Invoice> {
    let declared: Vec<(String, i64)> = input
        .shares
        .iter()
        .map(|s| (s.user_id.clone(), s.amount_cents))
        .collect();
    shares::verify_shares(input.total_cents, &declared)?;

    let id = gen_id();
    let now = now();
    let currency = input.currency.trim().to_lowercase();

    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO invoices (id, issuer_id, collective_id, total_cents, currency,
                               status, payment_status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'sent', 'pending', ?6, ?7)",
        params![
            &id,
            &input.issuer_id,
            &input.collective_id,
            input.total_cents,
            &currency,
            now,
            now
        ],
    )?;

    for share in &input.shares {
        tx.execute(
            "INSERT INTO invoice_shares (id, invoice_id, user_id, amount_cents, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![gen_id(), &id, &share.user_id, share.amount_cents, now],
        )?;
    }

    tx.commit()?;

    Ok(Invoice {
        id,
        issuer_id: input.issuer_id.clone(),
        collective_id: input.collective_id.clone(),
        total_cents: input.total_cents,
        currency,
        status: InvoiceStatus::Sent,
        payment_status: PaymentStatus::Pending,
        payment_reference: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_invoice_by_id(conn: &Connection, id: &str) -> Result<Option<Invoice>> {
    query_one(
        conn,
        &format!("SELECT {} FROM invoices WHERE id = ?1", INVOICE_COLS),
        &[&id],
    )
}

/// Flip an invoice to paid, recording the processor payment reference.
///
/// Guarded by `payment_status != 'paid'` so the transition is monotonic:
/// a redelivered notification matches zero rows and returns false instead
/// of re-applying the transition.
pub fn mark_invoice_paid(
    conn: &Connection,
    invoice_id: &str,
    payment_reference: Option<&str>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE invoices
         SET status = 'paid', payment_status = 'paid', payment_reference = ?1, updated_at = ?2
         WHERE id = ?3 AND payment_status != 'paid'",
        params![payment_reference, now(), invoice_id],
    )?;
    Ok(affected > 0)
}

// ============ Shares ============

pub fn list_shares_for_invoice(conn: &Connection, invoice_id: &str) -> Result<Vec<InvoiceShare>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM invoice_shares WHERE invoice_id = ?1 ORDER BY created_at",
            INVOICE_SHARE_COLS
        ),
        &[&invoice_id],
    )
}

// ============ Sub-invoices ============

/// Insert a sub-invoice for a (parent, receiver) pair, mirroring the
/// parent's current state. Returns None when the pair already has one
/// (the unique index absorbs the conflict).
pub fn create_sub_invoice(
    conn: &Connection,
    invoice: &Invoice,
    receiver_id: &str,
    amount_cents: i64,
) -> Result<Option<SubInvoice>> {
    let id = gen_id();
    let now = now();

    let affected = conn.execute(
        "INSERT OR IGNORE INTO sub_invoices
         (id, parent_invoice_id, issuer_id, receiver_id, amount_cents, currency,
          status, payment_status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            &id,
            &invoice.id,
            &invoice.issuer_id,
            receiver_id,
            amount_cents,
            &invoice.currency,
            invoice.status.as_str(),
            invoice.payment_status.as_str(),
            now,
            now
        ],
    )?;

    if affected == 0 {
        return Ok(None);
    }

    Ok(Some(SubInvoice {
        id,
        parent_invoice_id: invoice.id.clone(),
        issuer_id: invoice.issuer_id.clone(),
        receiver_id: receiver_id.to_string(),
        amount_cents,
        currency: invoice.currency.clone(),
        status: invoice.status,
        payment_status: invoice.payment_status,
        created_at: now,
        updated_at: now,
    }))
}

pub fn list_sub_invoices_for_invoice(
    conn: &Connection,
    invoice_id: &str,
) -> Result<Vec<SubInvoice>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM sub_invoices WHERE parent_invoice_id = ?1 ORDER BY created_at",
            SUB_INVOICE_COLS
        ),
        &[&invoice_id],
    )
}

/// Bulk-update all of an invoice's sub-invoices to paid, in lockstep with
/// the parent. Idempotent: already-paid rows are not touched, so a
/// redelivered settlement observes zero affected rows.
pub fn mark_sub_invoices_paid(conn: &Connection, invoice_id: &str) -> Result<usize> {
    let affected = conn.execute(
        "UPDATE sub_invoices
         SET status = 'paid', payment_status = 'paid', updated_at = ?1
         WHERE parent_invoice_id = ?2 AND payment_status != 'paid'",
        params![now(), invoice_id],
    )?;
    Ok(affected)
}

// ============ Payouts ============

pub fn get_payout(
    conn: &Connection,
    invoice_id: &str,
    user_id: &str,
) -> Result<Option<CollectivePayout>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM collective_payouts WHERE invoice_id = ?1 AND user_id = ?2",
            PAYOUT_COLS
        ),
        &[&invoice_id, &user_id],
    )
}

pub fn list_payouts_for_invoice(
    conn: &Connection,
    invoice_id: &str,
) -> Result<Vec<CollectivePayout>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM collective_payouts WHERE invoice_id = ?1 ORDER BY created_at",
            PAYOUT_COLS
        ),
        &[&invoice_id],
    )
}

/// Upsert a payout on its (invoice_id, user_id) natural key and move it to
/// the given status, incrementing the attempt count.
///
/// This is the single write path for starting or re-starting a payout
/// attempt: a retry after a failure mutates the existing row instead of
/// inserting a duplicate, which is what makes re-running distribution safe.
fn upsert_payout(
    conn: &Connection,
    invoice_id: &str,
    user_id: &str,
    amount_cents: i64,
    currency: &str,
    status: PayoutStatus,
    error: Option<&str>,
) -> Result<CollectivePayout> {
    let now = now();
    conn.query_row(
        &format!(
            "INSERT INTO collective_payouts
             (id, invoice_id, user_id, amount_cents, currency, status, error,
              attempt_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)
             ON CONFLICT(invoice_id, user_id) DO UPDATE SET
                 status = excluded.status,
                 error = excluded.error,
                 attempt_count = attempt_count + 1,
                 updated_at = excluded.updated_at
             RETURNING {}",
            PAYOUT_COLS
        ),
        params![
            gen_id(),
            invoice_id,
            user_id,
            amount_cents,
            currency,
            status.as_str(),
            error,
            now
        ],
        CollectivePayout::from_row,
    )
    .map_err(Into::into)
}

/// Begin (or re-begin) a payout attempt: status moves to `processing`.
pub fn upsert_payout_processing(
    conn: &Connection,
    invoice_id: &str,
    user_id: &str,
    amount_cents: i64,
    currency: &str,
) -> Result<CollectivePayout> {
    upsert_payout(
        conn,
        invoice_id,
        user_id,
        amount_cents,
        currency,
        PayoutStatus::Processing,
        None,
    )
}

/// Record a terminal failure for a member without going through
/// `processing` (e.g. no connected payout account - no transfer is issued).
pub fn upsert_payout_failed(
    conn: &Connection,
    invoice_id: &str,
    user_id: &str,
    amount_cents: i64,
    currency: &str,
    error: &str,
) -> Result<CollectivePayout> {
    upsert_payout(
        conn,
        invoice_id,
        user_id,
        amount_cents,
        currency,
        PayoutStatus::Failed,
        Some(error),
    )
}

/// Complete a payout after a successful transfer. Guarded on
/// status = 'processing' so a stale writer cannot clobber a terminal state.
pub fn mark_payout_completed(
    conn: &Connection,
    payout_id: &str,
    transfer_reference: &str,
) -> Result<bool> {
    let now = now();
    let affected = conn.execute(
        "UPDATE collective_payouts
         SET status = 'completed', transfer_reference = ?1, error = NULL,
             updated_at = ?2, completed_at = ?2
         WHERE id = ?3 AND status = 'processing'",
        params![transfer_reference, now, payout_id],
    )?;
    Ok(affected > 0)
}

/// Fail a payout attempt, keeping the error for diagnosis. The row stays
/// in place for a later retry pass.
pub fn mark_payout_failed(conn: &Connection, payout_id: &str, error: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE collective_payouts
         SET status = 'failed', error = ?1, updated_at = ?2
         WHERE id = ?3 AND status = 'processing'",
        params![error, now(), payout_id],
    )?;
    Ok(affected > 0)
}

/// Re-mark payouts stuck in `processing` since before `cutoff` as failed.
///
/// A payout left `processing` by a crash must never be assumed completed;
/// failing it routes the member through the normal retry path. Returns the
/// affected rows so the caller can emit notifications.
pub fn fail_stale_processing_payouts(
    conn: &Connection,
    cutoff: i64,
) -> Result<Vec<CollectivePayout>> {
    let now = now();
    let mut stmt = conn.prepare(&format!(
        "UPDATE collective_payouts
         SET status = 'failed', error = ?1, updated_at = ?2
         WHERE status = 'processing' AND updated_at < ?3
         RETURNING {}",
        PAYOUT_COLS
    ))?;
    let rows = stmt
        .query_map(
            params![STALE_PROCESSING, now, cutoff],
            CollectivePayout::from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ Webhook events ============

/// Record a processor event id, returning false if it was seen before.
/// Processors deliver at least once; this is the replay guard.
pub fn try_record_webhook_event(conn: &Connection, provider: &str, event_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO webhook_events (provider, event_id, received_at)
         VALUES (?1, ?2, ?3)",
        params![provider, event_id, now()],
    )?;
    Ok(affected > 0)
}

/// Look up whether an event id has been recorded (used by tests and
/// diagnostics, the hot path uses `try_record_webhook_event`).
pub fn webhook_event_seen(conn: &Connection, provider: &str, event_id: &str) -> Result<bool> {
    let seen: Option<i64> = conn
        .query_row(
            "SELECT received_at FROM webhook_events WHERE provider = ?1 AND event_id = ?2",
            params![provider, event_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(seen.is_some())
}
