//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupt data.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str = "id, email, name, payout_account_id, created_at, updated_at";

pub const COLLECTIVE_COLS: &str = "id, name, created_at";

pub const INVOICE_COLS: &str = "id, issuer_id, collective_id, total_cents, currency, status, payment_status, payment_reference, created_at, updated_at";

pub const INVOICE_SHARE_COLS: &str = "id, invoice_id, user_id, amount_cents, created_at";

pub const SUB_INVOICE_COLS: &str = "id, parent_invoice_id, issuer_id, receiver_id, amount_cents, currency, status, payment_status, created_at, updated_at";

pub const PAYOUT_COLS: &str = "id, invoice_id, user_id, amount_cents, currency, status, transfer_reference, error, attempt_count, created_at, updated_at, completed_at";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            payout_account_id: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl FromRow for Collective {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Collective {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
        })
    }
}

impl FromRow for Invoice {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Invoice {
            id: row.get(0)?,
            issuer_id: row.get(1)?,
            collective_id: row.get(2)?,
            total_cents: row.get(3)?,
            currency: row.get(4)?,
            status: parse_enum(row, 5, "status")?,
            payment_status: parse_enum(row, 6, "payment_status")?,
            payment_reference: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl FromRow for InvoiceShare {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(InvoiceShare {
            id: row.get(0)?,
            invoice_id: row.get(1)?,
            user_id: row.get(2)?,
            amount_cents: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl FromRow for SubInvoice {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(SubInvoice {
            id: row.get(0)?,
            parent_invoice_id: row.get(1)?,
            issuer_id: row.get(2)?,
            receiver_id: row.get(3)?,
            amount_cents: row.get(4)?,
            currency: row.get(5)?,
            status: parse_enum(row, 6, "status")?,
            payment_status: parse_enum(row, 7, "payment_status")?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl FromRow for CollectivePayout {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(CollectivePayout {
            id: row.get(0)?,
            invoice_id: row.get(1)?,
            user_id: row.get(2)?,
            amount_cents: row.get(3)?,
            currency: row.get(4)?,
            status: parse_enum(row, 5, "status")?,
            transfer_reference: row.get(6)?,
            error: row.get(7)?,
            attempt_count: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
            completed_at: row.get(11)?,
        })
    }
}
