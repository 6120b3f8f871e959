use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::billing;
use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::models::{
    CollectivePayout, CreateInvoice, DistributionSummary, Invoice, InvoiceShare, PaymentStatus,
    SubInvoice, SubInvoiceGeneration,
};
use crate::payouts;

#[derive(Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub shares: Vec<InvoiceShare>,
    pub sub_invoices: Vec<SubInvoice>,
}

/// Create an invoice with its declared shares. A share set that does not
/// sum to the total is rejected here, before anything reaches the ledger.
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(input): Json<CreateInvoice>,
) -> Result<(StatusCode, Json<Invoice>)> {
    if input.total_cents <= 0 {
        return Err(AppError::BadRequest("Invoice total must be positive".into()));
    }

    let mut conn = state.db.get()?;
    let invoice = queries::create_invoice_with_shares(&mut conn, &input)?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<InvoiceDetail>> {
    let conn = state.db.get()?;

    let invoice = queries::get_invoice_by_id(&conn, &invoice_id)?
        .ok_or_else(|| AppError::NotFound(format!("Invoice {}", invoice_id)))?;
    let shares = queries::list_shares_for_invoice(&conn, &invoice_id)?;
    let sub_invoices = queries::list_sub_invoices_for_invoice(&conn, &invoice_id)?;

    Ok(Json(InvoiceDetail {
        invoice,
        shares,
        sub_invoices,
    }))
}

/// Explicit sub-invoice generation. 201 when at least one record was
/// created, 200 when every eligible member was already billed.
pub async fn generate_sub_invoices(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<(StatusCode, Json<SubInvoiceGeneration>)> {
    let conn = state.db.get()?;
    let generation = billing::generate_sub_invoices(&conn, &invoice_id)?;

    let status = if generation.is_noop() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((status, Json(generation)))
}

/// Per-member payout records for an invoice. Dashboards query these
/// directly: failures show up as actionable, retriable states.
pub async fn list_payouts(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<Vec<CollectivePayout>>> {
    let conn = state.db.get()?;

    if queries::get_invoice_by_id(&conn, &invoice_id)?.is_none() {
        return Err(AppError::NotFound(format!("Invoice {}", invoice_id)));
    }

    let payouts = queries::list_payouts_for_invoice(&conn, &invoice_id)?;
    Ok(Json(payouts))
}

/// Re-run distribution for a paid invoice. Completed members are skipped;
/// only failed/pending ones are re-attempted, so this is safe to call
/// after a partial failure or after a member finishes payout onboarding.
pub async fn retry_payouts(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<DistributionSummary>> {
    let mut conn = state.db.get()?;

    let invoice = queries::get_invoice_by_id(&conn, &invoice_id)?
        .ok_or_else(|| AppError::NotFound(format!("Invoice {}", invoice_id)))?;

    if invoice.payment_status != PaymentStatus::Paid {
        return Err(AppError::Conflict(
            "Invoice is not paid; payouts can only be distributed after settlement".into(),
        ));
    }

    let shares = queries::list_shares_for_invoice(&conn, &invoice_id)?;
    if shares.is_empty() {
        return Err(AppError::Conflict("Invoice has no shares to distribute".into()));
    }

    let summary = payouts::distribute(
        &mut conn,
        &state.stripe,
        &state.notifier,
        state.transfer_timeout,
        &invoice,
        &shares,
    )
    .await?;

    Ok(Json(summary))
}
