pub mod collectives;
pub mod invoices;
pub mod users;
pub mod webhooks;

use axum::routing::{get, post, put};
use axum::Router;

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhooks/stripe", post(webhooks::handle_stripe_webhook))
        .route("/users", post(users::create_user))
        .route(
            "/users/{id}/payout-account",
            put(users::connect_payout_account),
        )
        .route("/collectives", post(collectives::create_collective))
        .route("/invoices", post(invoices::create_invoice))
        .route("/invoices/{id}", get(invoices::get_invoice))
        .route(
            "/invoices/{id}/sub-invoices",
            post(invoices::generate_sub_invoices),
        )
        .route("/invoices/{id}/payouts", get(invoices::list_payouts))
        .route(
            "/invoices/{id}/payouts/retry",
            post(invoices::retry_payouts),
        )
}
