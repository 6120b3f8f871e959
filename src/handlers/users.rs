use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::models::{ConnectPayoutAccount, CreateUser, User};

pub async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<CreateUser>,
) -> Result<(StatusCode, Json<User>)> {
    let conn = state.db.get()?;
    let user = queries::create_user(&conn, &input)?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Connect (or disconnect) a member's payout account. This is the
/// out-of-band remediation for payouts failed with "no connected payout
/// account": once connected, a distribution re-run picks the member up.
pub async fn connect_payout_account(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(input): Json<ConnectPayoutAccount>,
) -> Result<Json<User>> {
    let conn = state.db.get()?;

    if !queries::set_user_payout_account(&conn, &user_id, input.payout_account_id.as_deref())? {
        return Err(AppError::NotFound(format!("User {}", user_id)));
    }

    let user = queries::get_user_by_id(&conn, &user_id)?
        .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;

    Ok(Json(user))
}
