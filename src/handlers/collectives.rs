use axum::{extract::State, http::StatusCode, Json};

use crate::db::{queries, AppState};
use crate::error::Result;
use crate::models::{Collective, CreateCollective};

pub async fn create_collective(
    State(state): State<AppState>,
    Json(input): Json<CreateCollective>,
) -> Result<(StatusCode, Json<Collective>)> {
    let conn = state.db.get()?;
    let collective = queries::create_collective(&conn, &input)?;
    Ok((StatusCode::CREATED, Json(collective)))
}
