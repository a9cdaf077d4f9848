use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::error::ApiError;
use crate::services::{RegisterInput, TokenResponse, UserService};
use crate::state::AppState;

/// POST /api/users - register and receive a token
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterInput>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(input) = payload?;
    let response = UserService::new(&state).register(input).await?;
    Ok(Json(response))
}
