use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::error::ApiError;
use crate::services::{LoginInput, TokenResponse, UserService};
use crate::state::AppState;

/// POST /api/auth - exchange credentials for a token
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginInput>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(input) = payload?;
    let response = UserService::new(&state).login(input).await?;
    Ok(Json(response))
}
