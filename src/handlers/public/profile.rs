use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::database::models::ProfileView;
use crate::error::ApiError;
use crate::services::ProfileService;
use crate::state::AppState;

/// GET /api/profile
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<ProfileView>>, ApiError> {
    Ok(Json(ProfileService::new(&state).list().await?))
}

/// GET /api/profile/user/:user_id
pub async fn by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ProfileView>, ApiError> {
    Ok(Json(ProfileService::new(&state).by_user(&user_id).await?))
}

/// GET /api/profile/github/:username - latest public repositories
pub async fn github(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<Value>>, ApiError> {
    Ok(Json(state.github.repos(&username).await?))
}
