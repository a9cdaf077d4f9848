use axum::{extract::State, Json};

use crate::database::models::UserView;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::services::UserService;
use crate::state::AppState;

/// GET /api/auth - the authenticated user, without the password hash
pub async fn current(State(state): State<AppState>, auth: AuthUser) -> Result<Json<UserView>, ApiError> {
    Ok(Json(UserService::new(&state).current(&auth.user_id).await?))
}
