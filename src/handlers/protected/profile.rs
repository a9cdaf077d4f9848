use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::database::models::{Profile, ProfileView};
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::services::{EducationInput, ExperienceInput, ProfileInput, ProfileOutcome, ProfileService};
use crate::state::AppState;

/// GET /api/profile/me
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Json<ProfileView>, ApiError> {
    Ok(Json(ProfileService::new(&state).me(&auth.user_id).await?))
}

/// POST /api/profile - create (201) or update (200) the caller's profile
pub async fn upsert(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<ProfileInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Profile>), ApiError> {
    let Json(input) = payload?;
    let outcome = ProfileService::new(&state).upsert(&auth.user_id, &input).await?;
    let status = match outcome {
        ProfileOutcome::Created(_) => StatusCode::CREATED,
        ProfileOutcome::Updated(_) => StatusCode::OK,
    };
    Ok((status, Json(outcome.into_profile())))
}

/// DELETE /api/profile - remove the caller's posts, profile and account
pub async fn delete(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Value>, ApiError> {
    ProfileService::new(&state).delete_account(&auth.user_id).await?;
    Ok(Json(json!({ "msg": "User deleted" })))
}

/// PUT /api/profile/experience
pub async fn add_experience(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<ExperienceInput>, JsonRejection>,
) -> Result<Json<Profile>, ApiError> {
    let Json(input) = payload?;
    Ok(Json(ProfileService::new(&state).add_experience(&auth.user_id, input).await?))
}

/// DELETE /api/profile/experience/:exp_id
pub async fn remove_experience(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(exp_id): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(ProfileService::new(&state).remove_experience(&auth.user_id, &exp_id).await?))
}

/// PUT /api/profile/education
pub async fn add_education(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<EducationInput>, JsonRejection>,
) -> Result<Json<Profile>, ApiError> {
    let Json(input) = payload?;
    Ok(Json(ProfileService::new(&state).add_education(&auth.user_id, input).await?))
}

/// DELETE /api/profile/education/:edu_id
pub async fn remove_education(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(edu_id): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(ProfileService::new(&state).remove_education(&auth.user_id, &edu_id).await?))
}
