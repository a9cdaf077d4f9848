use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::database::models::{Comment, Like, Post};
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::services::{PostInput, PostService};
use crate::state::AppState;

/// POST /api/posts
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<PostInput>, JsonRejection>,
) -> Result<Json<Post>, ApiError> {
    let Json(input) = payload?;
    Ok(Json(PostService::new(&state).create(&auth.user_id, input).await?))
}

/// GET /api/posts - newest first
pub async fn list(State(state): State<AppState>, _auth: AuthUser) -> Result<Json<Vec<Post>>, ApiError> {
    Ok(Json(PostService::new(&state).list().await?))
}

/// GET /api/posts/:post_id
pub async fn get(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(post_id): Path<String>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(PostService::new(&state).get(&post_id).await?))
}

/// DELETE /api/posts/:post_id
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    PostService::new(&state).delete(&auth.user_id, &post_id).await?;
    Ok(Json(json!({ "msg": "Post removed" })))
}

/// PUT /api/posts/like/:id
pub async fn like(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<String>,
) -> Result<Json<Vec<Like>>, ApiError> {
    Ok(Json(PostService::new(&state).like(&auth.user_id, &post_id).await?))
}

/// PUT /api/posts/unlike/:id
pub async fn unlike(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<String>,
) -> Result<Json<Vec<Like>>, ApiError> {
    Ok(Json(PostService::new(&state).unlike(&auth.user_id, &post_id).await?))
}

/// POST /api/posts/comment/:id
pub async fn comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<String>,
    payload: Result<Json<PostInput>, JsonRejection>,
) -> Result<Json<Post>, ApiError> {
    let Json(input) = payload?;
    Ok(Json(PostService::new(&state).comment(&auth.user_id, &post_id, input).await?))
}

/// DELETE /api/posts/comment/:id/:comment_id
pub async fn uncomment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    Ok(Json(
        PostService::new(&state)
            .uncomment(&auth.user_id, &post_id, &comment_id)
            .await?,
    ))
}
