use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use tracing::error;

use crate::state::AppState;

/// GET / - service banner with the route map
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "DevConnector API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "users": "/api/users (public - registration)",
            "auth": "/api/auth (POST public - login, GET protected - current user)",
            "profile": "/api/profile[/me|/user/:user_id|/github/:username|/experience|/education]",
            "posts": "/api/posts[/:post_id|/like/:id|/unlike/:id|/comment/:id[/:comment_id]] (protected)",
        }
    }))
}

/// GET /health - store connectivity
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let backend = state.store.backend();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "timestamp": now, "database": backend })),
        ),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "timestamp": now, "database": backend })),
            )
        }
    }
}
