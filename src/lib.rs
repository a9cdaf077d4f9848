pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod state;

#[cfg(test)]
pub mod testing;

use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::state::AppState;

/// Full application router: public routes merged with the token-gated ones
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.security.cors_origins);

    Router::new()
        .merge(public_routes())
        .merge(protected_routes(state.clone()))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    use handlers::public;

    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/api/users", post(public::user_register))
        .route("/api/auth", post(public::auth_login))
        .route("/api/profile", get(public::profile_list))
        .route("/api/profile/user/:user_id", get(public::profile_by_user))
        .route("/api/profile/github/:username", get(public::profile_github))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use handlers::protected::{self, posts, profile};

    Router::new()
        .route("/api/auth", get(protected::auth_current))
        // Profile
        .route("/api/profile", post(profile::upsert).delete(profile::delete))
        .route("/api/profile/me", get(profile::me))
        .route("/api/profile/experience", put(profile::add_experience))
        .route("/api/profile/experience/:exp_id", delete(profile::remove_experience))
        .route("/api/profile/education", put(profile::add_education))
        .route("/api/profile/education/:edu_id", delete(profile::remove_education))
        // Posts
        .route("/api/posts", post(posts::create).get(posts::list))
        .route("/api/posts/:post_id", get(posts::get).delete(posts::delete))
        .route("/api/posts/like/:id", put(posts::like))
        .route("/api/posts/unlike/:id", put(posts::unlike))
        .route("/api/posts/comment/:id", post(posts::comment))
        .route("/api/posts/comment/:id/:comment_id", delete(posts::uncomment))
        // Runs before any handler extractor, so body parsing never precedes the token check
        .route_layer(from_fn_with_state(state, middleware::token_auth_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
