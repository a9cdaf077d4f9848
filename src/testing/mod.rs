use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crate::auth::issue;
use crate::config::AppConfig;
use crate::database::models::{Post, User};
use crate::database::MemoryStore;
use crate::middleware::AUTH_HEADER;
use crate::services::user_service::gravatar_url;
use crate::state::AppState;

/// Application state over a fresh in-memory store with development config
pub struct TestContext {
    pub state: AppState,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(AppConfig::development())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let state = AppState::new(config, Arc::new(MemoryStore::new())).expect("failed to build test state");
        Self { state }
    }

    /// Insert a user directly, skipping password hashing
    pub async fn create_user(&self, name: &str, email: &str) -> User {
        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: String::new(),
            avatar: gravatar_url(email),
            date: Utc::now(),
        };
        self.state.users().insert(&user).await.expect("failed to insert test user")
    }

    pub async fn create_post(&self, author: &User, text: &str) -> Post {
        let post = Post {
            id: Uuid::new_v4().to_string(),
            user_id: author.id.clone(),
            text: text.to_string(),
            name: author.name.clone(),
            avatar: author.avatar.clone(),
            date: Utc::now(),
            likes: Vec::new(),
            comments: Vec::new(),
        };
        self.state.posts().insert(&post).await.expect("failed to insert test post")
    }

    pub fn token_for(&self, user: &User) -> String {
        issue(&user.id, self.state.secret(), self.state.config.security.jwt_expiry_secs)
            .expect("failed to sign test token")
    }

    /// Send one request through the full router
    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTH_HEADER, token);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("failed to build request");

        let response = crate::app(self.state.clone())
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn missing_token_is_rejected_before_body_parsing() {
        let ctx = TestContext::new();
        let (status, body) = ctx
            .send(Method::POST, "/api/posts", None, Some(json!("not an object")))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["msg"], "No token, Authorization Denied");
    }

    #[tokio::test]
    async fn garbage_token_is_invalid() {
        let ctx = TestContext::new();
        let (status, body) = ctx.send(Method::GET, "/api/auth", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["msg"], "Token Invalid");
        assert_eq!(body["code"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn token_for_a_removed_user_is_invalid_when_rechecked() {
        let mut config = AppConfig::development();
        config.security.verify_user_exists = true;
        let ctx = TestContext::with_config(config);
        let user = ctx.create_user("Ada", "ada@example.com").await;
        let token = ctx.token_for(&user);

        let (status, _) = ctx.send(Method::GET, "/api/auth", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        ctx.state.users().delete(&user.id).await.unwrap();
        let (status, body) = ctx.send(Method::GET, "/api/auth", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["msg"], "Token Invalid");
    }

    #[tokio::test]
    async fn register_then_fetch_current_user() {
        let ctx = TestContext::new();
        let (status, body) = ctx
            .send(
                Method::POST,
                "/api/users",
                None,
                Some(json!({ "name": "Ada", "email": "ada@example.com", "password": "secret1" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        let (status, me) = ctx.send(Method::GET, "/api/auth", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "ada@example.com");
        assert!(me.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn profile_create_then_update_status_codes() {
        let ctx = TestContext::new();
        let user = ctx.create_user("Ada", "ada@example.com").await;
        let token = ctx.token_for(&user);

        let (status, body) = ctx.send(Method::POST, "/api/profile", Some(&token), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"].as_array().unwrap().len(), 2);

        let payload = json!({ "status": "Developer", "skills": "node, react, sql", "twitter": "@ada" });
        let (status, body) = ctx
            .send(Method::POST, "/api/profile", Some(&token), Some(payload.clone()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["skills"], json!(["node", "react", "sql"]));
        assert_eq!(body["social"]["twitter"], "@ada");

        let (status, _) = ctx.send(Method::POST, "/api/profile", Some(&token), Some(payload)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = ctx.send(Method::GET, "/api/profile/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["name"], "Ada");

        let (status, body) = ctx.send(Method::GET, "/api/profile", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_own_profile_is_not_found() {
        let ctx = TestContext::new();
        let user = ctx.create_user("Ada", "ada@example.com").await;
        let token = ctx.token_for(&user);

        let (status, body) = ctx.send(Method::GET, "/api/profile/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["msg"], "There is no profile for this user");
    }

    #[tokio::test]
    async fn post_lifecycle_over_http() {
        let ctx = TestContext::new();
        let ada = ctx.create_user("Ada", "ada@example.com").await;
        let bob = ctx.create_user("Bob", "bob@example.com").await;
        let ada_token = ctx.token_for(&ada);
        let bob_token = ctx.token_for(&bob);

        let (status, post) = ctx
            .send(Method::POST, "/api/posts", Some(&ada_token), Some(json!({ "text": "hello" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        let post_id = post["id"].as_str().unwrap().to_string();

        let like_uri = format!("/api/posts/like/{}", post_id);
        let (status, likes) = ctx.send(Method::PUT, &like_uri, Some(&bob_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(likes[0]["user_id"], bob.id.as_str());
        let (status, body) = ctx.send(Method::PUT, &like_uri, Some(&bob_token), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["msg"], "Post already liked");

        let (status, body) = ctx
            .send(Method::DELETE, &format!("/api/posts/{}", post_id), Some(&bob_token), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["msg"], "User not authorized");

        let (status, body) = ctx
            .send(Method::DELETE, &format!("/api/posts/{}", post_id), Some(&ada_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["msg"], "Post removed");

        let (status, body) = ctx
            .send(Method::GET, &format!("/api/posts/{}", post_id), Some(&ada_token), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["msg"], "Post not found");
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let ctx = TestContext::new();
        let user = ctx.create_user("Ada", "ada@example.com").await;
        let token = ctx.token_for(&user);

        let (status, body) = ctx
            .send(Method::POST, "/api/posts", Some(&token), Some(json!([1, 2, 3])))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn health_reports_memory_store() {
        let ctx = TestContext::new();
        let (status, body) = ctx.send(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], "memory");
    }
}
