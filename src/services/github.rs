use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GithubConfig;
use crate::error::ApiError;

/// Longest username GitHub accepts
const MAX_USERNAME_LEN: usize = 39;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("no GitHub profile for {0}")]
    NotFound(String),
    #[error("GitHub request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl From<GithubError> for ApiError {
    fn from(err: GithubError) -> Self {
        match err {
            GithubError::NotFound(_) => ApiError::not_found("No Github profile found"),
            GithubError::Transport(e) => {
                warn!("GitHub lookup failed: {}", e);
                ApiError::bad_gateway("GitHub is unavailable")
            }
        }
    }
}

/// Thin client for the public repository listing
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: Client,
    api_base: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(config: &GithubConfig) -> Result<Self, GithubError> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// The five oldest public repositories of `username`, passed through as
    /// GitHub returns them
    pub async fn repos(&self, username: &str) -> Result<Vec<Value>, GithubError> {
        if !is_valid_username(username) {
            return Err(GithubError::NotFound(username.to_string()));
        }

        let url = format!("{}/users/{}/repos", self.api_base, username);
        let mut request = self
            .http
            .get(&url)
            .header(header::ACCEPT, "application/vnd.github+json")
            .query(&[("per_page", "5"), ("sort", "created"), ("direction", "asc")]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if response.status() != StatusCode::OK {
            debug!("GitHub answered {} for {}", response.status(), username);
            return Err(GithubError::NotFound(username.to_string()));
        }

        Ok(response.json().await?)
    }
}

fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.len() <= MAX_USERNAME_LEN
        && username.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
