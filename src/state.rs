use std::sync::Arc;

use crate::auth::TokenSecret;
use crate::config::AppConfig;
use crate::database::models::{Post, Profile, User};
use crate::database::{Collection, DocumentStore, Repository};
use crate::services::github::{GithubClient, GithubError};

/// Shared, read-only application state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub github: GithubClient,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn DocumentStore>) -> Result<Self, GithubError> {
        let github = GithubClient::new(&config.github)?;
        Ok(Self {
            config: Arc::new(config),
            store,
            github,
        })
    }

    pub fn secret(&self) -> &TokenSecret {
        &self.config.security.jwt_secret
    }

    pub fn users(&self) -> Repository<User> {
        Repository::new(Collection::Users, self.store.clone())
    }

    pub fn profiles(&self) -> Repository<Profile> {
        Repository::new(Collection::Profiles, self.store.clone())
    }

    pub fn posts(&self) -> Repository<Post> {
        Repository::new(Collection::Posts, self.store.clone())
    }
}
