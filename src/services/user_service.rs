use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{hash_password, issue, verify_password};
use crate::database::models::{User, UserView};
use crate::database::{Filter, Repository, StoreError};
use crate::error::{is_blank, validate, ApiError, FieldError};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Registration, login and the current-user lookup
pub struct UserService {
    users: Repository<User>,
    state: AppState,
}

impl UserService {
    pub fn new(state: &AppState) -> Self {
        Self {
            users: state.users(),
            state: state.clone(),
        }
    }

    fn token_for(&self, user_id: &str) -> Result<TokenResponse, ApiError> {
        let token = issue(user_id, self.state.secret(), self.state.config.security.jwt_expiry_secs)?;
        Ok(TokenResponse { token })
    }

    pub async fn register(&self, input: RegisterInput) -> Result<TokenResponse, ApiError> {
        let mut errors = Vec::new();
        if is_blank(input.name.as_deref()) {
            errors.push(FieldError::new("name", "Name is required"));
        }
        if !input.email.as_deref().map_or(false, is_valid_email) {
            errors.push(FieldError::new("email", "Please include a valid email"));
        }
        if input.password.as_deref().map_or(0, |p| p.chars().count()) < MIN_PASSWORD_LEN {
            errors.push(FieldError::new(
                "password",
                "Please enter a password with 6 or more characters",
            ));
        }
        validate(errors)?;

        let name = input.name.unwrap_or_default().trim().to_string();
        let email = normalize_email(&input.email.unwrap_or_default());
        let password = input.password.unwrap_or_default();

        if self.users.select_one(&Filter::eq("email", email.as_str())).await?.is_some() {
            return Err(ApiError::bad_request("User already exists"));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            name,
            avatar: gravatar_url(&email),
            email,
            password_hash: hash_password(password).await?,
            date: Utc::now(),
        };

        // The unique email index settles a registration racing this one
        let user = match self.users.insert(&user).await {
            Ok(user) => user,
            Err(StoreError::Duplicate { .. }) => return Err(ApiError::bad_request("User already exists")),
            Err(err) => return Err(err.into()),
        };

        info!("Registered user {}", user.id);
        self.token_for(&user.id)
    }

    pub async fn login(&self, input: LoginInput) -> Result<TokenResponse, ApiError> {
        let mut errors = Vec::new();
        if !input.email.as_deref().map_or(false, is_valid_email) {
            errors.push(FieldError::new("email", "Please include a valid email"));
        }
        if is_blank(input.password.as_deref()) {
            errors.push(FieldError::new("password", "Password is required"));
        }
        validate(errors)?;

        let email = normalize_email(&input.email.unwrap_or_default());
        let Some(user) = self.users.select_one(&Filter::eq("email", email.as_str())).await? else {
            warn!("Login for unknown email");
            return Err(ApiError::bad_request("Invalid Credentials"));
        };

        let password = input.password.unwrap_or_default();
        if !verify_password(password, user.password_hash.clone()).await? {
            warn!("Login with wrong password for user {}", user.id);
            return Err(ApiError::bad_request("Invalid Credentials"));
        }

        self.token_for(&user.id)
    }

    pub async fn current(&self, user_id: &str) -> Result<UserView, ApiError> {
        let user = self.users.select_404(user_id).await?;
        Ok(UserView::from(&user))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `local@domain.tld` with no whitespace and a dot inside the domain
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .map_or(false, |(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Gravatar image for the normalized address: 200px, PG rated, mystery-person fallback
pub fn gravatar_url(email: &str) -> String {
    let digest = Sha256::digest(normalize_email(email).as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("https://www.gravatar.com/avatar/{}?s=200&r=pg&d=mm", hex)
}
