// Protected handlers: every route here sits behind `token_auth_middleware`
// and receives the caller through the `AuthUser` extractor
pub mod auth;
pub mod posts;
pub mod profile;

pub use auth::current as auth_current;
