pub mod guard;
pub mod password;
pub mod token;

pub use guard::{authorize_mutation, ensure_owner, Owned};
pub use password::{hash_password, verify_password, PasswordError};
pub use token::{issue, verify, Claims, ClaimUser, Identity, TokenError, TokenSecret};
