use tracing::warn;

use crate::database::models::{Comment, Post, Profile};
use crate::error::ApiError;

/// Resource carrying an ownership edge to the user allowed to mutate it
pub trait Owned {
    fn owner_id(&self) -> &str;
}

impl Owned for Post {
    fn owner_id(&self) -> &str {
        &self.user_id
    }
}

impl Owned for Comment {
    fn owner_id(&self) -> &str {
        &self.user_id
    }
}

impl Owned for Profile {
    fn owner_id(&self) -> &str {
        &self.user_id
    }
}

/// Allowed iff the identity is the owner
pub fn authorize_mutation(identity_user_id: &str, owner_user_id: &str) -> Result<(), ApiError> {
    if identity_user_id == owner_user_id {
        Ok(())
    } else {
        warn!("Ownership check failed: user {} is not owner {}", identity_user_id, owner_user_id);
        Err(ApiError::unauthorized("User not authorized"))
    }
}

pub fn ensure_owner<R: Owned>(identity_user_id: &str, resource: &R) -> Result<(), ApiError> {
    authorize_mutation(identity_user_id, resource.owner_id())
}
