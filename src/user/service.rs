use std::sync::Arc;

use crate::crypto::PasswordManager;
use crate::error::{Result, ServerError, USER_EXISTS};
use crate::user::{User, UserId, UserRepository};

/// User manager.
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
    pwd: Arc<PasswordManager>,
}

impl UserService {
    /// Create a new [`UserService`].
    pub fn new(repo: Arc<dyn UserRepository>, pwd: Arc<PasswordManager>) -> Self {
        Self { repo, pwd }
    }

    /// Register a new user. Password is hashed before saving.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        is_admin: bool,
    ) -> Result<User> {
        if self.repo.find_by_username(username).await?.is_some() {
            return Err(ServerError::Conflict(USER_EXISTS));
        }

        let hash = self.pwd.hash_password(password)?;
        let user = User::new(username, hash, is_admin);
        // Unique constraint still catches concurrent registrations.
        self.repo.insert(&user).await?;

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Check credentials and return the matching user.
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let user = self.repo.find_by_username(username).await?;

        match user {
            Some(user) if self.pwd.verify_password(password, &user.password) => Ok(user),
            _ => Err(ServerError::InvalidCredentials),
        }
    }

    /// Find user using `id` field.
    pub async fn find(&self, id: &UserId) -> Result<Option<User>> {
        self.repo.find_by_id(id).await
    }

    /// Remove every user.
    pub async fn clear(&self) -> Result<()> {
        self.repo.clear().await
    }
}
