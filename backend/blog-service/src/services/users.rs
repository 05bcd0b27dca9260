/// User service - local mirror of accounts owned by the identity system
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::db::BlogRepository;
use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::User;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UserForm {
    #[validate(
        length(min = 1, max = 150),
        custom(function = "crate::validators::validate_not_blank")
    )]
    pub username: String,
}

pub struct UserService {
    repo: Arc<dyn BlogRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn BlogRepository>) -> Self {
        Self { repo }
    }

    pub async fn register(&self, form: UserForm) -> Result<User> {
        form.validate()?;

        let user = self.repo.create_user(form.username.trim()).await?;
        info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Make sure the user behind a verified token has a local row, so writes
    /// that name them as author or follower have something to reference.
    pub async fn sync_identity(&self, user: &AuthUser) -> Result<User> {
        UserForm {
            username: user.username.clone(),
        }
        .validate()?;

        let stored = self.repo.ensure_user(user.id, user.username.trim()).await?;
        debug!(user_id = %stored.id, username = %stored.username, "Identity mirrored");
        Ok(stored)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User> {
        self.repo
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<User> {
        self.repo
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", username)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryBlogRepository;

    #[tokio::test]
    async fn register_and_lookup() {
        let service = UserService::new(Arc::new(InMemoryBlogRepository::new()));

        let user = service
            .register(UserForm {
                username: "auth".into(),
            })
            .await
            .unwrap();
        assert_eq!(service.get_by_username("auth").await.unwrap().id, user.id);
        assert_eq!(service.get_user(user.id).await.unwrap().username, "auth");

        assert!(matches!(
            service.register(UserForm { username: "auth".into() }).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.register(UserForm { username: "  ".into() }).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.get_by_username("nobody").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn sync_identity_mirrors_token_user_once() {
        let service = UserService::new(Arc::new(InMemoryBlogRepository::new()));
        let current = AuthUser {
            id: Uuid::new_v4(),
            username: "auth".into(),
        };

        let stored = service.sync_identity(&current).await.unwrap();
        assert_eq!(stored.id, current.id);
        assert_eq!(service.sync_identity(&current).await.unwrap().id, current.id);
        assert_eq!(service.get_by_username("auth").await.unwrap().id, current.id);

        let squatter = AuthUser {
            id: Uuid::new_v4(),
            username: "auth".into(),
        };
        assert!(matches!(
            service.sync_identity(&squatter).await,
            Err(AppError::Validation(_))
        ));
        let blank = AuthUser {
            id: Uuid::new_v4(),
            username: " ".into(),
        };
        assert!(matches!(
            service.sync_identity(&blank).await,
            Err(AppError::Validation(_))
        ));
    }
}
