/// Follow graph - directed follower -> author edges
///
/// Edges are unique per (follower, author) and never point at the follower
/// themself. Following twice or following yourself is a no-op, not an error.
use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{BlogRepository, Reference};
use crate::error::{AppError, Result};
use crate::metrics::FOLLOW_OPERATIONS_TOTAL;
use crate::middleware::{require_user, AuthUser};
use crate::models::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    NoOp,
}

impl FollowOutcome {
    fn label(self) -> &'static str {
        match self {
            FollowOutcome::Created => "created",
            FollowOutcome::NoOp => "noop",
        }
    }
}

#[derive(Clone)]
pub struct FollowGraph {
    repo: Arc<dyn BlogRepository>,
}

impl FollowGraph {
    pub fn new(repo: Arc<dyn BlogRepository>) -> Self {
        Self { repo }
    }

    pub async fn follow(&self, follower_id: Uuid, author_id: Uuid) -> Result<FollowOutcome> {
        let outcome = if follower_id == author_id {
            FollowOutcome::NoOp
        } else if self.repo.create_follow(follower_id, author_id).await? {
            FollowOutcome::Created
        } else {
            FollowOutcome::NoOp
        };

        FOLLOW_OPERATIONS_TOTAL
            .with_label_values(&["follow", outcome.label()])
            .inc();
        debug!(%follower_id, %author_id, outcome = outcome.label(), "follow");

        Ok(outcome)
    }

    pub async fn unfollow(&self, follower_id: Uuid, author_id: Uuid) -> Result<()> {
        let removed = self.repo.delete_follow(follower_id, author_id).await?;

        let outcome = if removed { "removed" } else { "noop" };
        FOLLOW_OPERATIONS_TOTAL
            .with_label_values(&["unfollow", outcome])
            .inc();
        debug!(%follower_id, %author_id, outcome, "unfollow");

        Ok(())
    }

    pub async fn is_following(&self, follower_id: Uuid, author_id: Uuid) -> Result<bool> {
        if follower_id == author_id {
            return Ok(false);
        }
        self.repo.is_following(follower_id, author_id).await
    }

    pub async fn followed_authors(&self, user_id: Uuid) -> Result<HashSet<Uuid>> {
        let authors = self.repo.followed_author_ids(user_id).await?;
        Ok(authors.into_iter().filter(|id| *id != user_id).collect())
    }

    /// Follow the author named `username` on behalf of the current user.
    pub async fn follow_username(
        &self,
        user: Option<&AuthUser>,
        username: &str,
    ) -> Result<(User, FollowOutcome)> {
        let user = require_user(user)?;
        if self.repo.find_user_by_id(user.id).await?.is_none() {
            return Err(Reference::Follower.missing());
        }
        let author = self.resolve_author(username).await?;
        let outcome = self.follow(user.id, author.id).await?;

        if outcome == FollowOutcome::Created {
            info!(follower = %user.username, author = %author.username, "Follow created");
        }
        Ok((author, outcome))
    }

    pub async fn unfollow_username(&self, user: Option<&AuthUser>, username: &str) -> Result<User> {
        let user = require_user(user)?;
        let author = self.resolve_author(username).await?;
        self.unfollow(user.id, author.id).await?;
        Ok(author)
    }

    async fn resolve_author(&self, username: &str) -> Result<User> {
        self.repo
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", username)))
    }
}
