/// Database access layer
///
/// This module provides:
/// - Repository traits for users, groups, posts, comments and follows
/// - `PgBlogRepository`: the PostgreSQL implementation (source of truth)
/// - `InMemoryBlogRepository`: a process-local implementation for tests and
///   local development
/// - Embedded schema migrations
///
/// Referential rules are explicit repository operations rather than foreign
/// key actions: `delete_group` nullifies `posts.group_id`, `delete_post`
/// removes the post's comments. Each runs as a single unit of work.
pub mod memory;
pub mod postgres;

pub use memory::InMemoryBlogRepository;
pub use postgres::PgBlogRepository;

use crate::error::{AppError, Result};
use crate::models::{
    Comment, CommentView, FeedScope, Group, NewComment, NewGroup, NewPost, Post, PostChanges,
    PostView, User,
};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Mirror a user provisioned by the identity system.
    async fn create_user(&self, username: &str) -> Result<User>;

    /// Mirror the user behind a verified token under its own id. An existing
    /// row is returned unchanged.
    async fn ensure_user(&self, user_id: Uuid, username: &str) -> Result<User>;

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;
}

#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn create_group(&self, group: NewGroup) -> Result<Group>;

    async fn find_group_by_id(&self, group_id: Uuid) -> Result<Option<Group>>;

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<Group>>;

    /// All groups ordered by title.
    async fn list_groups(&self) -> Result<Vec<Group>>;

    /// Delete a group, setting `group_id` to null on every post that referenced it.
    /// Returns false if no such group existed.
    async fn delete_group(&self, group_id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create_post(&self, post: NewPost) -> Result<Post>;

    async fn find_post_by_id(&self, post_id: Uuid) -> Result<Option<Post>>;

    /// A post joined with its author and group.
    async fn find_post_view(&self, post_id: Uuid) -> Result<Option<PostView>>;

    /// Returns the updated post, or None if it does not exist.
    async fn update_post(&self, post_id: Uuid, changes: PostChanges) -> Result<Option<Post>>;

    /// Delete a post together with its comments. Returns false if no such post existed.
    async fn delete_post(&self, post_id: Uuid) -> Result<bool>;

    async fn count_posts(&self, scope: &FeedScope) -> Result<usize>;

    /// Posts in `scope`, newest first.
    async fn list_posts(
        &self,
        scope: &FeedScope,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PostView>>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create_comment(&self, comment: NewComment) -> Result<Comment>;

    /// Comments on a post, oldest first.
    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<CommentView>>;

    async fn count_comments(&self, post_id: Uuid) -> Result<usize>;
}

#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Idempotent create; returns true if a new edge was inserted.
    async fn create_follow(&self, follower_id: Uuid, author_id: Uuid) -> Result<bool>;

    /// Idempotent delete; returns true if an edge was removed.
    async fn delete_follow(&self, follower_id: Uuid, author_id: Uuid) -> Result<bool>;

    async fn is_following(&self, follower_id: Uuid, author_id: Uuid) -> Result<bool>;

    async fn followed_author_ids(&self, follower_id: Uuid) -> Result<Vec<Uuid>>;
}

/// A foreign key a write can violate. Both repositories report a dangling
/// reference through `missing`, so callers see the same error either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    PostAuthor,
    PostGroup,
    CommentPost,
    CommentAuthor,
    Follower,
    FollowedAuthor,
}

impl Reference {
    /// Map a PostgreSQL foreign key constraint name.
    pub fn from_constraint(name: &str) -> Option<Self> {
        match name {
            "posts_author_id_fkey" => Some(Self::PostAuthor),
            "posts_group_id_fkey" => Some(Self::PostGroup),
            "comments_post_id_fkey" => Some(Self::CommentPost),
            "comments_author_id_fkey" => Some(Self::CommentAuthor),
            "follows_follower_id_fkey" => Some(Self::Follower),
            "follows_author_id_fkey" => Some(Self::FollowedAuthor),
            _ => None,
        }
    }

    pub fn missing(self) -> AppError {
        match self {
            Self::PostAuthor | Self::CommentAuthor => {
                AppError::invalid_field("author", "unknown_author", "Author does not exist.")
            }
            Self::PostGroup => AppError::invalid_field(
                "group",
                "invalid_choice",
                "Select a valid choice. That choice is not one of the available choices.",
            ),
            Self::Follower => {
                AppError::invalid_field("follower", "unknown_user", "User does not exist.")
            }
            Self::CommentPost => AppError::NotFound("post".to_string()),
            Self::FollowedAuthor => AppError::NotFound("author".to_string()),
        }
    }
}

/// Everything the services need from storage.
pub trait BlogRepository:
    UserRepository + GroupRepository + PostRepository + CommentRepository + FollowRepository
{
}

impl<T> BlogRepository for T where
    T: UserRepository + GroupRepository + PostRepository + CommentRepository + FollowRepository
{
}

/// Apply the embedded schema migrations.
pub async fn run_migrations(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    tracing::debug!("Running blog-service migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations completed successfully");
    Ok(())
}
