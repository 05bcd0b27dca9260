use super::{
    CommentRepository, FollowRepository, GroupRepository, PostRepository, Reference,
    UserRepository,
};
use crate::error::{AppError, Result};
use crate::models::{
    AuthorSummary, Comment, CommentView, FeedScope, Group, GroupSummary, NewComment, NewGroup,
    NewPost, Post, PostChanges, PostView, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

const POST_VIEW_SELECT: &str = r#"
    SELECT p.id, p.text, p.image, p.created_at,
           u.id AS author_id, u.username AS author_username,
           g.id AS group_id, g.slug AS group_slug, g.title AS group_title
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id
"#;

/// PostgreSQL repository (source of truth)
#[derive(Clone)]
pub struct PgBlogRepository {
    pool: PgPool,
}

impl PgBlogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct PostViewRow {
    id: Uuid,
    text: String,
    image: Option<String>,
    created_at: DateTime<Utc>,
    author_id: Uuid,
    author_username: String,
    group_id: Option<Uuid>,
    group_slug: Option<String>,
    group_title: Option<String>,
}

impl From<PostViewRow> for PostView {
    fn from(row: PostViewRow) -> Self {
        let group = match (row.group_id, row.group_slug, row.group_title) {
            (Some(id), Some(slug), Some(title)) => Some(GroupSummary { id, slug, title }),
            _ => None,
        };

        PostView {
            id: row.id,
            text: row.text,
            image: row.image,
            created_at: row.created_at,
            author: AuthorSummary {
                id: row.author_id,
                username: row.author_username,
            },
            group,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CommentViewRow {
    id: Uuid,
    text: String,
    created_at: DateTime<Utc>,
    author_id: Uuid,
    author_username: String,
}

impl From<CommentViewRow> for CommentView {
    fn from(row: CommentViewRow) -> Self {
        CommentView {
            id: row.id,
            text: row.text,
            created_at: row.created_at,
            author: AuthorSummary {
                id: row.author_id,
                username: row.author_username,
            },
        }
    }
}

fn push_scope_filter(builder: &mut QueryBuilder<'_, Postgres>, scope: &FeedScope) {
    match scope {
        FeedScope::All => {}
        FeedScope::Group(group_id) => {
            builder.push(" WHERE p.group_id = ").push_bind(*group_id);
        }
        FeedScope::Author(author_id) => {
            builder.push(" WHERE p.author_id = ").push_bind(*author_id);
        }
        FeedScope::Authors(author_ids) => {
            builder
                .push(" WHERE p.author_id = ANY(")
                .push_bind(author_ids.clone())
                .push(")");
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}

fn duplicate_username() -> AppError {
    AppError::invalid_field(
        "username",
        "unique",
        "A user with that username already exists.",
    )
}

/// Turn a foreign key violation (SQLSTATE 23503) into the error the
/// in-memory repository reports for the same dangling reference.
fn map_write_error(err: sqlx::Error) -> AppError {
    let reference = err
        .as_database_error()
        .filter(|db_err| db_err.is_foreign_key_violation())
        .and_then(|db_err| db_err.constraint())
        .and_then(Reference::from_constraint);

    match reference {
        Some(reference) => reference.missing(),
        None => AppError::Database(err),
    }
}

#[async_trait]
impl UserRepository for PgBlogRepository {
    async fn create_user(&self, username: &str) -> Result<User> {
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username)
            VALUES ($1, $2)
            RETURNING id, username, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(err) if is_unique_violation(&err) => Err(duplicate_username()),
            Err(err) => Err(err.into()),
        }
    }

    async fn ensure_user(&self, user_id: Uuid, username: &str) -> Result<User> {
        let inserted = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username)
            VALUES ($1, $2)
            ON CONFLICT (id) DO NOTHING
            RETURNING id, username, created_at
            "#,
        )
        .bind(user_id)
        .bind(username)
        .fetch_optional(&self.pool)
        .await;

        match inserted {
            Ok(Some(user)) => Ok(user),
            Ok(None) => self
                .find_user_by_id(user_id)
                .await?
                .ok_or_else(|| AppError::Internal(format!("user {} vanished", user_id))),
            Err(err) if is_unique_violation(&err) => Err(duplicate_username()),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

#[async_trait]
impl GroupRepository for PgBlogRepository {
    async fn create_group(&self, group: NewGroup) -> Result<Group> {
        let result = sqlx::query_as::<_, Group>(
            r#"
            INSERT INTO post_groups (id, slug, title, description)
            VALUES ($1, $2, $3, $4)
            RETURNING id, slug, title, description
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&group.slug)
        .bind(&group.title)
        .bind(&group.description)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(group) => Ok(group),
            Err(err) if is_unique_violation(&err) => Err(AppError::invalid_field(
                "slug",
                "unique",
                "A group with that slug already exists.",
            )),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_group_by_id(&self, group_id: Uuid) -> Result<Option<Group>> {
        let group = sqlx::query_as::<_, Group>(
            "SELECT id, slug, title, description FROM post_groups WHERE id = $1",
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(group)
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let group = sqlx::query_as::<_, Group>(
            "SELECT id, slug, title, description FROM post_groups WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(group)
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let groups = sqlx::query_as::<_, Group>(
            "SELECT id, slug, title, description FROM post_groups ORDER BY title, slug",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(groups)
    }

    async fn delete_group(&self, group_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // Blocks concurrent inserts that reference the group until we commit.
        let locked = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM post_groups WHERE id = $1 FOR UPDATE",
        )
        .bind(group_id)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Ok(false);
        }

        let detached = sqlx::query("UPDATE posts SET group_id = NULL WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let deleted = sqlx::query("DELETE FROM post_groups WHERE id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        tx.commit().await?;

        debug!(%group_id, detached, deleted, "Deleted group");
        Ok(deleted)
    }
}

#[async_trait]
impl PostRepository for PgBlogRepository {
    async fn create_post(&self, post: NewPost) -> Result<Post> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (id, author_id, group_id, text, image)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, author_id, group_id, text, image, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(post.author_id)
        .bind(post.group_id)
        .bind(&post.text)
        .bind(&post.image)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(post)
    }

    async fn find_post_by_id(&self, post_id: Uuid) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, author_id, group_id, text, image, created_at
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    async fn find_post_view(&self, post_id: Uuid) -> Result<Option<PostView>> {
        let mut builder = QueryBuilder::<Postgres>::new(POST_VIEW_SELECT);
        builder.push(" WHERE p.id = ").push_bind(post_id);

        let row = builder
            .build_query_as::<PostViewRow>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(PostView::from))
    }

    async fn update_post(&self, post_id: Uuid, changes: PostChanges) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET text = $2, group_id = $3, image = COALESCE($4, image)
            WHERE id = $1
            RETURNING id, author_id, group_id, text, image, created_at
            "#,
        )
        .bind(post_id)
        .bind(&changes.text)
        .bind(changes.group_id)
        .bind(&changes.image)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    async fn delete_post(&self, post_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query_scalar::<_, Uuid>("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Ok(false);
        }

        let comments = sqlx::query("DELETE FROM comments WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let deleted = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        tx.commit().await?;

        debug!(%post_id, comments, deleted, "Deleted post");
        Ok(deleted)
    }

    async fn count_posts(&self, scope: &FeedScope) -> Result<usize> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts p");
        push_scope_filter(&mut builder, scope);

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as usize)
    }

    async fn list_posts(
        &self,
        scope: &FeedScope,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PostView>> {
        let mut builder = QueryBuilder::<Postgres>::new(POST_VIEW_SELECT);
        push_scope_filter(&mut builder, scope);
        builder
            .push(" ORDER BY p.created_at DESC, p.seq DESC LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(offset as i64);

        let rows = builder
            .build_query_as::<PostViewRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(PostView::from).collect())
    }
}

#[async_trait]
impl CommentRepository for PgBlogRepository {
    async fn create_comment(&self, comment: NewComment) -> Result<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (id, post_id, author_id, text)
            VALUES ($1, $2, $3, $4)
            RETURNING id, post_id, author_id, text, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(&comment.text)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(comment)
    }

    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<CommentView>> {
        let rows = sqlx::query_as::<_, CommentViewRow>(
            r#"
            SELECT c.id, c.text, c.created_at,
                   u.id AS author_id, u.username AS author_username
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.post_id = $1
            ORDER BY c.created_at ASC, c.seq ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CommentView::from).collect())
    }

    async fn count_comments(&self, post_id: Uuid) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as usize)
    }
}

#[async_trait]
impl FollowRepository for PgBlogRepository {
    async fn create_follow(&self, follower_id: Uuid, author_id: Uuid) -> Result<bool> {
        let inserted = sqlx::query_as::<_, (Uuid,)>(
            r#"
            INSERT INTO follows (id, follower_id, author_id, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (follower_id, author_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(follower_id)
        .bind(author_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(inserted.is_some())
    }

    async fn delete_follow(&self, follower_id: Uuid, author_id: Uuid) -> Result<bool> {
        let affected = sqlx::query(
            r#"
            DELETE FROM follows
            WHERE follower_id = $1 AND author_id = $2
            "#,
        )
        .bind(follower_id)
        .bind(author_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }

    async fn is_following(&self, follower_id: Uuid, author_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND author_id = $2)",
        )
        .bind(follower_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn followed_author_ids(&self, follower_id: Uuid) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT author_id FROM follows WHERE follower_id = $1 ORDER BY created_at",
        )
        .bind(follower_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
