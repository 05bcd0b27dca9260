/// Post service - handles post creation, editing, deletion and detail pages
///
/// Every write validates the form first and performs no mutation when it
/// fails. After a successful write the cached index pages are invalidated;
/// a cache failure at that point is logged and swallowed since the post is
/// already committed.
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::cache::PageCache;
use crate::db::{BlogRepository, Reference};
use crate::error::{AppError, Result};
use crate::metrics::POST_WRITES_TOTAL;
use crate::middleware::{check_post_ownership, require_user, AuthUser};
use crate::models::{
    FeedScope, GroupSummary, NewPost, Post, PostChanges, PostDetailView, PostFormView,
};
use crate::validators::{normalize_image_path, MAX_IMAGE_PATH_LEN};

/// Create/edit post form
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PostForm {
    #[validate(custom(function = "crate::validators::validate_not_blank"))]
    pub text: String,
    #[serde(default)]
    pub group: Option<Uuid>,
    /// Uploaded file name. Stored as `posts/<file name>`.
    #[serde(default)]
    pub image: Option<String>,
}

/// A form that passed validation, ready to be written.
struct CleanPost {
    group_id: Option<Uuid>,
    text: String,
    image: Option<String>,
}

pub struct PostService {
    repo: Arc<dyn BlogRepository>,
    cache: Arc<dyn PageCache>,
}

impl PostService {
    pub fn new(repo: Arc<dyn BlogRepository>, cache: Arc<dyn PageCache>) -> Self {
        Self { repo, cache }
    }

    /// Create a post authored by the current user
    pub async fn create_post(&self, user: Option<&AuthUser>, form: PostForm) -> Result<Post> {
        let user = require_user(user)?;

        if self.repo.find_user_by_id(user.id).await?.is_none() {
            return Err(Reference::PostAuthor.missing());
        }

        let clean = self.clean(form).await?;
        let post = self
            .repo
            .create_post(NewPost {
                author_id: user.id,
                group_id: clean.group_id,
                text: clean.text,
                image: clean.image,
            })
            .await?;

        POST_WRITES_TOTAL.with_label_values(&["create"]).inc();
        info!(post_id = %post.id, author = %user.username, "Post created");

        self.invalidate_index().await;
        Ok(post)
    }

    /// Edit a post. Only its author may do this.
    pub async fn edit_post(
        &self,
        user: Option<&AuthUser>,
        post_id: Uuid,
        form: PostForm,
    ) -> Result<Post> {
        let user = require_user(user)?;
        let existing = self.get_post(post_id).await?;
        check_post_ownership(user, &existing)?;

        let clean = self.clean(form).await?;
        let post = self
            .repo
            .update_post(
                post_id,
                PostChanges {
                    group_id: clean.group_id,
                    text: clean.text,
                    image: clean.image,
                },
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;

        POST_WRITES_TOTAL.with_label_values(&["update"]).inc();
        info!(%post_id, author = %user.username, "Post updated");

        self.invalidate_index().await;
        Ok(post)
    }

    /// Delete a post and its comments. Only its author may do this.
    pub async fn delete_post(&self, user: Option<&AuthUser>, post_id: Uuid) -> Result<()> {
        let user = require_user(user)?;
        let existing = self.get_post(post_id).await?;
        check_post_ownership(user, &existing)?;

        if !self.repo.delete_post(post_id).await? {
            return Err(AppError::NotFound(format!("post {}", post_id)));
        }

        POST_WRITES_TOTAL.with_label_values(&["delete"]).inc();
        info!(%post_id, author = %user.username, "Post deleted");

        self.invalidate_index().await;
        Ok(())
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<Post> {
        self.repo
            .find_post_by_id(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))
    }

    pub async fn post_detail(&self, post_id: Uuid) -> Result<PostDetailView> {
        let post = self
            .repo
            .find_post_view(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;

        let author_post_count = self
            .repo
            .count_posts(&FeedScope::Author(post.author.id))
            .await?;
        let comments = self.repo.list_comments(post_id).await?;

        Ok(PostDetailView {
            post,
            author_post_count,
            comments,
        })
    }

    /// Empty create form.
    pub async fn new_post_form(&self, user: Option<&AuthUser>) -> Result<PostFormView> {
        require_user(user)?;

        Ok(PostFormView {
            is_edit: false,
            post_id: None,
            text: String::new(),
            group: None,
            image: None,
            groups: self.group_choices().await?,
        })
    }

    /// Edit form pre-filled with the post's current values.
    pub async fn edit_post_form(
        &self,
        user: Option<&AuthUser>,
        post_id: Uuid,
    ) -> Result<PostFormView> {
        let user = require_user(user)?;
        let post = self.get_post(post_id).await?;
        check_post_ownership(user, &post)?;

        Ok(PostFormView {
            is_edit: true,
            post_id: Some(post.id),
            text: post.text,
            group: post.group_id,
            image: post.image,
            groups: self.group_choices().await?,
        })
    }

    async fn group_choices(&self) -> Result<Vec<GroupSummary>> {
        let groups = self.repo.list_groups().await?;
        Ok(groups.iter().map(GroupSummary::from).collect())
    }

    async fn clean(&self, form: PostForm) -> Result<CleanPost> {
        form.validate()?;

        if let Some(group_id) = form.group {
            if self.repo.find_group_by_id(group_id).await?.is_none() {
                return Err(Reference::PostGroup.missing());
            }
        }

        let image = form.image.as_deref().and_then(normalize_image_path);
        if image
            .as_ref()
            .is_some_and(|path| path.chars().count() > MAX_IMAGE_PATH_LEN)
        {
            return Err(AppError::invalid_field(
                "image",
                "max_length",
                "Ensure this filename has at most 255 characters.",
            ));
        }

        Ok(CleanPost {
            group_id: form.group,
            text: form.text,
            image,
        })
    }

    async fn invalidate_index(&self) {
        if let Err(e) = self.cache.invalidate_index().await {
            warn!(error = %e, "Failed to invalidate index page cache");
        }
    }
}
