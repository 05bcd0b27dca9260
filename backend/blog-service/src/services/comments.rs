/// Comment service - comments on posts
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::db::{BlogRepository, Reference};
use crate::error::{AppError, Result};
use crate::metrics::COMMENT_WRITES_TOTAL;
use crate::middleware::{require_user, AuthUser};
use crate::models::{Comment, CommentView, NewComment};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CommentForm {
    #[validate(custom(function = "crate::validators::validate_not_blank"))]
    pub text: String,
}

pub struct CommentService {
    repo: Arc<dyn BlogRepository>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn BlogRepository>) -> Self {
        Self { repo }
    }

    pub async fn add_comment(
        &self,
        user: Option<&AuthUser>,
        post_id: Uuid,
        form: CommentForm,
    ) -> Result<Comment> {
        let user = require_user(user)?;

        if self.repo.find_post_by_id(post_id).await?.is_none() {
            return Err(AppError::NotFound(format!("post {}", post_id)));
        }
        if self.repo.find_user_by_id(user.id).await?.is_none() {
            return Err(Reference::CommentAuthor.missing());
        }
        form.validate()?;

        let comment = self
            .repo
            .create_comment(NewComment {
                post_id,
                author_id: user.id,
                text: form.text,
            })
            .await?;

        COMMENT_WRITES_TOTAL.with_label_values(&["create"]).inc();
        info!(comment_id = %comment.id, %post_id, author = %user.username, "Comment created");

        Ok(comment)
    }

    /// Comments on a post, oldest first.
    pub async fn list_comments(&self, post_id: Uuid) -> Result<Vec<CommentView>> {
        self.repo.list_comments(post_id).await
    }
}
