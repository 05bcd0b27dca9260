/// Access policy for blog-service
///
/// Ownership checks for posts and the "must be signed in" gate for writes.
/// Callers pass the current user explicitly; nothing here reads the request.
use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::Post;

/// True iff `user` wrote `post`.
pub fn can_edit(user: &AuthUser, post: &Post) -> bool {
    user.id == post.author_id
}

/// True iff someone is signed in.
pub fn can_create(user: Option<&AuthUser>) -> bool {
    user.is_some()
}

/// The signed-in user, or `Unauthorized`.
pub fn require_user(user: Option<&AuthUser>) -> Result<&AuthUser> {
    user.ok_or_else(AppError::login_required)
}

/// Only the author can modify a post.
pub fn check_post_ownership(user: &AuthUser, post: &Post) -> Result<()> {
    if can_edit(user, post) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You don't have permission to modify this post".to_string(),
        ))
    }
}
