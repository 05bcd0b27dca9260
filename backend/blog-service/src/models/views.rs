//! Typed view models returned to the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Group, Post, User};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub username: String,
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
}

impl From<&Group> for GroupSummary {
    fn from(group: &Group) -> Self {
        Self {
            id: group.id,
            slug: group.slug.clone(),
            title: group.title.clone(),
        }
    }
}

/// A post joined with its author and group, as shown in feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostView {
    pub id: Uuid,
    pub text: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub author: AuthorSummary,
    pub group: Option<GroupSummary>,
}

impl PostView {
    pub fn new(post: &Post, author: &User, group: Option<&Group>) -> Self {
        Self {
            id: post.id,
            text: post.text.clone(),
            image: post.image.clone(),
            created_at: post.created_at,
            author: author.into(),
            group: group.map(GroupSummary::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentView {
    pub id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author: AuthorSummary,
}

/// One page of a feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// 1-based page number actually served.
    pub number: usize,
    pub num_pages: usize,
    pub per_page: usize,
    /// Total number of items across all pages.
    pub count: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexView {
    pub page: Page<PostView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupFeedView {
    pub group: Group,
    pub page: Page<PostView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileView {
    pub author: AuthorSummary,
    pub post_count: usize,
    /// Whether the viewer follows this author. Always false for anonymous viewers.
    pub following: bool,
    pub page: Page<PostView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetailView {
    pub post: PostView,
    pub author_post_count: usize,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowFeedView {
    pub page: Page<PostView>,
}

/// Context for the create/edit post form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostFormView {
    pub is_edit: bool,
    pub post_id: Option<Uuid>,
    pub text: String,
    pub group: Option<Uuid>,
    pub image: Option<String>,
    pub groups: Vec<GroupSummary>,
}
