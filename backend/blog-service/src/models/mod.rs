/// Data models for blog-service
///
/// This module defines structures for:
/// - User: authors, mirrored from the identity system
/// - Group: topical groups posts can be published to
/// - Post: text posts with an optional image
/// - Comment: comments on posts
/// - Follow: directed follower -> author edges
///
/// View models returned by the feed composer live in `views`.
pub mod views;

pub use views::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Number of characters of the text used when a post is displayed.
pub const POST_DISPLAY_CHARS: usize = 15;

/// Upload prefix for post images.
pub const POST_IMAGE_PREFIX: &str = "posts/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: String,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub group_id: Option<Uuid>,
    pub text: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview: String = self.text.chars().take(POST_DISPLAY_CHARS).collect();
        f.write_str(&preview)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Follow {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a group.
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub slug: String,
    pub title: String,
    pub description: String,
}

/// Insert payload for a post. Fields are already validated.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: Uuid,
    pub group_id: Option<Uuid>,
    pub text: String,
    pub image: Option<String>,
}

/// Edit payload for a post.
///
/// `image: None` keeps the stored image, matching how a file field left empty
/// behaves on an edit form.
#[derive(Debug, Clone)]
pub struct PostChanges {
    pub group_id: Option<Uuid>,
    pub text: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
}

/// Which posts a feed covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedScope {
    /// Every post.
    All,
    Group(Uuid),
    Author(Uuid),
    /// Posts by any of the listed authors. An empty list matches nothing.
    Authors(Vec<Uuid>),
}

impl FeedScope {
    /// Label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            FeedScope::All => "index",
            FeedScope::Group(_) => "group",
            FeedScope::Author(_) => "profile",
            FeedScope::Authors(_) => "follow",
        }
    }

    /// In-memory predicate equivalent to the SQL filter for this scope.
    pub fn matches(&self, post: &Post) -> bool {
        match self {
            FeedScope::All => true,
            FeedScope::Group(group_id) => post.group_id == Some(*group_id),
            FeedScope::Author(author_id) => post.author_id == *author_id,
            FeedScope::Authors(author_ids) => author_ids.contains(&post.author_id),
        }
    }
}
