/// Blog Service Library
///
/// Posts, groups, comments and follows for the Yatube blogging platform.
/// Readers browse feeds anonymously; signing in (a bearer token issued by
/// the identity system) lets a user post, comment and follow authors.
///
/// # Modules
///
/// - `handlers`: HTTP request handlers and route table
/// - `models`: entities, write payloads and view models
/// - `services`: business logic (posts, comments, groups, users, feeds, follows)
/// - `db`: repository traits with PostgreSQL and in-memory implementations
/// - `cache`: index page cache and invalidation
/// - `middleware`: bearer token extraction and access policy
/// - `error`: error types and HTTP mapping
/// - `config`: configuration management
/// - `metrics`: Prometheus collectors
/// - `validators`: form field validators
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;
pub mod validators;

pub use config::Config;
pub use error::{AppError, Result};

use std::sync::Arc;

use cache::PageCache;
use db::BlogRepository;
use services::{CommentService, FeedComposer, FollowGraph, PostService, UserService};

/// Shared per-process state handed to every handler.
///
/// Groups are managed out of band (provisioning or `GroupService` directly);
/// no route creates or deletes them.
pub struct AppState {
    pub posts: PostService,
    pub comments: CommentService,
    pub users: UserService,
    pub follows: FollowGraph,
    pub feeds: FeedComposer,
    pub cache: Arc<dyn PageCache>,
}

impl AppState {
    pub fn new(repo: Arc<dyn BlogRepository>, cache: Arc<dyn PageCache>, page_size: usize) -> Self {
        Self {
            posts: PostService::new(repo.clone(), cache.clone()),
            comments: CommentService::new(repo.clone()),
            users: UserService::new(repo.clone()),
            follows: FollowGraph::new(repo.clone()),
            feeds: FeedComposer::new(repo, page_size),
            cache,
        }
    }
}
