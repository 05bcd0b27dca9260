/// Business logic layer for blog-service
///
/// Services take the current user as an explicit `Option<&AuthUser>` and
/// return typed results; rendering and redirects belong to the handlers.
pub mod comments;
pub mod feed;
pub mod follow;
pub mod groups;
pub mod posts;
pub mod users;

pub use comments::{CommentForm, CommentService};
pub use feed::{Feed, FeedComposer, Paginator};
pub use follow::{FollowGraph, FollowOutcome};
pub use groups::{GroupForm, GroupService};
pub use posts::{PostForm, PostService};
pub use users::{UserForm, UserService};
