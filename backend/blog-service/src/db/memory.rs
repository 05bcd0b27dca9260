use super::{
    CommentRepository, FollowRepository, GroupRepository, PostRepository, Reference,
    UserRepository,
};
use crate::error::{AppError, Result};
use crate::models::{
    AuthorSummary, Comment, CommentView, FeedScope, Follow, Group, NewComment, NewGroup, NewPost,
    Post, PostChanges, PostView, User,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local repository with the same semantics as `PgBlogRepository`.
///
/// One lock guards the whole state, so every operation is atomic.
#[derive(Default)]
pub struct InMemoryBlogRepository {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    groups: HashMap<Uuid, Group>,
    /// Insertion order, used to break created_at ties.
    posts: Vec<Post>,
    comments: Vec<Comment>,
    follows: Vec<Follow>,
}

fn duplicate_username() -> AppError {
    AppError::invalid_field(
        "username",
        "unique",
        "A user with that username already exists.",
    )
}

impl State {
    fn username_taken(&self, username: &str) -> bool {
        self.users.values().any(|u| u.username == username)
    }

    fn post_view(&self, post: &Post) -> Option<PostView> {
        let author = self.users.get(&post.author_id)?;
        let group = post.group_id.and_then(|id| self.groups.get(&id));
        Some(PostView::new(post, author, group))
    }

    /// Indexes of posts in `scope`, newest first.
    fn scoped_posts(&self, scope: &FeedScope) -> Vec<usize> {
        let mut indexes: Vec<usize> = self
            .posts
            .iter()
            .enumerate()
            .filter(|(_, post)| scope.matches(post))
            .map(|(idx, _)| idx)
            .collect();
        indexes.sort_by(|a, b| {
            let (pa, pb) = (&self.posts[*a], &self.posts[*b]);
            pb.created_at.cmp(&pa.created_at).then(b.cmp(a))
        });
        indexes
    }
}

impl InMemoryBlogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryBlogRepository {
    async fn create_user(&self, username: &str) -> Result<User> {
        let mut state = self.state.write().await;
        if state.username_taken(username) {
            return Err(duplicate_username());
        }

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn ensure_user(&self, user_id: Uuid, username: &str) -> Result<User> {
        let mut state = self.state.write().await;
        if let Some(user) = state.users.get(&user_id) {
            return Ok(user.clone());
        }
        if state.username_taken(username) {
            return Err(duplicate_username());
        }

        let user = User {
            id: user_id,
            username: username.to_string(),
            created_at: Utc::now(),
        };
        state.users.insert(user_id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }
}

#[async_trait]
impl GroupRepository for InMemoryBlogRepository {
    async fn create_group(&self, group: NewGroup) -> Result<Group> {
        let mut state = self.state.write().await;
        if state.groups.values().any(|g| g.slug == group.slug) {
            return Err(AppError::invalid_field(
                "slug",
                "unique",
                "A group with that slug already exists.",
            ));
        }

        let group = Group {
            id: Uuid::new_v4(),
            slug: group.slug,
            title: group.title,
            description: group.description,
        };
        state.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn find_group_by_id(&self, group_id: Uuid) -> Result<Option<Group>> {
        Ok(self.state.read().await.groups.get(&group_id).cloned())
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let state = self.state.read().await;
        Ok(state.groups.values().find(|g| g.slug == slug).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let state = self.state.read().await;
        let mut groups: Vec<Group> = state.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.slug.cmp(&b.slug)));
        Ok(groups)
    }

    async fn delete_group(&self, group_id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        for post in state.posts.iter_mut() {
            if post.group_id == Some(group_id) {
                post.group_id = None;
            }
        }
        Ok(state.groups.remove(&group_id).is_some())
    }
}

#[async_trait]
impl PostRepository for InMemoryBlogRepository {
    async fn create_post(&self, post: NewPost) -> Result<Post> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&post.author_id) {
            return Err(Reference::PostAuthor.missing());
        }
        if let Some(group_id) = post.group_id {
            if !state.groups.contains_key(&group_id) {
                return Err(Reference::PostGroup.missing());
            }
        }

        let post = Post {
            id: Uuid::new_v4(),
            author_id: post.author_id,
            group_id: post.group_id,
            text: post.text,
            image: post.image,
            created_at: Utc::now(),
        };
        state.posts.push(post.clone());
        Ok(post)
    }

    async fn find_post_by_id(&self, post_id: Uuid) -> Result<Option<Post>> {
        let state = self.state.read().await;
        Ok(state.posts.iter().find(|p| p.id == post_id).cloned())
    }

    async fn find_post_view(&self, post_id: Uuid) -> Result<Option<PostView>> {
        let state = self.state.read().await;
        Ok(state
            .posts
            .iter()
            .find(|p| p.id == post_id)
            .and_then(|post| state.post_view(post)))
    }

    async fn update_post(&self, post_id: Uuid, changes: PostChanges) -> Result<Option<Post>> {
        let mut state = self.state.write().await;
        let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) else {
            return Ok(None);
        };

        post.text = changes.text;
        post.group_id = changes.group_id;
        if changes.image.is_some() {
            post.image = changes.image;
        }
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, post_id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        state.comments.retain(|c| c.post_id != post_id);

        let before = state.posts.len();
        state.posts.retain(|p| p.id != post_id);
        Ok(state.posts.len() < before)
    }

    async fn count_posts(&self, scope: &FeedScope) -> Result<usize> {
        let state = self.state.read().await;
        Ok(state.posts.iter().filter(|p| scope.matches(p)).count())
    }

    async fn list_posts(
        &self,
        scope: &FeedScope,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PostView>> {
        let state = self.state.read().await;
        Ok(state
            .scoped_posts(scope)
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|idx| state.post_view(&state.posts[idx]))
            .collect())
    }
}

#[async_trait]
impl CommentRepository for InMemoryBlogRepository {
    async fn create_comment(&self, comment: NewComment) -> Result<Comment> {
        let mut state = self.state.write().await;
        if !state.posts.iter().any(|p| p.id == comment.post_id) {
            return Err(Reference::CommentPost.missing());
        }
        if !state.users.contains_key(&comment.author_id) {
            return Err(Reference::CommentAuthor.missing());
        }

        let comment = Comment {
            id: Uuid::new_v4(),
            post_id: comment.post_id,
            author_id: comment.author_id,
            text: comment.text,
            created_at: Utc::now(),
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<CommentView>> {
        let state = self.state.read().await;
        let mut comments: Vec<(usize, &Comment)> = state
            .comments
            .iter()
            .enumerate()
            .filter(|(_, c)| c.post_id == post_id)
            .collect();
        comments.sort_by(|(ia, a), (ib, b)| a.created_at.cmp(&b.created_at).then(ia.cmp(ib)));

        Ok(comments
            .into_iter()
            .filter_map(|(_, c)| {
                let author = state.users.get(&c.author_id)?;
                Some(CommentView {
                    id: c.id,
                    text: c.text.clone(),
                    created_at: c.created_at,
                    author: AuthorSummary::from(author),
                })
            })
            .collect())
    }

    async fn count_comments(&self, post_id: Uuid) -> Result<usize> {
        let state = self.state.read().await;
        Ok(state.comments.iter().filter(|c| c.post_id == post_id).count())
    }
}

#[async_trait]
impl FollowRepository for InMemoryBlogRepository {
    async fn create_follow(&self, follower_id: Uuid, author_id: Uuid) -> Result<bool> {
        if follower_id == author_id {
            return Err(AppError::Internal(
                "follows_no_self_follow constraint violated".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        if !state.users.contains_key(&follower_id) {
            return Err(Reference::Follower.missing());
        }
        if !state.users.contains_key(&author_id) {
            return Err(Reference::FollowedAuthor.missing());
        }
        if state
            .follows
            .iter()
            .any(|f| f.follower_id == follower_id && f.author_id == author_id)
        {
            return Ok(false);
        }

        state.follows.push(Follow {
            id: Uuid::new_v4(),
            follower_id,
            author_id,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn delete_follow(&self, follower_id: Uuid, author_id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.follows.len();
        state
            .follows
            .retain(|f| !(f.follower_id == follower_id && f.author_id == author_id));
        Ok(state.follows.len() < before)
    }

    async fn is_following(&self, follower_id: Uuid, author_id: Uuid) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .follows
            .iter()
            .any(|f| f.follower_id == follower_id && f.author_id == author_id))
    }

    async fn followed_author_ids(&self, follower_id: Uuid) -> Result<Vec<Uuid>> {
        let state = self.state.read().await;
        Ok(state
            .follows
            .iter()
            .filter(|f| f.follower_id == follower_id)
            .map(|f| f.author_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_post(repo: &InMemoryBlogRepository, author: &User, group: Option<&Group>) -> Post {
        repo.create_post(NewPost {
            author_id: author.id,
            group_id: group.map(|g| g.id),
            text: "Тестовый пост".into(),
            image: None,
        })
        .await
        .unwrap()
    }

    fn test_group() -> NewGroup {
        NewGroup {
            slug: "test_slug".into(),
            title: "Тестовая группа".into(),
            description: "Тестовое описание".into(),
        }
    }

    #[tokio::test]
    async fn deleting_group_nullifies_posts() {
        let repo = InMemoryBlogRepository::new();
        let author = repo.create_user("auth").await.unwrap();
        let group = repo.create_group(test_group()).await.unwrap();
        let post = seed_post(&repo, &author, Some(&group)).await;

        assert!(repo.delete_group(group.id).await.unwrap());

        let stored = repo.find_post_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(stored.group_id, None);
        assert_eq!(repo.count_posts(&FeedScope::All).await.unwrap(), 1);
        assert!(!repo.delete_group(group.id).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_post_cascades_to_comments() {
        let repo = InMemoryBlogRepository::new();
        let author = repo.create_user("auth").await.unwrap();
        let post = seed_post(&repo, &author, None).await;
        let other = seed_post(&repo, &author, None).await;
        for post_id in [post.id, post.id, other.id] {
            repo.create_comment(NewComment {
                post_id,
                author_id: author.id,
                text: "comment".into(),
            })
            .await
            .unwrap();
        }

        assert!(repo.delete_post(post.id).await.unwrap());
        assert_eq!(repo.count_comments(post.id).await.unwrap(), 0);
        assert_eq!(repo.count_comments(other.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_posts_is_newest_first_and_sliced() {
        let repo = InMemoryBlogRepository::new();
        let author = repo.create_user("auth").await.unwrap();
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(seed_post(&repo, &author, None).await.id);
        }
        ids.reverse();

        let first = repo.list_posts(&FeedScope::All, 2, 0).await.unwrap();
        let rest = repo.list_posts(&FeedScope::All, 10, 2).await.unwrap();
        let listed: Vec<Uuid> = first.iter().chain(rest.iter()).map(|p| p.id).collect();
        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn duplicate_username_is_a_validation_error() {
        let repo = InMemoryBlogRepository::new();
        repo.create_user("auth").await.unwrap();
        assert!(matches!(
            repo.create_user("auth").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn follow_edges_are_unique() {
        let repo = InMemoryBlogRepository::new();
        let a = repo.create_user("a").await.unwrap();
        let b = repo.create_user("b").await.unwrap();

        assert!(repo.create_follow(a.id, b.id).await.unwrap());
        assert!(!repo.create_follow(a.id, b.id).await.unwrap());
        assert_eq!(repo.followed_author_ids(a.id).await.unwrap(), vec![b.id]);
        assert!(repo.delete_follow(a.id, b.id).await.unwrap());
        assert!(!repo.delete_follow(a.id, b.id).await.unwrap());
    }

    #[tokio::test]
    async fn dangling_references_are_rejected() {
        let repo = InMemoryBlogRepository::new();
        let author = repo.create_user("auth").await.unwrap();
        let post = seed_post(&repo, &author, None).await;
        let ghost = Uuid::new_v4();

        assert!(matches!(
            repo.create_follow(ghost, author.id).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            repo.create_follow(author.id, ghost).await,
            Err(AppError::NotFound(_))
        ));
        assert!(repo.followed_author_ids(ghost).await.unwrap().is_empty());

        assert!(matches!(
            repo.create_comment(NewComment {
                post_id: post.id,
                author_id: ghost,
                text: "comment".into(),
            })
            .await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            repo.create_comment(NewComment {
                post_id: Uuid::new_v4(),
                author_id: author.id,
                text: "comment".into(),
            })
            .await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            repo.create_post(NewPost {
                author_id: ghost,
                group_id: None,
                text: "text".into(),
                image: None,
            })
            .await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn ensure_user_keeps_the_token_id() {
        let repo = InMemoryBlogRepository::new();
        let id = Uuid::new_v4();

        let user = repo.ensure_user(id, "auth").await.unwrap();
        assert_eq!(user.id, id);
        assert_eq!(repo.ensure_user(id, "renamed").await.unwrap().username, "auth");
        assert!(matches!(
            repo.ensure_user(Uuid::new_v4(), "auth").await,
            Err(AppError::Validation(_))
        ));
    }
}
