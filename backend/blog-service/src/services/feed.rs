/// Feed composer - ordered, paginated post listings
///
/// A `Feed` is only a description: a repository handle plus a `FeedScope`.
/// Counting and slicing go to the store every time, so a feed can be held,
/// re-read and re-paginated without going stale. Pages are produced by
/// `Paginator`, which follows the usual "get page" rules:
///
/// - a missing or non-numeric page number serves page 1
/// - a number below 1 or past the end serves the last page
/// - an empty feed still has one (empty) page
use std::sync::Arc;

use crate::db::BlogRepository;
use crate::error::{AppError, Result};
use crate::metrics::FEED_PAGES_TOTAL;
use crate::middleware::{require_user, AuthUser};
use crate::models::{
    FeedScope, FollowFeedView, Group, GroupFeedView, IndexView, Page, PostView, ProfileView,
    User,
};
use crate::services::follow::FollowGraph;

#[derive(Clone)]
pub struct Feed {
    repo: Arc<dyn BlogRepository>,
    scope: FeedScope,
}

impl Feed {
    pub fn new(repo: Arc<dyn BlogRepository>, scope: FeedScope) -> Self {
        Self { repo, scope }
    }

    pub fn scope(&self) -> &FeedScope {
        &self.scope
    }

    pub async fn count(&self) -> Result<usize> {
        self.repo.count_posts(&self.scope).await
    }

    /// Up to `limit` posts starting at `offset`, newest first.
    pub async fn slice(&self, offset: usize, limit: usize) -> Result<Vec<PostView>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.repo.list_posts(&self.scope, limit, offset).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    per_page: usize,
}

impl Paginator {
    pub fn new(per_page: usize) -> Self {
        Self {
            per_page: per_page.max(1),
        }
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn num_pages(&self, count: usize) -> usize {
        if count == 0 {
            1
        } else {
            count.div_ceil(self.per_page)
        }
    }

    /// The 1-based page actually served for `requested`.
    pub fn resolve_page(&self, requested: Option<&str>, count: usize) -> usize {
        let last = self.num_pages(count);

        let Some(number) = requested.and_then(|raw| raw.trim().parse::<i64>().ok()) else {
            return 1;
        };

        if number < 1 || number as u64 > last as u64 {
            last
        } else {
            number as usize
        }
    }

    pub async fn get_page(&self, feed: &Feed, requested: Option<&str>) -> Result<Page<PostView>> {
        let count = feed.count().await?;
        let num_pages = self.num_pages(count);
        let number = self.resolve_page(requested, count);

        let items = feed.slice((number - 1) * self.per_page, self.per_page).await?;

        FEED_PAGES_TOTAL
            .with_label_values(&[feed.scope().label()])
            .inc();

        Ok(Page {
            number,
            num_pages,
            per_page: self.per_page,
            count,
            has_next: number < num_pages,
            has_previous: number > 1,
            items,
        })
    }
}

/// Builds feeds and the view models that wrap them.
#[derive(Clone)]
pub struct FeedComposer {
    repo: Arc<dyn BlogRepository>,
    follows: FollowGraph,
    paginator: Paginator,
}

impl FeedComposer {
    pub fn new(repo: Arc<dyn BlogRepository>, page_size: usize) -> Self {
        Self {
            follows: FollowGraph::new(repo.clone()),
            repo,
            paginator: Paginator::new(page_size),
        }
    }

    pub fn paginator(&self) -> Paginator {
        self.paginator
    }

    pub fn list_index(&self) -> Feed {
        Feed::new(self.repo.clone(), FeedScope::All)
    }

    pub async fn list_by_group(&self, slug: &str) -> Result<(Group, Feed)> {
        let group = self
            .repo
            .find_group_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("group {}", slug)))?;

        let feed = Feed::new(self.repo.clone(), FeedScope::Group(group.id));
        Ok((group, feed))
    }

    pub async fn list_by_author(&self, username: &str) -> Result<(User, Feed)> {
        let author = self
            .repo
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", username)))?;

        let feed = Feed::new(self.repo.clone(), FeedScope::Author(author.id));
        Ok((author, feed))
    }

    /// Posts by every author `user` follows.
    pub async fn list_followed(&self, user: &AuthUser) -> Result<Feed> {
        let mut authors: Vec<_> = self
            .follows
            .followed_authors(user.id)
            .await?
            .into_iter()
            .collect();
        authors.sort();

        Ok(Feed::new(self.repo.clone(), FeedScope::Authors(authors)))
    }

    pub async fn index_view(&self, page: Option<&str>) -> Result<IndexView> {
        let feed = self.list_index();
        let page = self.paginator.get_page(&feed, page).await?;
        Ok(IndexView { page })
    }

    pub async fn group_view(&self, slug: &str, page: Option<&str>) -> Result<GroupFeedView> {
        let (group, feed) = self.list_by_group(slug).await?;
        let page = self.paginator.get_page(&feed, page).await?;
        Ok(GroupFeedView { group, page })
    }

    pub async fn profile_view(
        &self,
        viewer: Option<&AuthUser>,
        username: &str,
        page: Option<&str>,
    ) -> Result<ProfileView> {
        let (author, feed) = self.list_by_author(username).await?;
        let page = self.paginator.get_page(&feed, page).await?;

        let following = match viewer {
            Some(viewer) => self.follows.is_following(viewer.id, author.id).await?,
            None => false,
        };

        Ok(ProfileView {
            author: (&author).into(),
            post_count: page.count,
            following,
            page,
        })
    }

    pub async fn follow_view(
        &self,
        viewer: Option<&AuthUser>,
        page: Option<&str>,
    ) -> Result<FollowFeedView> {
        let viewer = require_user(viewer)?;
        let feed = self.list_followed(viewer).await?;
        let page = self.paginator.get_page(&feed, page).await?;
        Ok(FollowFeedView { page })
    }
}
