/// Group service - group administration
///
/// Groups are created and removed by operators; there is no public HTTP
/// route for either. Deleting a group keeps its posts (their group becomes
/// null), which changes what the index shows, so the index cache is dropped.
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::cache::PageCache;
use crate::db::BlogRepository;
use crate::error::{AppError, Result};
use crate::models::{Group, NewGroup};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GroupForm {
    #[validate(
        length(min = 1, max = 50),
        custom(function = "crate::validators::validate_slug")
    )]
    pub slug: String,
    #[validate(
        length(max = 200),
        custom(function = "crate::validators::validate_not_blank")
    )]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

pub struct GroupService {
    repo: Arc<dyn BlogRepository>,
    cache: Arc<dyn PageCache>,
}

impl GroupService {
    pub fn new(repo: Arc<dyn BlogRepository>, cache: Arc<dyn PageCache>) -> Self {
        Self { repo, cache }
    }

    pub async fn create_group(&self, form: GroupForm) -> Result<Group> {
        form.validate()?;

        let group = self
            .repo
            .create_group(NewGroup {
                slug: form.slug,
                title: form.title,
                description: form.description,
            })
            .await?;

        info!(group_id = %group.id, slug = %group.slug, "Group created");
        Ok(group)
    }

    pub async fn get_group(&self, slug: &str) -> Result<Group> {
        self.repo
            .find_group_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("group {}", slug)))
    }

    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        self.repo.list_groups().await
    }

    pub async fn delete_group(&self, group_id: Uuid) -> Result<()> {
        if !self.repo.delete_group(group_id).await? {
            return Err(AppError::NotFound(format!("group {}", group_id)));
        }

        info!(%group_id, "Group deleted");

        if let Err(e) = self.cache.invalidate_index().await {
            warn!(error = %e, "Failed to invalidate index page cache");
        }
        Ok(())
    }
}
