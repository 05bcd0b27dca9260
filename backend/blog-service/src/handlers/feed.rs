/// Feed handlers - index, group, profile and followed-authors pages
use actix_web::{http::header::ContentType, web, HttpResponse};
use tracing::warn;

use super::{login_or, PageQuery};
use crate::cache::IndexLookup;
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::AppState;

fn index_cache_key(query: &PageQuery) -> String {
    format!("page={}", query.page.as_deref().unwrap_or(""))
}

/// Index page, served from the page cache when fresh
pub async fn index(state: web::Data<AppState>, query: web::Query<PageQuery>) -> Result<HttpResponse> {
    let key = index_cache_key(&query);

    let generation = match state.cache.get_index(&key).await {
        Ok(IndexLookup {
            body: Some(body), ..
        }) => {
            return Ok(HttpResponse::Ok()
                .content_type(ContentType::json())
                .body(body))
        }
        Ok(IndexLookup { generation, .. }) => Some(generation),
        Err(e) => {
            warn!(error = %e, "Index page cache read failed");
            None
        }
    };

    let view = state.feeds.index_view(query.page.as_deref()).await?;
    let body = serde_json::to_string(&view)?;

    // Without a generation there is nothing safe to store under.
    if let Some(generation) = generation {
        if let Err(e) = state.cache.put_index(generation, &key, body.clone()).await {
            warn!(error = %e, "Index page cache write failed");
        }
    }

    Ok(HttpResponse::Ok()
        .content_type(ContentType::json())
        .body(body))
}

pub async fn group_posts(
    state: web::Data<AppState>,
    slug: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let view = state.feeds.group_view(&slug, query.page.as_deref()).await?;
    Ok(HttpResponse::Ok().json(view))
}

pub async fn profile(
    state: web::Data<AppState>,
    current: CurrentUser,
    username: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let view = state
        .feeds
        .profile_view(current.user(), &username, query.page.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(view))
}

/// Posts by the authors the current user follows
pub async fn follow_index(
    state: web::Data<AppState>,
    current: CurrentUser,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let result = state
        .feeds
        .follow_view(current.user(), query.page.as_deref())
        .await
        .map(|view| HttpResponse::Ok().json(view));

    login_or(&current, result)
}
