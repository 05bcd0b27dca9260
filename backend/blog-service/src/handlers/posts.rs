/// Post handlers - detail, create, edit and delete
use actix_web::{web, HttpResponse};
use uuid::Uuid;

use super::{login_or, mirror_identity, post_url, profile_url, redirect};
use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::services::PostForm;
use crate::AppState;

pub async fn post_detail(state: web::Data<AppState>, post_id: web::Path<Uuid>) -> Result<HttpResponse> {
    let view = state.posts.post_detail(post_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(view))
}

pub async fn new_post_form(state: web::Data<AppState>, current: CurrentUser) -> Result<HttpResponse> {
    let result = state
        .posts
        .new_post_form(current.user())
        .await
        .map(|view| HttpResponse::Ok().json(view));

    login_or(&current, result)
}

/// Create a post; on success go to the author's profile
pub async fn create_post(
    state: web::Data<AppState>,
    current: CurrentUser,
    form: web::Json<PostForm>,
) -> Result<HttpResponse> {
    mirror_identity(&state, &current).await?;

    let result = match state.posts.create_post(current.user(), form.into_inner()).await {
        Ok(post) => state
            .users
            .get_user(post.author_id)
            .await
            .map(|author| redirect(&profile_url(&author.username))),
        Err(e) => Err(e),
    };

    login_or(&current, result)
}

/// Edit form; anyone but the author is sent back to the post
pub async fn edit_post_form(
    state: web::Data<AppState>,
    current: CurrentUser,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let post_id = post_id.into_inner();
    let result = match state.posts.edit_post_form(current.user(), post_id).await {
        Ok(view) => Ok(HttpResponse::Ok().json(view)),
        Err(AppError::Forbidden(_)) => Ok(redirect(&post_url(post_id))),
        Err(e) => Err(e),
    };

    login_or(&current, result)
}

pub async fn edit_post(
    state: web::Data<AppState>,
    current: CurrentUser,
    post_id: web::Path<Uuid>,
    form: web::Json<PostForm>,
) -> Result<HttpResponse> {
    let post_id = post_id.into_inner();
    let result = match state
        .posts
        .edit_post(current.user(), post_id, form.into_inner())
        .await
    {
        Ok(_) | Err(AppError::Forbidden(_)) => Ok(redirect(&post_url(post_id))),
        Err(e) => Err(e),
    };

    login_or(&current, result)
}

/// Author-only delete. Answers 401/403 instead of redirecting.
pub async fn delete_post(
    state: web::Data<AppState>,
    current: CurrentUser,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    state
        .posts
        .delete_post(current.user(), post_id.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
