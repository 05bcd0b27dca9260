/// Follow handlers - both answer with a redirect to the author's profile
use actix_web::{web, HttpResponse};

use super::{login_or, mirror_identity, profile_url, redirect};
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::AppState;

pub async fn profile_follow(
    state: web::Data<AppState>,
    current: CurrentUser,
    username: web::Path<String>,
) -> Result<HttpResponse> {
    mirror_identity(&state, &current).await?;

    let result = state
        .follows
        .follow_username(current.user(), &username)
        .await
        .map(|(author, _)| redirect(&profile_url(&author.username)));

    login_or(&current, result)
}

pub async fn profile_unfollow(
    state: web::Data<AppState>,
    current: CurrentUser,
    username: web::Path<String>,
) -> Result<HttpResponse> {
    let result = state
        .follows
        .unfollow_username(current.user(), &username)
        .await
        .map(|author| redirect(&profile_url(&author.username)));

    login_or(&current, result)
}
