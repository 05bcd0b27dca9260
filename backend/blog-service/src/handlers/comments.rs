/// Comment handlers
use actix_web::{web, HttpResponse};
use uuid::Uuid;

use super::{login_or, mirror_identity, post_url, redirect};
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::services::CommentForm;
use crate::AppState;

pub async fn add_comment(
    state: web::Data<AppState>,
    current: CurrentUser,
    post_id: web::Path<Uuid>,
    form: web::Json<CommentForm>,
) -> Result<HttpResponse> {
    let post_id = post_id.into_inner();
    mirror_identity(&state, &current).await?;

    let result = state
        .comments
        .add_comment(current.user(), post_id, form.into_inner())
        .await
        .map(|_| redirect(&post_url(post_id)));

    login_or(&current, result)
}
