/// HTTP handlers for blog-service
///
/// This module contains handlers for:
/// - Feeds: index, group, profile and followed-authors pages
/// - Posts: detail, create, edit and delete
/// - Comments: adding a comment to a post
/// - Follows: following and unfollowing an author
/// - Health: liveness and readiness checks
///
/// Writes answer with a 302 to the page the user should see next. Requests
/// that need a signed-in user and have none are redirected to the login page
/// with `next` set to the requested path.
pub mod comments;
pub mod feed;
pub mod follow;
pub mod health;
pub mod posts;

pub use comments::add_comment;
pub use feed::{follow_index, group_posts, index, profile};
pub use follow::{profile_follow, profile_unfollow};
pub use health::{health_summary, liveness_check, readiness_summary, HealthState};
pub use posts::{create_post, delete_post, edit_post, edit_post_form, new_post_form, post_detail};

use actix_web::{http::header, web, HttpResponse};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::AppState;

/// `?page=N` on any feed. Kept as raw text so bad values fall back to page 1.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

pub(crate) fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

/// Turns a missing login into the login redirect; other errors pass through.
pub(crate) fn login_or(current: &CurrentUser, result: Result<HttpResponse>) -> Result<HttpResponse> {
    match result {
        Err(AppError::Unauthorized(_)) => Ok(redirect(current.login_redirect())),
        other => other,
    }
}

/// Mirror the signed-in user before a write that references them. Anonymous
/// requests pass through so the service can answer with the login redirect.
pub(crate) async fn mirror_identity(state: &AppState, current: &CurrentUser) -> Result<()> {
    if let Some(user) = current.user() {
        state.users.sync_identity(user).await?;
    }
    Ok(())
}

pub(crate) fn post_url(post_id: uuid::Uuid) -> String {
    format!("/posts/{}/", post_id)
}

pub(crate) fn profile_url(username: &str) -> String {
    format!("/profile/{}/", username)
}

/// Register every blog route.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/group/{slug}/", web::get().to(group_posts))
        .route("/profile/{username}/", web::get().to(profile))
        .route("/profile/{username}/follow/", web::post().to(profile_follow))
        .route(
            "/profile/{username}/unfollow/",
            web::post().to(profile_unfollow),
        )
        .route("/follow/", web::get().to(follow_index))
        .service(
            web::resource("/create/")
                .route(web::get().to(new_post_form))
                .route(web::post().to(create_post)),
        )
        .service(
            web::resource("/posts/{post_id}/")
                .route(web::get().to(post_detail))
                .route(web::delete().to(delete_post)),
        )
        .service(
            web::resource("/posts/{post_id}/edit/")
                .route(web::get().to(edit_post_form))
                .route(web::post().to(edit_post)),
        )
        .route("/posts/{post_id}/comment/", web::post().to(add_comment))
        .route("/api/v1/health", web::get().to(health_summary))
        .route("/api/v1/health/ready", web::get().to(readiness_summary))
        .route("/api/v1/health/live", web::get().to(liveness_check))
        .route("/metrics", web::get().to(crate::metrics::serve_metrics));
}
