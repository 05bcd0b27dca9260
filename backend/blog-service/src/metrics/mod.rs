//! Prometheus metrics for blog-service.
//!
//! Exposes write, cache and follow collectors and an HTTP handler for the
//! `/metrics` endpoint.

use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

lazy_static! {
    /// Post writes segmented by operation (create/update/delete).
    pub static ref POST_WRITES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "blog_post_writes_total",
        "Post writes segmented by operation",
        &["op"]
    )
    .expect("failed to register blog_post_writes_total");

    /// Comments created.
    pub static ref COMMENT_WRITES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "blog_comment_writes_total",
        "Comment writes segmented by operation",
        &["op"]
    )
    .expect("failed to register blog_comment_writes_total");

    /// Index page cache events (hit/miss/write/invalidate/error).
    pub static ref PAGE_CACHE_EVENTS: IntCounterVec = register_int_counter_vec!(
        "blog_page_cache_events_total",
        "Index page cache events segmented by outcome",
        &["event"]
    )
    .expect("failed to register blog_page_cache_events_total");

    /// Follow graph operations segmented by operation and outcome.
    pub static ref FOLLOW_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "blog_follow_operations_total",
        "Follow graph operations segmented by operation and outcome",
        &["op", "outcome"]
    )
    .expect("failed to register blog_follow_operations_total");

    /// Feed pages served segmented by scope (index/group/profile/follow).
    pub static ref FEED_PAGES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "blog_feed_pages_total",
        "Feed pages served segmented by scope",
        &["scope"]
    )
    .expect("failed to register blog_feed_pages_total");
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
