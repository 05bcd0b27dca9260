/// Health endpoints
///
/// Liveness only says the process is up. Readiness checks the backing
/// stores that are configured; a service running on the in-memory store
/// with no Redis has nothing to check and is always ready.
use std::collections::HashMap;
use std::time::Instant;

use actix_web::{web, HttpResponse};
use chrono::Utc;
use db_pool::PoolStats;
use redis::aio::ConnectionManager;
use redis::RedisError;
use serde::Serialize;
use sqlx::PgPool;

use crate::config::SERVICE_NAME;

#[derive(Clone, Default)]
pub struct HealthState {
    db_pool: Option<PgPool>,
    redis: Option<ConnectionManager>,
}

#[derive(Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ComponentStatus {
    Healthy,
    Unhealthy,
}

#[derive(Serialize)]
struct ComponentCheck {
    status: ComponentStatus,
    message: String,
    latency_ms: u64,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    checks: HashMap<String, ComponentCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pool: Option<PoolStats>,
    timestamp: String,
}

impl HealthState {
    pub fn new(db_pool: Option<PgPool>, redis: Option<ConnectionManager>) -> Self {
        Self { db_pool, redis }
    }

    async fn check_postgres(pool: &PgPool) -> Result<(), sqlx::Error> {
        let mut conn = db_pool::acquire_with_metrics(pool, SERVICE_NAME).await?;
        sqlx::query("SELECT 1").execute(&mut *conn).await.map(|_| ())
    }

    async fn check_redis(redis: &ConnectionManager) -> Result<(), RedisError> {
        let mut conn = redis.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(RedisError::from((
                redis::ErrorKind::ResponseError,
                "unexpected PING response",
            )))
        }
    }
}

fn component(result: Result<(), String>, ok_message: &str, started: Instant) -> ComponentCheck {
    let latency_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(()) => ComponentCheck {
            status: ComponentStatus::Healthy,
            message: ok_message.to_string(),
            latency_ms,
        },
        Err(e) => ComponentCheck {
            status: ComponentStatus::Unhealthy,
            message: e,
            latency_ms,
        },
    }
}

pub async fn health_summary(state: web::Data<HealthState>) -> HttpResponse {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = HealthState::check_postgres(pool).await {
            return HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "unhealthy",
                "error": format!("PostgreSQL connection failed: {}", e),
                "service": SERVICE_NAME
            }));
        }
    }

    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn readiness_summary(state: web::Data<HealthState>) -> HttpResponse {
    let mut checks = HashMap::new();

    if let Some(pool) = &state.db_pool {
        let started = Instant::now();
        let result = HealthState::check_postgres(pool)
            .await
            .map_err(|e| format!("PostgreSQL check failed: {}", e));
        checks.insert(
            "postgres".to_string(),
            component(result, "PostgreSQL connection successful", started),
        );
    }

    if let Some(redis) = &state.redis {
        let started = Instant::now();
        let result = HealthState::check_redis(redis)
            .await
            .map_err(|e| format!("Redis check failed: {}", e));
        checks.insert(
            "redis".to_string(),
            component(result, "Redis connection successful", started),
        );
    }

    let ready = checks
        .values()
        .all(|check| check.status == ComponentStatus::Healthy);

    let response = ReadinessResponse {
        ready,
        checks,
        pool: state.db_pool.as_ref().map(PoolStats::sample),
        timestamp: Utc::now().to_rfc3339(),
    };

    if ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

pub async fn liveness_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"alive": true}))
}
