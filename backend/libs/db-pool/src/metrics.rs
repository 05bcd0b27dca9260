//! Pool occupancy and acquisition metrics
//!
//! Occupancy is sampled into `PoolStats`, which the gauges and the service's
//! readiness report share. Every acquisition is counted by outcome, so the
//! error rate is `outcome != "ok"` over the total.

use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, HistogramVec,
    IntCounterVec, IntGaugeVec,
};
use serde::Serialize;
use sqlx::{pool::PoolConnection, PgPool, Postgres};
use std::time::Instant;

lazy_static::lazy_static! {
    static ref POOL_CONNECTIONS: IntGaugeVec = register_int_gauge_vec!(
        "db_pool_connections",
        "Connections held by the pool, by state",
        &["service", "state"]
    ).expect("db_pool_connections registers once");

    /// Blog queries are short; anything past 250ms is already a saturated pool.
    static ref POOL_ACQUIRE_SECONDS: HistogramVec = register_histogram_vec!(
        "db_pool_acquire_seconds",
        "Time spent waiting for a pooled connection",
        &["service"],
        vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 1.0]
    ).expect("db_pool_acquire_seconds registers once");

    static ref POOL_ACQUIRES: IntCounterVec = register_int_counter_vec!(
        "db_pool_acquires_total",
        "Connection acquisitions by outcome",
        &["service", "outcome"]
    ).expect("db_pool_acquires_total registers once");
}

/// Point-in-time view of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub size: u32,
    pub idle: u32,
    pub max: u32,
}

impl PoolStats {
    pub fn sample(pool: &PgPool) -> Self {
        Self {
            size: pool.size(),
            idle: pool.num_idle() as u32,
            max: pool.options().get_max_connections(),
        }
    }

    /// Connections checked out right now.
    pub fn in_use(&self) -> u32 {
        self.size.saturating_sub(self.idle)
    }

    /// True when every connection the pool may open is checked out.
    pub fn saturated(&self) -> bool {
        self.max > 0 && self.in_use() >= self.max
    }

    fn publish(&self, service: &str) {
        for (state, value) in [
            ("idle", self.idle),
            ("in_use", self.in_use()),
            ("max", self.max),
        ] {
            POOL_CONNECTIONS
                .with_label_values(&[service, state])
                .set(i64::from(value));
        }
    }
}

pub(crate) fn record_pool_stats(pool: &PgPool, service: &str) -> PoolStats {
    let stats = PoolStats::sample(pool);
    stats.publish(service);
    stats
}

fn acquire_outcome(result: &Result<PoolConnection<Postgres>, sqlx::Error>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(sqlx::Error::PoolTimedOut) => "timeout",
        Err(sqlx::Error::PoolClosed) => "closed",
        Err(sqlx::Error::Io(_)) => "io",
        Err(_) => "other",
    }
}

/// Check out a connection, recording wait time and outcome.
pub async fn acquire_with_metrics(
    pool: &PgPool,
    service: &str,
) -> Result<PoolConnection<Postgres>, sqlx::Error> {
    let started = Instant::now();
    let result = pool.acquire().await;

    POOL_ACQUIRE_SECONDS
        .with_label_values(&[service])
        .observe(started.elapsed().as_secs_f64());
    POOL_ACQUIRES
        .with_label_values(&[service, acquire_outcome(&result)])
        .inc();

    result
}
