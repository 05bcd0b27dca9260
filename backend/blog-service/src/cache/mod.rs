/// Index page caching
///
/// The rendered index page is cached for a short TTL, keyed by the requested
/// page. Any post mutation invalidates every cached index page at once. Other
/// feeds (group, profile, follow) are never cached.
///
/// Both caches are generational. A lookup reports the generation it read,
/// and a page rendered after a miss is stored under that generation only, so
/// a render that raced an invalidation can never become visible.
///
/// - `RedisPageCache`: shared across instances; invalidation bumps a
///   generation counter so stale pages become unreachable immediately and
///   expire on their own.
/// - `InMemoryPageCache`: per-process, used in tests and when no Redis URL is
///   configured.
use crate::error::Result;
use crate::metrics::PAGE_CACHE_EVENTS;
use async_trait::async_trait;
use moka::future::Cache;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Outcome of an index lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLookup {
    /// Cache generation current when the lookup ran.
    pub generation: u64,
    pub body: Option<String>,
}

#[async_trait]
pub trait PageCache: Send + Sync {
    /// Cached body of the index page for `page_key`, if still fresh.
    async fn get_index(&self, page_key: &str) -> Result<IndexLookup>;

    /// Store a page rendered after a lookup that saw `generation`.
    async fn put_index(&self, generation: u64, page_key: &str, body: String) -> Result<()>;

    /// Drop every cached index page.
    async fn invalidate_index(&self) -> Result<()>;
}

fn record_lookup(body: &Option<String>) -> &'static str {
    let event = if body.is_some() { "hit" } else { "miss" };
    PAGE_CACHE_EVENTS.with_label_values(&[event]).inc();
    event
}

/// Redis-backed page cache
#[derive(Clone)]
pub struct RedisPageCache {
    redis: ConnectionManager,
    ttl: Duration,
}

impl RedisPageCache {
    pub fn new(redis: ConnectionManager, ttl_secs: u64) -> Self {
        Self {
            redis,
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    pub async fn connect(redis_url: &str, ttl_secs: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self::new(manager, ttl_secs))
    }

    pub fn manager(&self) -> ConnectionManager {
        self.redis.clone()
    }

    fn generation_key() -> &'static str {
        "blog:page:index:gen"
    }

    fn page_key(generation: u64, page_key: &str) -> String {
        format!("blog:page:index:{}:{}", generation, page_key)
    }

    async fn generation(&self) -> Result<u64> {
        let mut conn = self.redis.clone();
        let generation: Option<u64> = conn.get(Self::generation_key()).await?;
        Ok(generation.unwrap_or(0))
    }
}

#[async_trait]
impl PageCache for RedisPageCache {
    async fn get_index(&self, page_key: &str) -> Result<IndexLookup> {
        let generation = self.generation().await?;
        let key = Self::page_key(generation, page_key);
        let mut conn = self.redis.clone();
        let body: Option<String> = conn.get(&key).await?;

        let event = record_lookup(&body);
        debug!(key = %key, event, "Index page cache lookup");

        Ok(IndexLookup { generation, body })
    }

    /// A stale generation lands under a key no lookup reads any more.
    async fn put_index(&self, generation: u64, page_key: &str, body: String) -> Result<()> {
        let key = Self::page_key(generation, page_key);
        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(&key, body, self.ttl.as_secs().max(1))
            .await?;

        PAGE_CACHE_EVENTS.with_label_values(&["write"]).inc();
        Ok(())
    }

    async fn invalidate_index(&self) -> Result<()> {
        let mut conn = self.redis.clone();
        let generation: u64 = conn.incr(Self::generation_key(), 1u64).await?;

        PAGE_CACHE_EVENTS.with_label_values(&["invalidate"]).inc();
        debug!(generation, "Index page cache INVALIDATE");
        Ok(())
    }
}

/// Process-local page cache
#[derive(Clone)]
pub struct InMemoryPageCache {
    pages: Cache<String, String>,
    generation: Arc<AtomicU64>,
}

impl InMemoryPageCache {
    pub fn new(ttl_secs: u64) -> Self {
        let pages = Cache::builder()
            .max_capacity(1_000)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();
        Self {
            pages,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    fn page_key(generation: u64, page_key: &str) -> String {
        format!("{}:{}", generation, page_key)
    }
}

#[async_trait]
impl PageCache for InMemoryPageCache {
    async fn get_index(&self, page_key: &str) -> Result<IndexLookup> {
        let generation = self.generation.load(Ordering::Acquire);
        let body = self.pages.get(&Self::page_key(generation, page_key)).await;
        record_lookup(&body);
        Ok(IndexLookup { generation, body })
    }

    async fn put_index(&self, generation: u64, page_key: &str, body: String) -> Result<()> {
        if generation != self.generation.load(Ordering::Acquire) {
            PAGE_CACHE_EVENTS.with_label_values(&["stale_write"]).inc();
            debug!(generation, page_key, "Dropped index page rendered before invalidation");
            return Ok(());
        }

        self.pages
            .insert(Self::page_key(generation, page_key), body)
            .await;
        PAGE_CACHE_EVENTS.with_label_values(&["write"]).inc();
        Ok(())
    }

    async fn invalidate_index(&self) -> Result<()> {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.pages.invalidate_all();
        PAGE_CACHE_EVENTS.with_label_values(&["invalidate"]).inc();
        Ok(())
    }
}
