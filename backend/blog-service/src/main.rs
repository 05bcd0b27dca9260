use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::{anyhow, Context};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blog_service::cache::{InMemoryPageCache, PageCache, RedisPageCache};
use blog_service::config::{Config, SERVICE_NAME};
use blog_service::db::{self, BlogRepository, InMemoryBlogRepository, PgBlogRepository};
use blog_service::handlers::{configure_routes, HealthState};
use blog_service::middleware::AuthSettings;
use blog_service::AppState;
use db_pool::{create_pool, DbConfig};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,blog_service=debug,actix_web=info,sqlx=warn".into());

    let json_logs = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true),
            )
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to install SIGTERM handler"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

/// Blog Service
///
/// Serves the Yatube feeds, post pages and write endpoints.
///
/// # Routes
///
/// - `/`, `/group/{slug}/`, `/profile/{username}/`, `/follow/` - feeds
/// - `/posts/{id}/`, `/create/`, `/posts/{id}/edit/` - posts
/// - `/posts/{id}/comment/` - comments
/// - `/profile/{username}/follow/`, `/profile/{username}/unfollow/` - follows
/// - `/api/v1/health*`, `/metrics` - operations
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env().map_err(|e| anyhow!("Failed to load configuration: {}", e))?;
    info!(env = %config.app.env, "Starting {}", SERVICE_NAME);

    let (repo, pg_pool) = match &config.database.url {
        Some(url) => {
            let db_config = DbConfig::for_url(SERVICE_NAME, url)
                .with_max_connections(config.database.max_connections);
            db_config.log_config();

            let pool = create_pool(db_config)
                .await
                .context("Failed to create database pool")?;

            if config.database.run_migrations {
                db::run_migrations(&pool)
                    .await
                    .context("Failed to run database migrations")?;
            }

            let repo: Arc<dyn BlogRepository> = Arc::new(PgBlogRepository::new(pool.clone()));
            (repo, Some(pool))
        }
        None => {
            warn!("DATABASE_URL not set; using the in-memory store, data will not persist");
            let repo: Arc<dyn BlogRepository> = Arc::new(InMemoryBlogRepository::new());
            (repo, None)
        }
    };

    let ttl = config.cache.index_ttl_secs;
    let (cache, redis_manager) = match &config.cache.redis_url {
        Some(url) => {
            let redis_cache = RedisPageCache::connect(url, ttl)
                .await
                .context("Failed to connect to Redis")?;
            let manager = redis_cache.manager();
            info!(ttl_secs = ttl, "Index page cache: Redis");
            let cache: Arc<dyn PageCache> = Arc::new(redis_cache);
            (cache, Some(manager))
        }
        None => {
            info!(ttl_secs = ttl, "Index page cache: in-process");
            let cache: Arc<dyn PageCache> = Arc::new(InMemoryPageCache::new(ttl));
            (cache, None)
        }
    };

    let state = web::Data::new(AppState::new(repo, cache, config.feed.page_size));
    let auth = web::Data::new(AuthSettings::new(
        &config.auth.jwt_secret,
        config.auth.login_url.clone(),
    ));
    let health = web::Data::new(HealthState::new(pg_pool, redis_manager));

    let bind_address = (config.app.host.clone(), config.app.port);
    info!("Listening on {}:{}", bind_address.0, bind_address.1);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(auth.clone())
            .app_data(health.clone())
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(configure_routes)
    })
    .bind(bind_address)?
    .disable_signals()
    .run();

    let handle = server.handle();
    tokio::select! {
        result = server => {
            result.context("HTTP server failed")?;
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping server");
            handle.stop(true).await;
        }
    }

    info!("{} stopped", SERVICE_NAME);
    Ok(())
}
