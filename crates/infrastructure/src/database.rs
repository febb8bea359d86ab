use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use rolewarden_core::{AppError, AppResult};

/// Connection settings for the durable store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
    /// Number of connection attempts before giving up.
    pub connect_attempts: u32,
    /// Delay between connection attempts.
    pub retry_delay: Duration,
    /// Per-operation bound on acquiring a pooled connection.
    pub acquire_timeout: Duration,
}

impl StoreConfig {
    /// Creates a configuration with the reference bounds: a pool of five,
    /// three connection attempts five seconds apart, and a thirty-second
    /// acquire timeout.
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 5,
            connect_attempts: 3,
            retry_delay: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Establishes a bounded connection pool, retrying a fixed number of times.
///
/// Each attempt is verified with a round-trip `SELECT 1` before the pool is
/// declared usable. On exhaustion the caller receives
/// [`AppError::StorageUnavailable`] and may keep running degraded; every
/// store call then fails fast with the same error kind.
pub async fn connect_with_retry(config: &StoreConfig) -> AppResult<PgPool> {
    let mut last_error: Option<sqlx::Error> = None;

    for attempt in 1..=config.connect_attempts.max(1) {
        info!(
            attempt,
            max_attempts = config.connect_attempts,
            "connecting to grant store"
        );

        match try_connect(config).await {
            Ok(pool) => {
                info!("grant store connection pool established");
                return Ok(pool);
            }
            Err(connect_error) => {
                warn!(
                    attempt,
                    error = %connect_error,
                    "grant store connection attempt failed"
                );
                last_error = Some(connect_error);
            }
        }

        if attempt < config.connect_attempts {
            tokio::time::sleep(config.retry_delay).await;
        }
    }

    Err(AppError::StorageUnavailable(format!(
        "failed to connect to grant store after {} attempts: {}",
        config.connect_attempts,
        last_error.map_or_else(|| "no attempt made".to_owned(), |error| error.to_string())
    )))
}

async fn try_connect(config: &StoreConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(config.database_url.as_str())
        .await?;

    // Liveness round-trip before declaring the pool usable.
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&pool)
        .await?;

    Ok(pool)
}
