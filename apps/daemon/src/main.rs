//! Rolewarden reconciliation daemon.
//!
//! Hosts the temporary-grant lifecycle: connects to the durable store with
//! bounded retries, ensures the grant schema, and runs the periodic
//! reconciliation loop until shutdown. The command layer that issues grants
//! embeds [`rolewarden_application::GrantService`] separately.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use rolewarden_application::{GrantService, GrantStore, ReconciliationScheduler};
use rolewarden_core::{AppError, AppResult};
use rolewarden_infrastructure::{
    HttpRoleAuthority, PostgresGrantStore, StoreConfig, connect_with_retry,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct DaemonConfig {
    database_url: String,
    bot_token: String,
    api_base_url: String,
    reconcile_interval_secs: u64,
    default_grant_duration_hours: i64,
    db_max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = DaemonConfig::load()?;

    let mut store_config = StoreConfig::new(config.database_url.clone());
    store_config.max_connections = config.db_max_connections;
    let pool = connect_with_retry(&store_config).await?;

    let store = Arc::new(PostgresGrantStore::new(pool));
    store.ensure_schema().await?;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;
    let authority = Arc::new(HttpRoleAuthority::new(
        http_client,
        config.api_base_url.clone(),
        config.bot_token.as_str(),
    ));

    let scheduler = Arc::new(ReconciliationScheduler::new(store.clone(), authority));
    let service = GrantService::new(
        store,
        Arc::clone(&scheduler),
        chrono::Duration::hours(config.default_grant_duration_hours),
    );

    let recorded_grants = service.count().await?;
    info!(
        api_base_url = %config.api_base_url,
        reconcile_interval_secs = config.reconcile_interval_secs,
        default_grant_duration_hours = config.default_grant_duration_hours,
        recorded_grants,
        "rolewarden-daemon started"
    );

    let reconciliation_loop = scheduler.spawn(Duration::from_secs(config.reconcile_interval_secs));

    tokio::signal::ctrl_c()
        .await
        .map_err(|error| AppError::Internal(format!("failed to await shutdown signal: {error}")))?;

    info!("shutdown signal received, stopping reconciliation loop");
    reconciliation_loop.abort();

    Ok(())
}

impl DaemonConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let bot_token = required_env("BOT_TOKEN")?;
        let api_base_url = env::var("CHAT_API_BASE_URL")
            .unwrap_or_else(|_| "https://discord.com/api/v10".to_owned())
            .trim_end_matches('/')
            .to_owned();
        let reconcile_interval_secs = parse_env_u64("RECONCILE_INTERVAL_SECS", 300)?;
        let default_grant_duration_hours = parse_env_i64("DEFAULT_GRANT_DURATION_HOURS", 48)?;
        let db_max_connections = parse_env_u32("DB_MAX_CONNECTIONS", 5)?;

        if reconcile_interval_secs == 0 {
            return Err(AppError::Validation(
                "RECONCILE_INTERVAL_SECS must be greater than zero".to_owned(),
            ));
        }

        if default_grant_duration_hours <= 0 {
            return Err(AppError::Validation(
                "DEFAULT_GRANT_DURATION_HOURS must be greater than zero".to_owned(),
            ));
        }

        if db_max_connections == 0 {
            return Err(AppError::Validation(
                "DB_MAX_CONNECTIONS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            bot_token,
            api_base_url,
            reconcile_interval_secs,
            default_grant_duration_hours,
            db_max_connections,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u32(name: &str, default: u32) -> AppResult<u32> {
    match env::var(name) {
        Ok(value) => value.parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_i64(name: &str, default: i64) -> AppResult<i64> {
    match env::var(name) {
        Ok(value) => value.parse::<i64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
