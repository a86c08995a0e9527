use anyhow::{Context, Result};
use carpool_auth::Authenticator;
use carpool_config::AppConfig;
use carpool_database::initialize_database;
use carpool_maps::MapsClient;
use sqlx::SqlitePool;
use tracing::{info, warn};

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

        let subscriber = SubscriberBuilder::default()
            .with_env_filter(env_filter)
            .with_target(false)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Long-lived handles shared by every request.
#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub authenticator: Authenticator,
    pub maps: Option<MapsClient>,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise database")?;

        let authenticator = Authenticator::new(db_pool.clone(), config.auth.clone());
        if !authenticator.identity_enabled() {
            info!("identity provider sign-in disabled");
        }

        let maps = MapsClient::from_config(&config.maps).context("invalid maps configuration")?;
        if maps.is_none() {
            warn!("maps api key not set; ride routes fall back to straight segments");
        }

        info!(database = %config.database.url, "backend services ready");

        Ok(Self {
            db_pool,
            authenticator,
            maps,
        })
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
