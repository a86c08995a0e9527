use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "carpool.toml",
    "config/carpool.toml",
    "../carpool.toml",
    "backend/carpool.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub maps: MapsConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub impact: ImpactConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://carpool.db".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "AuthConfig::default_session_ttl")]
    pub session_ttl_seconds: u64,
    #[serde(default)]
    pub identity: IdentityProviderConfig,
    #[serde(default)]
    pub claims: SessionClaimsConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: Self::default_session_ttl(),
            identity: IdentityProviderConfig::default(),
            claims: SessionClaimsConfig::default(),
        }
    }
}

impl AuthConfig {
    fn default_session_ttl() -> u64 {
        86_400
    }
}

/// OAuth2 authorization-code settings for the external identity provider.
///
/// ```
/// use carpool_config::IdentityProviderConfig;
///
/// let identity = IdentityProviderConfig::default();
/// assert!(!identity.is_configured());
/// assert_eq!(identity.scopes, vec!["openid", "email", "profile"]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityProviderConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub authorize_url: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub userinfo_url: Option<String>,
    #[serde(default = "IdentityProviderConfig::default_scopes")]
    pub scopes: Vec<String>,
}

impl IdentityProviderConfig {
    fn default_scopes() -> Vec<String> {
        vec!["openid".into(), "email".into(), "profile".into()]
    }

    pub fn is_configured(&self) -> bool {
        self.client_id.is_some()
            && self.client_secret.is_some()
            && self.authorize_url.is_some()
            && self.token_url.is_some()
            && self.userinfo_url.is_some()
    }
}

impl Default for IdentityProviderConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            authorize_url: None,
            token_url: None,
            userinfo_url: None,
            scopes: Self::default_scopes(),
        }
    }
}

/// Verification settings for session tokens minted by the identity provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionClaimsConfig {
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
}

impl SessionClaimsConfig {
    pub fn is_configured(&self) -> bool {
        self.jwt_secret
            .as_deref()
            .map(|secret| !secret.is_empty())
            .unwrap_or(false)
    }
}

/// Settings for the maps/places provider.
///
/// ```
/// use carpool_config::MapsConfig;
///
/// let maps = MapsConfig::default();
/// assert_eq!(maps.routes_base_url, "https://routes.googleapis.com");
/// assert_eq!(maps.request_timeout_seconds, 15);
/// assert!(!maps.is_configured());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapsConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "MapsConfig::default_places_base_url")]
    pub places_base_url: String,
    #[serde(default = "MapsConfig::default_geocode_base_url")]
    pub geocode_base_url: String,
    #[serde(default = "MapsConfig::default_routes_base_url")]
    pub routes_base_url: String,
    #[serde(default = "MapsConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "MapsConfig::default_language")]
    pub language: String,
    #[serde(default)]
    pub region: Option<String>,
}

impl MapsConfig {
    fn default_places_base_url() -> String {
        "https://places.googleapis.com".to_string()
    }

    fn default_geocode_base_url() -> String {
        "https://maps.googleapis.com".to_string()
    }

    fn default_routes_base_url() -> String {
        "https://routes.googleapis.com".to_string()
    }

    const fn default_request_timeout() -> u64 {
        15
    }

    fn default_language() -> String {
        "en".to_string()
    }

    pub fn is_configured(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false)
    }
}

impl Default for MapsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            places_base_url: Self::default_places_base_url(),
            geocode_base_url: Self::default_geocode_base_url(),
            routes_base_url: Self::default_routes_base_url(),
            request_timeout_seconds: Self::default_request_timeout(),
            language: Self::default_language(),
            region: None,
        }
    }
}

/// Thresholds used when matching a rider's trip against a driver's route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub max_pickup_distance_meters: f64,
    pub max_dropoff_distance_meters: f64,
    pub max_results: u32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_pickup_distance_meters: 2_000.0,
            max_dropoff_distance_meters: 2_000.0,
            max_results: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactConfig {
    /// Emissions of an average passenger car, in kilograms of CO2 per kilometre.
    pub co2_kg_per_km: f64,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            co2_kg_per_km: 0.192,
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use carpool_config::load;
///
/// std::env::remove_var("CARPOOL_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let session_ttl = i64::try_from(defaults.auth.session_ttl_seconds).unwrap_or(i64::MAX);

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default("auth.session_ttl_seconds", session_ttl)?
        .set_default("maps.language", defaults.maps.language.clone())?
        .set_default(
            "matching.max_pickup_distance_meters",
            defaults.matching.max_pickup_distance_meters,
        )?
        .set_default(
            "matching.max_dropoff_distance_meters",
            defaults.matching.max_dropoff_distance_meters,
        )?
        .set_default("impact.co2_kg_per_km", defaults.impact.co2_kg_per_km)?;

    let environment_overrides = config::Environment::with_prefix("CARPOOL").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("CARPOOL_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via CARPOOL_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    // The conventional sqlx variable wins over every other source.
    if let Some(url) = std::env::var("DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())
    {
        debug!("database url taken from DATABASE_URL");
        config.database.url = url;
    }

    if config.auth.session_ttl_seconds > i64::MAX as u64 {
        config.auth.session_ttl_seconds = i64::MAX as u64;
    }

    if config.matching.max_results == 0 {
        config.matching.max_results = MatchingConfig::default().max_results;
    }

    debug!(
        http = %format!("{}:{}", config.http.address, config.http.port),
        database = %config.database.url,
        maps_enabled = config.maps.is_configured(),
        identity_enabled = config.auth.identity.is_configured(),
        "loaded backend configuration"
    );
    Ok(config)
}
