use std::{collections::HashMap, sync::Arc, time::Duration as StdDuration, time::Instant};

use axum::http::HeaderMap;
use carpool_auth::{AuthSession, Authenticator, User};
use carpool_config::{ImpactConfig, MatchingConfig};
use carpool_maps::MapsClient;
use rand::{distributions::Alphanumeric, Rng};
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::{services::ServiceError, util::require_bearer, ApiError};

const DEFAULT_OAUTH_STATE_TTL: StdDuration = StdDuration::from_secs(600);
const DEFAULT_OAUTH_STATE_CAPACITY: usize = 10_000;

#[derive(Clone)]
pub struct AppState {
    pool: SqlitePool,
    authenticator: Authenticator,
    oauth_state: OAuthStateStore,
    maps: Option<Arc<MapsClient>>,
    matching: MatchingConfig,
    impact: ImpactConfig,
}

impl AppState {
    pub fn new(pool: SqlitePool, authenticator: Authenticator, maps: Option<MapsClient>) -> Self {
        Self {
            pool,
            authenticator,
            oauth_state: OAuthStateStore::default(),
            maps: maps.map(Arc::new),
            matching: MatchingConfig::default(),
            impact: ImpactConfig::default(),
        }
    }

    pub fn with_oauth_store(mut self, oauth_state: OAuthStateStore) -> Self {
        self.oauth_state = oauth_state;
        self
    }

    pub fn with_matching(mut self, matching: MatchingConfig) -> Self {
        self.matching = matching;
        self
    }

    pub fn with_impact(mut self, impact: ImpactConfig) -> Self {
        self.impact = impact;
        self
    }

    pub fn db_pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn oauth_state(&self) -> &OAuthStateStore {
        &self.oauth_state
    }

    pub fn maps(&self) -> Option<&MapsClient> {
        self.maps.as_deref()
    }

    pub fn require_maps(&self) -> Result<&MapsClient, ServiceError> {
        self.maps().ok_or(ServiceError::MapsDisabled)
    }

    pub fn matching(&self) -> &MatchingConfig {
        &self.matching
    }

    pub fn impact(&self) -> &ImpactConfig {
        &self.impact
    }

    pub async fn authenticate(&self, token: &str) -> Result<(User, AuthSession), ApiError> {
        self.authenticator
            .authenticate_token(token)
            .await
            .map_err(ApiError::from)
    }

    /// Resolve the bearer token on a request to the signed-in profile.
    pub async fn current_user(&self, headers: &HeaderMap) -> Result<User, ApiError> {
        let token = require_bearer(headers)?;
        let (user, _) = self.authenticate(&token).await?;
        Ok(user)
    }
}

/// Single-use OAuth `state` values handed out by the identity login route.
///
/// At most `capacity` states are pending at once; issuing past that evicts
/// the oldest one.
#[derive(Clone)]
pub struct OAuthStateStore {
    inner: Arc<Mutex<HashMap<String, Instant>>>,
    ttl: StdDuration,
    capacity: usize,
}

impl OAuthStateStore {
    pub fn new(ttl: StdDuration) -> Self {
        Self::with_capacity(ttl, DEFAULT_OAUTH_STATE_CAPACITY)
    }

    pub fn with_capacity(ttl: StdDuration, capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub async fn issue(&self) -> String {
        let state = random_state();
        self.store(state.clone()).await;
        state
    }

    pub async fn store(&self, state: String) {
        let mut pending = self.inner.lock().await;
        prune(&mut pending, self.ttl);
        while pending.len() >= self.capacity {
            let Some(oldest) = pending
                .iter()
                .min_by_key(|(_, issued)| **issued)
                .map(|(state, _)| state.clone())
            else {
                break;
            };
            pending.remove(&oldest);
        }
        pending.insert(state, Instant::now());
    }

    pub async fn consume(&self, state: &str) -> bool {
        let mut pending = self.inner.lock().await;
        prune(&mut pending, self.ttl);
        pending.remove(state).is_some()
    }

    pub async fn len(&self) -> usize {
        let mut pending = self.inner.lock().await;
        prune(&mut pending, self.ttl);
        pending.len()
    }
}

impl Default for OAuthStateStore {
    fn default() -> Self {
        Self::new(DEFAULT_OAUTH_STATE_TTL)
    }
}

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

fn prune(pending: &mut HashMap<String, Instant>, ttl: StdDuration) {
    let now = Instant::now();
    pending.retain(|_, issued| now.duration_since(*issued) <= ttl);
}
