use std::{env, sync::Arc, time::Duration};

use serde::Deserialize;
use sqlx::{
    AnyPool,
    any::{AnyPoolOptions, install_default_drivers},
};
use tracing::info;

use crate::{ConnectionRegistry, Error, SessionProvider, db_adapter::SqlxSession};

/// Pool settings of a data source
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: Some(600),
            test_before_acquire: true,
        }
    }
}

impl EngineOptions {
    /// Apply `<PREFIX>_MAX_CONNECTIONS`, `<PREFIX>_MIN_CONNECTIONS` and
    /// `<PREFIX>_ACQUIRE_TIMEOUT_SECS` overrides
    pub fn with_env_overrides(mut self, prefix: &str) -> Self {
        if let Some(max) = env_number::<u32>(prefix, "MAX_CONNECTIONS") {
            self.max_connections = max;
            info!("Overriding max_connections from env: {}", max);
        }
        if let Some(min) = env_number::<u32>(prefix, "MIN_CONNECTIONS") {
            self.min_connections = min;
            info!("Overriding min_connections from env: {}", min);
        }
        if let Some(secs) = env_number::<u64>(prefix, "ACQUIRE_TIMEOUT_SECS") {
            self.acquire_timeout_secs = secs;
            info!("Overriding acquire_timeout from env: {}s", secs);
        }
        self
    }

    fn pool_options(&self) -> AnyPoolOptions {
        AnyPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .idle_timeout(self.idle_timeout_secs.map(Duration::from_secs))
            .test_before_acquire(self.test_before_acquire)
    }
}

fn env_number<T: std::str::FromStr>(prefix: &str, name: &str) -> Option<T> {
    env::var(format!("{prefix}_{name}")).ok()?.parse().ok()
}

/// A named data source: a lazily connecting pool registered under its id
///
/// Must be created inside a tokio runtime.
#[derive(Debug)]
pub struct Connector {
    id: String,
    dsn: String,
    options: EngineOptions,
    pool: AnyPool,
    registry: Arc<ConnectionRegistry<AnyPool>>,
}

impl Connector {
    pub fn new(
        id: impl Into<String>,
        dsn: impl Into<String>,
        options: EngineOptions,
        registry: Arc<ConnectionRegistry<AnyPool>>,
    ) -> Result<Self, Error> {
        install_default_drivers();
        let id = id.into();
        let dsn = dsn.into();
        let pool = options.pool_options().connect_lazy(&dsn)?;
        registry.register(id.clone(), pool.clone());
        info!(connector = %id, max_connections = options.max_connections, "registered connector");
        Ok(Connector {
            id,
            dsn,
            options,
            pool,
            registry,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Rebuilds and re-registers the pool when the dsn or options changed
    ///
    /// Returns whether the pool was rebuilt.
    pub async fn edit(&mut self, dsn: &str, options: Option<EngineOptions>) -> Result<bool, Error> {
        let options = options.unwrap_or_else(|| self.options.clone());
        if dsn == self.dsn && options == self.options {
            return Ok(false);
        }
        let pool = options.pool_options().connect_lazy(dsn)?;
        let old = std::mem::replace(&mut self.pool, pool);
        self.dsn = dsn.to_string();
        self.options = options;
        self.registry.register(self.id.clone(), self.pool.clone());
        old.close().await;
        info!(connector = %self.id, "recreated connector pool");
        Ok(true)
    }

    /// Closes the pool and removes it from the registry
    pub async fn close(self) {
        self.registry.deregister(&self.id);
        self.pool.close().await;
    }
}

impl SessionProvider for Connector {
    type Session = <AnyPool as SessionProvider>::Session;

    async fn session(&self) -> Result<Self::Session, Error> {
        self.pool.session().await
    }

    async fn finish(&self, session: Self::Session) -> Result<(), Error> {
        self.pool.finish(session).await
    }
}

/// Provider resolving its pool from a registry by name on every session
#[derive(Debug, Clone)]
pub struct Registered {
    registry: Arc<ConnectionRegistry<AnyPool>>,
    name: String,
}

impl Registered {
    pub fn new(registry: Arc<ConnectionRegistry<AnyPool>>, name: impl Into<String>) -> Self {
        Registered {
            registry,
            name: name.into(),
        }
    }

    fn pool(&self) -> Result<AnyPool, Error> {
        self.registry
            .lookup(&self.name)
            .ok_or_else(|| Error::ConnectionNotFound(self.name.clone()))
    }
}

impl SessionProvider for Registered {
    type Session = SqlxSession<sqlx::Transaction<'static, sqlx::Any>>;

    async fn session(&self) -> Result<Self::Session, Error> {
        self.pool()?.session().await
    }

    /// Completes the transaction even when the name was deregistered after
    /// the session was opened
    async fn finish(&self, session: Self::Session) -> Result<(), Error> {
        session.finish().await
    }
}
