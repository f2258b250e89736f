//! Shared application state: connection pool and resolved model registry.

use crate::config::{resolve, DatabaseConfig, FullConfig, ResolvedModel};
use crate::context::Context;
use crate::error::AppError;
use crate::session::UserSession;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: AnyPool,
    pub model: Arc<ResolvedModel>,
}

fn pool_options(config: &DatabaseConfig) -> AnyPoolOptions {
    let options = AnyPoolOptions::new().max_connections(config.max_connections);
    if config.url.contains(":memory:") || config.url.contains("mode=memory") {
        // Each connection to an in-memory SQLite URL opens its own empty database.
        options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        options
    }
}

impl AppState {
    pub fn new(pool: AnyPool, model: ResolvedModel) -> Self {
        AppState {
            pool,
            model: Arc::new(model),
        }
    }

    /// Resolve config and create a pool that connects on first use.
    pub fn connect_lazy(config: &FullConfig) -> Result<Self, AppError> {
        sqlx::any::install_default_drivers();
        let model = resolve(config)?;
        let pool = pool_options(&config.database).connect_lazy(&config.database.url)?;
        Ok(Self::new(pool, model))
    }

    /// Resolve config and connect eagerly.
    pub async fn connect(config: &FullConfig) -> Result<Self, AppError> {
        sqlx::any::install_default_drivers();
        let model = resolve(config)?;
        let pool = pool_options(&config.database).connect(&config.database.url).await?;
        tracing::info!(models = model.entities.len(), "database connected");
        Ok(Self::new(pool, model))
    }

    /// Request-scoped context for one caller session.
    pub fn context(&self, session: UserSession) -> Context {
        Context::new(self, session)
    }
}
