//! Database connection management.

use std::ops::Deref;

use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect};
use surrealdb::opt::auth::Root;
use thiserror::Error;

use crate::schema::init_schema;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Connection endpoint: "mem://" or "rocksdb://path"
    pub endpoint: String,
    /// Namespace to use
    pub namespace: String,
    /// Database name to use
    pub database: String,
    /// Optional root credentials for authentication
    pub credentials: Option<(String, String)>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            namespace: "jobfeed".to_string(),
            database: "main".to_string(),
            credentials: None,
        }
    }
}

impl DbConfig {
    /// Create a config for in-memory testing.
    pub fn memory() -> Self {
        Self::default()
    }
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Surreal(#[from] surrealdb::Error),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid record id: {0}")]
    InvalidId(String),
}

/// Shared handle to the store.
///
/// Cloning is cheap; every clone talks to the same connection. Services take
/// one of these at construction instead of reaching for a global.
#[derive(Clone)]
pub struct Database {
    client: Surreal<Any>,
}

impl Database {
    /// Connect, select namespace and database, and make sure the schema exists.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        tracing::info!("Connecting to database: {}", config.endpoint);

        let client = connect(&config.endpoint).await?;

        if let Some((username, password)) = &config.credentials {
            client.signin(Root { username, password }).await?;
        }

        client
            .use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        tracing::info!(
            "Connected to database: {}/{}",
            config.namespace,
            config.database
        );

        let db = Self { client };
        init_schema(&db).await?;
        Ok(db)
    }

    /// A fresh, isolated in-memory store.
    pub async fn memory() -> Result<Self, DbError> {
        Self::connect(&DbConfig::memory()).await
    }
}

impl Deref for Database {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
