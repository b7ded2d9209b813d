//! Ledger store abstraction and implementations for pinboard.
//!
//! This crate provides the engagement data model:
//! - User accounts, profile fields, and relationship counters
//! - Posts with engagement counters
//! - Follow, like, and bookmark edges guarded by uniqueness constraints
//! - Comments
//! - Notification records and their read-side enrichment

pub mod error;
pub mod models;
pub mod postgres;
pub mod repos;
pub mod store;

pub use error::{LedgerError, LedgerResult};
pub use postgres::PostgresStore;
pub use store::{LedgerStore, SqliteStore};

use pinboard_core::config::LedgerConfig;
use std::sync::Arc;

/// Create a ledger store from configuration.
pub async fn from_config(config: &LedgerConfig) -> LedgerResult<Arc<dyn LedgerStore>> {
    match config {
        LedgerConfig::Sqlite {
            path,
            query_timeout_secs,
        } => {
            let store = SqliteStore::new(path, *query_timeout_secs).await?;
            Ok(Arc::new(store) as Arc<dyn LedgerStore>)
        }
        LedgerConfig::Postgres {
            url,
            host,
            port,
            username,
            password,
            database,
            ssl_mode,
            max_connections,
            statement_timeout_ms,
        } => {
            let store = if let Some(url) = url {
                // URL takes precedence for backward compatibility
                tracing::info!("Connecting to PostgreSQL using connection URL");
                PostgresStore::from_url(url, *max_connections, *statement_timeout_ms).await?
            } else if let (Some(host), Some(database)) = (host.as_ref(), database.as_ref()) {
                // Use individual parameters
                PostgresStore::from_params(
                    host,
                    port.unwrap_or(5432),
                    username.as_deref(),
                    password.as_deref(),
                    database,
                    *ssl_mode,
                    *max_connections,
                    *statement_timeout_ms,
                )
                .await?
            } else {
                return Err(LedgerError::Config(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ));
            };
            Ok(Arc::new(store) as Arc<dyn LedgerStore>)
        }
    }
}
