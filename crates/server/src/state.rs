//! Application state shared across handlers.

use crate::identity::IdentityVerifier;
use crate::ratelimit::RateLimitState;
use pinboard_core::config::AppConfig;
use pinboard_ledger::LedgerStore;
use pinboard_media::MediaStore;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Engagement ledger store.
    pub ledger: Arc<dyn LedgerStore>,
    /// Media asset store.
    pub media: Arc<dyn MediaStore>,
    /// Bearer token verifier.
    pub identity: Arc<IdentityVerifier>,
    /// Rate limiting state.
    pub rate_limit: RateLimitState,
}

impl AppState {
    /// Create a new application state.
    ///
    /// This performs configuration validation and logs warnings for
    /// potentially dangerous settings.
    ///
    /// # Panics
    ///
    /// Panics if rate limit or identity configuration is invalid.
    pub fn new(
        config: AppConfig,
        ledger: Arc<dyn LedgerStore>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        // Fail fast on config errors, log warnings.
        match config.rate_limit.validate() {
            Ok(warnings) => {
                for warning in warnings {
                    tracing::warn!("Configuration warning: {}", warning);
                }
            }
            Err(error) => {
                panic!("Invalid rate limit configuration: {}", error);
            }
        }

        let identity = match IdentityVerifier::new(&config.identity) {
            Ok(identity) => identity,
            Err(error) => panic!("Invalid identity configuration: {}", error),
        };

        let rate_limit = RateLimitState::new(&config.rate_limit);

        Self {
            config: Arc::new(config),
            ledger,
            media,
            identity: Arc::new(identity),
            rate_limit,
        }
    }

    /// Get the cleanup interval for the rate limiter, if enabled.
    /// Returns a default of 60 seconds if the configured interval is
    /// zero, which would make tokio::time::interval panic.
    pub fn rate_limit_cleanup_interval(&self) -> Option<Duration> {
        if self.rate_limit.is_enabled() {
            let interval_secs = self.config.rate_limit.cleanup_interval_secs;
            if interval_secs == 0 {
                tracing::warn!(
                    "rate_limit.cleanup_interval_secs is 0, using default of 60 seconds"
                );
                Some(Duration::from_secs(60))
            } else {
                Some(Duration::from_secs(interval_secs))
            }
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinboard_core::config::{AppConfig, LedgerConfig, MediaConfig};
    use tempfile::tempdir;

    async fn build_state(mut config: AppConfig) -> (tempfile::TempDir, AppState) {
        let temp = tempdir().unwrap();
        config.ledger = LedgerConfig::Sqlite {
            path: temp.path().join("ledger.db"),
            query_timeout_secs: None,
        };
        config.media = MediaConfig::Filesystem {
            path: temp.path().join("media"),
            public_base_url: "http://localhost:8080/media".to_string(),
        };

        let ledger = pinboard_ledger::from_config(&config.ledger).await.unwrap();
        let media = pinboard_media::from_config(&config.media).await.unwrap();

        let state = AppState::new(config, ledger, media);
        (temp, state)
    }

    #[tokio::test]
    async fn rate_limit_cleanup_interval_none_when_disabled() {
        let (_temp, state) = build_state(AppConfig::for_testing()).await;
        assert!(state.rate_limit_cleanup_interval().is_none());
    }

    #[tokio::test]
    async fn rate_limit_cleanup_interval_enabled_respects_config() {
        let mut config = AppConfig::for_testing();
        config.rate_limit.enabled = true;
        config.rate_limit.cleanup_interval_secs = 12;

        let (_temp, state) = build_state(config).await;
        assert_eq!(
            state.rate_limit_cleanup_interval(),
            Some(Duration::from_secs(12))
        );
    }
}
