//! Self-ping task for hosts that spin down idle services.

use pinboard_core::config::KeepaliveConfig;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Spawn a background task that pings the configured URL on an
/// interval. Missed ticks are skipped rather than bursted, and a failed
/// ping is logged but never fatal.
pub fn spawn_keepalive_task(config: KeepaliveConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build keepalive HTTP client");
                return;
            }
        };

        let mut ticker = tokio::time::interval(Duration::from_secs(config.interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so the server is
        // listening before we ping ourselves.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match client.get(&config.url).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(url = %config.url, status = %response.status(), "Keepalive ping succeeded");
                }
                Ok(response) => {
                    tracing::warn!(url = %config.url, status = %response.status(), "Keepalive ping returned non-success status");
                }
                Err(e) => {
                    tracing::warn!(url = %config.url, error = %e, "Keepalive ping failed");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_and_abort() {
        let handle = spawn_keepalive_task(KeepaliveConfig {
            url: "http://127.0.0.1:1/health".to_string(),
            interval_secs: 3600,
        });
        assert!(!handle.is_finished());
        handle.abort();
    }
}
