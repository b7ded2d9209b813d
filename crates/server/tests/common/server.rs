//! Server test utilities.

use pinboard_core::config::{AppConfig, IdentityConfig, LedgerConfig, MediaConfig};
use pinboard_server::{AppState, create_router};
use std::path::PathBuf;
use tempfile::TempDir;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub media_root: PathBuf,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let media_root = temp_dir.path().join("media");
        std::fs::create_dir_all(&media_root).expect("Failed to create media directory");
        let db_path = temp_dir.path().join("ledger.db");

        let mut config = AppConfig {
            server: Default::default(),
            ledger: LedgerConfig::Sqlite {
                path: db_path,
                query_timeout_secs: None,
            },
            media: MediaConfig::Filesystem {
                path: media_root.clone(),
                public_base_url: "http://localhost:8080/media".to_string(),
            },
            identity: IdentityConfig::for_testing(),
            rate_limit: Default::default(),
            keepalive: None,
        };

        // Apply user modifications
        modifier(&mut config);

        let ledger = pinboard_ledger::from_config(&config.ledger)
            .await
            .expect("Failed to create ledger store");
        let media = pinboard_media::from_config(&config.media)
            .await
            .expect("Failed to create media store");

        let state = AppState::new(config, ledger, media);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            media_root,
            _temp_dir: temp_dir,
        }
    }
}
