//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates a temporary library directory, a
//! playback state file next to it, and a full [`AppContext`]. The
//! [`TestHarness::with_server`] constructor starts Axum on a random port for
//! HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use audioshelf::config::Config;
use audioshelf::fetch::MediaFetcher;
use audioshelf::library::FsMediaStore;
use audioshelf::playback::PositionStore;
use audioshelf::server::{create_router, AppContext};
use tempfile::TempDir;

/// Test harness wrapping a fully-constructed [`AppContext`] over a temp dir.
pub struct TestHarness {
    pub ctx: AppContext,
    pub library_dir: PathBuf,
    pub state_file: PathBuf,
    _tmp: TempDir,
}

impl TestHarness {
    /// Create a new harness with default settings.
    pub fn new() -> Self {
        Self::with_config(Config::default(), None)
    }

    /// Create a harness from `config`; library and state paths are replaced
    /// with locations inside a fresh temp dir.
    pub fn with_config(mut config: Config, fetcher: Option<Arc<dyn MediaFetcher>>) -> Self {
        let tmp = tempfile::tempdir().expect("failed to create temp dir");
        let library_dir = tmp.path().join("audiobooks");
        let state_file = tmp.path().join("playback-times.json");
        config.library.path = library_dir.clone();
        config.playback.state_file = state_file.clone();

        let store = FsMediaStore::from_config(&config.library).expect("failed to open library");
        let positions = PositionStore::from_config(&config.playback);

        let ctx = AppContext {
            config: Arc::new(config),
            store: Arc::new(store),
            positions: Arc::new(positions),
            fetcher,
        };

        Self {
            ctx,
            library_dir,
            state_file,
            _tmp: tmp,
        }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::new().serve().await
    }

    /// Start an Axum server with a fetcher installed.
    pub async fn with_fetcher(fetcher: Arc<dyn MediaFetcher>) -> (Self, SocketAddr) {
        Self::with_config(Config::default(), Some(fetcher))
            .serve()
            .await
    }

    /// Start an Axum server with custom config on a random port.
    pub async fn with_server_config(config: Config) -> (Self, SocketAddr) {
        Self::with_config(config, None).serve().await
    }

    async fn serve(self) -> (Self, SocketAddr) {
        let app = create_router(self.ctx.clone(), None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (self, addr)
    }

    /// Write a file straight into the library directory.
    pub fn add_file(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.library_dir.join(name);
        std::fs::write(&path, data).expect("failed to write library file");
        path
    }
}

/// Deterministic non-repeating-looking test payload.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}
