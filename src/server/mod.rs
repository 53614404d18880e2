use crate::config::Config;
use crate::fetch::{MediaFetcher, YtDlpFetcher};
use crate::library::{FsMediaStore, MediaStore};
use crate::playback::PositionStore;
use crate::streaming;
use anyhow::{Context, Result};
use axum::{
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

mod error;
pub mod routes_library;
pub mod routes_playback;

pub use error::AppError;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Audio files
    pub store: Arc<dyn MediaStore>,
    /// Saved playback offsets
    pub positions: Arc<PositionStore>,
    /// Remote fetcher, `None` when fetching is disabled
    pub fetcher: Option<Arc<dyn MediaFetcher>>,
}

impl AppContext {
    /// Build the context from configuration, creating the library directory
    /// if needed.
    pub fn from_config(config: Config) -> Result<Self> {
        let store = FsMediaStore::from_config(&config.library).with_context(|| {
            format!("Failed to open library directory {:?}", config.library.path)
        })?;
        let positions = PositionStore::from_config(&config.playback);
        let fetcher = YtDlpFetcher::from_config(&config.fetch)
            .map(|f| Arc::new(f) as Arc<dyn MediaFetcher>);

        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(store),
            positions: Arc::new(positions),
            fetcher,
        })
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::RANGE])
        .expose_headers([
            header::CONTENT_RANGE,
            header::ACCEPT_RANGES,
            header::CONTENT_LENGTH,
        ]);

    let mut app = Router::new()
        // Health check
        .route("/health", get(health_check))
        .merge(streaming::media_router())
        .merge(routes_playback::playback_routes())
        .merge(routes_library::library_routes(
            ctx.config.library.max_upload_bytes,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    // Player assets; index.html for anything that is not a file
    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            let index_path = dir.join("index.html");
            app = app.fallback_service(
                ServeDir::new(&dir)
                    .append_index_html_on_directories(true)
                    .not_found_service(ServeFile::new(index_path)),
            );
        }
    }

    app
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server and run until Ctrl+C or SIGTERM.
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let static_dir = config.server.static_dir.clone();
    let ctx = AppContext::from_config(config)?;

    tracing::info!(
        library = %ctx.config.library.path.display(),
        state_file = %ctx.positions.path().display(),
        fetch = ctx.fetcher.is_some(),
        "Library ready"
    );

    let app = create_router(ctx, static_dir);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
