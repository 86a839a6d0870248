//! Web layer
//!
//! The HTTP surface of the service: a resolve endpoint, a liveness endpoint,
//! request logging, and permissive CORS. Handlers stay thin and delegate to
//! the resolver service.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Config;
use crate::services::ResolverService;

pub mod handlers;
pub mod middleware;
pub mod responses;

pub use responses::{ApiResponse, handle_error};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<ResolverService>,
    pub cache_enabled: bool,
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &Config, resolver: Arc<ResolverService>) -> Result<Self> {
        let state = AppState {
            resolver,
            cache_enabled: config.cache_enabled,
        };

        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port)
            .parse()
            .context("invalid listen address")?;

        Ok(Self {
            app: Self::create_router(state),
            addr,
        })
    }

    /// Create the router with all routes and middleware
    pub fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health_check))
            .route(
                "/api/v1/resolve/{*target}",
                get(handlers::resolve_favicon),
            )
            .layer(CorsLayer::permissive())
            .layer(axum::middleware::from_fn(
                middleware::request_logging_middleware,
            ))
            .with_state(state)
    }

    /// Bind and serve until shutdown. A bind failure propagates so the
    /// process can exit non-zero.
    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .with_context(|| format!("failed to bind to {}", self.addr))?;
        info!(addr = %self.addr, "listening");
        axum::serve(listener, self.app).await?;
        Ok(())
    }
}
