//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with all health handlers
//! - Wire up middleware (tracing, request timeout)
//! - Serve on a bound listener until shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::schema::ListenerConfig;
use crate::health::HealthMonitor;
use crate::http::handlers;
use crate::resilience::CircuitBreakerRegistry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<HealthMonitor>,
    pub registry: Arc<CircuitBreakerRegistry>,
}

pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ListenerConfig, state: AppState) -> Self {
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &ListenerConfig, state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::get_health))
            .route("/health/ready", get(handlers::get_ready))
            .route("/health/live", get(handlers::get_live))
            .route("/health/breakers", get(handlers::get_breakers))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until a shutdown signal arrives, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
