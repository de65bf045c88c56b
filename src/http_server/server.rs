//! HTTP server wiring: combines the control-surface router with CORS and
//! binds it to a socket.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::coordinator::Coordinator;

use super::config::HttpServerConfig;
use super::routes::{control_routes, AppState};

/// Thin HTTP adapter in front of a [`Coordinator`] (§6c).
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self::with_config(coordinator, HttpServerConfig::default())
    }

    pub fn with_config(coordinator: Arc<Coordinator>, config: HttpServerConfig) -> Self {
        let state = Arc::new(AppState { coordinator });
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
        let router = control_routes(state).layer(cors);
        Self { config, router }
    }

    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Returns the router, consuming the server. Used by tests that want to
    /// drive requests through it without binding a socket.
    pub fn router(self) -> Router {
        self.router
    }

    pub async fn start(self) -> std::io::Result<()> {
        let addr: SocketAddr = self.config.socket_addr().parse().expect("invalid socket address");

        println!("mirrorsync control surface listening on {addr}");
        println!("  GET  /health            current health snapshot");
        println!("  GET  /stats             counters, watermarks, schemas");
        println!("  POST /run               trigger an incremental run");
        println!("  POST /run/full          trigger a full re-replication");
        println!("  POST /run/auth          trigger an auth-only full run");
        println!("  POST /recover           trigger standby -> primary recovery");
        println!("  POST /reconcile         compare both sides without mutating");
        println!("  GET  /events            Server-Sent Events stream");

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await
    }
}
