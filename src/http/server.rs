//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, panic recovery, timeout, admission)
//! - Serve on a listener with graceful shutdown
//! - Hand the serving loop to the lifecycle coordinator

use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::Request,
    middleware,
    response::Response,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatekeeperConfig;
use crate::http::handlers;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::http::response;
use crate::lifecycle::{
    spawn_supervised, DrainError, LifecycleCoordinator, LifecycleError, ServerRuntime,
    ShutdownReport,
};
use crate::lifecycle::supervise::panic_message;
use crate::security::{rate_limit_middleware, AdmissionController, ClientRegistry, RegistrySweeper};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatekeeperConfig>,
}

/// HTTP server wrapping every route in admission control.
pub struct HttpServer {
    router: Router,
    config: Arc<GatekeeperConfig>,
    registry: Arc<ClientRegistry>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatekeeperConfig) -> Self {
        Self::with_routes(config, Router::new())
    }

    /// Create a server that also serves `routes`, behind the same middleware.
    pub fn with_routes(config: GatekeeperConfig, routes: Router) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(ClientRegistry::new());
        let admission = Arc::new(AdmissionController::new(&config.rate_limit, registry.clone()));

        let state = AppState {
            config: config.clone(),
        };

        let router = Self::build_router(&config, state, admission, routes);
        Self {
            router,
            config,
            registry,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &GatekeeperConfig,
        state: AppState,
        admission: Arc<AdmissionController>,
        routes: Router,
    ) -> Router {
        Router::new()
            .route("/v1/healthcheck", get(handlers::healthcheck))
            .with_state(state)
            .merge(routes)
            .fallback(handlers::not_found)
            .method_not_allowed_fallback(handlers::method_not_allowed)
            .layer(middleware::from_fn_with_state(admission, rate_limit_middleware))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id(request),
                )
            }))
            .layer(set_request_id_layer())
    }

    /// Start serving on `listener`. Returns the handle the coordinator drives.
    pub fn serve(self, listener: TcpListener) -> std::io::Result<ServeHandle> {
        let local_addr = listener.local_addr()?;
        tracing::info!(
            address = %local_addr,
            environment = %self.config.listener.environment,
            "HTTP server starting"
        );

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    // Also fires if the handle is dropped.
                    let _ = stop_rx.await;
                })
                .await
        });

        Ok(ServeHandle {
            stop: Some(stop_tx),
            task,
            local_addr,
        })
    }

    /// Serve until `coordinator` finishes, sweeping idle clients meanwhile.
    pub async fn run(
        self,
        listener: TcpListener,
        coordinator: LifecycleCoordinator,
    ) -> Result<ShutdownReport, LifecycleError> {
        let sweeper = RegistrySweeper::from_config(self.registry.clone(), &self.config.lifecycle);
        spawn_supervised("registry-sweeper", sweeper.run(coordinator.subscribe()));

        let handle = self.serve(listener).map_err(|e| LifecycleError::ServeFailure(e.into()))?;
        coordinator.spawn(handle).wait().await
    }

    /// Router with all layers, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The client registry owned by this server.
    pub fn registry(&self) -> Arc<ClientRegistry> {
        self.registry.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatekeeperConfig {
        &self.config
    }
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!(panic = panic_message(panic.as_ref()), "Request handler panicked");
    response::panic_response()
}

/// A running serve loop.
pub struct ServeHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
    local_addr: SocketAddr,
}

impl ServeHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl ServerRuntime for ServeHandle {
    fn stop_accepting(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    fn finished(&mut self) -> impl Future<Output = Result<(), DrainError>> + Send + '_ {
        async move {
            (&mut self.task).await??;
            tracing::info!(address = %self.local_addr, "HTTP server stopped");
            Ok(())
        }
    }
}
