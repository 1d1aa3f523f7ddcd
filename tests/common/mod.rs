//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::Path, routing::get, Router};
use gatekeeper::config::GatekeeperConfig;
use gatekeeper::http::HttpServer;
use gatekeeper::lifecycle::{
    LifecycleCoordinator, LifecycleError, LifecycleState, ShutdownReport, ShutdownTrigger,
};
use gatekeeper::security::ClientRegistry;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A server running on an ephemeral port, driven like `main` drives it.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub trigger: ShutdownTrigger,
    pub state: watch::Receiver<LifecycleState>,
    pub registry: Arc<ClientRegistry>,
    pub outcome: JoinHandle<Result<ShutdownReport, LifecycleError>>,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// `GET /slow/{ms}` sleeps before answering.
fn test_routes() -> Router {
    Router::new().route(
        "/slow/{ms}",
        get(|Path(ms): Path<u64>| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            "done"
        }),
    )
}

/// Start the server with `config`, bound to 127.0.0.1 on a free port.
pub async fn start_server(config: GatekeeperConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (coordinator, trigger) = LifecycleCoordinator::new(config.lifecycle.grace_period());
    let state = coordinator.subscribe();

    let server = HttpServer::with_routes(config, test_routes());
    let registry = server.registry();
    let outcome = tokio::spawn(server.run(listener, coordinator));

    TestServer {
        addr,
        trigger,
        state,
        registry,
        outcome,
    }
}

/// A client that never reuses connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
