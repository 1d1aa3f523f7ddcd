//! Per-client admission control.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::config::RateLimitConfig;
use crate::http::response;
use crate::observability::metrics;
use crate::security::bucket::BucketLimits;
use crate::security::identity::{ClientIdentity, IdentityError};
use crate::security::registry::ClientRegistry;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    /// Client exceeded its rate. Not an error: maps to 429.
    Denied,
}

/// Decides whether a request may proceed, keyed on the peer's host.
pub struct AdmissionController {
    registry: Arc<ClientRegistry>,
    limits: BucketLimits,
    enabled: bool,
}

impl AdmissionController {
    pub fn new(config: &RateLimitConfig, registry: Arc<ClientRegistry>) -> Self {
        Self {
            registry,
            limits: BucketLimits::from(config),
            enabled: config.enabled,
        }
    }

    /// Check a request using the peer address recorded by the server.
    pub fn check<B>(&self, request: &Request<B>) -> Result<Decision, IdentityError> {
        if !self.enabled {
            return Ok(Decision::Allowed);
        }

        let ConnectInfo(addr) = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .ok_or(IdentityError::MissingPeer)?;

        self.check_peer(&addr.to_string())
    }

    /// Check a raw `host:port` peer address.
    pub fn check_peer(&self, peer: &str) -> Result<Decision, IdentityError> {
        if !self.enabled {
            return Ok(Decision::Allowed);
        }

        let identity = ClientIdentity::from_peer_addr(peer)?;
        Ok(self.check_identity(&identity))
    }

    pub fn check_identity(&self, identity: &ClientIdentity) -> Decision {
        if !self.enabled {
            return Decision::Allowed;
        }

        if self.registry.admit(identity, self.limits) {
            Decision::Allowed
        } else {
            Decision::Denied
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }
}

/// Middleware function for per-client rate limiting.
pub async fn rate_limit_middleware(
    State(controller): State<Arc<AdmissionController>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match controller.check(&request) {
        Ok(Decision::Allowed) => {
            metrics::record_admission("allowed");
            next.run(request).await
        }
        Ok(Decision::Denied) => {
            tracing::debug!(
                method = %request.method(),
                uri = %request.uri(),
                "Rate limit exceeded"
            );
            metrics::record_admission("denied");
            response::rate_limit_exceeded()
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                method = %request.method(),
                uri = %request.uri(),
                "Cannot derive client identity"
            );
            metrics::record_admission("identity_error");
            response::server_error()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn controller(rps: f64, burst: u32, enabled: bool) -> AdmissionController {
        let config = RateLimitConfig {
            enabled,
            requests_per_second: rps,
            burst_size: burst,
        };
        AdmissionController::new(&config, Arc::new(ClientRegistry::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_denied_per_client() {
        let controller = controller(2.0, 4, true);

        for _ in 0..4 {
            assert_eq!(controller.check_peer("10.0.0.1:1000"), Ok(Decision::Allowed));
        }
        assert_eq!(controller.check_peer("10.0.0.1:1001"), Ok(Decision::Denied));
        // Another client has its own bucket.
        assert_eq!(controller.check_peer("10.0.0.2:1000"), Ok(Decision::Allowed));

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(controller.check_peer("10.0.0.1:1000"), Ok(Decision::Allowed));
        assert_eq!(controller.check_peer("10.0.0.1:1000"), Ok(Decision::Denied));
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_still_refreshes_last_seen() {
        let controller = controller(1.0, 1, true);
        let id = ClientIdentity::from_peer_addr("10.0.0.1:1").unwrap();

        assert_eq!(controller.check_identity(&id), Decision::Allowed);
        let first_seen = controller.registry().snapshot(&id).unwrap().last_seen;

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(controller.check_identity(&id), Decision::Denied);
        let snapshot = controller.registry().snapshot(&id).unwrap();
        assert_eq!(snapshot.last_seen, first_seen + Duration::from_millis(100));
    }

    #[test]
    fn test_disabled_never_touches_registry() {
        let controller = controller(1.0, 1, false);
        assert!(!controller.is_enabled());
        for _ in 0..10 {
            assert_eq!(controller.check_peer("10.0.0.1:1"), Ok(Decision::Allowed));
        }
        assert_eq!(controller.check_peer("garbage"), Ok(Decision::Allowed));
        assert!(controller.registry().is_empty());
    }

    #[test]
    fn test_malformed_peer_is_identity_error() {
        let controller = controller(1.0, 1, true);
        assert!(matches!(
            controller.check_peer("no-port-here"),
            Err(IdentityError::MissingPort(_))
        ));
        assert!(controller.registry().is_empty());
    }

    #[test]
    fn test_request_without_peer_is_identity_error() {
        let controller = controller(1.0, 1, true);
        let request = Request::builder().uri("/").body(()).unwrap();
        assert_eq!(controller.check(&request), Err(IdentityError::MissingPeer));
        assert!(controller.registry().is_empty());
    }

    #[test]
    fn test_request_with_connect_info() {
        let controller = controller(1.0, 1, true);
        let mut request = Request::builder().uri("/").body(()).unwrap();
        let addr: SocketAddr = "192.0.2.10:5555".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));

        assert_eq!(controller.check(&request), Ok(Decision::Allowed));
        assert_eq!(controller.check(&request), Ok(Decision::Denied));
        assert!(controller
            .registry()
            .contains(&ClientIdentity::from_peer_addr("192.0.2.10:1").unwrap()));
    }

    /// Release `callers` threads at once against one client; count admissions.
    fn contended_round(controller: &Arc<AdmissionController>, callers: u16) -> usize {
        let allowed = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(std::sync::Barrier::new(callers as usize));

        let handles: Vec<_> = (0..callers)
            .map(|i| {
                let controller = controller.clone();
                let allowed = allowed.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    let peer = format!("198.51.100.7:{}", 1000 + i);
                    if controller.check_peer(&peer) == Ok(Decision::Allowed) {
                        allowed.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        allowed.load(Ordering::SeqCst)
    }

    #[test]
    fn test_concurrent_callers_never_exceed_budget() {
        let rate = 0.01;
        let burst = 10;
        let controller = Arc::new(controller(rate, burst, true));

        let start = Instant::now();
        let allowed = contended_round(&controller, 200);
        let elapsed = start.elapsed().as_secs_f64();

        let expected = burst as usize + (elapsed * rate).floor() as usize;
        assert_eq!(allowed, expected);
    }

    #[test]
    fn test_refill_under_contention_is_counted_once() {
        let controller = Arc::new(controller(2.0, 4, true));

        assert_eq!(contended_round(&controller, 200), 4);

        // 1.2s at 2 rps refills 2.4 tokens.
        std::thread::sleep(Duration::from_millis(1200));
        assert_eq!(contended_round(&controller, 200), 2);

        let id = ClientIdentity::from_peer_addr("198.51.100.7:1").unwrap();
        let snapshot = controller.registry().snapshot(&id).unwrap();
        assert!(snapshot.bucket.tokens() < 1.0);
    }
}
