//! IP whitelisting middleware.
//!
//! Rejects every request whose client address is not inside one of the
//! configured CIDR ranges.
//!
//! # Behavior
//!
//! - **Allowed**: the request is passed to the inner service untouched and its
//!   response is returned as-is
//! - **Denied**: `403 Forbidden` with the body `Forbidden`; the inner service
//!   is never called
//!
//! The decision is fail-closed. A candidate that cannot be parsed as an IP
//! address (garbage header, missing transport address, truncated IPv6) is
//! denied, never passed through and never turned into an error.
//!
//! # Usage
//!
//! ```rust,ignore
//! let layer = IpWhitelistLayer::new(&["10.0.0.0/8", "fe80::/16"], false)?;
//! let app = Router::new()
//!     .route("/", get(handler))
//!     .layer(layer);
//!
//! // The transport address is read from ConnectInfo, so serve with:
//! axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::ip::{ClientAddressSource, ExtractedIp, extract_candidate, parse_candidate};
use crate::error::WhitelistError;
use crate::metrics;
use crate::whitelist::IpWhitelist;

/// Body sent with every denial.
pub const FORBIDDEN_BODY: &str = "Forbidden";

/// Outcome of evaluating one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision<'a> {
    /// Candidate parsed and falls inside a whitelisted range
    Allow(ExtractedIp<'a>),
    /// Candidate missing, unparseable, or outside every range
    Deny(ExtractedIp<'a>),
}

impl<'a> AccessDecision<'a> {
    /// `true` for [`AccessDecision::Allow`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow(_))
    }

    /// The candidate address the decision was based on.
    pub fn candidate(&self) -> ExtractedIp<'a> {
        match self {
            AccessDecision::Allow(candidate) | AccessDecision::Deny(candidate) => *candidate,
        }
    }

    /// Metric/log label.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessDecision::Allow(_) => "allow",
            AccessDecision::Deny(_) => "deny",
        }
    }
}

/// Whitelist plus resolution mode: the framework-independent decision core.
#[derive(Debug, Clone)]
pub struct IpWhitelister {
    whitelist: IpWhitelist,
    /// Trust X-Forwarded-For / X-Real-Ip
    use_header: bool,
}

impl IpWhitelister {
    /// Build a whitelister from CIDR strings.
    ///
    /// # Errors
    ///
    /// Propagates [`WhitelistError`] from [`IpWhitelist::new`].
    pub fn new<S: AsRef<str>>(cidrs: &[S], use_header: bool) -> Result<Self, WhitelistError> {
        Ok(Self::from_whitelist(IpWhitelist::new(cidrs)?, use_header))
    }

    /// Wrap an already-parsed whitelist.
    pub fn from_whitelist(whitelist: IpWhitelist, use_header: bool) -> Self {
        Self {
            whitelist,
            use_header,
        }
    }

    /// The parsed ranges.
    pub fn whitelist(&self) -> &IpWhitelist {
        &self.whitelist
    }

    /// Whether forwarding headers are consulted.
    pub fn use_header(&self) -> bool {
        self.use_header
    }

    /// Decide whether the client described by `source` may pass.
    ///
    /// Pure function of `source` and the configuration: the same inputs always
    /// yield the same decision.
    pub fn decide<'a>(&self, source: &'a ClientAddressSource<'_>) -> AccessDecision<'a> {
        let candidate = extract_candidate(source, self.use_header);

        match parse_candidate(candidate.as_str()) {
            Some(ip) if self.whitelist.contains(&ip) => AccessDecision::Allow(candidate),
            _ => AccessDecision::Deny(candidate),
        }
    }
}

/// IP whitelist layer for Tower middleware stack.
///
/// Cloning is cheap; the whitelist is shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct IpWhitelistLayer {
    whitelister: Arc<IpWhitelister>,
}

impl IpWhitelistLayer {
    /// Create a whitelist layer.
    ///
    /// # Arguments
    ///
    /// * `cidrs` - Allowed ranges in CIDR notation
    /// * `use_header` - Judge by forwarding headers when present (only safe
    ///   behind a trusted reverse proxy)
    ///
    /// # Errors
    ///
    /// Returns [`WhitelistError::Empty`] or [`WhitelistError::InvalidCidr`];
    /// a layer that failed to build must not be installed.
    pub fn new<S: AsRef<str>>(cidrs: &[S], use_header: bool) -> Result<Self, WhitelistError> {
        Ok(Self::from_whitelister(IpWhitelister::new(cidrs, use_header)?))
    }

    /// Create a layer around an existing whitelister.
    pub fn from_whitelister(whitelister: IpWhitelister) -> Self {
        Self {
            whitelister: Arc::new(whitelister),
        }
    }

    /// The shared decision core.
    pub fn whitelister(&self) -> &IpWhitelister {
        &self.whitelister
    }
}

impl<S> Layer<S> for IpWhitelistLayer {
    type Service = IpWhitelistService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IpWhitelistService {
            inner,
            whitelister: self.whitelister.clone(),
        }
    }
}

/// IP whitelist service wrapper.
#[derive(Debug, Clone)]
pub struct IpWhitelistService<S> {
    inner: S,
    whitelister: Arc<IpWhitelister>,
}

impl<S> Service<Request<Body>> for IpWhitelistService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let allowed = {
            let source = ClientAddressSource::from_request(&req);
            let decision = self.whitelister.decide(&source);
            let candidate = decision.candidate();

            metrics::record_whitelist_decision(decision.as_str(), candidate.origin().as_str());

            if decision.is_allowed() {
                debug!(
                    client_ip = %candidate.as_str(),
                    origin = %candidate.origin(),
                    "Client IP is whitelisted"
                );
            } else {
                warn!(
                    client_ip = %candidate.as_str(),
                    origin = %candidate.origin(),
                    path = %req.uri().path(),
                    "Rejecting request from non-whitelisted IP"
                );
            }

            decision.is_allowed()
        };

        if !allowed {
            return Box::pin(async { Ok::<_, S::Error>(forbidden()) });
        }

        // The readied service handles this request; a fresh clone stays behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move { inner.call(req).await })
    }
}

fn forbidden() -> Response<Body> {
    (StatusCode::FORBIDDEN, FORBIDDEN_BODY).into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::net::SocketAddr;

    use axum::extract::ConnectInfo;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

    fn whitelister(cidrs: &[&str], use_header: bool) -> IpWhitelister {
        IpWhitelister::new(cidrs, use_header).unwrap()
    }

    #[test]
    fn test_layer_creation_errors() {
        let empty: [&str; 0] = [];
        assert_eq!(
            IpWhitelistLayer::new(&empty, false).unwrap_err(),
            WhitelistError::Empty
        );
        assert_eq!(
            IpWhitelistLayer::new(&["1.2.3.4/24", "foo"], true).unwrap_err(),
            WhitelistError::InvalidCidr {
                entry: "foo".to_string()
            }
        );
    }

    #[test]
    fn test_layer_keeps_configuration() {
        let layer = IpWhitelistLayer::new(&["1.2.3.4/24"], true).unwrap();
        assert!(layer.whitelister().use_header());
        assert_eq!(layer.whitelister().whitelist().ranges().len(), 1);
    }

    #[test]
    fn test_decide_allows_remote_addr_in_range() {
        let wl = whitelister(&["1.2.3.4/24"], false);
        let source = ClientAddressSource::new().with_remote_addr("1.2.3.156:2342");

        let decision = wl.decide(&source);
        assert!(decision.is_allowed());
        assert_eq!(decision.candidate(), ExtractedIp::FromRemoteAddr("1.2.3.156"));
    }

    #[test]
    fn test_decide_denies_remote_addr_out_of_range() {
        let wl = whitelister(&["1.2.3.4/24"], false);
        let source = ClientAddressSource::new().with_remote_addr("1.2.16.1:2342");

        assert_eq!(
            wl.decide(&source),
            AccessDecision::Deny(ExtractedIp::FromRemoteAddr("1.2.16.1"))
        );
    }

    #[test]
    fn test_decide_header_trust_toggle() {
        let source = ClientAddressSource::new()
            .with_remote_addr("254.254.254.254:2342")
            .with_forwarded_for("1.2.3.4");

        assert!(whitelister(&["1.2.3.4/32"], true).decide(&source).is_allowed());
        assert!(!whitelister(&["1.2.3.4/32"], false).decide(&source).is_allowed());
    }

    #[test]
    fn test_decide_spoofed_header_cannot_rescue_remote_addr() {
        let wl = whitelister(&["10.0.0.0/8"], false);
        let source = ClientAddressSource::new()
            .with_remote_addr("8.8.8.8:443")
            .with_forwarded_for("10.0.0.1")
            .with_real_ip("10.0.0.1");

        assert!(!wl.decide(&source).is_allowed());
    }

    #[test]
    fn test_decide_headers_do_not_block_allowed_remote_addr() {
        let wl = whitelister(&["10.0.0.0/8"], false);
        let source = ClientAddressSource::new()
            .with_remote_addr("10.1.2.3:443")
            .with_forwarded_for("garbage");

        assert!(wl.decide(&source).is_allowed());
    }

    #[test]
    fn test_decide_last_hop_only() {
        let wl = whitelister(&["1.2.3.4/32"], true);

        for chain in ["1.1.1.1,1.2.3.4", "1.1.1.1,2.2.2.2,1.2.3.4", "1.2.3.4"] {
            let source = ClientAddressSource::new()
                .with_remote_addr("254.254.254.254:2342")
                .with_forwarded_for(chain);
            assert!(wl.decide(&source).is_allowed(), "{chain} should pass");
        }

        for chain in ["1.2.3.4,1.1.1.1", "1.1.1.1,1.2.3.4,2.2.2.2", "1.1.1.1"] {
            let source = ClientAddressSource::new()
                .with_remote_addr("254.254.254.254:2342")
                .with_forwarded_for(chain);
            assert!(!wl.decide(&source).is_allowed(), "{chain} should be rejected");
        }
    }

    #[test]
    fn test_decide_missing_remote_addr_is_denied() {
        let wl = whitelister(&["0.0.0.0/0", "::/0"], false);

        assert_eq!(
            wl.decide(&ClientAddressSource::new()),
            AccessDecision::Deny(ExtractedIp::NotFound)
        );
    }

    #[test]
    fn test_decide_malformed_candidates_are_denied() {
        let wl = whitelister(&["0.0.0.0/0", "::/0"], true);

        for candidate in ["foo", "10.0.0.350", "fe:::80", "", "\\&$§&/(", "1.2.3.4:80"] {
            let source = ClientAddressSource::new().with_real_ip(candidate);
            assert!(!wl.decide(&source).is_allowed(), "{candidate:?} should be rejected");
        }
    }

    #[test]
    fn test_decide_is_idempotent() {
        let wl = whitelister(&["1.2.3.4/24"], true);
        let source = ClientAddressSource::new()
            .with_remote_addr("254.254.254.254:2342")
            .with_forwarded_for("1.2.3.9");

        let first = wl.decide(&source);
        for _ in 0..10 {
            assert_eq!(wl.decide(&source), first);
        }
    }

    // ==========================================================================
    // Metrics
    // ==========================================================================

    async fn ok(_req: Request<Body>) -> Result<Response<Body>, Infallible> {
        Ok(Response::new(Body::empty()))
    }

    fn request(remote: Option<&str>, forwarded_for: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = forwarded_for {
            builder = builder.header("x-forwarded-for", value);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        if let Some(addr) = remote {
            req.extensions_mut()
                .insert(ConnectInfo::<SocketAddr>(addr.parse().unwrap()));
        }
        req
    }

    /// Decision counters as `(decision, origin) -> count`, sorted.
    fn decision_counters(snapshotter: &Snapshotter) -> Vec<((String, String), u64)> {
        let mut counters: Vec<_> = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter_map(|(key, _, _, value)| {
                let key = key.key();
                if key.name() != crate::metrics::names::REQUESTS_TOTAL {
                    return None;
                }
                let label = |name: &str| {
                    key.labels()
                        .find(|l| l.key() == name)
                        .map(|l| l.value().to_string())
                        .unwrap_or_default()
                };
                match value {
                    DebugValue::Counter(count) => Some(((label("decision"), label("origin")), count)),
                    _ => None,
                }
            })
            .collect();
        counters.sort();
        counters
    }

    #[test]
    fn test_service_records_decision_counters() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let layer = IpWhitelistLayer::new(&["10.0.0.0/8"], true).unwrap();
        let mut service = layer.layer(tower::service_fn(ok));

        ::metrics::with_local_recorder(&recorder, || {
            // Decisions are recorded before the response future is returned.
            drop(service.call(request(Some("10.0.0.1:2342"), None)));
            drop(service.call(request(Some("10.0.0.1:2342"), Some("10.0.0.2"))));
            drop(service.call(request(Some("10.0.0.1:2342"), Some("6.6.6.6"))));
            drop(service.call(request(None, None)));
        });

        assert_eq!(
            decision_counters(&snapshotter),
            vec![
                (("allow".to_string(), "remote_addr".to_string()), 1),
                (("allow".to_string(), "x_forwarded_for".to_string()), 1),
                (("deny".to_string(), "missing".to_string()), 1),
                (("deny".to_string(), "x_forwarded_for".to_string()), 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_service_denial_response() {
        let layer = IpWhitelistLayer::new(&["10.0.0.0/8"], false).unwrap();
        let mut service = layer.layer(tower::service_fn(ok));

        let response = service
            .call(request(Some("6.6.6.6:2342"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = service
            .call(request(Some("10.0.0.1:2342"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_decision_labels() {
        assert_eq!(AccessDecision::Allow(ExtractedIp::NotFound).as_str(), "allow");
        assert_eq!(AccessDecision::Deny(ExtractedIp::NotFound).as_str(), "deny");
    }
}
