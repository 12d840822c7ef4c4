//! # Engage Health Check
//!
//! Read-only HTTP surface over a service's component health.
//!
//! ## Endpoints
//!
//! - `/health` - Liveness with the overall level; 503 when any component is unhealthy
//! - `/adapter-health` - Per-component health
//! - `/adapter-metrics/<component>` - Per-operation metrics of one component
//!
//! Only `GET` is served. The service supplies its data through
//! [`HealthSource`], so this crate knows nothing about adapters.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use engage_health_check::{HealthCheckServer, HealthLevel, HealthSource};
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! struct Fixed;
//!
//! impl HealthSource for Fixed {
//!     fn service_name(&self) -> &str { "demo" }
//!     fn overall_level(&self) -> HealthLevel { HealthLevel::Healthy }
//!     fn component_health(&self) -> Value { json!({}) }
//!     fn component_metrics(&self, _component: &str) -> Option<Value> { None }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let server = HealthCheckServer::new(Arc::new(Fixed), ([127, 0, 0, 1], 8081).into());
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Component health levels, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLevel::Healthy => "healthy",
            HealthLevel::Degraded => "degraded",
            HealthLevel::Unhealthy => "unhealthy",
        }
    }

    /// Worst of a set of levels; `Healthy` when empty
    pub fn worst<I>(levels: I) -> HealthLevel
    where
        I: IntoIterator<Item = HealthLevel>,
    {
        levels.into_iter().max().unwrap_or(HealthLevel::Healthy)
    }
}

/// Data a service exposes through the health endpoints
pub trait HealthSource: Send + Sync + 'static {
    fn service_name(&self) -> &str;

    fn overall_level(&self) -> HealthLevel;

    /// JSON object keyed by component name
    fn component_health(&self) -> Value;

    /// `None` when the component is unknown
    fn component_metrics(&self, component: &str) -> Option<Value>;
}

const METRICS_PREFIX: &str = "/adapter-metrics/";

/// Resolve a request to a status and JSON body
pub fn route(
    method: &Method,
    path: &str,
    source: &dyn HealthSource,
    uptime_seconds: u64,
) -> (StatusCode, Value) {
    if method != Method::GET {
        return (StatusCode::METHOD_NOT_ALLOWED, json!({ "error": "Method not allowed" }));
    }

    match path {
        "/health" => {
            let level = source.overall_level();
            let status = if level == HealthLevel::Unhealthy {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::OK
            };
            (
                status,
                json!({
                    "status": level,
                    "service": source.service_name(),
                    "uptime_seconds": uptime_seconds
                }),
            )
        }
        "/adapter-health" => (StatusCode::OK, source.component_health()),
        _ => match path.strip_prefix(METRICS_PREFIX) {
            Some(component) if !component.is_empty() => match source.component_metrics(component) {
                Some(metrics) => (StatusCode::OK, metrics),
                None => (
                    StatusCode::NOT_FOUND,
                    json!({ "error": format!("Unknown adapter type: {}", component) }),
                ),
            },
            _ => (StatusCode::NOT_FOUND, json!({ "error": "Not found" })),
        },
    }
}

/// HTTP health check server
pub struct HealthCheckServer {
    source: Arc<dyn HealthSource>,
    addr: SocketAddr,
    started: Instant,
}

impl HealthCheckServer {
    pub fn new(source: Arc<dyn HealthSource>, addr: SocketAddr) -> Self {
        Self {
            source,
            addr,
            started: Instant::now(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until the process exits
    pub async fn start(&self) -> Result<()> {
        self.serve_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves
    pub async fn serve_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let source = Arc::clone(&self.source);
        let started = self.started;

        let make_svc = make_service_fn(move |_conn| {
            let source = Arc::clone(&source);
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let source = Arc::clone(&source);
                    handle_request(req, source, started)
                }))
            }
        });

        let server = Server::try_bind(&self.addr)?.serve(make_svc);

        info!(
            service = self.source.service_name(),
            "Health check server listening on http://{}", self.addr
        );
        info!("Endpoints: /health, /adapter-health, /adapter-metrics/<type>");

        if let Err(e) = server.with_graceful_shutdown(shutdown).await {
            error!("Health check server error: {}", e);
            return Err(e.into());
        }

        info!("Health check server stopped");
        Ok(())
    }
}

async fn handle_request(
    req: Request<Body>,
    source: Arc<dyn HealthSource>,
    started: Instant,
) -> Result<Response<Body>, Infallible> {
    debug!("Health check request: {} {}", req.method(), req.uri().path());

    let uptime_seconds = started.elapsed().as_secs();
    let (status, body) = route(req.method(), req.uri().path(), source.as_ref(), uptime_seconds);

    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}
