//! Tower layers: per-request memory headers, live-unit headers, access log.
//!
//! Layers only add response headers or log lines; bodies and inner errors
//! pass through untouched.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::Response;
use tracing::info;

use memwatch_core::instrument::{measure_async, measure_live_units_async};
use memwatch_core::{Monitor, StatsSource};

type BoxFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

fn append_headers<const N: usize>(headers: &mut HeaderMap, pairs: [(&'static str, String); N]) {
    for (name, value) in pairs {
        // from_bytes: duration strings may contain "µ".
        if let Ok(value) = HeaderValue::from_bytes(value.as_bytes()) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
}

// ============================================================
// Memory delta
// ============================================================

/// Adds before/after/diff memory, duration and live-unit headers.
#[derive(Clone)]
pub(crate) struct MemoryLayer {
    monitor: Arc<Monitor>,
}

impl MemoryLayer {
    pub(crate) fn new(monitor: Arc<Monitor>) -> Self {
        Self { monitor }
    }
}

impl<S> tower::Layer<S> for MemoryLayer {
    type Service = MemoryService<S>;
    fn layer(&self, inner: S) -> Self::Service {
        MemoryService {
            inner,
            monitor: self.monitor.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct MemoryService<S> {
    inner: S,
    monitor: Arc<Monitor>,
}

impl<S> tower::Service<Request> for MemoryService<S>
where
    S: tower::Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let monitor = self.monitor.clone();
        let mut inner = self.inner.clone();
        Box::pin(async move {
            let (result, delta) = measure_async(&monitor, inner.call(req)).await;
            let mut response = result?;
            append_headers(response.headers_mut(), delta.headers());
            Ok(response)
        })
    }
}

// ============================================================
// Live units
// ============================================================

/// Adds live-unit before/after/diff headers.
#[derive(Clone)]
pub(crate) struct LiveUnitsLayer {
    source: Arc<dyn StatsSource>,
}

impl LiveUnitsLayer {
    pub(crate) fn new(source: Arc<dyn StatsSource>) -> Self {
        Self { source }
    }
}

impl<S> tower::Layer<S> for LiveUnitsLayer {
    type Service = LiveUnitsService<S>;
    fn layer(&self, inner: S) -> Self::Service {
        LiveUnitsService {
            inner,
            source: self.source.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct LiveUnitsService<S> {
    inner: S,
    source: Arc<dyn StatsSource>,
}

impl<S> tower::Service<Request> for LiveUnitsService<S>
where
    S: tower::Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let source = self.source.clone();
        let mut inner = self.inner.clone();
        Box::pin(async move {
            let (result, delta) = measure_live_units_async(&*source, inner.call(req)).await;
            let mut response = result?;
            append_headers(response.headers_mut(), delta.headers());
            Ok(response)
        })
    }
}

// ============================================================
// Access log
// ============================================================

#[derive(Clone)]
pub(crate) struct AccessLogLayer;

impl<S> tower::Layer<S> for AccessLogLayer {
    type Service = AccessLogService<S>;
    fn layer(&self, inner: S) -> Self::Service {
        AccessLogService { inner }
    }
}

#[derive(Clone)]
pub(crate) struct AccessLogService<S> {
    inner: S,
}

impl<S> tower::Service<Request> for AccessLogService<S>
where
    S: tower::Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let client = req
            .extensions()
            .get::<axum::extract::ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .unwrap_or_else(|| "-".to_owned());
        let t0 = Instant::now();

        let mut inner = self.inner.clone();
        Box::pin(async move {
            let response = inner.call(req).await?;
            let latency_ms = t0.elapsed().as_millis() as u64;
            let status = response.status().as_u16();
            if !path.starts_with("/swagger-ui") {
                info!(client, status, latency_ms, "{method} {path}");
            }
            Ok(response)
        })
    }
}
