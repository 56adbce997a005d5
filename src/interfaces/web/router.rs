use axum::{
    Router,
    extract::{DefaultBodyLimit, Request, State},
    http::header,
    response::Response,
    routing::{get, post},
};
use std::collections::HashMap;
use std::sync::Arc;
use tower::util::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::AppState;
use super::handlers::{self, docs::DocsSite, trigger};

/// GitHub caps webhook payloads at 25 MB.
const MAX_PAYLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Picks a sub-router by the request's host name.
#[derive(Clone)]
struct HostRouter {
    hosts: Arc<HashMap<String, Router>>,
    fallback: Router,
}

impl HostRouter {
    fn route_for(&self, host: Option<&str>) -> Router {
        host.and_then(|h| self.hosts.get(h))
            .unwrap_or(&self.fallback)
            .clone()
    }
}

/// Host name without port, from the URI authority or the `Host` header.
fn request_host(req: &Request) -> Option<String> {
    let raw = req.uri().host().map(str::to_string).or_else(|| {
        req.headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    })?;
    let host = match raw.rsplit_once(':') {
        Some((name, port)) if !name.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => raw.as_str(),
    };
    Some(host.to_ascii_lowercase())
}

async fn dispatch(State(hosts): State<HostRouter>, req: Request) -> Response {
    let host = request_host(&req);
    match hosts.route_for(host.as_deref()).oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

fn trigger_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(trigger::trigger_endpoint))
        .layer(DefaultBodyLimit::max(MAX_PAYLOAD_BYTES))
        .fallback(handlers::not_found)
        .with_state(state)
}

fn catch_all_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/trigger",
            post(trigger::trigger_endpoint).layer(DefaultBodyLimit::max(MAX_PAYLOAD_BYTES)),
        )
        .fallback(handlers::not_found)
        .with_state(state)
}

pub(crate) fn build_router(state: AppState, docs: DocsSite, book: DocsSite) -> Router {
    let config = state.config.clone();

    let mut hosts = HashMap::new();
    hosts.insert(config.docs.host.to_ascii_lowercase(), docs.router());
    hosts.insert(config.book.host.to_ascii_lowercase(), book.router());
    hosts.insert(
        config.trigger_host.to_ascii_lowercase(),
        trigger_router(state.clone()),
    );

    let hosts = HostRouter {
        hosts: Arc::new(hosts),
        fallback: catch_all_router(state),
    };

    Router::new()
        .fallback(dispatch)
        .with_state(hosts)
        .layer(CatchPanicLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
