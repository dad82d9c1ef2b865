use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use once_cell::sync::{Lazy, OnceCell};
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{error, info};
use warden_analytics::metrics as analytics_metrics;
use warden_policy_cache::metrics as cache_metrics;
use warden_reload::metrics as reload_metrics;

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static REGISTER_ONCE: OnceCell<()> = OnceCell::new();

pub fn register_metrics() {
    REGISTER_ONCE.get_or_init(|| {
        let registry = global_registry();
        cache_metrics::register_metrics(registry);
        reload_metrics::register_metrics(registry);
        analytics_metrics::register_metrics(registry);
    });
}

pub fn router() -> Router {
    register_metrics();
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(Arc::new(global_registry().clone()))
}

pub fn spawn_metrics_server(port: u16) -> Option<JoinHandle<()>> {
    if port == 0 {
        return None;
    }

    let app = router();
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(%addr, "metrics server listening");
    Some(tokio::spawn(async move {
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Err(err) = axum::serve(listener, app.into_make_service()).await {
                    error!(?err, "metrics server exited with error");
                }
            }
            Err(err) => {
                error!(?err, "failed to bind metrics listener");
            }
        }
    }))
}

fn encode_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "metric encode error").into_response()
}

async fn metrics_handler(State(registry): State<Arc<Registry>>) -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&registry.gather(), &mut buffer) {
        error!(?err, "failed to encode prometheus metrics");
        return encode_error();
    }

    let body = match String::from_utf8(buffer) {
        Ok(body) => body,
        Err(err) => {
            error!(?err, "failed to convert prometheus metrics to utf8");
            return encode_error();
        }
    };
    match HeaderValue::from_str(encoder.format_type()) {
        Ok(value) => ([(header::CONTENT_TYPE, value)], body).into_response(),
        Err(err) => {
            error!(?err, "failed to build content-type header");
            encode_error()
        }
    }
}

pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}
