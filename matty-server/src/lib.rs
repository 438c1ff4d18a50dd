//! # Matty Server Library
//!
//! HTTP API for stored designs. This library is used by both the
//! `matty-server` binary and integration tests.
//!
//! ## Routes
//!
//! | Method | Path | |
//! |--------|------|--|
//! | `GET` | `/api/designs` | list the owner's designs |
//! | `POST` | `/api/designs` | create a design (201) |
//! | `GET` | `/api/designs/{id}` | fetch one design |
//! | `PUT` | `/api/designs/{id}` | merge an update |
//! | `DELETE` | `/api/designs/{id}` | delete |
//! | `GET` | `/api/designs/{id}/export` | render to PNG or JPEG |
//! | `GET` | `/health`, `/health/live`, `/health/ready` | probes |
//! | `GET` | `/metrics` | Prometheus metrics |
//!
//! Every `/api` request names its owner in the `x-owner-id` header.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use matty_core::DesignStore;
use matty_renderer::{ExportConfig, Exporter, ImageCrateDecoder, ImageDecoder};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

pub mod error;
pub mod health;
pub mod metrics;
pub mod routes;
pub mod validation;

pub use error::{ApiError, MessageResponse};
pub use routes::{Owner, OWNER_HEADER};

/// Default port for the design API.
pub const DEFAULT_PORT: u16 = 9474;

/// Largest request body accepted; image `src` data URIs travel inline.
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Server settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind (`MATTY_BIND`, default 127.0.0.1).
    pub bind: IpAddr,
    /// Port to listen on (`MATTY_PORT`, default 9474).
    pub port: u16,
    /// Directory for persisted designs (`MATTY_DATA_DIR`); memory only when unset.
    pub data_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            data_dir: None,
        }
    }
}

impl ServerConfig {
    /// Read settings from process environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`. Unparseable values fall back to defaults.
    #[must_use]
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let bind = match lookup("MATTY_BIND") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!("Ignoring invalid MATTY_BIND {raw:?}");
                defaults.bind
            }),
            None => defaults.bind,
        };
        let port = match lookup("MATTY_PORT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!("Ignoring invalid MATTY_PORT {raw:?}");
                defaults.port
            }),
            None => defaults.port,
        };
        let data_dir = lookup("MATTY_DATA_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        Self {
            bind,
            port,
            data_dir,
        }
    }

    /// Socket address to listen on.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Stored designs.
    pub store: DesignStore,
    /// Renders designs for the export route.
    pub exporter: Arc<Exporter>,
    /// Decodes image sources before export.
    pub decoder: Arc<dyn ImageDecoder>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.store)
            .field("exporter", &self.exporter)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// State serving `store` with the default exporter and decoder.
    #[must_use]
    pub fn new(store: DesignStore) -> Self {
        Self::with_exporter(store, Exporter::new(ExportConfig::default()))
    }

    /// State serving `store` with a custom exporter.
    #[must_use]
    pub fn with_exporter(store: DesignStore, exporter: Exporter) -> Self {
        Self {
            store,
            exporter: Arc::new(exporter),
            decoder: Arc::new(ImageCrateDecoder),
        }
    }

    /// Get a reference to the design store.
    #[must_use]
    pub fn store(&self) -> &DesignStore {
        &self.store
    }
}

/// Build a CORS layer that only allows localhost origins.
#[must_use]
pub fn build_cors_layer(port: u16) -> CorsLayer {
    let localhost_origins = [
        format!("http://localhost:{port}"),
        format!("http://127.0.0.1:{port}"),
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(), // Vite
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ];

    let origins: Vec<HeaderValue> = localhost_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(OWNER_HEADER),
        ])
}

/// Build the application router.
///
/// `/metrics` is only mounted when a Prometheus handle is supplied.
pub fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let api = Router::new()
        .route(
            "/api/designs",
            get(routes::list_designs).post(routes::create_design),
        )
        .route(
            "/api/designs/{id}",
            get(routes::get_design)
                .put(routes::update_design)
                .delete(routes::delete_design),
        )
        .route("/api/designs/{id}/export", get(routes::export_design))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/health", get(health::readiness))
        .route_layer(middleware::from_fn(metrics::track_http))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state);

    let app = match metrics_handle {
        Some(handle) => api.merge(
            Router::new()
                .route("/metrics", get(metrics::metrics_handler))
                .with_state(handle),
        ),
        None => api,
    };

    app.layer(
        ServiceBuilder::new()
            // Request ID for log correlation
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
            .layer(PropagateRequestIdLayer::x_request_id()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = ServerConfig::from_lookup(&lookup(&[]));
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.addr().to_string(), "127.0.0.1:9474");
    }

    #[test]
    fn test_config_from_env_values() {
        let config = ServerConfig::from_lookup(&lookup(&[
            ("MATTY_BIND", "0.0.0.0"),
            ("MATTY_PORT", "8080"),
            ("MATTY_DATA_DIR", "/var/lib/matty"),
        ]));
        assert_eq!(config.addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/matty")));
    }

    #[test]
    fn test_config_ignores_garbage() {
        let config = ServerConfig::from_lookup(&lookup(&[
            ("MATTY_BIND", "localhost:80"),
            ("MATTY_PORT", "ninety"),
            ("MATTY_DATA_DIR", "  "),
        ]));
        assert_eq!(config, ServerConfig::default());
    }
}
