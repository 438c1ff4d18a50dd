//! Test server harness for integration tests.
//!
//! Spins up the real application router on a random port so tests can talk
//! to it over HTTP.

use std::net::SocketAddr;

use matty_core::DesignStore;
use matty_renderer::{ExportConfig, Exporter};
use matty_server::{build_router, AppState, OWNER_HEADER};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A test server instance with control handles.
pub struct TestServer {
    addr: SocketAddr,
    store: DesignStore,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a server with an empty in-memory store.
    pub async fn start() -> Self {
        Self::with_store(DesignStore::new()).await
    }

    /// Start a server over `store` on a random available port.
    ///
    /// # Panics
    ///
    /// Panics if no port is available or server fails to bind.
    pub async fn with_store(store: DesignStore) -> Self {
        let port = portpicker::pick_unused_port().expect("no available port");
        let addr = SocketAddr::from(([127, 0, 0, 1], port));

        let exporter = Exporter::new(ExportConfig {
            load_system_fonts: false,
            ..ExportConfig::default()
        });
        let state = AppState::with_exporter(store.clone(), exporter);

        // A recorder that is never installed globally, so tests don't collide
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
        let app = build_router(state, Some(metrics_handle));

        let listener = TcpListener::bind(addr).await.expect("failed to bind");
        let actual_addr = listener.local_addr().expect("failed to get local addr");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("server error");
        });

        // Give the server a moment to start
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;

        Self {
            addr: actual_addr,
            store,
            shutdown_tx: Some(shutdown_tx),
            handle,
        }
    }

    /// Base URL, e.g. `http://127.0.0.1:12345`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL of `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// URL of the design collection.
    pub fn designs_url(&self) -> String {
        self.url("/api/designs")
    }

    /// URL of one design.
    pub fn design_url(&self, id: &str) -> String {
        self.url(&format!("/api/designs/{id}"))
    }

    /// Get access to the store (for test assertions).
    #[allow(dead_code)]
    pub fn store(&self) -> &DesignStore {
        &self.store
    }

    /// Gracefully shut down the server.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = tokio::time::timeout(tokio::time::Duration::from_secs(5), self.handle).await;
    }
}

/// A reqwest request builder with the owner header set.
#[allow(dead_code)]
pub fn as_owner(builder: reqwest::RequestBuilder, owner: &str) -> reqwest::RequestBuilder {
    builder.header(OWNER_HEADER, owner)
}
