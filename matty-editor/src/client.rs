//! HTTP client for the Matty design API.
//!
//! [`HttpDesignClient`] implements [`DesignRepository`] over the REST routes
//! served by `matty-server`, so the editor saves to a remote server exactly as
//! it saves to an in-process [`matty_core::DesignStore`].

use async_trait::async_trait;
use matty_core::{DesignId, DesignPayload, DesignRecord, DesignRepository, DesignUpdate, StoreError};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Header carrying the owner id on every API request.
pub const OWNER_HEADER: &str = "x-owner-id";

/// Errors constructing a [`HttpDesignClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The base URL provided is invalid.
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),
    /// The HTTP client failed to build.
    #[error("HTTP client setup failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// `{"message": ...}` body returned by the API for errors and deletes.
#[derive(Debug, Deserialize)]
struct MessageBody {
    message: String,
}

/// Design repository backed by a remote `matty-server`.
#[derive(Debug, Clone)]
pub struct HttpDesignClient {
    http: Client,
    base: Url,
}

impl HttpDesignClient {
    /// Create a client for the server at `base_url`, e.g. `http://127.0.0.1:9474`.
    ///
    /// Proxies come from the usual `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY`
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the URL is malformed or cannot
    /// carry a path. Returns [`ClientError::Http`] if the HTTP client fails to
    /// build.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = Client::builder()
            .user_agent(concat!("matty/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_http_client(base_url, http)
    }

    /// Create a client that sends requests through a preconfigured
    /// [`reqwest::Client`] (custom proxy, TLS roots or timeouts).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the URL is malformed or cannot
    /// carry a path.
    pub fn with_http_client(base_url: &str, http: Client) -> Result<Self, ClientError> {
        let mut base = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(format!("{base_url} cannot be a base URL")));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { http, base })
    }

    /// The server base URL, always ending in `/`.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, StoreError> {
        self.base
            .join(path)
            .map_err(|e| StoreError::Backend(format!("bad request URL: {e}")))
    }

    fn collection_url(&self) -> Result<Url, StoreError> {
        self.url("api/designs")
    }

    fn design_url(&self, id: DesignId) -> Result<Url, StoreError> {
        self.url(&format!("api/designs/{id}"))
    }

    /// Send a request and decode a successful JSON response.
    ///
    /// `id` is the design addressed by the request, reported back in
    /// [`StoreError::NotFound`] on a 404.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        owner: &str,
        id: Option<DesignId>,
    ) -> Result<T, StoreError> {
        let response = request
            .header(OWNER_HEADER, owner)
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| StoreError::Serialization(e.to_string()));
        }

        let message = match response.json::<MessageBody>().await {
            Ok(body) => body.message,
            Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
        };
        tracing::debug!("API responded {status}: {message}");

        Err(match (status, id) {
            (StatusCode::NOT_FOUND, Some(id)) => StoreError::NotFound(id),
            (StatusCode::BAD_REQUEST, _) => StoreError::InvalidInput(message),
            _ => StoreError::Backend(format!("{status}: {message}")),
        })
    }
}

#[async_trait]
impl DesignRepository for HttpDesignClient {
    async fn create(&self, owner: &str, payload: DesignPayload) -> Result<DesignRecord, StoreError> {
        let request = self.http.post(self.collection_url()?).json(&payload);
        self.send(request, owner, None).await
    }

    async fn list(&self, owner: &str) -> Result<Vec<DesignRecord>, StoreError> {
        let request = self.http.get(self.collection_url()?);
        self.send(request, owner, None).await
    }

    async fn get(&self, owner: &str, id: DesignId) -> Result<DesignRecord, StoreError> {
        let request = self.http.get(self.design_url(id)?);
        self.send(request, owner, Some(id)).await
    }

    async fn update(
        &self,
        owner: &str,
        id: DesignId,
        update: DesignUpdate,
    ) -> Result<DesignRecord, StoreError> {
        let request = self.http.put(self.design_url(id)?).json(&update);
        self.send(request, owner, Some(id)).await
    }

    async fn delete(&self, owner: &str, id: DesignId) -> Result<(), StoreError> {
        let request = self.http.delete(self.design_url(id)?);
        let body: MessageBody = self.send(request, owner, Some(id)).await?;
        tracing::debug!("{}", body.message);
        Ok(())
    }
}
