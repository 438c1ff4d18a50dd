//! API route handlers.

use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use matty_core::{DesignId, DesignPayload, DesignRecord, DesignUpdate};
use matty_renderer::{decode_pending, export_filename, ExportFormat};
use serde::Deserialize;

use crate::error::{ApiError, MessageResponse};
use crate::metrics;
use crate::validation::{self, ValidationError};
use crate::AppState;

/// Header naming the owner of every `/api` request.
pub const OWNER_HEADER: &str = "x-owner-id";

/// Validated owner id taken from the `x-owner-id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(OWNER_HEADER)
            .ok_or(ApiError::Unauthorized)?;
        let owner = value
            .to_str()
            .map_err(|_| rejected(ValidationError::OwnerIdInvalidChars))?;
        validation::validate_owner_id(owner).map_err(rejected)?;
        Ok(Self(owner.to_string()))
    }
}

/// Query string of the export route.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ExportQuery {
    /// `png` (default) or `jpeg`.
    #[serde(default)]
    pub format: ExportFormat,
}

fn rejected(err: ValidationError) -> ApiError {
    tracing::debug!("Validation failed: {err}");
    metrics::record_validation_failure(err.kind());
    ApiError::from(err)
}

fn parse_id(raw: &str) -> Result<DesignId, ApiError> {
    validation::validate_design_id(raw).map_err(rejected)
}

fn observe<T>(operation: &str, result: Result<T, ApiError>) -> Result<T, ApiError> {
    metrics::record_design_operation(operation, result.is_ok());
    result
}

/// List the owner's designs, most recently updated first.
#[tracing::instrument(skip(state))]
pub async fn list_designs(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<Vec<DesignRecord>>, ApiError> {
    let designs = state.store.list(&owner);
    tracing::debug!("Listing {} designs", designs.len());
    observe("list", Ok(Json(designs)))
}

/// Create a design.
#[tracing::instrument(skip(state, body))]
pub async fn create_design(
    State(state): State<AppState>,
    Owner(owner): Owner,
    body: Result<Json<DesignPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<DesignRecord>), ApiError> {
    let Json(payload) = body?;
    validation::validate_payload(&payload).map_err(rejected)?;

    let record = state.store.create(&owner, payload);
    metrics::set_designs_stored(state.store.len());
    tracing::info!(design = %record.id, "Design created");
    observe("create", Ok((StatusCode::CREATED, Json(record))))
}

/// Fetch one design.
#[tracing::instrument(skip(state))]
pub async fn get_design(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<DesignRecord>, ApiError> {
    let id = parse_id(&id)?;
    let result = state.store.get(&owner, id).map(Json).map_err(ApiError::from);
    observe("get", result)
}

/// Merge an update into a design.
#[tracing::instrument(skip(state, body))]
pub async fn update_design(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    body: Result<Json<DesignUpdate>, JsonRejection>,
) -> Result<Json<DesignRecord>, ApiError> {
    let id = parse_id(&id)?;
    let Json(update) = body?;
    validation::validate_update(&update).map_err(rejected)?;

    let result = state
        .store
        .update(&owner, id, update)
        .map(Json)
        .map_err(ApiError::from);
    if result.is_ok() {
        tracing::info!(design = %id, "Design updated");
    }
    observe("update", result)
}

/// Delete a design.
#[tracing::instrument(skip(state))]
pub async fn delete_design(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id)?;
    let result = state
        .store
        .delete(&owner, id)
        .map(|()| Json(MessageResponse::new("Design deleted successfully")))
        .map_err(ApiError::from);
    if result.is_ok() {
        metrics::set_designs_stored(state.store.len());
        tracing::info!(design = %id, "Design deleted");
    }
    observe("delete", result)
}

/// Render a design to PNG or JPEG as a file download.
///
/// Images are decoded first; encoding runs on the blocking pool.
#[tracing::instrument(skip(state))]
pub async fn export_design(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let record = observe("get", state.store.get(&owner, id).map_err(ApiError::from))?;
    let format = query.format;

    let document = decode_pending(&record.document(), state.decoder.as_ref()).await;
    let exporter = state.exporter.clone();
    let bytes = tokio::task::spawn_blocking(move || exporter.encode(&document, format))
        .await
        .map_err(|e| ApiError::Internal(format!("export task failed: {e}")))??;

    metrics::record_export(format.extension());
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_filename(&record.title, format)
    );
    Ok((
        [
            (header::CONTENT_TYPE, format.mime().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
