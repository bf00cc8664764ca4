use axum::body::Body;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use http::header;

use object_store::TierError;

use crate::ServiceState;

/// Serve the full bundle stored under a root id.
pub async fn handler(
    State(state): State<ServiceState>,
    Path(root_id): Path<String>,
) -> Result<impl IntoResponse, DownloadError> {
    let data = state.tier().download(&root_id).await?;

    tracing::debug!(root_id = %root_id, size = data.len(), "DOWNLOAD: serving bundle");

    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-tar")
        .body(Body::from(data))
        .map_err(|e| DownloadError::Internal(e.to_string()))?)
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Tier error: {0}")]
    Tier(#[from] TierError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for DownloadError {
    fn into_response(self) -> Response {
        tracing::error!("DOWNLOAD ERROR: {:?}", self);
        match self {
            DownloadError::Tier(TierError::NotFound(id)) => (
                http::StatusCode::NOT_FOUND,
                format!("Bundle not found: {id}"),
            )
                .into_response(),
            DownloadError::Tier(e) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("Tier error: {e}"),
            )
                .into_response(),
            DownloadError::Internal(msg) => {
                (http::StatusCode::INTERNAL_SERVER_ERROR, msg).into_response()
            }
        }
    }
}
