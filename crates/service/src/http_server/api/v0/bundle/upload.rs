use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use common::bundle::{Bundle, BundleError, ParseOptions};
use object_store::TierError;

use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub root_id: String,
    pub size: usize,
}

/// Accept a serialized bundle and store it under its own root id.
///
/// The id is read from the manifest inside the uploaded archive; a
/// client-supplied id is never trusted.
pub async fn handler(
    State(state): State<ServiceState>,
    body: Bytes,
) -> Result<impl IntoResponse, UploadError> {
    let bundle = Bundle::parse(&body, ParseOptions::default()).await?;
    let root_id = bundle
        .root_id()
        .ok_or(UploadError::MissingRootId)?
        .to_string();

    tracing::info!(root_id = %root_id, size = body.len(), "UPLOAD: storing bundle");

    // serialize concurrent uploads for the same root id
    let _guard = state.locks().lock(&root_id).await;
    let size = body.len();
    state.tier().upload(&root_id, body).await?;

    Ok((
        http::StatusCode::OK,
        Json(UploadResponse { root_id, size }),
    )
        .into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Invalid bundle: {0}")]
    Parse(#[from] BundleError),
    #[error("Bundle manifest has no root id")]
    MissingRootId,
    #[error("Tier error: {0}")]
    Tier(#[from] TierError),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        tracing::error!("UPLOAD ERROR: {:?}", self);
        match self {
            UploadError::Parse(e) => {
                (http::StatusCode::BAD_REQUEST, format!("Invalid bundle: {e}")).into_response()
            }
            UploadError::MissingRootId => (
                http::StatusCode::UNPROCESSABLE_ENTITY,
                "Bundle manifest has no root id".to_string(),
            )
                .into_response(),
            UploadError::Tier(e) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("Tier error: {e}"),
            )
                .into_response(),
        }
    }
}
