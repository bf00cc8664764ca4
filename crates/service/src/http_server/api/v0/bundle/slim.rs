use axum::body::Body;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use http::header;

use common::bundle::{Bundle, BundleError, ParseOptions};
use object_store::TierError;

use crate::ServiceState;

/// Serve a slim bundle derived on the fly from the stored full bundle.
///
/// The shard selection uses the manifest's own root id, so the slim
/// artifact stays correct even if the storage key and manifest ever
/// disagree.
pub async fn handler(
    State(state): State<ServiceState>,
    Path(root_id): Path<String>,
) -> Result<impl IntoResponse, SlimError> {
    let data = state.tier().download(&root_id).await?;
    let bundle = Bundle::parse(&data, ParseOptions::default()).await?;

    let manifest_root = bundle
        .root_id()
        .ok_or(SlimError::MissingRootId)?
        .to_string();
    let slim = bundle.slim(&manifest_root, None)?;
    let bytes = slim.to_bytes().await?;

    tracing::debug!(
        root_id = %root_id,
        full_size = data.len(),
        slim_size = bytes.len(),
        "SLIM: derived bootstrap bundle"
    );

    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-tar")
        .body(Body::from(bytes))
        .map_err(|e| SlimError::Internal(e.to_string()))?)
}

#[derive(Debug, thiserror::Error)]
pub enum SlimError {
    #[error("Tier error: {0}")]
    Tier(#[from] TierError),
    #[error("Stored bundle is invalid: {0}")]
    Bundle(#[from] BundleError),
    #[error("Stored bundle has no root id")]
    MissingRootId,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for SlimError {
    fn into_response(self) -> Response {
        tracing::error!("SLIM ERROR: {:?}", self);
        match self {
            SlimError::Tier(TierError::NotFound(id)) => (
                http::StatusCode::NOT_FOUND,
                format!("Bundle not found: {id}"),
            )
                .into_response(),
            SlimError::Tier(e) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("Tier error: {e}"),
            )
                .into_response(),
            SlimError::Bundle(e) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("Stored bundle is invalid: {e}"),
            )
                .into_response(),
            SlimError::MissingRootId => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                "Stored bundle has no root id".to_string(),
            )
                .into_response(),
            SlimError::Internal(msg) => {
                (http::StatusCode::INTERNAL_SERVER_ERROR, msg).into_response()
            }
        }
    }
}
