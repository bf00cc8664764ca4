use axum::routing::{get, post};
use axum::Router;

pub mod download;
pub mod slim;
pub mod upload;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/", post(upload::handler))
        .route("/:root_id", get(download::handler))
        .route("/:root_id/slim", get(slim::handler))
        .with_state(state)
}
