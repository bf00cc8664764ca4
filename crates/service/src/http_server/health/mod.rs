use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use http::StatusCode;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/livez", get(livez_handler))
        .with_state(state)
}

async fn livez_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
