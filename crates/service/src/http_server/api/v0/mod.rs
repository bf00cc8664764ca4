use axum::Router;

pub mod bundle;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .nest("/bundles", bundle::router(state.clone()))
        .with_state(state)
}
