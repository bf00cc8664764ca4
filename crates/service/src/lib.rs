/**
 * HTTP surface for the bundle tier: upload with
 *  server-side root-id derivation, full download,
 *  and on-the-fly slim derivation.
 */
pub mod http_server;
mod state;

pub use state::ServiceState;

/// Install a global tracing subscriber honoring `RUST_LOG`.
pub fn init_tracing(default_level: tracing::Level) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
