use std::net::SocketAddr;

use super::MAX_UPLOAD_SIZE_BYTES;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// Level request/response traces are emitted at.
    pub log_level: tracing::Level,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: ([127, 0, 0, 1], 8080).into(),
            log_level: tracing::Level::INFO,
            max_upload_bytes: MAX_UPLOAD_SIZE_BYTES,
        }
    }
}
