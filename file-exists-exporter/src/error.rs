use thiserror::Error;

use crate::config::ConfigError;

/// Fatal errors raised while starting or running the exporter.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Result type alias using the exporter's Error.
pub type Result<T> = std::result::Result<T, Error>;
