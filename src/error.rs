use std::result;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Only plain `MD5` has a defined computation; `MD5-sess` and anything else land here.
    #[error("Unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Unsupported qop options in challenge: {0}")]
    UnsupportedQop(String),

    /// The OS random source failed; no cnonce can be produced.
    #[error("Failed to generate client nonce: {0}")]
    Random(#[from] rand::Error),

    #[error("Invalid Authorization header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("Invalid request: {0}")]
    Http(#[from] http::Error),

    /// Error reported by the underlying transport, passed through untouched.
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = result::Result<T, Error>;
