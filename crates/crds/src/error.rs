//! CRD helper errors

use thiserror::Error;

/// Errors raised while decoding data stored on CRD objects.
#[derive(Error, Debug)]
pub enum CrdError {
    /// A stored JSON snapshot could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
