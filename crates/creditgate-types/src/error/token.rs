//! Guest usage token errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a client-held usage token was rejected.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum TokenError {
    /// Token does not have the `payload.signature` shape or is not valid base64/JSON
    #[error("Malformed usage token: {message}")]
    Malformed {
        /// Description of the decoding failure
        message: String,
    },

    /// Signature does not match the payload
    #[error("Usage token signature mismatch")]
    BadSignature,

    /// Token was issued by an incompatible format version
    #[error("Unsupported usage token version: {version}")]
    UnsupportedVersion {
        /// Version found in the payload
        version: u8,
    },
}
