//! Rejection reasons
//!
//! Callers that only need a yes/no answer use the `verify` wrappers, which
//! collapse every variant to `false`.

/// Why a signed request was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// No secret or public key configured
    #[error("verifier is not configured")]
    NotConfigured,

    /// Required header absent or empty
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    /// Timestamp header is not an integer
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Timestamp outside the replay window
    #[error("timestamp outside replay window: skew {skew_secs}s exceeds {max_age_secs}s")]
    StaleTimestamp { skew_secs: u64, max_age_secs: u64 },

    /// Hex decoding failed or produced the wrong length
    #[error("malformed {field}: {reason}")]
    Malformed {
        field: &'static str,
        reason: String,
    },

    /// Public key bytes are not a valid curve point
    #[error("invalid public key")]
    InvalidKey,

    /// Signature did not match
    #[error("signature mismatch")]
    Mismatch,
}

impl SignatureError {
    pub(crate) fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            field,
            reason: reason.into(),
        }
    }
}
