//! Ed25519 verifier for Discord-style interaction callbacks
//!
//! The signed message is the timestamp's UTF-8 bytes followed by the raw
//! body. Key and signature arrive hex-encoded.

use crate::error::SignatureError;
use crate::headers::{header_value, Headers};
use crate::replay::ReplayWindow;
use ed25519_dalek::{Signature, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};

/// Timestamp header name
pub const DISCORD_TIMESTAMP_HEADER: &str = "X-Signature-Timestamp";
/// Signature header name
pub const DISCORD_SIGNATURE_HEADER: &str = "X-Signature-Ed25519";

/// Verifies Discord interaction signatures
#[derive(Debug, Clone)]
pub struct DiscordSignatureVerifier {
    public_key_hex: String,
    window: ReplayWindow,
}

impl DiscordSignatureVerifier {
    /// Create new verifier from a hex public key; empty rejects everything
    #[inline]
    #[must_use]
    pub fn new(public_key_hex: impl Into<String>) -> Self {
        Self {
            public_key_hex: public_key_hex.into(),
            window: ReplayWindow::default(),
        }
    }

    /// Override the replay window
    #[inline]
    #[must_use]
    pub fn with_window(mut self, window: ReplayWindow) -> Self {
        self.window = window;
        self
    }

    /// Check a request, returning the rejection reason
    pub fn check(&self, headers: &Headers, body: &[u8], now: i64) -> Result<(), SignatureError> {
        if self.public_key_hex.trim().is_empty() {
            return Err(SignatureError::NotConfigured);
        }

        let timestamp = header_value(headers, DISCORD_TIMESTAMP_HEADER)
            .ok_or(SignatureError::MissingHeader(DISCORD_TIMESTAMP_HEADER))?;
        let signature_hex = header_value(headers, DISCORD_SIGNATURE_HEADER)
            .ok_or(SignatureError::MissingHeader(DISCORD_SIGNATURE_HEADER))?;

        self.window.check(timestamp, now)?;

        let key_bytes: [u8; PUBLIC_KEY_LENGTH] = decode_fixed("public key", &self.public_key_hex)?;
        let signature_bytes: [u8; SIGNATURE_LENGTH] = decode_fixed("signature", signature_hex)?;

        let verifying_key =
            VerifyingKey::from_bytes(&key_bytes).map_err(|_| SignatureError::InvalidKey)?;
        let signature = Signature::from_bytes(&signature_bytes);

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        verifying_key
            .verify(&message, &signature)
            .map_err(|_| SignatureError::Mismatch)
    }

    /// Fail-closed check
    #[must_use]
    pub fn verify(&self, headers: &Headers, body: &[u8], now: i64) -> bool {
        match self.check(headers, body, now) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(reason = %err, "discord_signature_rejected");
                false
            }
        }
    }
}

fn decode_fixed<const N: usize>(field: &'static str, value: &str) -> Result<[u8; N], SignatureError> {
    let value = value.trim();
    if value.is_empty() || value.len() % 2 != 0 {
        return Err(SignatureError::malformed(field, "empty or odd-length hex"));
    }
    let bytes = hex::decode(value).map_err(|e| SignatureError::malformed(field, e.to_string()))?;
    <[u8; N]>::try_from(bytes.as_slice())
        .map_err(|_| SignatureError::malformed(field, format!("expected {N} bytes, got {}", bytes.len())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    const T: i64 = 1_700_000_000;
    const BODY: &[u8] = br#"{"type":3,"data":{"custom_id":"approve_remediation:a1"}}"#;

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn verifier() -> DiscordSignatureVerifier {
        DiscordSignatureVerifier::new(hex::encode(signing_key().verifying_key().as_bytes()))
    }

    fn signed_headers(ts: &str, body: &[u8]) -> Headers {
        let mut message = ts.as_bytes().to_vec();
        message.extend_from_slice(body);
        let signature = signing_key().sign(&message);

        let mut headers = Headers::new();
        headers.insert(DISCORD_TIMESTAMP_HEADER.into(), ts.into());
        headers.insert(DISCORD_SIGNATURE_HEADER.into(), hex::encode(signature.to_bytes()));
        headers
    }

    #[test]
    fn accepts_valid_signature() {
        let headers = signed_headers(&T.to_string(), BODY);
        assert_eq!(verifier().check(&headers, BODY, T + 10), Ok(()));
    }

    #[test]
    fn rejects_single_byte_body_mutation() {
        let headers = signed_headers(&T.to_string(), BODY);
        for index in [0, BODY.len() / 2, BODY.len() - 1] {
            let mut mutated = BODY.to_vec();
            mutated[index] ^= 0x01;
            assert_eq!(
                verifier().check(&headers, &mutated, T),
                Err(SignatureError::Mismatch)
            );
        }
    }

    #[test]
    fn rejects_stale_timestamp() {
        let headers = signed_headers(&T.to_string(), BODY);
        assert!(verifier().verify(&headers, BODY, T + 299));
        assert!(!verifier().verify(&headers, BODY, T + 301));
    }

    #[test]
    fn rejects_malformed_key_and_signature() {
        let headers = signed_headers(&T.to_string(), BODY);

        for key in ["", "abc", "zz", "ab".repeat(31).as_str()] {
            let verifier = DiscordSignatureVerifier::new(key);
            assert!(!verifier.verify(&headers, BODY, T), "key {key:?} accepted");
        }

        for signature in ["abc", "gg", "00".repeat(63).as_str()] {
            let mut bad = headers.clone();
            bad.insert(DISCORD_SIGNATURE_HEADER.into(), signature.to_string());
            assert!(matches!(
                verifier().check(&bad, BODY, T),
                Err(SignatureError::Malformed { field: "signature", .. })
            ));
        }
    }

    #[test]
    fn rejects_missing_headers() {
        assert_eq!(
            verifier().check(&Headers::new(), BODY, T),
            Err(SignatureError::MissingHeader(DISCORD_TIMESTAMP_HEADER))
        );
    }
}
