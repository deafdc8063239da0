//! HMAC-SHA256 verifier for Slack-style action callbacks
//!
//! Signed string: `v0:{timestamp}:{body}`. Expected header value:
//! `v0=` followed by the lowercase hex digest.

use crate::error::SignatureError;
use crate::headers::{header_value, Headers};
use crate::replay::ReplayWindow;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Timestamp header name
pub const SLACK_TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";
/// Signature header name
pub const SLACK_SIGNATURE_HEADER: &str = "X-Slack-Signature";

const VERSION_PREFIX: &str = "v0";

/// Verifies Slack request signatures
#[derive(Clone)]
pub struct SlackSignatureVerifier {
    signing_secret: String,
    window: ReplayWindow,
}

impl std::fmt::Debug for SlackSignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackSignatureVerifier")
            .field("configured", &!self.signing_secret.is_empty())
            .field("window", &self.window)
            .finish()
    }
}

impl SlackSignatureVerifier {
    /// Create new verifier; an empty secret rejects everything
    #[inline]
    #[must_use]
    pub fn new(signing_secret: impl Into<String>) -> Self {
        Self {
            signing_secret: signing_secret.into(),
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

    /// Compute the expected header value for a timestamp and body
    pub fn compute_signature(&self, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.signing_secret.as_bytes())
            .map_err(|_| SignatureError::NotConfigured)?;
        mac.update(VERSION_PREFIX.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        let digest = mac.finalize().into_bytes();
        Ok(format!("{VERSION_PREFIX}={}", hex::encode(digest)))
    }

    /// Check a request, returning the rejection reason
    pub fn check(&self, headers: &Headers, body: &[u8], now: i64) -> Result<(), SignatureError> {
        if self.signing_secret.trim().is_empty() {
            return Err(SignatureError::NotConfigured);
        }

        let timestamp = header_value(headers, SLACK_TIMESTAMP_HEADER)
            .ok_or(SignatureError::MissingHeader(SLACK_TIMESTAMP_HEADER))?;
        let provided = header_value(headers, SLACK_SIGNATURE_HEADER)
            .ok_or(SignatureError::MissingHeader(SLACK_SIGNATURE_HEADER))?;

        self.window.check(timestamp, now)?;

        let expected = self.compute_signature(timestamp, body)?;
        // Length is public; only equal-length values reach the fixed-time compare.
        let matches = expected.len() == provided.len()
            && bool::from(expected.as_bytes().ct_eq(provided.as_bytes()));
        if matches {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }

    /// Fail-closed check
    #[must_use]
    pub fn verify(&self, headers: &Headers, body: &[u8], now: i64) -> bool {
        match self.check(headers, body, now) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(reason = %err, "slack_signature_rejected");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const T: i64 = 1_700_000_000;
    const BODY: &[u8] = b"payload=%7B%22type%22%3A%22block_actions%22%7D";

    fn signed_headers(verifier: &SlackSignatureVerifier, ts: &str, body: &[u8]) -> Headers {
        let mut headers = Headers::new();
        headers.insert(SLACK_TIMESTAMP_HEADER.into(), ts.into());
        headers.insert(
            SLACK_SIGNATURE_HEADER.into(),
            verifier.compute_signature(ts, body).unwrap(),
        );
        headers
    }

    #[test]
    fn accepts_valid_signature() {
        let verifier = SlackSignatureVerifier::new("s");
        let headers = signed_headers(&verifier, &T.to_string(), BODY);
        assert_eq!(verifier.check(&headers, BODY, T), Ok(()));
    }

    #[test]
    fn signature_format() {
        let verifier = SlackSignatureVerifier::new("s");
        let signature = verifier.compute_signature("1", b"b").unwrap();
        assert!(signature.starts_with("v0="));
        assert_eq!(signature.len(), 3 + 64);
        assert!(signature[3..].chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn replay_window_edges() {
        let verifier = SlackSignatureVerifier::new("s");
        let headers = signed_headers(&verifier, &T.to_string(), BODY);

        assert!(verifier.verify(&headers, BODY, T + 299));
        assert!(!verifier.verify(&headers, BODY, T + 301));
    }

    #[test]
    fn fails_closed() {
        let verifier = SlackSignatureVerifier::new("s");
        let headers = signed_headers(&verifier, &T.to_string(), BODY);

        assert_eq!(
            SlackSignatureVerifier::new("").check(&headers, BODY, T),
            Err(SignatureError::NotConfigured)
        );
        assert_eq!(
            verifier.check(&Headers::new(), BODY, T),
            Err(SignatureError::MissingHeader(SLACK_TIMESTAMP_HEADER))
        );
        assert_eq!(
            verifier.check(&headers, b"tampered", T),
            Err(SignatureError::Mismatch)
        );

        let mut bad_ts = headers.clone();
        bad_ts.insert(SLACK_TIMESTAMP_HEADER.into(), "yesterday".into());
        assert!(matches!(
            verifier.check(&bad_ts, BODY, T),
            Err(SignatureError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn lowercase_headers_accepted() {
        let verifier = SlackSignatureVerifier::new("s");
        let ts = T.to_string();
        let mut headers = Headers::new();
        headers.insert("x-slack-request-timestamp".into(), ts.clone());
        headers.insert(
            "x-slack-signature".into(),
            verifier.compute_signature(&ts, BODY).unwrap(),
        );
        assert!(verifier.verify(&headers, BODY, T));
    }

    #[test]
    fn compare_is_exact() {
        let verifier = SlackSignatureVerifier::new("s");
        let headers = signed_headers(&verifier, &T.to_string(), BODY);
        let valid = headers[SLACK_SIGNATURE_HEADER].clone();

        let mut truncated = headers.clone();
        truncated.insert(SLACK_SIGNATURE_HEADER.into(), valid[..valid.len() - 1].to_string());
        assert_eq!(verifier.check(&truncated, BODY, T), Err(SignatureError::Mismatch));

        let mut uppercase = headers.clone();
        uppercase.insert(SLACK_SIGNATURE_HEADER.into(), format!("v0={}", valid[3..].to_uppercase()));
        assert_eq!(verifier.check(&uppercase, BODY, T), Err(SignatureError::Mismatch));

        let mut extended = headers;
        extended.insert(SLACK_SIGNATURE_HEADER.into(), format!("{valid}0"));
        assert_eq!(verifier.check(&extended, BODY, T), Err(SignatureError::Mismatch));
    }

    proptest! {
        #[test]
        fn any_flipped_character_is_rejected(index in 0usize..67, replacement in proptest::char::range('0', 'z')) {
            let verifier = SlackSignatureVerifier::new("s");
            let mut headers = signed_headers(&verifier, &T.to_string(), BODY);
            let original = headers[SLACK_SIGNATURE_HEADER].clone();

            let mut chars: Vec<char> = original.chars().collect();
            prop_assume!(chars[index] != replacement);
            chars[index] = replacement;
            headers.insert(SLACK_SIGNATURE_HEADER.into(), chars.into_iter().collect());

            prop_assert!(!verifier.verify(&headers, BODY, T));
        }
    }
}
