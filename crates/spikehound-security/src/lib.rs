//! Spikehound Security
//!
//! Fail-closed authenticators for inbound chat callbacks:
//!
//! - [`SlackSignatureVerifier`]: HMAC-SHA256 over `v0:{ts}:{body}`
//! - [`DiscordSignatureVerifier`]: Ed25519 over `ts || body`
//! - [`ReplayWindow`]: timestamp skew bound shared by both
//!
//! Every verifier offers `check`, which reports why a request was rejected,
//! and `verify`, which only answers yes or no.
//!
//! # Example
//!
//! ```rust
//! use spikehound_security::{Headers, SlackSignatureVerifier};
//!
//! let verifier = SlackSignatureVerifier::new("secret");
//! let signature = verifier.compute_signature("1700000000", b"body").unwrap();
//!
//! let mut headers = Headers::new();
//! headers.insert("X-Slack-Request-Timestamp".into(), "1700000000".into());
//! headers.insert("X-Slack-Signature".into(), signature);
//!
//! assert!(verifier.verify(&headers, b"body", 1_700_000_100));
//! assert!(!verifier.verify(&headers, b"body", 1_700_000_400));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod discord;
pub mod error;
pub mod headers;
pub mod replay;
pub mod slack;

pub use discord::{DiscordSignatureVerifier, DISCORD_SIGNATURE_HEADER, DISCORD_TIMESTAMP_HEADER};
pub use error::SignatureError;
pub use headers::{header_value, Headers};
pub use replay::{ReplayWindow, DEFAULT_MAX_AGE_SECS};
pub use slack::{SlackSignatureVerifier, SLACK_SIGNATURE_HEADER, SLACK_TIMESTAMP_HEADER};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
