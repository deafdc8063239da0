//! Opaque investigation references for untrusted clients
//!
//! Discord custom ids are echoed back by the client, so the raw
//! investigation id is replaced by `inv_<sha256-hex>` and resolved through a
//! bounded table. Unknown references resolve to themselves.

use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Token prefix
pub const TOKEN_PREFIX: &str = "inv_";

const DEFAULT_CAPACITY: u64 = 10_000;
const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Token to investigation id table
#[derive(Debug, Clone)]
pub struct InvestigationTokens {
    table: Cache<String, String>,
}

impl InvestigationTokens {
    /// Create table with capacity and entry lifetime
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            table: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Deterministic token for an investigation id
    #[must_use]
    pub fn mint(investigation_id: &str) -> String {
        let digest = Sha256::digest(investigation_id.as_bytes());
        format!("{TOKEN_PREFIX}{}", hex::encode(digest))
    }

    /// Mint and remember a token
    pub async fn remember(&self, investigation_id: &str) -> String {
        let token = Self::mint(investigation_id);
        self.table.insert(token.clone(), investigation_id.to_string()).await;
        token
    }

    /// Resolve a reference; unknown references are returned unchanged
    pub async fn resolve(&self, reference: &str) -> String {
        self.table
            .get(reference)
            .await
            .unwrap_or_else(|| reference.to_string())
    }
}

impl Default for InvestigationTokens {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn remember_then_resolve() {
        let tokens = InvestigationTokens::default();
        let token = tokens.remember("/subscriptions/s/alerts/1").await;

        assert!(token.starts_with(TOKEN_PREFIX));
        assert_eq!(token.len(), TOKEN_PREFIX.len() + 64);
        assert_eq!(tokens.resolve(&token).await, "/subscriptions/s/alerts/1");
    }

    #[tokio::test]
    async fn unknown_reference_is_raw_id() {
        let tokens = InvestigationTokens::default();
        assert_eq!(tokens.resolve("a1").await, "a1");
    }

    #[test]
    fn mint_is_deterministic() {
        assert_eq!(InvestigationTokens::mint("a1"), InvestigationTokens::mint("a1"));
        assert_ne!(InvestigationTokens::mint("a1"), InvestigationTokens::mint("a2"));
    }
}
