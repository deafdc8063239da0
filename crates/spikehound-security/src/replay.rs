//! Replay window for signed request timestamps

use crate::error::SignatureError;

/// Default maximum timestamp skew, in seconds
pub const DEFAULT_MAX_AGE_SECS: u64 = 300;

/// Bounds how far a signed timestamp may drift from the local clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayWindow {
    max_age_secs: u64,
}

impl ReplayWindow {
    /// Create new window
    #[inline]
    #[must_use]
    pub const fn new(max_age_secs: u64) -> Self {
        Self { max_age_secs }
    }

    /// Maximum accepted skew
    #[inline]
    #[must_use]
    pub const fn max_age_secs(&self) -> u64 {
        self.max_age_secs
    }

    /// Parse `timestamp` and check it against `now` (Unix seconds)
    ///
    /// Skew in either direction counts; a skew equal to the maximum is accepted.
    pub fn check(&self, timestamp: &str, now: i64) -> Result<i64, SignatureError> {
        let ts: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp(timestamp.to_string()))?;

        let skew_secs = now
            .checked_sub(ts)
            .map_or(u64::MAX, i64::unsigned_abs);

        if skew_secs > self.max_age_secs {
            return Err(SignatureError::StaleTimestamp {
                skew_secs,
                max_age_secs: self.max_age_secs,
            });
        }
        Ok(ts)
    }
}

impl Default for ReplayWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AGE_SECS)
    }
}
