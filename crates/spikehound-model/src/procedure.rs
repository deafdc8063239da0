//! Procedure result envelope
//!
//! Every investigation, diagnosis and planning procedure returns a
//! [`ProcedureResult`]. The envelope is produced once per invocation and is
//! never mutated afterwards; the pipeline re-stamps timing by building a new
//! value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Identity of a pipeline procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureId {
    /// Cost investigation
    Cost,
    /// Resource investigation
    Resource,
    /// Incident history investigation
    History,
    /// Root-cause diagnosis
    Diagnosis,
    /// Remediation planning
    Remediation,
}

impl ProcedureId {
    /// The three stage-1 investigators, in launch order
    pub const INVESTIGATORS: [ProcedureId; 3] =
        [ProcedureId::Cost, ProcedureId::Resource, ProcedureId::History];

    /// Lowercase name used in logs and messages
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProcedureId::Cost => "cost",
            ProcedureId::Resource => "resource",
            ProcedureId::History => "history",
            ProcedureId::Diagnosis => "diagnosis",
            ProcedureId::Remediation => "remediation",
        }
    }
}

impl Display for ProcedureId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome class of a procedure invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureStatus {
    /// Full output
    Ok,
    /// Partial or low-confidence output
    Degraded,
    /// No usable output
    Error,
}

/// Typed envelope returned by every procedure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureResult<T> {
    /// Identity the procedure declares for itself
    pub procedure: ProcedureId,
    /// Outcome class
    pub status: ProcedureStatus,
    /// Invocation start
    pub started_at: DateTime<Utc>,
    /// Invocation end
    pub finished_at: DateTime<Utc>,
    /// Output, present only when the computation produced one
    pub data: Option<T>,
    /// Ordered error messages
    pub errors: Vec<String>,
}

impl<T> ProcedureResult<T> {
    /// Successful result carrying data
    #[inline]
    #[must_use]
    pub fn ok(
        procedure: ProcedureId,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        data: T,
    ) -> Self {
        Self {
            procedure,
            status: ProcedureStatus::Ok,
            started_at,
            finished_at,
            data: Some(data),
            errors: Vec::new(),
        }
    }

    /// Partial result with optional data and explanatory errors
    #[inline]
    #[must_use]
    pub fn degraded(
        procedure: ProcedureId,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        data: Option<T>,
        errors: Vec<String>,
    ) -> Self {
        Self {
            procedure,
            status: ProcedureStatus::Degraded,
            started_at,
            finished_at,
            data,
            errors,
        }
    }

    /// Failed result without data
    #[inline]
    #[must_use]
    pub fn error(
        procedure: ProcedureId,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            procedure,
            status: ProcedureStatus::Error,
            started_at,
            finished_at,
            data: None,
            errors: vec![message.into()],
        }
    }

    /// Check for `Ok` status
    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == ProcedureStatus::Ok
    }

    /// Check for `Error` status
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == ProcedureStatus::Error
    }

    /// Borrow the data, if any
    #[inline]
    #[must_use]
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// First error message, if any
    #[inline]
    #[must_use]
    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(String::as_str)
    }

    /// Transform the payload while keeping the envelope
    pub fn map_data<U>(self, f: impl FnOnce(T) -> U) -> ProcedureResult<U> {
        ProcedureResult {
            procedure: self.procedure,
            status: self.status,
            started_at: self.started_at,
            finished_at: self.finished_at,
            data: self.data.map(f),
            errors: self.errors,
        }
    }

    /// Copy of this result with new timing
    #[must_use]
    pub fn restamped(self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procedure_id_names() {
        assert_eq!(ProcedureId::Cost.to_string(), "cost");
        assert_eq!(ProcedureId::Remediation.as_str(), "remediation");
        assert_eq!(
            serde_json::to_string(&ProcedureId::History).unwrap(),
            "\"history\""
        );
    }

    #[test]
    fn error_result_has_no_data() {
        let now = Utc::now();
        let result: ProcedureResult<u8> =
            ProcedureResult::error(ProcedureId::Resource, now, now, "boom");

        assert!(result.is_error());
        assert!(result.data().is_none());
        assert_eq!(result.first_error(), Some("boom"));
    }

    #[test]
    fn map_data_keeps_envelope() {
        let now = Utc::now();
        let result = ProcedureResult::degraded(
            ProcedureId::Cost,
            now,
            now,
            Some(2u32),
            vec!["partial".to_string()],
        );

        let mapped = result.map_data(|v| v.to_string());
        assert_eq!(mapped.status, ProcedureStatus::Degraded);
        assert_eq!(mapped.data.as_deref(), Some("2"));
        assert_eq!(mapped.errors, vec!["partial".to_string()]);
    }
}
