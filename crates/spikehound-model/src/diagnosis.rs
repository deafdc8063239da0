//! Root-cause diagnosis

use serde::{Deserialize, Deserializer, Serialize};

/// Leading root-cause hypothesis
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RootCauseHypothesis {
    pub title: String,
    pub explanation: String,
    pub evidence: Vec<String>,
}

/// Diagnosis produced from unified findings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub hypothesis: RootCauseHypothesis,
    /// Confidence percentage, always within `0..=100`
    #[serde(deserialize_with = "clamp_confidence")]
    confidence: u8,
    pub alternatives: Vec<String>,
    pub risks: Vec<String>,
}

impl Diagnosis {
    /// Create new diagnosis; confidence is clamped to 100
    #[must_use]
    pub fn new(hypothesis: RootCauseHypothesis, confidence: u8) -> Self {
        Self {
            hypothesis,
            confidence: confidence.min(100),
            alternatives: Vec::new(),
            risks: Vec::new(),
        }
    }

    /// Add alternative explanations
    #[inline]
    #[must_use]
    pub fn with_alternatives(mut self, alternatives: Vec<String>) -> Self {
        self.alternatives = alternatives;
        self
    }

    /// Add known risks
    #[inline]
    #[must_use]
    pub fn with_risks(mut self, risks: Vec<String>) -> Self {
        self.risks = risks;
        self
    }

    /// Confidence percentage
    #[inline]
    #[must_use]
    pub fn confidence(&self) -> u8 {
        self.confidence
    }
}

fn clamp_confidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let raw = i64::deserialize(deserializer)?;
    Ok(u8::try_from(raw.clamp(0, 100)).unwrap_or(100))
}
