//! SLA vocabularies and the SLA view models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Commitment phase a node is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaPhase {
    FirstResponse,
    Solution,
    Quote,
    Close,
}

impl SlaPhase {
    pub const ALL: [SlaPhase; 4] = [
        SlaPhase::FirstResponse,
        SlaPhase::Solution,
        SlaPhase::Quote,
        SlaPhase::Close,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SlaPhase::FirstResponse => "first_response",
            SlaPhase::Solution => "solution",
            SlaPhase::Quote => "quote",
            SlaPhase::Close => "close",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    Normal,
    AtRisk,
    Breached,
}

impl SlaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlaStatus::Normal => "normal",
            SlaStatus::AtRisk => "at_risk",
            SlaStatus::Breached => "breached",
        }
    }
}

impl std::fmt::Display for SlaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SlaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(SlaStatus::Normal),
            "at_risk" => Ok(SlaStatus::AtRisk),
            "breached" => Ok(SlaStatus::Breached),
            _ => Err(format!("Unknown SLA status: {}", s)),
        }
    }
}

/// Result of checking a ticket against its SLA window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaCheck {
    pub sla_status: SlaStatus,
    /// `None` when the ticket carries no SLA commitment
    pub remaining_hours: Option<f64>,
    /// Fraction of the window left, 0.0..=1.0
    pub remaining_percent: Option<f64>,
}

impl SlaCheck {
    pub fn no_sla() -> Self {
        Self {
            sla_status: SlaStatus::Normal,
            remaining_hours: None,
            remaining_percent: None,
        }
    }

    pub fn has_sla(&self) -> bool {
        self.remaining_hours.is_some()
    }
}

/// Response for GET /tickets/sla/matrix: priority -> phase -> hours
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaMatrixResponse {
    pub matrix: BTreeMap<String, BTreeMap<String, i64>>,
    /// Remaining fraction at or below which a ticket is reported at risk
    pub at_risk_threshold: f64,
}
