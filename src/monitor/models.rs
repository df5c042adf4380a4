// Data models for liveness probing

use chrono::{DateTime, Utc};
use std::fmt;

/// Last known reachability of the monitored host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// No prior record exists
    Unknown,
    Up,
    Down,
}

impl HealthState {
    /// Token written to the state record; `Unknown` has none
    pub fn as_token(&self) -> Option<&'static str> {
        match self {
            HealthState::Unknown => None,
            HealthState::Up => Some("up"),
            HealthState::Down => Some("down"),
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "up" => Some(HealthState::Up),
            "down" => Some(HealthState::Down),
            _ => None,
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HealthState::Unknown => "unknown",
            HealthState::Up => "up",
            HealthState::Down => "down",
        };
        f.write_str(label)
    }
}

/// Outcome of a single probe attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub target: String,
    /// Always `Up` or `Down`
    pub outcome: HealthState,
    pub timestamp: DateTime<Utc>,
    pub latency_ms: Option<f64>,
    pub detail: String,
}

impl ProbeResult {
    pub fn up(target: &str, latency_ms: f64, detail: impl Into<String>) -> Self {
        Self {
            target: target.to_string(),
            outcome: HealthState::Up,
            timestamp: Utc::now(),
            latency_ms: Some(latency_ms),
            detail: detail.into(),
        }
    }

    pub fn down(target: &str, detail: impl Into<String>) -> Self {
        Self {
            target: target.to_string(),
            outcome: HealthState::Down,
            timestamp: Utc::now(),
            latency_ms: None,
            detail: detail.into(),
        }
    }
}

/// Only the edge into `Down` is alert-worthy.
pub fn is_alert_transition(prior: HealthState, current: HealthState) -> bool {
    current == HealthState::Down && prior != HealthState::Down
}

/// Human-readable alert text for a fresh outage
pub fn format_down_alert(result: &ProbeResult) -> String {
    format!(
        "Host {} is unreachable (detected at {}): {}",
        result.target,
        result.timestamp.to_rfc3339(),
        result.detail
    )
}

/// Summary of one completed probe cycle
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeCycleReport {
    pub prior: HealthState,
    pub result: ProbeResult,
    pub alert_attempted: bool,
    /// `None` when no alert was attempted
    pub alert_delivered: Option<bool>,
    pub state_persisted: bool,
}
