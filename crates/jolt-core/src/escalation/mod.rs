//! Escalation engine.
//!
//! [`EscalationController`] is the pure state machine: it owns the
//! [`EscalationState`] and is driven by explicit calls, the same way the
//! caller drives ticks. [`EscalationSession`] wraps it in a single task that
//! merges sensor samples, user intents and countdown ticks into one queue,
//! owns the alarm, and calls the notifier.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Triggered -> CountingDown(n) -> ... -> CountingDown(0) -> Dispatching -> Resolved
//!                            |                                        ^
//!                            +--- send now ---------------------------+
//!                            +--- cancel / dismiss -> Cancelled
//! Resolved | Cancelled -> Triggered   (next accident)
//! Resolved | Cancelled -> Idle        (dismiss)
//! ```

mod alarm;
mod controller;
mod session;

pub use alarm::{volume_for, Alarm, AlarmDevice, SilentAlarm, MIN_VOLUME};
pub use controller::{EscalationController, DEFAULT_COUNTDOWN_SECS};
pub use session::{
    EscalationSession, SampleSink, SensorSource, SessionBuilder, SessionSummary, UserIntent,
};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "seconds_remaining", rename_all = "snake_case")]
pub enum EscalationState {
    Idle,
    Triggered,
    CountingDown(u8),
    Dispatching,
    Resolved,
    Cancelled,
}

impl EscalationState {
    /// A cycle is in flight and owns the alarm/dispatch resources.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Triggered | Self::CountingDown(_) | Self::Dispatching
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Cancelled)
    }

    pub fn seconds_remaining(self) -> Option<u8> {
        match self {
            Self::CountingDown(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for EscalationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Triggered => write!(f, "triggered"),
            Self::CountingDown(n) => write!(f, "counting down ({n}s)"),
            Self::Dispatching => write!(f, "dispatching"),
            Self::Resolved => write!(f, "resolved"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Why dispatch began.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchTrigger {
    /// The countdown ran out.
    Expired,
    /// The user asked to send immediately.
    SendNow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    Resolved,
    Cancelled,
}

impl CycleOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            CycleOutcome::Resolved => "resolved",
            CycleOutcome::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for CycleOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resolved" => Ok(CycleOutcome::Resolved),
            "cancelled" => Ok(CycleOutcome::Cancelled),
            other => Err(format!("unknown cycle outcome: {other}")),
        }
    }
}

/// One trigger-to-terminal escalation, as stored in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub session_id: Uuid,
    pub outcome: CycleOutcome,
    pub magnitude: f32,
    pub confidence: f32,
    pub triggered_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub delivered: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_and_terminal_are_disjoint() {
        let all = [
            EscalationState::Idle,
            EscalationState::Triggered,
            EscalationState::CountingDown(3),
            EscalationState::Dispatching,
            EscalationState::Resolved,
            EscalationState::Cancelled,
        ];
        for state in all {
            assert!(!(state.is_active() && state.is_terminal()), "{state}");
        }
        assert!(!EscalationState::Idle.is_active());
        assert!(!EscalationState::Idle.is_terminal());
    }

    #[test]
    fn state_serializes_with_seconds() {
        let json = serde_json::to_value(EscalationState::CountingDown(9)).unwrap();
        assert_eq!(json["state"], "counting_down");
        assert_eq!(json["seconds_remaining"], 9);
        let idle = serde_json::to_value(EscalationState::Idle).unwrap();
        assert_eq!(idle["state"], "idle");
    }

    #[test]
    fn cycle_outcome_parses() {
        assert_eq!("resolved".parse::<CycleOutcome>(), Ok(CycleOutcome::Resolved));
        assert!("lost".parse::<CycleOutcome>().is_err());
    }
}
