use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::escalation::{CycleRecord, DispatchTrigger, EscalationState};
use crate::notify::DispatchOutcome;

/// Every state change in the engine produces an Event.
/// The display layer renders them; the CLI prints them as JSON lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    MonitoringStarted {
        session_id: Uuid,
        classifier: String,
        at: DateTime<Utc>,
    },
    MonitoringStopped {
        session_id: Uuid,
        at: DateTime<Utc>,
    },
    /// The classifier cannot produce positives (model failed to load).
    ClassifierUnavailable {
        reason: String,
        at: DateTime<Utc>,
    },
    AccidentDetected {
        magnitude: f32,
        confidence: f32,
        at: DateTime<Utc>,
    },
    CountdownStarted {
        seconds: u8,
        volume: f32,
        at: DateTime<Utc>,
    },
    CountdownTick {
        seconds_remaining: u8,
        volume: f32,
        at: DateTime<Utc>,
    },
    /// The user stopped the countdown before anything was sent.
    Cancelled {
        seconds_remaining: u8,
        at: DateTime<Utc>,
    },
    DispatchStarted {
        trigger: DispatchTrigger,
        at: DateTime<Utc>,
    },
    /// Dispatch was attempted with an empty contact list.
    NoContactsConfigured {
        at: DateTime<Utc>,
    },
    DispatchCompleted {
        outcomes: Vec<DispatchOutcome>,
        at: DateTime<Utc>,
    },
    Resolved {
        delivered: usize,
        failed: usize,
        at: DateTime<Utc>,
    },
    /// A finished cycle was acknowledged and the controller is idle again.
    Dismissed {
        at: DateTime<Utc>,
    },
    /// Summary of one finished trigger-to-terminal cycle.
    CycleFinished {
        record: CycleRecord,
    },
    StateSnapshot {
        state: EscalationState,
        volume: Option<f32>,
        countdown_secs: u8,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Snake-case name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::MonitoringStarted { .. } => "monitoring_started",
            Event::MonitoringStopped { .. } => "monitoring_stopped",
            Event::ClassifierUnavailable { .. } => "classifier_unavailable",
            Event::AccidentDetected { .. } => "accident_detected",
            Event::CountdownStarted { .. } => "countdown_started",
            Event::CountdownTick { .. } => "countdown_tick",
            Event::Cancelled { .. } => "cancelled",
            Event::DispatchStarted { .. } => "dispatch_started",
            Event::NoContactsConfigured { .. } => "no_contacts_configured",
            Event::DispatchCompleted { .. } => "dispatch_completed",
            Event::Resolved { .. } => "resolved",
            Event::Dismissed { .. } => "dismissed",
            Event::CycleFinished { .. } => "cycle_finished",
            Event::StateSnapshot { .. } => "state_snapshot",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_type() {
        let event = Event::CountdownTick {
            seconds_remaining: 3,
            volume: 0.82,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "CountdownTick");
        assert_eq!(json["seconds_remaining"], 3);
        assert_eq!(event.kind(), "countdown_tick");
    }
}
