//! Escalation state machine.
//!
//! The controller has no clock and no threads. The owning task feeds it
//! accident results, one `tick()` per countdown second, and user intents,
//! and acts on the events it returns.
//!
//! ## Usage
//!
//! ```ignore
//! let mut controller = EscalationController::new(15);
//! if let Some(event) = controller.on_accident(&result) {
//!     controller.start_countdown()?;
//! }
//! // Once per second:
//! controller.tick(); // Some(Event::DispatchStarted { .. }) when it runs out
//! ```

use chrono::{DateTime, Utc};

use super::alarm::{volume_for, MIN_VOLUME};
use super::{CycleOutcome, CycleRecord, DispatchTrigger, EscalationState};
use crate::detection::ClassificationResult;
use crate::error::SessionError;
use crate::events::Event;
use crate::notify::DispatchReport;

pub const DEFAULT_COUNTDOWN_SECS: u8 = 15;

/// What set off the current cycle.
#[derive(Debug, Clone, Copy)]
struct Trigger {
    result: ClassificationResult,
    at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EscalationController {
    state: EscalationState,
    countdown_secs: u8,
    min_volume: f32,
    trigger: Option<Trigger>,
    last_report: Option<DispatchReport>,
}

impl Default for EscalationController {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTDOWN_SECS)
    }
}

impl EscalationController {
    /// A zero-length countdown is bumped to one second so the user always
    /// gets at least one chance to cancel.
    pub fn new(countdown_secs: u8) -> Self {
        Self {
            state: EscalationState::Idle,
            countdown_secs: countdown_secs.max(1),
            min_volume: MIN_VOLUME,
            trigger: None,
            last_report: None,
        }
    }

    pub fn with_min_volume(mut self, min_volume: f32) -> Self {
        self.min_volume = min_volume.clamp(0.0, 1.0);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> EscalationState {
        self.state
    }

    pub fn countdown_secs(&self) -> u8 {
        self.countdown_secs
    }

    /// Alarm volume for the current countdown second, if counting down.
    pub fn volume(&self) -> Option<f32> {
        self.state
            .seconds_remaining()
            .map(|n| volume_for(n, self.countdown_secs, self.min_volume))
    }

    /// Report from the most recent dispatch, kept until the next trigger.
    pub fn last_report(&self) -> Option<&DispatchReport> {
        self.last_report.as_ref()
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            state: self.state,
            volume: self.volume(),
            countdown_secs: self.countdown_secs,
            at: Utc::now(),
        }
    }

    /// History record for the cycle that just finished.
    ///
    /// `None` unless the controller is in a terminal state.
    pub fn cycle_record(&self, session_id: uuid::Uuid) -> Option<CycleRecord> {
        let outcome = match self.state {
            EscalationState::Resolved => CycleOutcome::Resolved,
            EscalationState::Cancelled => CycleOutcome::Cancelled,
            _ => return None,
        };
        let trigger = self.trigger?;
        let report = self.last_report.as_ref();
        Some(CycleRecord {
            session_id,
            outcome,
            magnitude: trigger.result.magnitude,
            confidence: trigger.result.confidence,
            triggered_at: trigger.at,
            finished_at: Utc::now(),
            delivered: report.map(DispatchReport::delivered).unwrap_or(0),
            failed: report.map(DispatchReport::failed).unwrap_or(0),
        })
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a new cycle.
    ///
    /// # Errors
    /// [`SessionError::SessionAlreadyActive`] if a cycle is still in flight.
    pub fn trigger(&mut self, result: ClassificationResult) -> Result<Event, SessionError> {
        if self.state.is_active() {
            return Err(SessionError::SessionAlreadyActive { state: self.state });
        }
        self.trigger = Some(Trigger {
            result,
            at: Utc::now(),
        });
        self.last_report = None;
        self.transition(EscalationState::Triggered);
        Ok(Event::AccidentDetected {
            magnitude: result.magnitude,
            confidence: result.confidence,
            at: Utc::now(),
        })
    }

    /// Sensor-path entry point: like [`trigger`], but an accident arriving
    /// during a live cycle is coalesced into it and yields `None`.
    ///
    /// [`trigger`]: EscalationController::trigger
    pub fn on_accident(&mut self, result: &ClassificationResult) -> Option<Event> {
        match self.trigger(*result) {
            Ok(event) => Some(event),
            Err(_) => {
                tracing::debug!(
                    state = %self.state,
                    magnitude = result.magnitude,
                    "accident coalesced into active escalation"
                );
                None
            }
        }
    }

    /// `Triggered -> CountingDown(countdown_secs)`.
    pub fn start_countdown(&mut self) -> Result<Event, SessionError> {
        self.require(EscalationState::Triggered, "start countdown")?;
        self.transition(EscalationState::CountingDown(self.countdown_secs));
        Ok(Event::CountdownStarted {
            seconds: self.countdown_secs,
            volume: self.min_volume,
            at: Utc::now(),
        })
    }

    /// Advance the countdown by one second.
    ///
    /// Reaching zero expires the countdown in the same tick and moves to
    /// `Dispatching`. Outside a countdown this is a no-op.
    pub fn tick(&mut self) -> Option<Event> {
        let EscalationState::CountingDown(n) = self.state else {
            return None;
        };
        let remaining = n.saturating_sub(1);
        if remaining == 0 {
            self.transition(EscalationState::CountingDown(0));
            return Some(self.begin_dispatch(DispatchTrigger::Expired));
        }
        self.transition(EscalationState::CountingDown(remaining));
        Some(Event::CountdownTick {
            seconds_remaining: remaining,
            volume: volume_for(remaining, self.countdown_secs, self.min_volume),
            at: Utc::now(),
        })
    }

    /// Stop the countdown. Nothing will be dispatched for this cycle.
    pub fn cancel(&mut self) -> Result<Event, SessionError> {
        let seconds_remaining = match self.state {
            EscalationState::Triggered => self.countdown_secs,
            EscalationState::CountingDown(n) => n,
            from => {
                return Err(SessionError::InvalidTransition {
                    from,
                    action: "cancel",
                })
            }
        };
        self.transition(EscalationState::Cancelled);
        Ok(Event::Cancelled {
            seconds_remaining,
            at: Utc::now(),
        })
    }

    /// Skip the rest of the countdown and dispatch now.
    pub fn send_now(&mut self) -> Result<Event, SessionError> {
        match self.state {
            EscalationState::Triggered | EscalationState::CountingDown(_) => {
                Ok(self.begin_dispatch(DispatchTrigger::SendNow))
            }
            from => Err(SessionError::InvalidTransition {
                from,
                action: "send now",
            }),
        }
    }

    /// Dismiss acts as cancel during a countdown, and as acknowledgement
    /// (back to `Idle`) once a cycle has finished.
    pub fn dismiss(&mut self) -> Result<Event, SessionError> {
        match self.state {
            EscalationState::Triggered | EscalationState::CountingDown(_) => self.cancel(),
            EscalationState::Resolved | EscalationState::Cancelled => {
                self.transition(EscalationState::Idle);
                Ok(Event::Dismissed { at: Utc::now() })
            }
            from => Err(SessionError::InvalidTransition {
                from,
                action: "dismiss",
            }),
        }
    }

    /// `Dispatching -> Resolved` once every outcome is in.
    pub fn complete_dispatch(&mut self, report: DispatchReport) -> Result<Event, SessionError> {
        self.require(EscalationState::Dispatching, "complete dispatch")?;
        let event = Event::Resolved {
            delivered: report.delivered(),
            failed: report.failed(),
            at: Utc::now(),
        };
        self.last_report = Some(report);
        self.transition(EscalationState::Resolved);
        Ok(event)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn begin_dispatch(&mut self, trigger: DispatchTrigger) -> Event {
        self.transition(EscalationState::Dispatching);
        Event::DispatchStarted {
            trigger,
            at: Utc::now(),
        }
    }

    fn require(&self, expected: EscalationState, action: &'static str) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                from: self.state,
                action,
            })
        }
    }

    fn transition(&mut self, to: EscalationState) {
        tracing::debug!(from = %self.state, %to, "escalation transition");
        self.state = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::Contact;
    use crate::notify::DispatchOutcome;

    fn crash() -> ClassificationResult {
        ClassificationResult {
            is_accident: true,
            confidence: 0.8,
            magnitude: 22.0,
        }
    }

    fn counting(secs: u8) -> EscalationController {
        let mut controller = EscalationController::new(secs);
        controller.trigger(crash()).unwrap();
        controller.start_countdown().unwrap();
        controller
    }

    fn report(succeeded: &[bool]) -> DispatchReport {
        DispatchReport {
            outcomes: succeeded
                .iter()
                .map(|ok| DispatchOutcome {
                    contact: Contact::new("Asha", "8638144632").unwrap(),
                    succeeded: *ok,
                    error: None,
                })
                .collect(),
            no_contacts: succeeded.is_empty(),
        }
    }

    #[test]
    fn trigger_then_countdown() {
        let mut controller = EscalationController::default();
        assert_eq!(controller.state(), EscalationState::Idle);

        let event = controller.trigger(crash()).unwrap();
        assert!(matches!(event, Event::AccidentDetected { .. }));
        assert_eq!(controller.state(), EscalationState::Triggered);

        controller.start_countdown().unwrap();
        assert_eq!(controller.state(), EscalationState::CountingDown(15));
        assert_eq!(controller.volume(), Some(0.1));
    }

    #[test]
    fn full_countdown_expires_into_dispatch() {
        let mut controller = counting(15);
        for expected in (1..15).rev() {
            match controller.tick() {
                Some(Event::CountdownTick {
                    seconds_remaining, ..
                }) => assert_eq!(seconds_remaining, expected),
                other => panic!("expected tick, got {other:?}"),
            }
        }
        assert!(matches!(
            controller.tick(),
            Some(Event::DispatchStarted {
                trigger: DispatchTrigger::Expired,
                ..
            })
        ));
        assert_eq!(controller.state(), EscalationState::Dispatching);
        assert_eq!(controller.tick(), None);
    }

    #[test]
    fn tick_volume_ramps_up() {
        let mut controller = counting(15);
        let mut last = controller.volume().unwrap();
        for _ in 0..14 {
            let Some(Event::CountdownTick { volume, .. }) = controller.tick() else {
                panic!("expected tick");
            };
            assert!(volume > last);
            last = volume;
        }
    }

    #[test]
    fn accident_during_countdown_is_coalesced() {
        let mut controller = counting(15);
        controller.tick();
        controller.tick();
        assert_eq!(controller.on_accident(&crash()), None);
        assert_eq!(controller.state(), EscalationState::CountingDown(13));
        assert!(matches!(
            controller.trigger(crash()),
            Err(SessionError::SessionAlreadyActive {
                state: EscalationState::CountingDown(13)
            })
        ));
    }

    #[test]
    fn accident_during_dispatch_is_coalesced() {
        let mut controller = counting(15);
        controller.send_now().unwrap();
        assert_eq!(controller.on_accident(&crash()), None);
        assert_eq!(controller.state(), EscalationState::Dispatching);
    }

    #[test]
    fn cancel_stops_countdown() {
        let mut controller = counting(15);
        controller.tick();
        let event = controller.cancel().unwrap();
        assert!(matches!(
            event,
            Event::Cancelled {
                seconds_remaining: 14,
                ..
            }
        ));
        assert_eq!(controller.state(), EscalationState::Cancelled);
        assert_eq!(controller.tick(), None);
        assert_eq!(controller.state(), EscalationState::Cancelled);
    }

    #[test]
    fn cancel_on_last_second_prevents_dispatch() {
        let mut controller = counting(3);
        controller.tick();
        controller.tick();
        assert_eq!(controller.state(), EscalationState::CountingDown(1));
        controller.cancel().unwrap();
        assert_eq!(controller.tick(), None);
        assert_eq!(controller.state(), EscalationState::Cancelled);
    }

    #[test]
    fn send_now_skips_countdown() {
        let mut controller = counting(15);
        controller.tick();
        assert!(matches!(
            controller.send_now().unwrap(),
            Event::DispatchStarted {
                trigger: DispatchTrigger::SendNow,
                ..
            }
        ));
        assert_eq!(controller.state(), EscalationState::Dispatching);
    }

    #[test]
    fn intents_are_rejected_outside_their_states() {
        let mut controller = EscalationController::default();
        assert!(controller.cancel().is_err());
        assert!(controller.send_now().is_err());
        assert!(controller.dismiss().is_err());
        assert!(controller.start_countdown().is_err());
        assert!(controller.complete_dispatch(report(&[])).is_err());

        let mut controller = counting(15);
        controller.send_now().unwrap();
        assert!(matches!(
            controller.cancel(),
            Err(SessionError::InvalidTransition {
                from: EscalationState::Dispatching,
                ..
            })
        ));
    }

    #[test]
    fn dispatch_resolves_and_records_cycle() {
        let mut controller = counting(15);
        controller.send_now().unwrap();
        let event = controller.complete_dispatch(report(&[true, false, true])).unwrap();
        assert!(matches!(
            event,
            Event::Resolved {
                delivered: 2,
                failed: 1,
                ..
            }
        ));
        assert_eq!(controller.state(), EscalationState::Resolved);

        let record = controller.cycle_record(uuid::Uuid::nil()).unwrap();
        assert_eq!(record.outcome, CycleOutcome::Resolved);
        assert_eq!((record.delivered, record.failed), (2, 1));
        assert_eq!(record.magnitude, 22.0);
    }

    #[test]
    fn terminal_states_allow_a_new_cycle() {
        let mut controller = counting(15);
        controller.cancel().unwrap();
        assert!(controller.cycle_record(uuid::Uuid::nil()).is_some());
        assert!(controller.on_accident(&crash()).is_some());
        assert_eq!(controller.state(), EscalationState::Triggered);
        assert!(controller.cycle_record(uuid::Uuid::nil()).is_none());
    }

    #[test]
    fn dismiss_cancels_or_acknowledges() {
        let mut controller = counting(15);
        assert!(matches!(controller.dismiss().unwrap(), Event::Cancelled { .. }));
        assert!(matches!(controller.dismiss().unwrap(), Event::Dismissed { .. }));
        assert_eq!(controller.state(), EscalationState::Idle);
    }

    #[test]
    fn zero_countdown_still_gives_one_second() {
        let mut controller = counting(0);
        assert_eq!(controller.state(), EscalationState::CountingDown(1));
        assert!(matches!(controller.tick(), Some(Event::DispatchStarted { .. })));
    }

    #[test]
    fn snapshot_reflects_state() {
        let controller = counting(10);
        match controller.snapshot() {
            Event::StateSnapshot {
                state,
                volume,
                countdown_secs,
                ..
            } => {
                assert_eq!(state, EscalationState::CountingDown(10));
                assert_eq!(volume, Some(0.1));
                assert_eq!(countdown_secs, 10);
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }
}
