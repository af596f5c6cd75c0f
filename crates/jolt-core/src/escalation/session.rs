//! Monitoring session: the single owner of all escalation state.
//!
//! One task holds the controller, the classifier, the alarm and the notifier.
//! Everything reaches it through channels and is handled strictly one at a
//! time, in priority order:
//!
//! 1. user intents and shutdown
//! 2. countdown ticks
//! 3. sensor samples
//!
//! Intents outrank ticks, so a cancel that lands at the same instant as the
//! final tick wins and nothing is dispatched. Ticks outrank samples so a
//! busy sensor cannot stall the countdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use uuid::Uuid;

use super::alarm::{Alarm, AlarmDevice, SilentAlarm, MIN_VOLUME};
use super::controller::{EscalationController, DEFAULT_COUNTDOWN_SECS};
use super::EscalationState;
use crate::contacts::ContactRegistry;
use crate::detection::{AccidentClassifier, ClassifierStatus, SensorSample};
use crate::error::{CoreError, SessionError};
use crate::events::Event;
use crate::notify::{Notifier, DEFAULT_MESSAGE};
use crate::storage::EscalationConfig;

const SAMPLE_QUEUE: usize = 256;
const CONTROL_QUEUE: usize = 16;
const EVENT_BUFFER: usize = 256;

/// What the user can ask for while an escalation is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserIntent {
    Cancel,
    SendNow,
    Dismiss,
}

impl std::str::FromStr for UserIntent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cancel" => Ok(UserIntent::Cancel),
            "send" | "send_now" | "send-now" => Ok(UserIntent::SendNow),
            "dismiss" => Ok(UserIntent::Dismiss),
            other => Err(format!("unknown intent: {other}")),
        }
    }
}

enum Control {
    Intent(UserIntent),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Write end of the sample queue, handed to a [`SensorSource`].
#[derive(Clone)]
pub struct SampleSink {
    tx: mpsc::Sender<SensorSample>,
}

impl SampleSink {
    /// Queue a sample, waiting if the session is behind.
    ///
    /// # Errors
    /// [`SessionError::Closed`] once the session has stopped.
    pub async fn send(&self, sample: SensorSample) -> Result<(), SessionError> {
        self.tx.send(sample).await.map_err(|_| SessionError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A live accelerometer feed.
///
/// The session registers interest when it starts and unregisters when it
/// stops; the source pushes samples into the sink in between.
pub trait SensorSource: Send {
    fn register(&mut self, sink: SampleSink) -> Result<(), CoreError>;
    fn unregister(&mut self);
}

/// Counters returned when a session shuts down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub samples_seen: u64,
    pub cycles_triggered: u32,
    pub cycles_resolved: u32,
    pub cycles_cancelled: u32,
    pub final_state: EscalationState,
}

pub struct SessionBuilder {
    classifier: Box<dyn AccidentClassifier>,
    notifier: Notifier,
    contacts: Arc<RwLock<ContactRegistry>>,
    alarm: Box<dyn AlarmDevice>,
    message: String,
    countdown_secs: u8,
    min_volume: f32,
    tick_interval: Duration,
    source: Option<Box<dyn SensorSource>>,
    events: broadcast::Sender<Event>,
}

impl SessionBuilder {
    pub fn new(classifier: Box<dyn AccidentClassifier>, notifier: Notifier) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            classifier,
            notifier,
            contacts: Arc::new(RwLock::new(ContactRegistry::new())),
            alarm: Box::new(SilentAlarm),
            message: DEFAULT_MESSAGE.to_string(),
            countdown_secs: DEFAULT_COUNTDOWN_SECS,
            min_volume: MIN_VOLUME,
            tick_interval: Duration::from_secs(1),
            source: None,
            events,
        }
    }

    /// Contacts are read at dispatch time, so edits made while monitoring
    /// are honored.
    pub fn contacts(mut self, contacts: Arc<RwLock<ContactRegistry>>) -> Self {
        self.contacts = contacts;
        self
    }

    pub fn alarm(mut self, alarm: Box<dyn AlarmDevice>) -> Self {
        self.alarm = alarm;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn countdown_secs(mut self, secs: u8) -> Self {
        self.countdown_secs = secs;
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn escalation_config(mut self, config: &EscalationConfig) -> Self {
        self.countdown_secs = config.countdown_secs;
        self.min_volume = config.min_volume;
        self.tick_interval = Duration::from_millis(config.tick_interval_ms.max(1));
        self
    }

    pub fn source(mut self, source: Box<dyn SensorSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Subscribe before spawning to see `MonitoringStarted`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Start the session task on the current tokio runtime.
    ///
    /// # Errors
    /// Returns an error if the sensor source refuses registration; the task
    /// is not started in that case.
    pub fn spawn(mut self) -> Result<EscalationSession, CoreError> {
        let id = Uuid::new_v4();
        let (sample_tx, sample_rx) = mpsc::channel(SAMPLE_QUEUE);
        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE);
        let (state_tx, state_rx) = watch::channel(EscalationState::Idle);

        let sink = SampleSink { tx: sample_tx };
        if let Some(source) = self.source.as_mut() {
            source.register(sink.clone())?;
        }

        let task = SessionTask {
            id,
            controller: EscalationController::new(self.countdown_secs)
                .with_min_volume(self.min_volume),
            classifier: self.classifier,
            notifier: self.notifier,
            contacts: self.contacts,
            alarm: Alarm::new(self.alarm),
            message: self.message,
            tick_interval: self.tick_interval,
            countdown: None,
            events: self.events.clone(),
            state_tx,
            summary: SessionSummary {
                session_id: id,
                samples_seen: 0,
                cycles_triggered: 0,
                cycles_resolved: 0,
                cycles_cancelled: 0,
                final_state: EscalationState::Idle,
            },
        };
        tracing::info!(session_id = %id, classifier = task.classifier.name(), "monitoring session started");
        let handle = tokio::spawn(task.run(control_rx, sample_rx));

        Ok(EscalationSession {
            id,
            sink,
            control: control_tx,
            events: self.events,
            state: state_rx,
            source: self.source,
            task: Some(handle),
        })
    }
}

/// Handle to a running monitoring session.
///
/// Dropping the handle stops the session and unregisters the sensor source;
/// [`shutdown`](EscalationSession::shutdown) does the same and waits for the
/// summary.
pub struct EscalationSession {
    id: Uuid,
    sink: SampleSink,
    control: mpsc::Sender<Control>,
    events: broadcast::Sender<Event>,
    state: watch::Receiver<EscalationState>,
    source: Option<Box<dyn SensorSource>>,
    task: Option<JoinHandle<SessionSummary>>,
}

impl EscalationSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sample_sink(&self) -> SampleSink {
        self.sink.clone()
    }

    pub async fn push_sample(&self, sample: SensorSample) -> Result<(), SessionError> {
        self.sink.send(sample).await
    }

    pub async fn intent(&self, intent: UserIntent) -> Result<(), SessionError> {
        self.control
            .send(Control::Intent(intent))
            .await
            .map_err(|_| SessionError::Closed)
    }

    pub async fn cancel(&self) -> Result<(), SessionError> {
        self.intent(UserIntent::Cancel).await
    }

    pub async fn send_now(&self) -> Result<(), SessionError> {
        self.intent(UserIntent::SendNow).await
    }

    pub async fn dismiss(&self) -> Result<(), SessionError> {
        self.intent(UserIntent::Dismiss).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Wait until every sample queued before this call has been classified.
    pub async fn flush(&self) -> Result<(), SessionError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.control
            .send(Control::Flush(done_tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        done_rx.await.map_err(|_| SessionError::Closed)
    }

    pub fn state(&self) -> EscalationState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<EscalationState> {
        self.state.clone()
    }

    /// Stop monitoring and wait for the task to finish.
    ///
    /// Samples already queued are classified first. An escalation still in
    /// flight is then abandoned: the alarm stops and nothing further is
    /// dispatched.
    pub async fn shutdown(mut self) -> Result<SessionSummary, SessionError> {
        if let Some(mut source) = self.source.take() {
            source.unregister();
        }
        // The task may already be gone; joining below reports that.
        let _ = self.control.send(Control::Shutdown).await;
        let task = self.task.take().ok_or(SessionError::Closed)?;
        task.await.map_err(|_| SessionError::Closed)
    }
}

impl Drop for EscalationSession {
    fn drop(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.unregister();
        }
        // The control sender drops with us, which ends the task loop.
    }
}

enum Wake {
    Control(Option<Control>),
    Tick,
    Sample(Option<SensorSample>),
}

struct SessionTask {
    id: Uuid,
    controller: EscalationController,
    classifier: Box<dyn AccidentClassifier>,
    notifier: Notifier,
    contacts: Arc<RwLock<ContactRegistry>>,
    alarm: Alarm,
    message: String,
    tick_interval: Duration,
    /// Present only while counting down; there is never more than one.
    countdown: Option<Interval>,
    events: broadcast::Sender<Event>,
    state_tx: watch::Sender<EscalationState>,
    summary: SessionSummary,
}

impl SessionTask {
    async fn run(
        mut self,
        mut control: mpsc::Receiver<Control>,
        mut samples: mpsc::Receiver<SensorSample>,
    ) -> SessionSummary {
        self.publish(Event::MonitoringStarted {
            session_id: self.id,
            classifier: self.classifier.name().to_string(),
            at: Utc::now(),
        });
        if let ClassifierStatus::Unavailable { reason } = self.classifier.status() {
            tracing::warn!(%reason, "classifier unavailable, accidents cannot be detected");
            self.publish(Event::ClassifierUnavailable {
                reason,
                at: Utc::now(),
            });
        }

        let mut samples_open = true;
        loop {
            let wake = tokio::select! {
                biased;
                msg = control.recv() => Wake::Control(msg),
                _ = next_tick(&mut self.countdown) => Wake::Tick,
                sample = samples.recv(), if samples_open => Wake::Sample(sample),
            };

            match wake {
                Wake::Control(None) => break,
                Wake::Control(Some(Control::Shutdown)) => {
                    // Samples accepted before shutdown still count; any cycle
                    // they start is abandoned by teardown.
                    self.drain(&mut samples).await;
                    break;
                }
                Wake::Control(Some(Control::Intent(intent))) => self.on_intent(intent).await,
                Wake::Control(Some(Control::Flush(done))) => {
                    self.drain(&mut samples).await;
                    let _ = done.send(());
                }
                Wake::Tick => self.on_tick().await,
                Wake::Sample(Some(sample)) => self.on_sample(sample).await,
                Wake::Sample(None) => {
                    tracing::info!(session_id = %self.id, "sensor stream ended");
                    samples_open = false;
                }
            }
        }

        self.teardown()
    }

    async fn drain(&mut self, samples: &mut mpsc::Receiver<SensorSample>) {
        while let Ok(sample) = samples.try_recv() {
            self.on_sample(sample).await;
        }
    }

    async fn on_sample(&mut self, sample: SensorSample) {
        self.summary.samples_seen += 1;
        let result = self.classifier.classify(&sample);
        if !result.is_accident {
            return;
        }
        let Some(detected) = self.controller.on_accident(&result) else {
            return;
        };
        tracing::info!(
            magnitude = result.magnitude,
            confidence = result.confidence,
            "accident detected"
        );
        self.summary.cycles_triggered += 1;
        self.publish(detected);

        match self.controller.start_countdown() {
            Ok(started) => {
                self.alarm.sound(self.controller.volume().unwrap_or(MIN_VOLUME));
                let first = Instant::now() + self.tick_interval;
                let mut interval = time::interval_at(first, self.tick_interval);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.countdown = Some(interval);
                self.publish(started);
            }
            Err(e) => tracing::error!(error = %e, "countdown failed to start"),
        }
    }

    async fn on_tick(&mut self) {
        match self.controller.tick() {
            Some(event @ Event::CountdownTick { volume, .. }) => {
                self.alarm.sound(volume);
                self.publish(event);
            }
            Some(event @ Event::DispatchStarted { .. }) => {
                self.publish(event);
                self.dispatch().await;
            }
            Some(other) => self.publish(other),
            None => self.countdown = None,
        }
    }

    async fn on_intent(&mut self, intent: UserIntent) {
        let result = match intent {
            UserIntent::Cancel => self.controller.cancel(),
            UserIntent::Dismiss => self.controller.dismiss(),
            UserIntent::SendNow => self.controller.send_now(),
        };
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(?intent, error = %e, "intent ignored");
                return;
            }
        };

        match event {
            Event::DispatchStarted { .. } => {
                self.publish(event);
                self.dispatch().await;
            }
            Event::Cancelled { seconds_remaining, .. } => {
                tracing::info!(seconds_remaining, "escalation cancelled by user");
                self.publish(event);
                self.finish_cycle();
            }
            other => self.publish(other),
        }
    }

    async fn dispatch(&mut self) {
        self.countdown = None;
        self.alarm.sound(1.0);

        let contacts = self.contacts.read().await.list().to_vec();
        let report = self.notifier.dispatch(&contacts, &self.message).await;

        if report.no_contacts {
            self.publish(Event::NoContactsConfigured { at: Utc::now() });
        }
        self.publish(Event::DispatchCompleted {
            outcomes: report.outcomes.clone(),
            at: Utc::now(),
        });
        match self.controller.complete_dispatch(report) {
            Ok(resolved) => self.publish(resolved),
            Err(e) => tracing::error!(error = %e, "dispatch finished outside of dispatching state"),
        }
        self.finish_cycle();
    }

    /// Release cycle resources and emit the history record.
    fn finish_cycle(&mut self) {
        self.countdown = None;
        self.alarm.silence();
        if let Some(record) = self.controller.cycle_record(self.id) {
            match record.outcome {
                super::CycleOutcome::Resolved => self.summary.cycles_resolved += 1,
                super::CycleOutcome::Cancelled => self.summary.cycles_cancelled += 1,
            }
            self.publish(Event::CycleFinished { record });
        }
    }

    fn teardown(mut self) -> SessionSummary {
        let state = self.controller.state();
        if state.is_active() {
            tracing::warn!(%state, "session stopped with an escalation in flight");
        }
        self.countdown = None;
        self.alarm.silence();
        self.publish(Event::MonitoringStopped {
            session_id: self.id,
            at: Utc::now(),
        });
        tracing::info!(session_id = %self.id, samples = self.summary.samples_seen, "monitoring session stopped");
        self.summary.final_state = state;
        self.summary.clone()
    }

    fn publish(&mut self, event: Event) {
        self.state_tx.send_replace(self.controller.state());
        tracing::trace!(kind = event.kind(), "session event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

async fn next_tick(countdown: &mut Option<Interval>) {
    match countdown {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
