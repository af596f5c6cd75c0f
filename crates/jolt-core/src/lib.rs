//! # Jolt Core Library
//!
//! Core logic for Jolt, an accident detector that escalates to emergency
//! contacts. Everything here runs headless; the CLI binary and any mobile
//! shell are thin layers over the same engine.
//!
//! ## Architecture
//!
//! - **Detection**: classifies accelerometer samples, either with a scored
//!   model gated by planar magnitude or with a debounced shake heuristic
//! - **Escalation**: a state machine driven through a single-owner session
//!   task that merges samples, user intents and countdown ticks
//! - **Contacts**: validated emergency contacts persisted through a
//!   key-value store
//! - **Notify**: fans one emergency message out to every contact over a
//!   pluggable transport
//! - **Storage**: SQLite key-value store and history, TOML configuration
//!
//! ## Key Components
//!
//! - [`EscalationController`]: countdown state machine
//! - [`EscalationSession`]: the running monitor
//! - [`ContactRegistry`]: emergency contacts
//! - [`Notifier`]: message/dial fan-out
//! - [`Database`]: persistence
//! - [`Config`]: application configuration

pub mod contacts;
pub mod detection;
pub mod error;
pub mod escalation;
pub mod events;
pub mod notify;
pub mod storage;

pub use contacts::{Contact, ContactRegistry, KeyValueStore, MemoryStore};
pub use detection::{
    classifier_from_config, AccidentClassifier, ClassificationResult, ClassifierStatus,
    DetectionStrategy, MotionClassifier, SensorSample, ShakeDetector,
};
pub use error::{
    ConfigError, ContactError, CoreError, DatabaseError, DispatchErrorKind, InvalidContact,
    SessionError,
};
pub use escalation::{
    AlarmDevice, CycleOutcome, CycleRecord, EscalationController, EscalationSession,
    EscalationState, SensorSource, SessionBuilder, SessionSummary, UserIntent,
};
pub use events::Event;
pub use notify::{DispatchOutcome, DispatchReport, Notifier, NotifyMode, Transport};
pub use storage::{Config, Database};
