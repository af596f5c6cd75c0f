//! Test doubles shared by the integration tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jolt_core::{DispatchErrorKind, Event, Transport};
use tokio::sync::broadcast;

/// One call made against the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Send { number: String, text: String },
    Dial { number: String },
}

/// Transport that records every call and fails for chosen numbers.
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    failing: HashSet<String>,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_for(numbers: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            failing: numbers.iter().map(|n| n.to_string()).collect(),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call, number: &str) -> Result<(), DispatchErrorKind> {
        self.calls.lock().unwrap().push(call);
        if self.failing.contains(number) {
            Err(DispatchErrorKind::TransportUnavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, number: &str, text: &str) -> Result<(), DispatchErrorKind> {
        self.record(
            Call::Send {
                number: number.to_string(),
                text: text.to_string(),
            },
            number,
        )
    }

    async fn dial(&self, number: &str) -> Result<(), DispatchErrorKind> {
        self.record(
            Call::Dial {
                number: number.to_string(),
            },
            number,
        )
    }
}

/// Wait for the first event matching `pred`, skipping the rest.
#[allow(dead_code)]
pub async fn wait_for(rx: &mut broadcast::Receiver<Event>, pred: impl Fn(&Event) -> bool) -> Event {
    tokio::time::timeout(Duration::from_secs(120), async {
        loop {
            let event = rx.recv().await.expect("event stream closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
