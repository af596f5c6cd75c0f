//! Stand-ins for the platform pieces a phone would provide: a transport
//! that logs instead of texting, an alarm that logs instead of ringing, and
//! a sensor source that replays a recorded JSON Lines file.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use jolt_core::escalation::SampleSink;
use jolt_core::{AlarmDevice, CoreError, DispatchErrorKind, SensorSample, SensorSource, Transport};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn send(&self, number: &str, text: &str) -> Result<(), DispatchErrorKind> {
        tracing::info!(number, text, "sms");
        Ok(())
    }

    async fn dial(&self, number: &str) -> Result<(), DispatchErrorKind> {
        tracing::info!(number, "call");
        Ok(())
    }
}

pub struct LogAlarm;

impl AlarmDevice for LogAlarm {
    fn play(&mut self, volume: f32) {
        tracing::info!(volume, "alarm playing");
    }

    fn set_volume(&mut self, volume: f32) {
        tracing::debug!(volume, "alarm volume");
    }

    fn stop(&mut self) {
        tracing::info!("alarm stopped");
    }
}

/// Replays samples from a JSON Lines file, one [`SensorSample`] per line.
pub struct ReplaySource {
    samples: Vec<SensorSample>,
    realtime: bool,
    finished: Option<oneshot::Sender<usize>>,
    task: Option<JoinHandle<()>>,
}

impl ReplaySource {
    /// Read and parse the whole file up front. The receiver resolves with the
    /// number of samples delivered once the replay ends.
    pub fn open(
        path: &Path,
        realtime: bool,
    ) -> Result<(Self, oneshot::Receiver<usize>), Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        let (tx, rx) = oneshot::channel();
        let source = Self {
            samples: parse_samples(&content),
            realtime,
            finished: Some(tx),
            task: None,
        };
        Ok((source, rx))
    }
}

/// Blank lines and `#` comments are ignored; malformed lines are skipped.
fn parse_samples(content: &str) -> Vec<SensorSample> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .filter_map(|(i, line)| match serde_json::from_str::<SensorSample>(line) {
            Ok(sample) => Some(sample),
            Err(e) => {
                tracing::warn!(line = i + 1, error = %e, "skipping malformed sample");
                None
            }
        })
        .collect()
}

impl SensorSource for ReplaySource {
    fn register(&mut self, sink: SampleSink) -> Result<(), CoreError> {
        let samples = std::mem::take(&mut self.samples);
        let finished = self.finished.take();
        let realtime = self.realtime;
        tracing::info!(samples = samples.len(), realtime, "replay started");

        self.task = Some(tokio::spawn(async move {
            let mut sent = 0;
            let mut previous: Option<u64> = None;
            for sample in samples {
                if realtime {
                    if let Some(prev) = previous {
                        let gap = sample.timestamp_ms.saturating_sub(prev);
                        tokio::time::sleep(Duration::from_millis(gap)).await;
                    }
                    previous = Some(sample.timestamp_ms);
                }
                if sink.send(sample).await.is_err() {
                    break;
                }
                sent += 1;
            }
            if let Some(finished) = finished {
                let _ = finished.send(sent);
            }
        }));
        Ok(())
    }

    fn unregister(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
