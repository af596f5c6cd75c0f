use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use jolt_core::detection::FnScorer;
use jolt_core::{
    classifier_from_config, AccidentClassifier, Config, ContactRegistry, Database, Event,
    MotionClassifier, Notifier, SessionBuilder, UserIntent,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{mpsc, RwLock};

use crate::adapters::{LogAlarm, LogTransport, ReplaySource};

#[derive(Args)]
pub struct MonitorArgs {
    /// Recorded samples, one JSON object per line
    #[arg(long)]
    replay: PathBuf,
    /// Pace the replay by the recorded timestamps
    #[arg(long)]
    realtime: bool,
    /// Use this model score instead of the configured model
    #[arg(long)]
    score: Option<f32>,
    /// Do not read intents (cancel, send, dismiss) from stdin
    #[arg(long)]
    no_input: bool,
}

pub fn run(args: MonitorArgs) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(monitor(args));
    // A pending stdin read would otherwise hold up runtime drop.
    runtime.shutdown_background();
    result
}

async fn monitor(args: MonitorArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    let registry = ContactRegistry::load(&db)?;
    if registry.is_empty() {
        tracing::warn!("no emergency contacts set");
    }

    let classifier: Box<dyn AccidentClassifier> = match args.score {
        Some(score) => Box::new(
            MotionClassifier::new(Box::new(FnScorer(move |_, _| score))).with_thresholds(
                config.detection.score_threshold,
                config.detection.magnitude_threshold,
            ),
        ),
        None => classifier_from_config(&config.detection),
    };
    let (source, mut replay_done) = ReplaySource::open(&args.replay, args.realtime)?;

    let builder = SessionBuilder::new(
        classifier,
        Notifier::new(Arc::new(LogTransport)).with_mode(config.notify.mode),
    )
    .escalation_config(&config.escalation)
    .message(config.notify.message.clone())
    .contacts(Arc::new(RwLock::new(registry)))
    .alarm(Box::new(LogAlarm))
    .source(Box::new(source));
    let mut events = builder.subscribe();
    let session = builder.spawn()?;
    let mut state = session.watch_state();

    let (intent_tx, mut intents) = mpsc::channel(8);
    if !args.no_input {
        tokio::spawn(read_intents(intent_tx));
    }

    let mut replay_finished = false;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => handle_event(&db, &event)?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event output fell behind");
                }
                Err(RecvError::Closed) => break,
            },
            Some(intent) = intents.recv() => session.intent(intent).await?,
            sent = &mut replay_done, if !replay_finished => {
                replay_finished = true;
                tracing::info!(samples = sent.unwrap_or(0), "replay finished");
                session.flush().await?;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        if replay_finished && !session.state().is_active() {
            break;
        }
    }

    let summary = session.shutdown().await?;
    loop {
        match events.try_recv() {
            Ok(event) => handle_event(&db, &event)?,
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event output fell behind");
            }
            Err(_) => break,
        }
    }
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn handle_event(db: &Database, event: &Event) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string(event)?);
    if let Event::CycleFinished { record } = event {
        db.record_cycle(record)?;
    }
    Ok(())
}

async fn read_intents(tx: mpsc::Sender<UserIntent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<UserIntent>() {
            Ok(intent) => {
                if tx.send(intent).await.is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!(error = %e, "ignoring input"),
        }
    }
}
