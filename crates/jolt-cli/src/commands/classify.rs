use clap::Args;
use jolt_core::detection::FnScorer;
use jolt_core::{classifier_from_config, AccidentClassifier, Config, MotionClassifier, SensorSample};
use serde::Serialize;

#[derive(Args)]
pub struct ClassifyArgs {
    /// Acceleration along x (m/s²)
    #[arg(long, allow_hyphen_values = true)]
    x: f32,
    /// Acceleration along y (m/s²)
    #[arg(long, allow_hyphen_values = true)]
    y: f32,
    /// Acceleration along z (m/s²); ignored by the conjunctive gate
    #[arg(long, default_value_t = 9.8, allow_hyphen_values = true)]
    z: f32,
    /// Use this model score instead of the configured model
    #[arg(long)]
    score: Option<f32>,
}

#[derive(Serialize)]
struct Output {
    classifier: String,
    ready: bool,
    is_accident: bool,
    confidence: f32,
    magnitude: f32,
}

pub fn run(args: ClassifyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let mut classifier: Box<dyn AccidentClassifier> = match args.score {
        Some(score) => Box::new(
            MotionClassifier::new(Box::new(FnScorer(move |_, _| score))).with_thresholds(
                config.detection.score_threshold,
                config.detection.magnitude_threshold,
            ),
        ),
        None => classifier_from_config(&config.detection),
    };

    let result = classifier.classify(&SensorSample::new(args.x, args.y, args.z, 0));
    let output = Output {
        classifier: classifier.name().to_string(),
        ready: classifier.status().is_ready(),
        is_accident: result.is_accident,
        confidence: result.confidence,
        magnitude: result.magnitude,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
