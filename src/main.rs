use anyhow::{Context, Result};
use clap::Parser;
use netsentry::cli::{Cli, Mode};
use netsentry::config::DetectorConfig;
use netsentry::ensemble::EnsembleCombiner;
use netsentry::model_persistence::{self, ModelMetadata, PersistenceOptions};
use netsentry::pipeline::{FittedPipeline, Pipeline, ScoreArtifacts};
use netsentry::table::RawTable;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; `--debug` forces TRACE, otherwise RUST_LOG or INFO
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Cli) -> Result<DetectorConfig> {
    let mut config = match &args.config {
        Some(path) => DetectorConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => DetectorConfig::default(),
    };
    args.apply_overrides(&mut config);
    Ok(config)
}

fn write_scores(output: &Path, artifacts: &ScoreArtifacts) -> Result<()> {
    let path = output.join("scores.json");
    fs::write(&path, serde_json::to_string_pretty(artifacts)?)
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), "score arrays written");
    Ok(())
}

fn save_model(args: &Cli, fitted: &FittedPipeline, config: &DetectorConfig, samples: usize) -> Result<()> {
    let metadata = ModelMetadata::from_config(config, samples)
        .with_hyperparameter("data", args.data.display().to_string());
    model_persistence::save_pipeline(
        &args.model,
        fitted,
        metadata,
        PersistenceOptions::new().with_name("netsentry"),
    )
    .with_context(|| format!("saving model {}", args.model.display()))
}

fn run_full(args: &Cli, config: DetectorConfig, table: &RawTable) -> Result<()> {
    let run = Pipeline::new(config.clone())?.run(table)?;

    let report_path = args.output.join("detection_report.json");
    run.report
        .write_json(&report_path)
        .with_context(|| format!("writing {}", report_path.display()))?;
    if args.scores {
        write_scores(&args.output, &run.artifacts)?;
    }

    let train_samples = run.report.metadata.train_samples.unwrap_or(0);
    save_model(args, &run.fitted, &config, train_samples)?;

    println!("{}", run.report.format());
    Ok(())
}

fn run_train(args: &Cli, config: DetectorConfig, table: &RawTable) -> Result<()> {
    let trained = Pipeline::new(config.clone())?.train(table)?;
    save_model(args, &trained.fitted, &config, trained.train_samples)?;

    println!(
        "Trained on {} samples, threshold {:.6}; model saved to {}",
        trained.train_samples,
        trained.fitted.threshold(),
        args.model.display()
    );
    Ok(())
}

fn run_detect(args: &Cli, config: DetectorConfig, table: &RawTable) -> Result<()> {
    let saved = model_persistence::load_pipeline(&args.model)
        .with_context(|| format!("loading model {}", args.model.display()))?;
    println!("{}", model_persistence::model_status_line(&saved.metadata));

    let mut fitted = saved.pipeline;
    if args.ensemble_method.is_some() {
        fitted = fitted.with_combiner(EnsembleCombiner::new(
            config.detection.ensemble_method,
            config.detection.confidence_margin,
        ));
    }

    let detection = fitted.detect(table)?;
    let results_path = args.output.join("detection_results.json");
    detection
        .report
        .write_json(&results_path)
        .with_context(|| format!("writing {}", results_path.display()))?;
    if args.scores {
        write_scores(&args.output, &detection.artifacts)?;
    }

    println!("{}", detection.report.format());
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);

    let config = load_config(&args)?;
    config.validate()?;

    let table = RawTable::load(&args.data)
        .with_context(|| format!("reading {}", args.data.display()))?;
    fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    match args.mode {
        Mode::Full => run_full(&args, config, &table),
        Mode::Train => run_train(&args, config, &table),
        Mode::Detect => run_detect(&args, config, &table),
    }
}
