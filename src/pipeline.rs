//! End-to-end detection pipeline
//!
//! Pipeline: raw table → normalize → split → encode → scale →
//! {isolation forest, autoencoder + threshold} → ensemble → metrics → report
//!
//! Everything fit on the training split lives in [`FittedPipeline`], which is
//! never mutated after training. Scoring takes it by shared reference, so
//! repeated or concurrent inference sees one consistent feature space.

use crate::autoencoder::{Autoencoder, TrainingHistory};
use crate::config::DetectorConfig;
use crate::encoder::CategoricalEncoder;
use crate::ensemble::{DetectorSignals, EnsembleCombiner};
use crate::error::Result;
use crate::isolation_forest::IsolationForest;
use crate::metrics::{ModelTriple, PerformanceMetrics, ScoreSummaries, ScoreSummary, Timings};
use crate::report::{Metadata, Report, Summary};
use crate::scaler::ScalerStats;
use crate::schema::{self, NormalizedTable, Record};
use crate::split::split_indices;
use crate::table::RawTable;
use crate::threshold::{classify, ThresholdCalibrator};
use crate::warnings::Warnings;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Per-record score arrays for plotting and offline analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreArtifacts {
    /// Isolation decision scores, negative = anomalous
    pub isolation_scores: Vec<f64>,
    /// -1 = anomaly, +1 = normal
    pub isolation_polarity: Vec<i8>,
    pub reconstruction_errors: Vec<f64>,
    pub threshold: f64,
    pub ensemble: Vec<bool>,
}

impl ScoreArtifacts {
    pub fn len(&self) -> usize {
        self.ensemble.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ensemble.is_empty()
    }
}

/// Output of scoring a table with a [`FittedPipeline`]
#[derive(Debug, Clone)]
pub struct Detection {
    pub report: Report,
    pub artifacts: ScoreArtifacts,
}

/// Matrix row for one record: numeric features then category codes
fn feature_row(record: &Record, encoder: &CategoricalEncoder, warnings: &mut Warnings) -> Vec<f64> {
    let mut row = Vec::with_capacity(schema::NUMERIC_FEATURES.len() + schema::CATEGORICAL_FEATURES.len());
    row.extend_from_slice(&record.numeric());
    row.extend_from_slice(&encoder.encode_record(record, warnings));
    row
}

/// Everything learned from the training split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    feature_names: Vec<String>,
    encoder: CategoricalEncoder,
    scaler: ScalerStats,
    forest: IsolationForest,
    autoencoder: Autoencoder,
    threshold: f64,
    combiner: EnsembleCombiner,
}

impl FittedPipeline {
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn encoder(&self) -> &CategoricalEncoder {
        &self.encoder
    }

    pub fn scaler(&self) -> &ScalerStats {
        &self.scaler
    }

    pub fn forest(&self) -> &IsolationForest {
        &self.forest
    }

    pub fn autoencoder(&self) -> &Autoencoder {
        &self.autoencoder
    }

    /// Reconstruction-error cutoff
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn combiner(&self) -> &EnsembleCombiner {
        &self.combiner
    }

    /// Same models, different ensemble policy
    pub fn with_combiner(mut self, combiner: EnsembleCombiner) -> Self {
        self.combiner = combiner;
        self
    }

    /// Encode and scale records with the fitted vocabularies and statistics
    pub fn transform(&self, records: &[&Record], warnings: &mut Warnings) -> Result<Vec<Vec<f64>>> {
        records
            .iter()
            .map(|r| self.scaler.transform_row(&feature_row(r, &self.encoder, warnings)))
            .collect()
    }

    /// Score a new table without refitting anything
    pub fn detect(&self, table: &RawTable) -> Result<Detection> {
        let mut warnings = Warnings::new();
        let normalized = schema::normalize(table, &mut warnings)?;
        let records: Vec<&Record> = normalized.records.iter().collect();
        let labels = normalized.labels();

        let mut detection = self.evaluate(&records, labels, &mut warnings)?;
        detection.report.metadata.filled_columns = normalized.filled_columns;
        detection.report.metadata.warnings = warnings.into_vec();
        Ok(detection)
    }

    /// Score `records` and build a report; supervised metrics when `labels` is set
    fn evaluate(
        &self,
        records: &[&Record],
        labels: Option<Vec<bool>>,
        warnings: &mut Warnings,
    ) -> Result<Detection> {
        let matrix = self.transform(records, warnings)?;

        let start = Instant::now();
        let isolation = self.forest.predict(&matrix)?;
        let isolation_time = start.elapsed();

        let start = Instant::now();
        let errors = self.autoencoder.reconstruction_errors(&matrix)?;
        let reconstruction = classify(&errors, self.threshold);
        let autoencoder_time = start.elapsed();

        let ensemble = self.combiner.combine(&DetectorSignals {
            isolation_verdicts: &isolation.verdicts,
            isolation_scores: &isolation.scores,
            isolation_offset: self.forest.offset(),
            reconstruction_errors: &errors,
            threshold: self.threshold,
        })?;

        let mut timings = Timings::default();
        timings.record_inference(isolation_time, autoencoder_time);

        let verdicts = ModelTriple::new(isolation.verdicts, reconstruction, ensemble);
        let performance_metrics = PerformanceMetrics::evaluate(labels.as_deref(), &verdicts, warnings)?;
        let summary = Summary::from_verdicts(&verdicts);

        tracing::info!(
            samples = summary.total_samples,
            isolation_forest = summary.anomalies_detected.isolation_forest,
            autoencoder = summary.anomalies_detected.autoencoder,
            ensemble = summary.anomalies_detected.ensemble,
            "detection complete"
        );

        let score_summaries = ScoreSummaries::from([
            (
                "isolation_forest".to_string(),
                ScoreSummary::from_scores(&isolation.scores),
            ),
            (
                "autoencoder".to_string(),
                ScoreSummary::from_scores(&errors),
            ),
        ]);

        let report = Report {
            summary,
            performance_metrics,
            metadata: Metadata {
                timings_sec: timings,
                threshold: self.threshold,
                isolation_offset: self.forest.offset(),
                ensemble_method: self.combiner.method(),
                train_samples: None,
                test_samples: records.len(),
                features: self.feature_names.clone(),
                filled_columns: Vec::new(),
                score_summaries,
                warnings: Vec::new(),
                training_history: None,
            },
            configuration: None,
        };

        let artifacts = ScoreArtifacts {
            isolation_scores: isolation.scores,
            isolation_polarity: isolation.polarity,
            reconstruction_errors: errors,
            threshold: self.threshold,
            ensemble: verdicts.ensemble,
        };

        Ok(Detection { report, artifacts })
    }
}

/// Result of fitting on the training split only
#[derive(Debug, Clone)]
pub struct TrainedPipeline {
    pub fitted: FittedPipeline,
    pub history: TrainingHistory,
    pub timings: Timings,
    pub train_samples: usize,
}

/// Result of a full fit + score run
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub report: Report,
    pub artifacts: ScoreArtifacts,
    pub fitted: FittedPipeline,
}

/// Trains and evaluates detectors according to a [`DetectorConfig`]
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: DetectorConfig,
}

/// Output of fitting models on the training split
struct FitOutcome {
    trained: TrainedPipeline,
    test_indices: Vec<usize>,
}

impl Pipeline {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Fit every stage on the training split of `table`
    pub fn train(&self, table: &RawTable) -> Result<TrainedPipeline> {
        let mut warnings = Warnings::new();
        let normalized = schema::normalize(table, &mut warnings)?;
        Ok(self.fit(&normalized, &mut warnings)?.trained)
    }

    /// Fit on the training split, score the test split, and build the report
    pub fn run(&self, table: &RawTable) -> Result<PipelineRun> {
        tracing::info!(rows = table.len(), "starting detection pipeline");
        let mut warnings = Warnings::new();
        let normalized = schema::normalize(table, &mut warnings)?;
        let FitOutcome {
            trained,
            test_indices,
        } = self.fit(&normalized, &mut warnings)?;

        let test_records: Vec<&Record> = test_indices
            .iter()
            .map(|&i| &normalized.records[i])
            .collect();
        let test_labels = normalized.has_labels.then(|| {
            test_records
                .iter()
                .map(|r| r.label.unwrap_or(false))
                .collect::<Vec<bool>>()
        });

        let Detection {
            mut report,
            artifacts,
        } = trained
            .fitted
            .evaluate(&test_records, test_labels, &mut warnings)?;

        report.metadata.timings_sec.train = trained.timings.train;
        report.metadata.train_samples = Some(trained.train_samples);
        report.metadata.filled_columns = normalized.filled_columns;
        report.metadata.training_history = Some(trained.history);
        report.metadata.warnings = warnings.into_vec();
        report.configuration = Some(self.config.clone());

        tracing::info!("pipeline completed");
        Ok(PipelineRun {
            report,
            artifacts,
            fitted: trained.fitted,
        })
    }

    fn fit(&self, normalized: &NormalizedTable, warnings: &mut Warnings) -> Result<FitOutcome> {
        let labels = normalized.labels();
        let split = split_indices(
            normalized.len(),
            labels.as_deref(),
            self.config.data.test_size,
            self.config.data.random_state,
            self.config.data.stratify,
        )?;

        let train_records: Vec<&Record> = split
            .train
            .iter()
            .map(|&i| &normalized.records[i])
            .collect();

        let encoder = CategoricalEncoder::fit(&train_records);
        let raw: Vec<Vec<f64>> = train_records
            .iter()
            .map(|r| feature_row(r, &encoder, warnings))
            .collect();
        let scaler = ScalerStats::fit(&raw)?;
        let x_train = scaler.transform(&raw)?;

        tracing::info!(
            train = x_train.len(),
            test = split.test.len(),
            features = scaler.n_features(),
            "preprocessed training split"
        );

        let (forest, forest_time, ae_fit) = if self.config.runtime.parallel_fit {
            crossbeam::scope(|s| {
                let forest = s.spawn(|_| self.fit_forest(&x_train));
                let ae_fit = self.fit_autoencoder(&x_train);
                let (forest, forest_time) = forest
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
                (forest, forest_time, ae_fit)
            })
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
        } else {
            let (forest, forest_time) = self.fit_forest(&x_train);
            (forest, forest_time, self.fit_autoencoder(&x_train))
        };
        let forest = forest?;
        let (autoencoder, history, threshold, ae_time) = ae_fit?;

        let mut timings = Timings::default();
        timings.record_train(forest_time, ae_time);

        let fitted = FittedPipeline {
            feature_names: schema::feature_names(),
            encoder,
            scaler,
            forest,
            autoencoder,
            threshold,
            combiner: EnsembleCombiner::new(
                self.config.detection.ensemble_method,
                self.config.detection.confidence_margin,
            ),
        };

        Ok(FitOutcome {
            trained: TrainedPipeline {
                fitted,
                history,
                timings,
                train_samples: split.train.len(),
            },
            test_indices: split.test,
        })
    }

    fn fit_forest(&self, x_train: &[Vec<f64>]) -> (Result<IsolationForest>, Duration) {
        let start = Instant::now();
        let mut forest = IsolationForest::from_config(&self.config.isolation_forest);
        let result = forest.fit(x_train).map(|()| forest);
        let elapsed = start.elapsed();
        tracing::info!(secs = elapsed.as_secs_f64(), "isolation forest trained");
        (result, elapsed)
    }

    /// Train the autoencoder and calibrate its threshold on the training errors
    fn fit_autoencoder(
        &self,
        x_train: &[Vec<f64>],
    ) -> Result<(Autoencoder, TrainingHistory, f64, Duration)> {
        let start = Instant::now();
        let input_dim = x_train.first().map_or(0, Vec::len);
        let mut autoencoder = Autoencoder::new(input_dim, &self.config.autoencoder)?;
        let history = autoencoder.fit(x_train)?;

        let train_errors = autoencoder.reconstruction_errors(x_train)?;
        let threshold = ThresholdCalibrator::new(self.config.detection.threshold_percentile)
            .calibrate(&train_errors)?;
        let elapsed = start.elapsed();

        tracing::info!(
            secs = elapsed.as_secs_f64(),
            final_loss = history.final_loss().unwrap_or(f64::NAN),
            threshold,
            "autoencoder trained"
        );
        Ok((autoencoder, history, threshold, elapsed))
    }
}
