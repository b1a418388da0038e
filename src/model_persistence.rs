//! Fitted pipeline persistence
//!
//! A trained [`FittedPipeline`] (vocabularies, scaler statistics, forest,
//! autoencoder weights, threshold, ensemble policy) is stored in aprender's
//! `.apr` container so `detect` runs reuse it instead of retraining.
//!
//! # References
//!
//! Sculley, D., et al. (2015). Hidden technical debt in machine learning systems.
//! Advances in Neural Information Processing Systems.

use crate::config::DetectorConfig;
use crate::error::{DetectorError, Result};
use crate::pipeline::FittedPipeline;
use aprender::format::{load, save, Compression, ModelType, SaveOptions};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Metadata stored alongside a persisted pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// netsentry version that created this model
    pub netsentry_version: String,
    /// When the model was trained (RFC 3339)
    pub trained_at: String,
    /// Number of records in the training split
    pub training_samples: usize,
    pub hyperparameters: HashMap<String, String>,
    pub description: Option<String>,
}

impl ModelMetadata {
    /// Create new metadata with current timestamp
    pub fn new(training_samples: usize) -> Self {
        Self {
            netsentry_version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: chrono::Utc::now().to_rfc3339(),
            training_samples,
            hyperparameters: HashMap::new(),
            description: None,
        }
    }

    /// Metadata carrying the hyperparameters of `config`
    pub fn from_config(config: &DetectorConfig, training_samples: usize) -> Self {
        let mut metadata = Self::new(training_samples);
        metadata.hyperparameters = config.hyperparameters();
        metadata
    }

    pub fn with_hyperparameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.hyperparameters.insert(key.into(), value.into());
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// On-disk payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPipeline {
    pub metadata: ModelMetadata,
    pub pipeline: FittedPipeline,
}

/// Options for saving models
#[derive(Debug, Clone)]
pub struct PersistenceOptions {
    /// Enable zstd compression (default: true)
    pub compress: bool,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Default for PersistenceOptions {
    fn default() -> Self {
        Self {
            compress: true,
            name: None,
            description: None,
        }
    }
}

impl PersistenceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Save a fitted pipeline to `.apr`, creating parent directories
pub fn save_pipeline(
    path: impl AsRef<Path>,
    pipeline: &FittedPipeline,
    metadata: ModelMetadata,
    options: PersistenceOptions,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let compression = if options.compress {
        Compression::ZstdDefault
    } else {
        Compression::None
    };

    let mut save_options = SaveOptions::new().with_compression(compression);
    if let Some(name) = options.name {
        save_options = save_options.with_name(name);
    }
    if let Some(desc) = options.description {
        save_options = save_options.with_description(desc);
    }

    let payload = SavedPipeline {
        metadata,
        pipeline: pipeline.clone(),
    };
    save(&payload, ModelType::Custom, path, save_options)
        .map_err(|e| DetectorError::Persistence(format!("saving {}: {}", path.display(), e)))?;

    tracing::info!(path = %path.display(), "model saved");
    Ok(())
}

/// Load a pipeline saved by [`save_pipeline`]
pub fn load_pipeline(path: impl AsRef<Path>) -> Result<SavedPipeline> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DetectorError::Persistence(format!(
            "model file not found: {}",
            path.display()
        )));
    }

    let saved = load::<SavedPipeline>(path, ModelType::Custom)
        .map_err(|e| DetectorError::Persistence(format!("loading {}: {}", path.display(), e)))?;

    tracing::info!(path = %path.display(), "{}", model_status_line(&saved.metadata));
    Ok(saved)
}

/// Check that a model file loads, returning its metadata
pub fn validate_model_file(path: impl AsRef<Path>) -> Result<ModelMetadata> {
    load_pipeline(path).map(|saved| saved.metadata)
}

/// One-line description of a saved model
pub fn model_status_line(metadata: &ModelMetadata) -> String {
    format!(
        "model: netsentry v{}, trained {} with {} samples",
        metadata.netsentry_version, metadata.trained_at, metadata.training_samples
    )
}
