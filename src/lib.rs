//! netsentry - ensemble anomaly detection for network traffic records
//!
//! Two unsupervised detectors, an isolation forest and a dense autoencoder,
//! are trained on the training split of a traffic table and combined into one
//! verdict per record. Labels, when present, turn the report into a supervised
//! evaluation; otherwise it carries detection rates and method agreement.

pub mod autoencoder;
pub mod cli;
pub mod config;
pub mod encoder;
pub mod ensemble;
pub mod error;
pub mod isolation_forest;
pub mod metrics;
pub mod model_persistence;
pub mod pipeline;
pub mod report;
pub mod scaler;
pub mod schema;
pub mod split;
pub mod table;
pub mod threshold;
pub mod warnings;

pub use config::DetectorConfig;
pub use error::{DetectorError, Result};
pub use pipeline::{FittedPipeline, Pipeline};
