use thiserror::Error;

pub mod app_config;
pub mod config;
pub mod metrics;
pub mod parsers;
pub mod segments;
pub mod setup;
pub mod types;
pub mod wizard;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use metrics::{
    aggregate_snapshots, compute_metrics, fractional_delta, position_delta, ComparisonResult,
    MetricChanges,
};
pub use segments::{partition_responses, segment_responses, SegmentBucket};
pub use types::{
    AccountScope, BuyingJourneyStage, Granularity, MetricsSnapshot, ResponseRecord, TimeSegment,
};
pub use wizard::{SetupPlan, SetupStep, SetupWizard, StepInput, WizardError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
    #[error("failed to read setup file {path}: {source}")]
    SetupFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse setup file: {0}")]
    SetupFileParse(#[from] serde_yaml::Error),
    #[error("{0}")]
    Validation(String),
}
