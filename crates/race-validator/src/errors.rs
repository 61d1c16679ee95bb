use std::path::PathBuf;

use thiserror::Error;

use crate::track_files::TrackFormat;

/// Failures reading a single track file.
#[derive(Debug, Error)]
pub enum TrackFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse GPX file: {0}")]
    Gpx(String),

    #[error("Failed to parse TCX file: {0}")]
    Tcx(String),

    #[error("Failed to parse FIT file: {0}")]
    Fit(String),

    #[error("Unsupported file type: {0:?}")]
    UnsupportedFormat(TrackFormat),
}

/// Failures producing a result record for one competitor file.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Malformed track file {}: {source}", path.display())]
    MalformedTrackFile {
        path: PathBuf,
        #[source]
        source: TrackFileError,
    },

    #[error("Competitor {competitor_id} has no reference distance for category {category:?}")]
    UnknownCategory {
        competitor_id: String,
        category: Option<String>,
    },

    #[error("Competitor {competitor_id} is not in the registry")]
    UnknownCompetitor { competitor_id: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read competitor registry: {0}")]
    Csv(#[from] csv::Error),

    #[error("Competitor registry row {row} has no competitor_id")]
    MissingId { row: usize },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to format time: {0}")]
    Format(#[from] time::error::Format),
}

/// A competitor file that could not be validated.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: ValidationError,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to read reference track {}: {source}", path.display())]
    Reference {
        path: PathBuf,
        #[source]
        source: TrackFileError,
    },

    #[error("Failed to scan {}: {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
