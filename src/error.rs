//! Error taxonomy. Each enum maps to one failure domain: unreadable source
//! data, invalid client input, an unusable training dataset, or a failed
//! prediction. Boundary code converts these into structured payloads; raw
//! errors never cross the HTTP or CLI surface.

use std::path::PathBuf;

use thiserror::Error;

/// The dataset source could not be read. Callers with a menu fallback
/// recover this as an empty result instead of failing the request.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("dataset unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: polars::prelude::PolarsError,
    },
}

/// Client-supplied input was invalid. Surfaced as a client error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizationError {
    #[error("missing required fields: {missing:?}")]
    MissingFields { missing: Vec<String> },
    #[error("field '{field}' is not numeric")]
    NotNumeric { field: String },
    #[error("field '{field}' is not text")]
    NotText { field: String },
}

/// The training dataset or schema was unusable. Fatal to the training run.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("no target column '{target}' in dataset (available: {available:?})")]
    MissingTarget {
        target: String,
        available: Vec<String>,
    },
    #[error("no usable features among columns {available:?}")]
    NoUsableFeatures { available: Vec<String> },
    #[error("not enough rows to train ({rows} after dropping incomplete rows)")]
    NotEnoughRows { rows: usize },
    #[error("least-squares solve failed: {0}")]
    Solve(String),
    #[error(transparent)]
    Frame(#[from] polars::prelude::PolarsError),
    #[error("failed to persist model artifact to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode model artifact: {0}")]
    Encode(#[from] bincode::Error),
}

/// A record could not be mapped onto the fitted feature space.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("feature '{0}' missing from record")]
    MissingFeature(String),
    #[error("feature '{0}' is not numeric")]
    NonNumericFeature(String),
}

/// The model was unavailable or the prediction raised. Surfaced as a
/// server error; the process keeps serving other requests. Clone-able so
/// the load-once cache can latch a failure and report it on every call.
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    #[error("model artifact missing at {path}")]
    ArtifactMissing { path: PathBuf },
    #[error("model artifact at {path} could not be read: {details}")]
    ArtifactUnreadable { path: PathBuf, details: String },
    #[error("prediction failed: {details}")]
    Prediction { details: String },
}
