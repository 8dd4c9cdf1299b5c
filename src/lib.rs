//! Crop yield estimation: CSV dataset ingestion, a linear-regression
//! training pipeline (scaled numerics, one-hot categoricals with
//! unseen-category tolerance), and cached inference served over HTTP and
//! an interactive CLI.

pub mod dataset;
pub mod error;
pub mod infer;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod schema;
pub mod server;

/// Well-known locations, relative to the process working directory.
pub const DEFAULT_DATA_PATH: &str = "mnt/data/indian_crop_climate_data.csv";
pub const DEFAULT_MODEL_PATH: &str = "model/crop_yield_pipeline.bin";
pub const COLLECTED_INPUTS_PATH: &str = "mnt/data/inputs_collected.csv";
