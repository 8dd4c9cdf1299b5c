//! Inference over the persisted model artifact. The artifact is
//! deserialized at most once per process; both the loaded pipeline and a
//! load failure are terminal states, so a confirmed-missing artifact is
//! reported on every call without touching the disk again.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{error, info};

use crate::error::InferenceError;
use crate::pipeline::FittedPipeline;
use crate::record::FeatureRecord;

/// Display precision for predictions.
const PRECISION: f64 = 10_000.0;

enum LoadState {
    Unloaded,
    Ready(Arc<FittedPipeline>),
    Failed(InferenceError),
}

/// Load-once cache around the model artifact. Concurrent first loads are
/// serialized behind the state lock.
pub struct ModelCache {
    path: PathBuf,
    state: Mutex<LoadState>,
}

impl ModelCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(LoadState::Unloaded),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The fitted pipeline, deserializing it on first call. Subsequent
    /// calls return the cached pipeline or replay the latched failure.
    pub fn get_or_load(&self) -> Result<Arc<FittedPipeline>, InferenceError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            LoadState::Ready(pipeline) => return Ok(Arc::clone(pipeline)),
            LoadState::Failed(err) => return Err(err.clone()),
            LoadState::Unloaded => {}
        }
        match self.load_from_disk() {
            Ok(pipeline) => {
                let pipeline = Arc::new(pipeline);
                info!(path = %self.path.display(), "model artifact loaded");
                *state = LoadState::Ready(Arc::clone(&pipeline));
                Ok(pipeline)
            }
            Err(err) => {
                error!(path = %self.path.display(), %err, "model artifact load failed");
                *state = LoadState::Failed(err.clone());
                Err(err)
            }
        }
    }

    fn load_from_disk(&self) -> Result<FittedPipeline, InferenceError> {
        if !self.path.exists() {
            return Err(InferenceError::ArtifactMissing {
                path: self.path.clone(),
            });
        }
        let bytes = fs::read(&self.path).map_err(|e| InferenceError::ArtifactUnreadable {
            path: self.path.clone(),
            details: e.to_string(),
        })?;
        bincode::deserialize(&bytes).map_err(|e| InferenceError::ArtifactUnreadable {
            path: self.path.clone(),
            details: e.to_string(),
        })
    }

    /// Predict the yield for one normalized record, rounded to four
    /// decimals for display stability.
    pub fn predict(&self, record: &FeatureRecord) -> Result<f64, InferenceError> {
        let pipeline = self.get_or_load()?;
        let prediction = pipeline
            .predict(record)
            .map_err(|e| InferenceError::Prediction {
                details: e.to_string(),
            })?;
        if !prediction.is_finite() {
            return Err(InferenceError::Prediction {
                details: "non-finite prediction".to_string(),
            });
        }
        Ok((prediction * PRECISION).round() / PRECISION)
    }
}
