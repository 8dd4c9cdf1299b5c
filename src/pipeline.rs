//! Training pipeline: feature selection against the candidate schema, a
//! reproducible 80/20 split, standardized numerics + one-hot categoricals,
//! and an ordinary-least-squares fit. The fitted transformers and
//! coefficients serialize together as one artifact.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use nalgebra::{DMatrix, DVector};
use polars::prelude::*;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{TrainingError, TransformError};
use crate::record::{FeatureRecord, FeatureValue};
use crate::schema;

/// Fixed partition seed; identical data always yields identical splits.
const SPLIT_SEED: u64 = 42;
const HOLDOUT_FRACTION: f64 = 0.2;

/// Per-feature standardization fitted on the training partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: f64,
    scale: f64,
}

impl StandardScaler {
    fn fit(values: &[f64]) -> Self {
        let n = values.len().max(1) as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let scale = variance.sqrt();
        // Constant columns pass through unscaled instead of dividing by zero.
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };
        Self { mean, scale }
    }

    fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }

    #[cfg(test)]
    fn scale(&self) -> f64 {
        self.scale
    }
}

/// One-hot encoding over the vocabulary seen at fit time. Categories
/// unseen during training encode as the all-zero indicator vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    categories: Vec<String>,
}

impl OneHotEncoder {
    fn fit<'a>(values: impl Iterator<Item = &'a str>) -> Self {
        let categories: BTreeSet<String> = values
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            categories: categories.into_iter().collect(),
        }
    }

    fn encode_into(&self, value: &str, out: &mut Vec<f64>) {
        let value = value.trim();
        for category in &self.categories {
            out.push(if category == value { 1.0 } else { 0.0 });
        }
    }

    fn width(&self) -> usize {
        self.categories.len()
    }
}

/// Fitted transformers plus regression coefficients. The feature names
/// recorded here are the canonical schema the model was trained against;
/// they are frozen until the artifact is replaced by a retrain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    numeric: Vec<(String, StandardScaler)>,
    categorical: Vec<(String, OneHotEncoder)>,
    /// Intercept first, then one weight per transformed column.
    coefficients: Vec<f64>,
}

impl FittedPipeline {
    /// Every feature name a record must carry before prediction.
    pub fn required_features(&self) -> Vec<String> {
        self.numeric
            .iter()
            .map(|(name, _)| name.clone())
            .chain(self.categorical.iter().map(|(name, _)| name.clone()))
            .collect()
    }

    /// Transform a record exactly as the pipeline was fit: scaled numerics
    /// in fit order, then one-hot blocks in fit order.
    fn feature_vector(&self, record: &FeatureRecord) -> Result<Vec<f64>, TransformError> {
        let width: usize = self.numeric.len()
            + self
                .categorical
                .iter()
                .map(|(_, enc)| enc.width())
                .sum::<usize>();
        let mut out = Vec::with_capacity(width);
        for (name, scaler) in &self.numeric {
            let value = record
                .get(name)
                .ok_or_else(|| TransformError::MissingFeature(name.clone()))?;
            let value = match value {
                FeatureValue::Number(v) => *v,
                FeatureValue::Text(s) => s
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| TransformError::NonNumericFeature(name.clone()))?,
            };
            out.push(scaler.transform(value));
        }
        for (name, encoder) in &self.categorical {
            let value = record
                .get(name)
                .ok_or_else(|| TransformError::MissingFeature(name.clone()))?;
            match value {
                FeatureValue::Text(s) => encoder.encode_into(s, &mut out),
                FeatureValue::Number(v) => encoder.encode_into(&v.to_string(), &mut out),
            }
        }
        Ok(out)
    }

    /// Evaluate the linear model for one record. Unrounded; display
    /// rounding belongs to the inference service.
    pub fn predict(&self, record: &FeatureRecord) -> Result<f64, TransformError> {
        let features = self.feature_vector(record)?;
        let mut prediction = self.coefficients.first().copied().unwrap_or(0.0);
        for (weight, value) in self.coefficients.iter().skip(1).zip(&features) {
            prediction += weight * value;
        }
        Ok(prediction)
    }

    /// Persist the artifact, overwriting any prior one at `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TrainingError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| TrainingError::Persist {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
        }
        let bytes = bincode::serialize(self)?;
        fs::write(path, bytes).map_err(|source| TrainingError::Persist {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Advisory evaluation metrics on the held-out partition.
#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub mse: f64,
    pub r2: f64,
    pub rows_train: usize,
    pub rows_eval: usize,
}

#[derive(Debug)]
pub struct TrainedModel {
    pub pipeline: FittedPipeline,
    pub report: EvalReport,
}

/// Fit the transformation + regression pipeline against `target`.
pub fn train(df: &DataFrame, target: &str) -> Result<TrainedModel, TrainingError> {
    let available: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|c| c.to_string())
        .collect();
    if !schema::has_column(df, target) {
        return Err(TrainingError::MissingTarget {
            target: target.to_string(),
            available,
        });
    }

    let cat_features: Vec<String> = schema::CATEGORICAL_CANDIDATES
        .iter()
        .filter(|c| schema::has_column(df, c))
        .map(|c| c.to_string())
        .collect();
    let num_features: Vec<String> = schema::NUMERIC_CANDIDATES
        .iter()
        .filter(|c| schema::has_column(df, c))
        .map(|c| c.to_string())
        .collect();
    if cat_features.is_empty() && num_features.is_empty() {
        return Err(TrainingError::NoUsableFeatures { available });
    }
    let ignored: Vec<&str> = schema::CATEGORICAL_CANDIDATES
        .iter()
        .chain(schema::NUMERIC_CANDIDATES)
        .filter(|c| !schema::has_column(df, c))
        .copied()
        .collect();
    if !ignored.is_empty() {
        warn!(?ignored, "candidate columns missing from dataset, ignored");
    }

    let mut used: Vec<String> = Vec::new();
    used.extend(cat_features.iter().cloned());
    used.extend(num_features.iter().cloned());
    used.push(target.to_string());
    let complete = df.drop_nulls(Some(used.as_slice()))?;
    let dropped = df.height() - complete.height();
    if dropped > 0 {
        warn!(dropped, "rows with missing values dropped before training");
    }
    if complete.height() < 2 {
        return Err(TrainingError::NotEnoughRows {
            rows: complete.height(),
        });
    }

    let (train_df, eval_df) = split(&complete)?;

    let mut numeric = Vec::with_capacity(num_features.len());
    for name in &num_features {
        let values = numeric_column(&train_df, name)?;
        numeric.push((name.clone(), StandardScaler::fit(&values)));
    }
    let mut categorical = Vec::with_capacity(cat_features.len());
    for name in &cat_features {
        let values = text_column(&train_df, name)?;
        categorical.push((
            name.clone(),
            OneHotEncoder::fit(values.iter().map(String::as_str)),
        ));
    }

    let mut pipeline = FittedPipeline {
        numeric,
        categorical,
        coefficients: Vec::new(),
    };

    let x_train = design_matrix(&pipeline, &train_df)?;
    let y_train = DVector::from_vec(numeric_column(&train_df, target)?);
    let svd = x_train.svd(true, true);
    let coefficients = svd
        .solve(&y_train, 1e-10)
        .map_err(|e| TrainingError::Solve(e.to_string()))?;
    pipeline.coefficients = coefficients.iter().copied().collect();

    // Held-out metrics are advisory; with too few rows to hold any out,
    // fall back to evaluating on the training partition.
    let (metric_df, rows_eval) = if eval_df.height() > 0 {
        (&eval_df, eval_df.height())
    } else {
        (&train_df, 0)
    };
    let x_eval = design_matrix(&pipeline, metric_df)?;
    let y_eval = DVector::from_vec(numeric_column(metric_df, target)?);
    let predictions = &x_eval * &coefficients;
    let (mse, r2) = regression_metrics(&y_eval, &predictions);

    let report = EvalReport {
        mse,
        r2,
        rows_train: train_df.height(),
        rows_eval,
    };
    info!(
        mse = report.mse,
        r2 = report.r2,
        rows_train = report.rows_train,
        rows_eval = report.rows_eval,
        "pipeline fitted"
    );

    Ok(TrainedModel { pipeline, report })
}

/// Reproducible 80/20 row split: shuffle indices with the fixed seed and
/// hold the leading fraction out for evaluation, always leaving at least
/// one training row.
fn split(df: &DataFrame) -> Result<(DataFrame, DataFrame), TrainingError> {
    let height = df.height();
    let mut indices: Vec<u32> = (0..height as u32).collect();
    let mut rng = StdRng::seed_from_u64(SPLIT_SEED);
    indices.shuffle(&mut rng);

    let n_eval = ((height as f64 * HOLDOUT_FRACTION).floor() as usize).min(height - 1);
    let eval_ca = UInt32Chunked::from_vec("", indices[..n_eval].to_vec());
    let train_ca = UInt32Chunked::from_vec("", indices[n_eval..].to_vec());

    let train_df = df.take(&train_ca)?;
    let eval_df = df.take(&eval_ca)?;
    Ok((train_df, eval_df))
}

/// `[1 | scaled numerics | one-hot blocks]` for every row of `df`, in the
/// same column order the prediction path uses.
fn design_matrix(pipeline: &FittedPipeline, df: &DataFrame) -> Result<DMatrix<f64>, TrainingError> {
    let height = df.height();
    let width = 1
        + pipeline.numeric.len()
        + pipeline
            .categorical
            .iter()
            .map(|(_, enc)| enc.width())
            .sum::<usize>();

    let mut numeric_cols = Vec::with_capacity(pipeline.numeric.len());
    for (name, scaler) in &pipeline.numeric {
        numeric_cols.push((numeric_column(df, name)?, scaler));
    }
    let mut text_cols = Vec::with_capacity(pipeline.categorical.len());
    for (name, encoder) in &pipeline.categorical {
        text_cols.push((text_column(df, name)?, encoder));
    }

    let mut data = Vec::with_capacity(height * width);
    for row in 0..height {
        data.push(1.0);
        for (values, scaler) in &numeric_cols {
            data.push(scaler.transform(values[row]));
        }
        for (values, encoder) in &text_cols {
            encoder.encode_into(&values[row], &mut data);
        }
    }
    Ok(DMatrix::from_row_iterator(height, width, data))
}

fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<f64>, TrainingError> {
    let cast = df.column(name)?.cast(&DataType::Float64)?;
    let ca = cast.f64()?;
    // Incomplete rows were dropped before the split.
    Ok(ca.into_iter().map(|v| v.unwrap_or_default()).collect())
}

fn text_column(df: &DataFrame, name: &str) -> Result<Vec<String>, TrainingError> {
    let cast = df.column(name)?.cast(&DataType::Utf8)?;
    let ca = cast.utf8()?;
    Ok(ca
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}

fn regression_metrics(actual: &DVector<f64>, predicted: &DVector<f64>) -> (f64, f64) {
    let n = actual.len().max(1) as f64;
    let residual: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(y, p)| (y - p).powi(2))
        .sum();
    let mse = residual / n;
    let mean = actual.iter().sum::<f64>() / n;
    let total: f64 = actual.iter().map(|y| (y - mean).powi(2)).sum();
    let r2 = if total > 0.0 { 1.0 - residual / total } else { 0.0 };
    (mse, r2)
}

/// Synthetic rows with a known linear relationship
/// `yield = 2*temperature_c + 0.01*rainfall_mm + noise` and three-value
/// categorical columns. Shared by the pipeline and inference tests.
#[cfg(test)]
pub(crate) fn synthetic_frame(rows: usize) -> DataFrame {
    use rand::Rng;

    let crops = ["maize", "rice", "wheat"];
    let regions = ["east", "north", "south"];
    let soils = ["clay", "loamy", "sandy"];
    let mut rng = StdRng::seed_from_u64(7);

    let mut crop = Vec::with_capacity(rows);
    let mut region = Vec::with_capacity(rows);
    let mut soil = Vec::with_capacity(rows);
    let mut temperature = Vec::with_capacity(rows);
    let mut rainfall = Vec::with_capacity(rows);
    let mut humidity = Vec::with_capacity(rows);
    let mut production = Vec::with_capacity(rows);
    for i in 0..rows {
        let t = rng.gen_range(15.0..35.0);
        let r = rng.gen_range(100.0..2000.0);
        crop.push(crops[i % 3]);
        region.push(regions[(i / 3) % 3]);
        soil.push(soils[(i / 9) % 3]);
        temperature.push(t);
        rainfall.push(r);
        humidity.push(rng.gen_range(30.0..90.0));
        production.push(2.0 * t + 0.01 * r + rng.gen_range(-0.5..0.5));
    }

    DataFrame::new(vec![
        Series::new("crop_type", &crop),
        Series::new("region", &region),
        Series::new("soil_type", &soil),
        Series::new("temperature_c", &temperature),
        Series::new("rainfall_mm", &rainfall),
        Series::new("humidity", &humidity),
        Series::new("production_tonnes_per_hectare", &production),
    ])
    .expect("synthetic frame")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(crop: &str, temperature: f64, rainfall: f64, humidity: f64) -> FeatureRecord {
        let mut r = FeatureRecord::new();
        r.insert("crop_type", FeatureValue::Text(crop.to_string()));
        r.insert("region", FeatureValue::Text("north".to_string()));
        r.insert("soil_type", FeatureValue::Text("loamy".to_string()));
        r.insert("temperature_c", FeatureValue::Number(temperature));
        r.insert("rainfall_mm", FeatureValue::Number(rainfall));
        r.insert("humidity", FeatureValue::Number(humidity));
        r
    }

    #[test]
    fn known_linear_relationship_recovered() {
        let df = synthetic_frame(100);
        let trained = train(&df, schema::TARGET).expect("train");
        assert!(
            trained.report.r2 > 0.8,
            "held-out R2 {} too low",
            trained.report.r2
        );
        assert_eq!(trained.report.rows_eval, 20);
        assert_eq!(trained.report.rows_train, 80);
    }

    #[test]
    fn repeated_training_is_deterministic() {
        let df = synthetic_frame(60);
        let first = train(&df, schema::TARGET).expect("train");
        let second = train(&df, schema::TARGET).expect("train");
        assert_eq!(first.pipeline, second.pipeline);
    }

    #[test]
    fn missing_target_fails() {
        let df = DataFrame::new(vec![Series::new("temperature_c", &[20.0f64, 22.0])]).unwrap();
        let err = train(&df, schema::TARGET).unwrap_err();
        assert!(err.to_string().contains("no target column"));
    }

    #[test]
    fn no_usable_features_fails() {
        let df = DataFrame::new(vec![
            Series::new("elevation_m", &[100.0f64, 220.0]),
            Series::new("production_tonnes_per_hectare", &[2.0f64, 3.0]),
        ])
        .unwrap();
        let err = train(&df, schema::TARGET).unwrap_err();
        assert!(err.to_string().contains("no usable features"));
    }

    #[test]
    fn unseen_category_encodes_to_zero_vector() {
        let encoder = OneHotEncoder::fit(["loamy", "sandy"].into_iter());
        let mut out = Vec::new();
        encoder.encode_into("volcanic", &mut out);
        assert_eq!(out, vec![0.0, 0.0]);
    }

    #[test]
    fn unseen_category_prediction_is_finite() {
        let df = synthetic_frame(100);
        let trained = train(&df, schema::TARGET).expect("train");
        let prediction = trained
            .pipeline
            .predict(&record("quinoa", 25.0, 800.0, 60.0))
            .expect("predict");
        assert!(prediction.is_finite());
    }

    #[test]
    fn constant_column_scales_by_one() {
        let scaler = StandardScaler::fit(&[5.0, 5.0, 5.0]);
        assert_eq!(scaler.scale(), 1.0);
    }

    #[test]
    fn record_missing_trained_feature_fails() {
        let df = synthetic_frame(40);
        let trained = train(&df, schema::TARGET).expect("train");
        let mut incomplete = record("rice", 25.0, 800.0, 60.0);
        incomplete.remove("humidity");
        let err = trained.pipeline.predict(&incomplete).unwrap_err();
        assert_eq!(err, TransformError::MissingFeature("humidity".to_string()));
    }
}
