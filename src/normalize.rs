//! The normalization boundary between untyped request payloads and the
//! typed feature space of the fitted pipeline. Everything downstream of
//! this module works with validated [`FeatureRecord`]s only.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::NormalizationError;
use crate::record::{FeatureRecord, FeatureValue};
use crate::schema;

/// Required request fields absent from the raw payload, in the fixed
/// reporting order.
pub fn missing_required(raw: &HashMap<String, Value>) -> Vec<String> {
    schema::REQUIRED_REQUEST_FIELDS
        .iter()
        .filter(|field| !raw.contains_key(**field))
        .map(|field| field.to_string())
        .collect()
}

/// Map a raw string-keyed payload onto the feature schema the fitted
/// pipeline expects.
///
/// Validation fails closed: every missing required field is enumerated,
/// and numeric fields that do not parse to a finite f64 are rejected.
/// The `humidity_percent` request field is moved to the canonical
/// `humidity` feature when the pipeline schema asks for it.
///
/// Any pipeline-required feature the caller did not supply is filled with
/// 0.0. This is lossy (a model trained with a `percent` column will always
/// see 0.0 for it) and kept for compatibility with the historical
/// behavior; see DESIGN.md.
pub fn normalize(
    raw: &HashMap<String, Value>,
    required_features: &[String],
) -> Result<FeatureRecord, NormalizationError> {
    let missing = missing_required(raw);
    if !missing.is_empty() {
        return Err(NormalizationError::MissingFields { missing });
    }

    let mut record = FeatureRecord::new();
    for field in schema::REQUIRED_REQUEST_FIELDS {
        let Some(value) = raw.get(*field) else {
            continue; // presence already validated
        };
        if schema::NUMERIC_REQUEST_FIELDS.contains(field) {
            record.insert(*field, FeatureValue::Number(coerce_number(field, value)?));
        } else {
            record.insert(*field, FeatureValue::Text(coerce_text(field, value)?));
        }
    }

    if required_features.iter().any(|f| f == "humidity") && !record.contains("humidity") {
        if let Some(value) = record.remove("humidity_percent") {
            record.insert("humidity", value);
        }
    }

    for feature in required_features {
        if !record.contains(feature) {
            record.insert(feature.clone(), FeatureValue::Number(0.0));
        }
    }

    Ok(record)
}

fn coerce_number(field: &str, value: &Value) -> Result<f64, NormalizationError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| NormalizationError::NotNumeric {
            field: field.to_string(),
        })
}

fn coerce_text(field: &str, value: &Value) -> Result<String, NormalizationError> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(NormalizationError::NotText {
            field: field.to_string(),
        }),
    }
}
