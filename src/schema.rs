//! Canonical column schema shared by the loader, the normalizer, and the
//! trainer, so alias resolution lives in exactly one place.

use polars::prelude::*;

/// Target column for training; never present at inference time.
pub const TARGET: &str = "production_tonnes_per_hectare";

/// Candidate categorical features; trained on whichever are present.
pub const CATEGORICAL_CANDIDATES: &[&str] = &["crop_type", "region", "soil_type"];

/// Candidate numeric features; trained on whichever are present.
pub const NUMERIC_CANDIDATES: &[&str] = &["temperature_c", "rainfall_mm", "humidity", "percent"];

/// Fields every inference request must carry, in reporting order.
pub const REQUIRED_REQUEST_FIELDS: &[&str] = &[
    "crop_type",
    "region",
    "temperature_c",
    "rainfall_mm",
    "humidity_percent",
    "soil_type",
];

/// Request fields coerced to f64 by the normalizer.
pub const NUMERIC_REQUEST_FIELDS: &[&str] = &["temperature_c", "rainfall_mm", "humidity_percent"];

/// Columns exposed through the options endpoint and the CLI menus.
pub const OPTION_COLUMNS: &[&str] = &["crop_type", "region", "soil_type"];

/// Alternate spellings seen in dataset exports, mapped to canonical names.
/// Applied only when the canonical spelling is absent.
pub const COLUMN_ALIASES: &[(&str, &str)] = &[("humidity_percent", "humidity")];

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| *c == name)
}

/// Rename aliased columns in place. A rename never clobbers a column that
/// already uses the canonical spelling.
pub fn apply_aliases(df: &mut DataFrame) -> PolarsResult<()> {
    for (alias, canonical) in COLUMN_ALIASES {
        if has_column(df, alias) && !has_column(df, canonical) {
            df.rename(alias, canonical)?;
        }
    }
    Ok(())
}
