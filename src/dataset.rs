//! Dataset loading. Reads the crop/climate CSV into a dataframe with alias
//! renames applied, and exposes per-column unique values for menu
//! population.

use std::collections::HashSet;
use std::path::Path;

use polars::prelude::*;
use tracing::debug;

use crate::error::DataError;
use crate::schema;

/// Read a CSV source and normalize alternate column spellings to the
/// canonical schema.
pub fn load(path: impl AsRef<Path>) -> Result<DataFrame, DataError> {
    let path = path.as_ref();
    let mut df = CsvReader::from_path(path)
        .and_then(|reader| reader.has_header(true).finish())
        .map_err(|source| DataError::Unavailable {
            path: path.to_path_buf(),
            source,
        })?;
    schema::apply_aliases(&mut df).map_err(|source| DataError::Unavailable {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(rows = df.height(), columns = df.width(), path = %path.display(), "dataset loaded");
    Ok(df)
}

/// Unique non-blank values of a column: trimmed, deduplicated by exact
/// string, sorted case-insensitively. Never fails; an absent or
/// unreadable column yields an empty list.
pub fn unique_values(df: &DataFrame, column: &str) -> Vec<String> {
    let Ok(series) = df.column(column) else {
        return Vec::new();
    };
    let Ok(cast) = series.cast(&DataType::Utf8) else {
        return Vec::new();
    };
    let Ok(ca) = cast.utf8() else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut values = Vec::new();
    for value in ca.into_iter().flatten() {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            values.push(trimmed.to_string());
        }
    }
    values.sort_by(|a, b| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(file, "{contents}").expect("write temp csv");
        file.flush().expect("flush temp csv");
        file
    }

    #[test]
    fn humidity_percent_renamed_to_humidity() {
        let file = write_csv(
            "crop_type,humidity_percent,production_tonnes_per_hectare\n\
             rice,61.5,2.0\n\
             wheat,48.0,1.5\n",
        );
        let df = load(file.path()).expect("load");
        assert!(schema::has_column(&df, "humidity"));
        assert!(!schema::has_column(&df, "humidity_percent"));
        assert!(schema::has_column(&df, "production_tonnes_per_hectare"));
        let humidity = df.column("humidity").unwrap().f64().unwrap();
        assert_eq!(humidity.get(0), Some(61.5));
        assert_eq!(humidity.get(1), Some(48.0));
    }

    #[test]
    fn load_fails_on_missing_file() {
        let err = load("definitely/not/a/real/path.csv").unwrap_err();
        let DataError::Unavailable { path, .. } = err;
        assert!(path.ends_with("path.csv"));
    }

    #[test]
    fn unique_values_trims_dedupes_and_sorts() {
        let df = DataFrame::new(vec![Series::new("crop_type", &["b", " a ", "a", ""])]).unwrap();
        assert_eq!(unique_values(&df, "crop_type"), vec!["a", "b"]);
    }

    #[test]
    fn unique_values_sorts_case_insensitively() {
        let df =
            DataFrame::new(vec![Series::new("region", &["Delta", "alpha", "Beta"])]).unwrap();
        assert_eq!(unique_values(&df, "region"), vec!["alpha", "Beta", "Delta"]);
    }

    #[test]
    fn unique_values_empty_for_absent_column() {
        let df = DataFrame::new(vec![Series::new("region", &["north"])]).unwrap();
        assert!(unique_values(&df, "soil_type").is_empty());
    }
}
