//! Interactive data-collection prompt. Menus come from the dataset when it
//! is readable, with hard-coded fallbacks otherwise; every collected row is
//! appended to the inputs CSV, and a prediction is printed opportunistically
//! when a model artifact exists.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context};
use serde_json::{json, Value};

use crop_yield_predictor::infer::ModelCache;
use crop_yield_predictor::{
    dataset, normalize, COLLECTED_INPUTS_PATH, DEFAULT_DATA_PATH, DEFAULT_MODEL_PATH,
};

const COLUMNS: [&str; 6] = [
    "crop_type",
    "region",
    "temperature_c",
    "rainfall_mm",
    "humidity_percent",
    "soil_type",
];

fn main() -> anyhow::Result<()> {
    let menus = load_menus(DEFAULT_DATA_PATH);

    let crop = choose_from(&menus.crop, "Choose crop_type:")?;
    let region = choose_from(&menus.region, "Choose region (state):")?;
    let temperature = prompt_numeric("Enter temperature_c: ")?;
    let rainfall = prompt_numeric("Enter rainfall_mm: ")?;
    let humidity = prompt_numeric("Enter humidity_percent: ")?;
    let soil = choose_from(&menus.soil, "Choose soil_type:")?;

    let row = [
        crop.clone(),
        region.clone(),
        temperature.to_string(),
        rainfall.to_string(),
        humidity.to_string(),
        soil.clone(),
    ];
    append_row(Path::new(COLLECTED_INPUTS_PATH), &row)?;
    println!("\nSaved input row to: {COLLECTED_INPUTS_PATH}");

    // Best effort: a missing or unreadable model is a warning, not a
    // failure, for this tool.
    let cache = ModelCache::new(DEFAULT_MODEL_PATH);
    match cache.get_or_load() {
        Ok(pipeline) => {
            let raw: HashMap<String, Value> = [
                ("crop_type".to_string(), json!(crop)),
                ("region".to_string(), json!(region)),
                ("temperature_c".to_string(), json!(temperature)),
                ("rainfall_mm".to_string(), json!(rainfall)),
                ("humidity_percent".to_string(), json!(humidity)),
                ("soil_type".to_string(), json!(soil)),
            ]
            .into_iter()
            .collect();
            match normalize::normalize(&raw, &pipeline.required_features())
                .map_err(anyhow::Error::from)
                .and_then(|record| cache.predict(&record).map_err(anyhow::Error::from))
            {
                Ok(prediction) => println!("Model prediction: {prediction}"),
                Err(err) => eprintln!("Could not run prediction with loaded model: {err}"),
            }
        }
        Err(err) => eprintln!("Warning: no usable model, skipping prediction ({err})"),
    }

    Ok(())
}

struct Menus {
    crop: Vec<String>,
    region: Vec<String>,
    soil: Vec<String>,
}

fn load_menus(data_path: &str) -> Menus {
    let df = dataset::load(data_path).ok();
    let values = |column: &str, fallback: &[&str]| -> Vec<String> {
        let from_data = df
            .as_ref()
            .map(|df| dataset::unique_values(df, column))
            .unwrap_or_default();
        if from_data.is_empty() {
            fallback.iter().map(|s| s.to_string()).collect()
        } else {
            from_data
        }
    };
    Menus {
        crop: values("crop_type", &["maize", "rice", "wheat"]),
        region: values("region", &["State1", "State2"]),
        soil: values("soil_type", &["clay", "loamy", "sandy"]),
    }
}

/// Numbered menu; a digit selects an entry, anything else non-empty is
/// accepted as a new value.
fn choose_from(menu: &[String], prompt: &str) -> anyhow::Result<String> {
    println!("\n{prompt}");
    for (i, option) in menu.iter().enumerate() {
        println!("  {}) {option}", i + 1);
    }
    loop {
        let choice = read_line("Select number (or type new value): ")?;
        if let Ok(idx) = choice.parse::<usize>() {
            if idx >= 1 && idx <= menu.len() {
                return Ok(menu[idx - 1].clone());
            }
            println!("Invalid number, try again.");
        } else if !choice.is_empty() {
            return Ok(choice);
        }
    }
}

fn prompt_numeric(prompt: &str) -> anyhow::Result<f64> {
    loop {
        let value = read_line(prompt)?;
        match value.parse::<f64>() {
            Ok(v) if v.is_finite() => return Ok(v),
            _ => println!("Invalid number, try again."),
        }
    }
}

fn read_line(prompt: &str) -> anyhow::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        bail!("input closed");
    }
    Ok(line.trim().to_string())
}

fn append_row(path: &Path, row: &[String; 6]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let write_header = !path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if write_header {
        writer.write_record(COLUMNS)?;
    }
    writer.write_record(row)?;
    writer.flush()?;
    Ok(())
}
