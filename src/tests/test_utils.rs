//! Shared fixtures: small hand-built bundles with predictable outputs.

use crate::artifact_store::{METADATA_FILE, MODEL_FILE, PREPROCESSOR_FILE};
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;

/// Column transformer over 3 numeric and 4 categorical columns (width 11).
pub fn pipeline_preprocessor() -> Value {
    json!({
        "kind": "column_transformer",
        "numeric": [
            {"name": "year", "median": 2018.0, "mean": 2018.0, "scale": 2.0},
            {"name": "kmDriven", "median": 40000.0, "mean": 40000.0, "scale": 20000.0},
            {"name": "engineSize", "median": 1.2, "mean": 1.2, "scale": 0.2}
        ],
        "categorical": [
            {"name": "brand", "most_frequent": "Maruti Suzuki", "categories": ["Hyundai", "Maruti Suzuki"]},
            {"name": "model", "most_frequent": "Swift", "categories": ["City", "Swift"]},
            {"name": "fuelType", "most_frequent": "Petrol", "categories": ["Diesel", "Petrol"]},
            {"name": "transmission", "most_frequent": "Manual", "categories": ["Automatic", "Manual"]}
        ]
    })
}

/// `600000 + 50000*z(year) - 30000*z(km) + 10000*z(engine)` plus premiums for
/// Hyundai, City, Diesel and Automatic.
pub fn pipeline_model() -> Value {
    json!({
        "kind": "linear",
        "intercept": 600000.0,
        "coefficients": [50000.0, -30000.0, 10000.0, 20000.0, 0.0, 40000.0, 0.0, 25000.0, 0.0, 60000.0, 0.0]
    })
}

pub fn pipeline_metadata(r2: f64) -> Value {
    json!({
        "best_model": "LinearRegression",
        "metrics": [
            {"model": "LinearRegression", "rmse": 81234.567, "mae": 60000.0, "r2": r2},
            {"model": "RandomForest", "rmse": 90000.0, "mae": 70000.0, "r2": 0.8}
        ],
        "features": {
            "numeric": ["year", "kmDriven", "engineSize"],
            "categorical": ["brand", "model", "fuelType", "transmission"]
        },
        "training_date": "2024-05-01T10:00:00+00:00"
    })
}

pub const LEGACY_COLUMNS: [&str; 7] = [
    "year",
    "kmDriven",
    "engineSize",
    "age",
    "km_per_year",
    "brand_encoded",
    "fuelType_encoded",
];

pub fn legacy_preprocessor() -> Value {
    json!({"kind": "passthrough", "columns": LEGACY_COLUMNS})
}

/// `100000 - 10000*age + 5000*brand_index + 2000*fuel_index`
pub fn legacy_model() -> Value {
    json!({
        "kind": "linear",
        "intercept": 100000.0,
        "coefficients": [0.0, 0.0, 0.0, -10000.0, 0.0, 5000.0, 2000.0]
    })
}

pub fn legacy_metadata() -> Value {
    json!({
        "label_encoders": {
            "brand": ["Hyundai", "Maruti Suzuki", "Tata"],
            "fuelType": ["Diesel", "Petrol"]
        },
        "feature_columns": LEGACY_COLUMNS,
        "categorical_columns": ["brand", "fuelType"],
        "numerical_columns": ["year", "kmDriven", "engineSize"],
        "model_metrics": {"rmse": 50000.0, "r2_score": 0.62, "mae": 40000.0},
        "training_date": "2023-11-20T08:30:00"
    })
}

pub fn write_bundle(dir: &Path, preprocessor: &Value, model: &Value, metadata: &Value) {
    std::fs::create_dir_all(dir).expect("create bundle dir");
    for (file, value) in [
        (PREPROCESSOR_FILE, preprocessor),
        (MODEL_FILE, model),
        (METADATA_FILE, metadata),
    ] {
        let bytes = serde_json::to_vec_pretty(value).expect("serialize fixture");
        std::fs::write(dir.join(file), bytes).expect("write fixture");
    }
}

pub fn pipeline_bundle() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    write_bundle(
        dir.path(),
        &pipeline_preprocessor(),
        &pipeline_model(),
        &pipeline_metadata(0.91234),
    );
    dir
}

pub fn legacy_bundle() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    write_bundle(dir.path(), &legacy_preprocessor(), &legacy_model(), &legacy_metadata());
    dir
}
