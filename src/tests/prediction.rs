use crate::alias_table::AliasTable;
use crate::artifact_store::ArtifactStore;
use crate::errors::PredictorError;
use crate::feature_reconciler::PredictionRequest;
use crate::prediction_service::{confidence_from_r2, PredictionService, DEFAULT_CONFIDENCE};
use crate::tests::test_utils::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;

fn service_for(dir: &Path) -> PredictionService {
    PredictionService::new(ArtifactStore::open(dir), AliasTable::default(), 2024)
        .expect("service builds")
}

fn swift_request() -> PredictionRequest {
    PredictionRequest::new()
        .with("brand", "Maruti Suzuki")
        .with("model", "Swift")
        .with("year", 2022)
        .with("kmDriven", 15000)
        .with("fuelType", "Petrol")
        .with("transmission", "Manual")
        .with("engineSize", 1.2)
}

#[test]
fn predicts_swift_scenario() {
    let dir = pipeline_bundle();
    let service = service_for(dir.path());

    let result = service.predict(&swift_request()).expect("prediction succeeds");

    // 600000 + 50000 * 2 - 30000 * -1.25
    assert_eq!(result.predicted_price, 737500.0);
    assert_eq!(result.confidence, 91.2);
    assert_eq!(result.rmse, Some(81234.57));
    assert_eq!(result.r2_score, Some(0.9123));
    assert_eq!(result.model_info.features_used, 7);
    assert_eq!(result.model_info.model_type, "LinearRegression");
    assert_eq!(
        result.model_info.training_date.as_deref(),
        Some("2024-05-01T10:00:00+00:00")
    );
}

#[test]
fn aliased_and_partial_request_is_imputed() {
    let dir = pipeline_bundle();
    let service = service_for(dir.path());

    let request = PredictionRequest::new()
        .with("Make", "Hyundai")
        .with("modelYear", "2020")
        .with("mileage", "60,000 km")
        .with("ft", "Diesel");
    let result = service.predict(&request).unwrap();

    // model and transmission fall back to Swift/Manual, engine to its median
    assert_eq!(result.predicted_price, 665000.0);
}

#[test]
fn prediction_is_idempotent() {
    let dir = pipeline_bundle();
    let service = service_for(dir.path());

    let first = service.predict(&swift_request()).unwrap();
    let second = service.predict(&swift_request()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn request_without_known_fields_is_rejected() {
    let dir = pipeline_bundle();
    let service = service_for(dir.path());

    let request = PredictionRequest::new().with("color", "red").with("owner", 1);
    let err = service.predict(&request).unwrap_err();
    assert!(matches!(err, PredictorError::NoMatchingFeatures { .. }));
    assert!(err.is_client_error());
}

#[test]
fn unloaded_service_refuses_requests() {
    let dir = TempDir::new().unwrap();
    let service = service_for(dir.path());

    assert!(!service.is_loaded());
    assert!(matches!(
        service.predict(&swift_request()),
        Err(PredictorError::ModelNotLoaded)
    ));
    assert!(matches!(service.model_info(), Err(PredictorError::ModelInfoUnavailable)));
    assert!(matches!(
        service.available_options(),
        Err(PredictorError::ModelInfoUnavailable)
    ));
}

#[test]
fn confidence_is_clamped() {
    assert_eq!(confidence_from_r2(Some(0.5)), 70.0);
    assert_eq!(confidence_from_r2(Some(0.99)), 95.0);
    assert_eq!(confidence_from_r2(Some(0.8)), 80.0);
    assert_eq!(confidence_from_r2(None), DEFAULT_CONFIDENCE);
    assert_eq!(confidence_from_r2(Some(f64::NAN)), DEFAULT_CONFIDENCE);
}

#[test]
fn missing_best_model_metrics_uses_fixed_confidence() {
    let dir = TempDir::new().unwrap();
    let mut metadata = pipeline_metadata(0.9);
    metadata["metrics"] = json!([{"model": "RandomForest", "rmse": 1.0, "mae": 1.0, "r2": 0.99}]);
    write_bundle(dir.path(), &pipeline_preprocessor(), &pipeline_model(), &metadata);
    let service = service_for(dir.path());

    let result = service.predict(&swift_request()).unwrap();
    assert_eq!(result.confidence, 85.0);
    assert_eq!(result.rmse, None);
    assert_eq!(result.r2_score, None);
}

#[test]
fn non_finite_output_fails_the_prediction() {
    let dir = TempDir::new().unwrap();
    let mut model = pipeline_model();
    model["intercept"] = json!(1.7e308);
    model["coefficients"][0] = json!(1.7e308);
    write_bundle(dir.path(), &pipeline_preprocessor(), &model, &pipeline_metadata(0.9));
    let service = service_for(dir.path());

    let err = service.predict(&swift_request()).unwrap_err();
    assert!(matches!(err, PredictorError::PredictionFailed { .. }));
}

#[test]
fn price_overflowing_when_rounded_fails_the_prediction() {
    let dir = TempDir::new().unwrap();
    let mut model = pipeline_model();
    model["intercept"] = json!(1.7e307);
    model["coefficients"] = json!(vec![0.0; 11]);
    write_bundle(dir.path(), &pipeline_preprocessor(), &model, &pipeline_metadata(0.9));
    let service = service_for(dir.path());

    let err = service.predict(&swift_request()).unwrap_err();
    assert!(matches!(err, PredictorError::PredictionFailed { .. }));
}

#[test]
fn legacy_bundle_encodes_unknown_brand_as_zero() {
    let dir = legacy_bundle();
    let service = service_for(dir.path());

    let request = PredictionRequest::new()
        .with("brand", "Tesla")
        .with("year", 2020)
        .with("kmDriven", 40000)
        .with("fuelType", "Petrol");
    let result = service.predict(&request).unwrap();

    // 100000 - 10000 * age(4) + 5000 * 0 + 2000 * 1
    assert_eq!(result.predicted_price, 62000.0);
    assert_eq!(result.confidence, 70.0);
    assert_eq!(result.r2_score, Some(0.62));
}

#[test]
fn unmapped_trained_column_fails_fast() {
    let dir = TempDir::new().unwrap();
    let mut preprocessor = pipeline_preprocessor();
    preprocessor["numeric"]
        .as_array_mut()
        .unwrap()
        .push(json!({"name": "sunroof", "median": 0.0, "mean": 0.5, "scale": 0.5}));
    let mut metadata = pipeline_metadata(0.9);
    metadata["features"]["numeric"] = json!(["year", "kmDriven", "engineSize", "sunroof"]);
    let mut model = pipeline_model();
    model["coefficients"].as_array_mut().unwrap().push(json!(0.0));
    write_bundle(dir.path(), &preprocessor, &model, &metadata);

    let err = PredictionService::new(ArtifactStore::open(dir.path()), AliasTable::default(), 2024)
        .err()
        .expect("unmapped column rejected");
    assert!(matches!(err, PredictorError::UnmappedFeature { ref column } if column == "sunroof"));

    let degraded = PredictionService::start(ArtifactStore::open(dir.path()), AliasTable::default(), 2024);
    assert!(!degraded.is_loaded());
    assert!(degraded.load_error().unwrap().contains("sunroof"));

    let mut extra = BTreeMap::new();
    extra.insert("sunroof".to_string(), vec!["sunroof".to_string(), "has_sunroof".to_string()]);
    let aliases = AliasTable::with_extra(&extra).unwrap();
    let service = PredictionService::new(ArtifactStore::open(dir.path()), aliases, 2024).unwrap();
    let request = swift_request().with("has_sunroof", true);
    assert!(service.predict(&request).is_ok());
}

#[test]
fn model_info_reports_schema_and_digest() {
    let dir = pipeline_bundle();
    let service = service_for(dir.path());

    let info = service.model_info().unwrap();
    assert_eq!(info.best_model, "LinearRegression");
    assert_eq!(info.features_count, 7);
    assert_eq!(info.numerical_features, vec!["year", "kmDriven", "engineSize"]);
    assert_eq!(info.categorical_features.len(), 4);
    assert_eq!(info.candidate_metrics.len(), 2);
    assert_eq!(info.model_metrics.map(|m| m.rmse), Some(81234.567));
    assert_eq!(info.encoding_strategy, "pipeline");
    assert_eq!(info.artifact_digest.map(|d| d.len()), Some(64));
}

#[test]
fn options_come_from_the_fitted_encoder() {
    let dir = pipeline_bundle();
    let service = service_for(dir.path());

    let options = service.available_options().unwrap();
    assert_eq!(options.len(), 4);
    assert_eq!(options["brand"].values(), ["Hyundai", "Maruti Suzuki"]);
    assert_eq!(options["transmission"].values(), ["Automatic", "Manual"]);
}

#[test]
fn options_come_from_legacy_label_encoders() {
    let dir = legacy_bundle();
    let service = service_for(dir.path());

    let options = service.available_options().unwrap();
    assert_eq!(options["brand"].values(), ["Hyundai", "Maruti Suzuki", "Tata"]);
    assert_eq!(options["fuelType"].len(), 2);
    assert!(options.get("model").is_none());
}
