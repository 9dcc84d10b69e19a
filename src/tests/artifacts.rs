use crate::artifact_store::{load, ArtifactStore, MODEL_FILE, PREPROCESSOR_FILE};
use crate::errors::PredictorError;
use crate::feature_schema::EncodingStrategy;
use crate::tests::test_utils::*;
use serde_json::json;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

#[test]
fn loads_pipeline_bundle_and_records_digest() {
    let dir = pipeline_bundle();
    let artifacts = load(dir.path()).expect("pipeline bundle loads");

    assert_eq!(artifacts.schema.encoding, EncodingStrategy::Pipeline);
    assert_eq!(artifacts.schema.feature_count(), 7);
    assert_eq!(artifacts.preprocessor.output_width(), 11);

    let bytes = std::fs::read(dir.path().join(MODEL_FILE)).unwrap();
    let expected = format!("{:x}", Sha256::digest(&bytes));
    assert_eq!(artifacts.model_digest.as_deref(), Some(expected.as_str()));
}

#[test]
fn loads_legacy_bundle_as_encoder_table() {
    let dir = legacy_bundle();
    let artifacts = load(dir.path()).expect("legacy bundle loads");

    assert_eq!(artifacts.schema.encoding.label(), "encoder_table");
    assert_eq!(artifacts.schema.best_model, "LinearRegression");
    assert_eq!(artifacts.schema.best_metrics().map(|m| m.r2), Some(0.62));
}

#[test]
fn missing_file_is_reported_before_parsing() {
    let dir = pipeline_bundle();
    std::fs::remove_file(dir.path().join(MODEL_FILE)).unwrap();
    // a corrupt sibling must not mask the missing file
    std::fs::write(dir.path().join(PREPROCESSOR_FILE), b"{not json").unwrap();

    match load(dir.path()) {
        Err(PredictorError::ArtifactMissing { artifact, .. }) => assert_eq!(artifact, MODEL_FILE),
        other => panic!("expected ArtifactMissing, got {other:?}"),
    }
}

#[test]
fn unparseable_file_is_corrupt() {
    let dir = pipeline_bundle();
    std::fs::write(dir.path().join(MODEL_FILE), b"\x00\x01garbage").unwrap();

    match load(dir.path()) {
        Err(PredictorError::ArtifactCorrupt { artifact, .. }) => assert_eq!(artifact, MODEL_FILE),
        other => panic!("expected ArtifactCorrupt, got {other:?}"),
    }
}

#[test]
fn width_mismatch_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let narrow_model = json!({"kind": "linear", "intercept": 1.0, "coefficients": [1.0, 2.0]});
    write_bundle(dir.path(), &pipeline_preprocessor(), &narrow_model, &pipeline_metadata(0.9));

    let err = load(dir.path()).unwrap_err();
    assert!(matches!(err, PredictorError::ArtifactCorrupt { .. }));
    assert!(err.to_string().contains("produces 11"));
}

#[test]
fn feature_lists_must_match_preprocessor() {
    let dir = TempDir::new().unwrap();
    let mut metadata = pipeline_metadata(0.9);
    metadata["features"]["numeric"] = json!(["kmDriven", "year", "engineSize"]);
    write_bundle(dir.path(), &pipeline_preprocessor(), &pipeline_model(), &metadata);

    assert!(matches!(load(dir.path()), Err(PredictorError::ArtifactCorrupt { .. })));
}

#[test]
fn mixed_strategies_are_rejected() {
    let dir = TempDir::new().unwrap();
    write_bundle(dir.path(), &legacy_preprocessor(), &legacy_model(), &pipeline_metadata(0.9));

    let err = load(dir.path()).unwrap_err();
    assert!(err.to_string().contains("pipeline bundle"));
}

#[test]
fn store_keeps_load_error_for_health() {
    let dir = TempDir::new().unwrap();
    let store = ArtifactStore::open(dir.path());

    assert!(!store.is_loaded());
    assert!(store.artifacts().is_none());
    assert!(store.load_error().unwrap().contains("Artifact missing"));
}

#[test]
fn unloaded_store_is_safe_to_query() {
    let store = ArtifactStore::unloaded("models");
    assert!(!store.is_loaded());
    assert!(store.load_error().is_none());
}
