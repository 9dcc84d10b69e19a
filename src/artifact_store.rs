//! Loads the artifact bundle written by the trainer.
//!
//! A bundle is three files in one directory. The store tries to load them
//! exactly once; afterwards it is either `Loaded` with immutable artifacts
//! shared behind an `Arc`, or `Unloaded` with the reason kept for health
//! reporting. There is no reload path.

use crate::errors::{PredictorError, PredictorResult};
use crate::feature_schema::{EncodingStrategy, FeatureSchema, MetadataDocument};
use crate::preprocessor::Preprocessor;
use crate::regressor::{Regression, Regressor};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

pub const PREPROCESSOR_FILE: &str = "preprocessor.json";
pub const MODEL_FILE: &str = "model.json";
pub const METADATA_FILE: &str = "model_info.json";

/// Everything needed to serve predictions, validated for consistency.
#[derive(Debug, Clone)]
pub struct LoadedArtifacts {
    pub preprocessor: Preprocessor,
    pub model: Regressor,
    pub schema: FeatureSchema,
    /// Hex SHA-256 of the model file as read from disk.
    pub model_digest: Option<String>,
}

impl LoadedArtifacts {
    /// Assemble artifacts already in memory, checking the same invariants
    /// as a disk load.
    pub fn new(
        preprocessor: Preprocessor,
        model: Regressor,
        schema: FeatureSchema,
    ) -> PredictorResult<Self> {
        let artifacts = Self {
            preprocessor,
            model,
            schema,
            model_digest: None,
        };
        artifacts.check_consistency()?;
        Ok(artifacts)
    }

    fn check_consistency(&self) -> PredictorResult<()> {
        self.preprocessor
            .validate()
            .map_err(|m| PredictorError::artifact_corrupt(PREPROCESSOR_FILE, m))?;
        self.model
            .validate()
            .map_err(|m| PredictorError::artifact_corrupt(MODEL_FILE, m))?;

        let width = self.preprocessor.output_width();
        if self.model.n_features() != width {
            return Err(PredictorError::artifact_corrupt(
                MODEL_FILE,
                format!(
                    "model expects {} features but the preprocessor produces {width}",
                    self.model.n_features()
                ),
            ));
        }

        let inputs = self.preprocessor.input_columns();
        match (&self.schema.encoding, &self.preprocessor) {
            (EncodingStrategy::Pipeline, Preprocessor::ColumnTransformer(_)) => {
                let trained = self.schema.trained_columns();
                if inputs != trained {
                    return Err(PredictorError::artifact_corrupt(
                        METADATA_FILE,
                        format!("feature lists {trained:?} do not match preprocessor columns {inputs:?}"),
                    ));
                }
            }
            (EncodingStrategy::EncoderTable { feature_columns, .. }, Preprocessor::Passthrough { .. }) => {
                if &inputs != feature_columns {
                    return Err(PredictorError::artifact_corrupt(
                        METADATA_FILE,
                        format!("feature_columns {feature_columns:?} do not match preprocessor columns {inputs:?}"),
                    ));
                }
            }
            (encoding, _) => {
                return Err(PredictorError::artifact_corrupt(
                    PREPROCESSOR_FILE,
                    format!("preprocessor kind does not fit a {} bundle", encoding.label()),
                ));
            }
        }
        Ok(())
    }
}

fn read_artifact(path: &Path, name: &str) -> PredictorResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            PredictorError::artifact_missing(name, path.display().to_string())
        }
        _ => PredictorError::io(format!("reading {}", path.display()), e),
    })
}

fn parse_artifact<T: DeserializeOwned>(bytes: &[u8], name: &str) -> PredictorResult<T> {
    serde_json::from_slice(bytes).map_err(|e| PredictorError::artifact_corrupt(name, e.to_string()))
}

/// Read and validate the bundle in `dir`.
pub fn load(dir: &Path) -> PredictorResult<LoadedArtifacts> {
    let preprocessor_path = dir.join(PREPROCESSOR_FILE);
    let model_path = dir.join(MODEL_FILE);
    let metadata_path = dir.join(METADATA_FILE);

    // report a missing file before trying to parse any of them
    for (path, name) in [
        (&preprocessor_path, PREPROCESSOR_FILE),
        (&model_path, MODEL_FILE),
        (&metadata_path, METADATA_FILE),
    ] {
        if !path.is_file() {
            return Err(PredictorError::artifact_missing(name, path.display().to_string()));
        }
    }

    let preprocessor: Preprocessor =
        parse_artifact(&read_artifact(&preprocessor_path, PREPROCESSOR_FILE)?, PREPROCESSOR_FILE)?;
    let model_bytes = read_artifact(&model_path, MODEL_FILE)?;
    let model: Regressor = parse_artifact(&model_bytes, MODEL_FILE)?;
    let document: MetadataDocument =
        parse_artifact(&read_artifact(&metadata_path, METADATA_FILE)?, METADATA_FILE)?;

    let schema = FeatureSchema::from_document(document, model.label());
    let mut artifacts = LoadedArtifacts::new(preprocessor, model, schema)?;
    artifacts.model_digest = Some(format!("{:x}", Sha256::digest(&model_bytes)));
    Ok(artifacts)
}

#[derive(Debug, Clone)]
pub enum ArtifactState {
    Unloaded { reason: Option<String> },
    Loaded(Arc<LoadedArtifacts>),
}

/// Read-only holder of the loaded bundle.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    state: ArtifactState,
}

impl ArtifactStore {
    /// Attempt a load from `dir`; failure leaves the store unloaded.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let state = match load(&dir) {
            Ok(artifacts) => {
                info!(
                    dir = %dir.display(),
                    model = artifacts.model.label(),
                    strategy = artifacts.schema.encoding.label(),
                    features = artifacts.schema.feature_count(),
                    "artifacts loaded"
                );
                ArtifactState::Loaded(Arc::new(artifacts))
            }
            Err(e) => {
                error!(dir = %dir.display(), "failed to load artifacts: {e}");
                ArtifactState::Unloaded {
                    reason: Some(e.to_string()),
                }
            }
        };
        Self { dir, state }
    }

    pub fn unloaded(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            state: ArtifactState::Unloaded { reason: None },
        }
    }

    /// An unloaded store carrying a failure found after loading.
    pub fn failed(dir: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            state: ArtifactState::Unloaded {
                reason: Some(reason.into()),
            },
        }
    }

    pub fn from_artifacts(dir: impl Into<PathBuf>, artifacts: LoadedArtifacts) -> Self {
        Self {
            dir: dir.into(),
            state: ArtifactState::Loaded(Arc::new(artifacts)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, ArtifactState::Loaded(_))
    }

    pub fn artifacts(&self) -> Option<&Arc<LoadedArtifacts>> {
        match &self.state {
            ArtifactState::Loaded(a) => Some(a),
            ArtifactState::Unloaded { .. } => None,
        }
    }

    pub fn load_error(&self) -> Option<&str> {
        match &self.state {
            ArtifactState::Unloaded { reason } => reason.as_deref(),
            ArtifactState::Loaded(_) => None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
