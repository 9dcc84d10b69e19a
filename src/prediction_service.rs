//! Prediction orchestration: reconcile, transform, infer, assemble.
//!
//! The service is built once by the entry point and shared behind an `Arc`.
//! It holds no mutable state, so handlers call it concurrently without locks.

use crate::alias_table::AliasTable;
use crate::artifact_store::{ArtifactStore, LoadedArtifacts};
use crate::errors::{PredictorError, PredictorResult};
use crate::feature_reconciler::{PredictionRequest, Reconciler};
use crate::feature_schema::{EncodingStrategy, ModelMetrics};
use crate::regressor::Regression;
use crate::vocabulary::CategoricalVocabularies;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

pub const CONFIDENCE_FLOOR: f64 = 70.0;
pub const CONFIDENCE_CEILING: f64 = 95.0;
/// Used when the winning model has no recorded r2.
pub const DEFAULT_CONFIDENCE: f64 = 85.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionModelInfo {
    pub training_date: Option<String>,
    pub features_used: usize,
    pub model_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub predicted_price: f64,
    pub confidence: f64,
    pub rmse: Option<f64>,
    pub r2_score: Option<f64>,
    pub model_info: PredictionModelInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub best_model: String,
    pub model_metrics: Option<ModelMetrics>,
    pub candidate_metrics: Vec<ModelMetrics>,
    pub training_date: Option<String>,
    pub features_count: usize,
    pub categorical_features: Vec<String>,
    pub numerical_features: Vec<String>,
    pub encoding_strategy: &'static str,
    pub artifact_digest: Option<String>,
}

/// `clamp(r2 * 100, 70, 95)`, or the fixed default without an r2.
pub fn confidence_from_r2(r2: Option<f64>) -> f64 {
    match r2 {
        Some(r2) if r2.is_finite() => (r2 * 100.0).clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEILING),
        _ => DEFAULT_CONFIDENCE,
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub struct PredictionService {
    store: ArtifactStore,
    reconciler: Option<Reconciler>,
    aliases: AliasTable,
}

impl PredictionService {
    /// Binds the alias table against the loaded schema. A trained column no
    /// alias reaches is a startup error, not a per-request surprise.
    pub fn new(store: ArtifactStore, aliases: AliasTable, reference_year: i32) -> PredictorResult<Self> {
        let reconciler = match store.artifacts() {
            Some(artifacts) => {
                let reconciler = Reconciler::for_schema(&artifacts.schema, &aliases, reference_year)?;
                info!(
                    strategy = artifacts.schema.encoding.label(),
                    "feature reconciler ready"
                );
                Some(reconciler)
            }
            None => None,
        };
        Ok(Self {
            store,
            reconciler,
            aliases,
        })
    }

    /// Like `new`, but a schema the alias table cannot cover leaves the
    /// service unloaded so health checks report it.
    pub fn start(store: ArtifactStore, aliases: AliasTable, reference_year: i32) -> Self {
        let dir = store.dir().to_path_buf();
        match Self::new(store, aliases.clone(), reference_year) {
            Ok(service) => service,
            Err(e) => {
                error!(dir = %dir.display(), "artifacts rejected: {e}");
                Self {
                    store: ArtifactStore::failed(dir, e.to_string()),
                    reconciler: None,
                    aliases,
                }
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.store.is_loaded()
    }

    pub fn load_error(&self) -> Option<&str> {
        self.store.load_error()
    }

    fn loaded(&self) -> PredictorResult<(&Arc<LoadedArtifacts>, &Reconciler)> {
        match (self.store.artifacts(), self.reconciler.as_ref()) {
            (Some(artifacts), Some(reconciler)) => Ok((artifacts, reconciler)),
            _ => Err(PredictorError::ModelNotLoaded),
        }
    }

    pub fn predict(&self, request: &PredictionRequest) -> PredictorResult<PredictionResult> {
        let (artifacts, reconciler) = self.loaded()?;

        let row = reconciler.reconcile(request)?;
        debug!(columns = row.len(), "feature row built");

        let features = artifacts.preprocessor.transform(&row)?;
        let raw = artifacts
            .model
            .predict_row(&features)
            .map_err(PredictorError::prediction_failed)?;
        // rounding scales by 100 first, so a huge finite output can still overflow
        let price = round_to(raw, 2);
        if !price.is_finite() {
            return Err(PredictorError::prediction_failed(format!(
                "model produced non-finite price {raw}"
            )));
        }

        let schema = &artifacts.schema;
        let metrics = schema.best_metrics();
        let r2 = metrics.map(|m| m.r2);

        Ok(PredictionResult {
            predicted_price: price,
            confidence: round_to(confidence_from_r2(r2), 1),
            rmse: metrics.map(|m| round_to(m.rmse, 2)),
            r2_score: r2.map(|r| round_to(r, 4)),
            model_info: PredictionModelInfo {
                training_date: schema.training_date.clone(),
                features_used: schema.feature_count(),
                model_type: schema.best_model.clone(),
            },
        })
    }

    pub fn model_info(&self) -> PredictorResult<ModelInfo> {
        let artifacts = self.store.artifacts().ok_or(PredictorError::ModelInfoUnavailable)?;
        let schema = &artifacts.schema;
        Ok(ModelInfo {
            best_model: schema.best_model.clone(),
            model_metrics: schema.best_metrics().cloned(),
            candidate_metrics: schema.metrics.clone(),
            training_date: schema.training_date.clone(),
            features_count: schema.feature_count(),
            categorical_features: schema.categorical.clone(),
            numerical_features: schema.numeric.clone(),
            encoding_strategy: schema.encoding.label(),
            artifact_digest: artifacts.model_digest.clone(),
        })
    }

    /// Training-time category values per feature, keyed by canonical key
    /// where one exists.
    pub fn available_options(&self) -> PredictorResult<CategoricalVocabularies> {
        let artifacts = self.store.artifacts().ok_or(PredictorError::ModelInfoUnavailable)?;
        let vocabularies = match &artifacts.schema.encoding {
            EncodingStrategy::EncoderTable { vocabularies, .. } => vocabularies.clone(),
            EncodingStrategy::Pipeline => artifacts.preprocessor.vocabularies(),
        };
        Ok(vocabularies
            .into_iter()
            .map(|(column, vocab)| {
                let key = self
                    .aliases
                    .canonical_for(&column)
                    .map(str::to_string)
                    .unwrap_or(column);
                (key, vocab)
            })
            .collect())
    }
}
