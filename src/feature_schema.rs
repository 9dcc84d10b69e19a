//! Metadata document written by the trainer and the schema derived from it.
//!
//! Two document shapes exist. Current bundles list raw feature names and
//! per-candidate metrics; the preprocessing pipeline does all encoding.
//! Legacy bundles carry label-encoder vocabularies and an explicit column
//! order, and the reconciler encodes categories itself.

use crate::vocabulary::{CategoricalVocabularies, CategoricalVocabulary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Holdout metrics for one candidate model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub model: String,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureLists {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
}

/// Metadata produced alongside a fitted column-transformer pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub best_model: String,
    pub metrics: Vec<ModelMetrics>,
    pub features: FeatureLists,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyMetrics {
    pub rmse: f64,
    pub r2_score: f64,
    pub mae: f64,
}

/// Metadata of label-encoded bundles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderTableMetadata {
    pub label_encoders: BTreeMap<String, CategoricalVocabulary>,
    pub feature_columns: Vec<String>,
    #[serde(default)]
    pub categorical_columns: Vec<String>,
    #[serde(default)]
    pub numerical_columns: Vec<String>,
    pub model_metrics: LegacyMetrics,
    pub training_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataDocument {
    Pipeline(PipelineMetadata),
    EncoderTable(EncoderTableMetadata),
}

/// How request values become model inputs. Fixed per loaded bundle.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodingStrategy {
    /// Raw values go to the fitted pipeline, which imputes and encodes.
    Pipeline,
    /// Deprecated: categories are label-encoded here, engineered features
    /// derived, and the pipeline passes columns through untouched.
    EncoderTable {
        vocabularies: CategoricalVocabularies,
        feature_columns: Vec<String>,
    },
}

impl EncodingStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            EncodingStrategy::Pipeline => "pipeline",
            EncodingStrategy::EncoderTable { .. } => "encoder_table",
        }
    }
}

/// The trained feature schema, immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
    pub training_date: Option<String>,
    pub metrics: Vec<ModelMetrics>,
    pub best_model: String,
    pub encoding: EncodingStrategy,
}

impl FeatureSchema {
    /// Legacy documents never recorded the winning model's name, so the
    /// caller supplies the label of the loaded model.
    pub fn from_document(doc: MetadataDocument, model_label: &str) -> Self {
        match doc {
            MetadataDocument::Pipeline(meta) => Self {
                numeric: meta.features.numeric,
                categorical: meta.features.categorical,
                training_date: meta.training_date,
                metrics: meta.metrics,
                best_model: meta.best_model,
                encoding: EncodingStrategy::Pipeline,
            },
            MetadataDocument::EncoderTable(meta) => Self {
                numeric: meta.numerical_columns,
                categorical: meta.categorical_columns,
                training_date: Some(meta.training_date),
                metrics: vec![ModelMetrics {
                    model: model_label.to_string(),
                    rmse: meta.model_metrics.rmse,
                    mae: meta.model_metrics.mae,
                    r2: meta.model_metrics.r2_score,
                }],
                best_model: model_label.to_string(),
                encoding: EncodingStrategy::EncoderTable {
                    vocabularies: meta.label_encoders,
                    feature_columns: meta.feature_columns,
                },
            },
        }
    }

    /// Columns the reconciler may populate, numeric first.
    pub fn trained_columns(&self) -> Vec<String> {
        self.numeric
            .iter()
            .chain(self.categorical.iter())
            .cloned()
            .collect()
    }

    pub fn is_numeric(&self, column: &str) -> bool {
        self.numeric.iter().any(|c| c == column)
    }

    /// Number of columns the model consumes after reconciliation.
    pub fn feature_count(&self) -> usize {
        match &self.encoding {
            EncodingStrategy::Pipeline => self.numeric.len() + self.categorical.len(),
            EncodingStrategy::EncoderTable { feature_columns, .. } => feature_columns.len(),
        }
    }

    pub fn best_metrics(&self) -> Option<&ModelMetrics> {
        self.metrics.iter().find(|m| m.model == self.best_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pipeline_document() {
        let doc: MetadataDocument = serde_json::from_str(
            r#"{
                "best_model": "RandomForest",
                "metrics": [
                    {"model": "LinearRegression", "rmse": 210000.0, "mae": 150000.0, "r2": 0.71},
                    {"model": "RandomForest", "rmse": 120000.0, "mae": 80000.0, "r2": 0.91}
                ],
                "features": {"numeric": ["year", "kmDriven"], "categorical": ["brand"]}
            }"#,
        )
        .unwrap();

        let schema = FeatureSchema::from_document(doc, "ignored");
        assert_eq!(schema.encoding, EncodingStrategy::Pipeline);
        assert_eq!(schema.trained_columns(), vec!["year", "kmDriven", "brand"]);
        assert_eq!(schema.best_metrics().unwrap().r2, 0.91);
        assert!(schema.training_date.is_none());
    }

    #[test]
    fn parses_encoder_table_document() {
        let doc: MetadataDocument = serde_json::from_str(
            r#"{
                "label_encoders": {"brand": ["Hyundai", "Maruti Suzuki"]},
                "feature_columns": ["year", "brand_encoded"],
                "categorical_columns": ["brand"],
                "numerical_columns": ["year"],
                "model_metrics": {"rmse": 95000.0, "r2_score": 0.88, "mae": 60000.0},
                "training_date": "2024-03-01T10:00:00"
            }"#,
        )
        .unwrap();

        let schema = FeatureSchema::from_document(doc, "RandomForest");
        assert_eq!(schema.best_model, "RandomForest");
        assert_eq!(schema.feature_count(), 2);
        assert_eq!(schema.best_metrics().unwrap().r2, 0.88);
        assert_eq!(schema.encoding.label(), "encoder_table");
    }

    #[test]
    fn missing_best_model_metrics_is_none() {
        let schema = FeatureSchema {
            numeric: vec!["year".into()],
            categorical: vec![],
            training_date: None,
            metrics: vec![],
            best_model: "XGBRegressor".into(),
            encoding: EncodingStrategy::Pipeline,
        };
        assert!(schema.best_metrics().is_none());
    }
}
