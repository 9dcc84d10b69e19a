//! Offline training: CSV in, artifact bundle out.
//!
//! Columns are matched to canonical features through the alias table, the
//! column transformer is fitted on the training split only, and every
//! candidate regressor is scored on the holdout split. The lowest-RMSE
//! candidate is written next to the preprocessor and the metadata document.

use crate::alias_table::{AliasTable, TARGET_ALIASES};
use crate::artifact_store::{METADATA_FILE, MODEL_FILE, PREPROCESSOR_FILE};
use crate::errors::{PredictorError, PredictorResult};
use crate::feature_reconciler::{coerce_numeric_str, resolve_column_name, FeatureRow, FeatureValue};
use crate::feature_schema::{FeatureLists, ModelMetrics, PipelineMetadata};
use crate::preprocessor::{ColumnTransformer, Preprocessor};
use crate::regressor::{ForestModel, LinearModel, Regressor};
use aprender::linear_model::Ridge;
use aprender::metrics::{mae, r_squared, rmse};
use aprender::model_selection::train_test_split;
use aprender::prelude::{Estimator, Matrix, Vector};
use aprender::tree::RandomForestRegressor;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// Canonical keys treated as continuous inputs, in feature order.
pub const NUMERIC_KEYS: &[&str] = &["year", "kmDriven", "engineSize", "qualityScore", "cngKit"];
/// Canonical keys treated as categories, in feature order.
pub const CATEGORICAL_KEYS: &[&str] = &["brand", "model", "fuelType", "transmission", "city", "state"];

/// Keeps the normal equations solvable when one-hot blocks are collinear
/// with the intercept.
const RIDGE_ALPHA: f32 = 1e-2;
const MIN_ROWS: usize = 5;

#[derive(Debug, Clone)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 12,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingOptions {
    pub test_size: f64,
    pub seed: u64,
    pub forest: ForestParams,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
            forest: ForestParams::default(),
        }
    }
}

/// Column-major training data keyed by CSV header names.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub numeric: Vec<(String, Vec<Option<f64>>)>,
    pub categorical: Vec<(String, Vec<Option<String>>)>,
    pub target: Vec<f64>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    fn subset(&self, rows: &[usize]) -> Dataset {
        Dataset {
            numeric: self
                .numeric
                .iter()
                .map(|(name, col)| (name.clone(), rows.iter().map(|&r| col[r]).collect()))
                .collect(),
            categorical: self
                .categorical
                .iter()
                .map(|(name, col)| (name.clone(), rows.iter().map(|&r| col[r].clone()).collect()))
                .collect(),
            target: rows.iter().map(|&r| self.target[r]).collect(),
        }
    }

    fn row(&self, r: usize) -> FeatureRow {
        let mut row = FeatureRow::default();
        for (name, col) in &self.numeric {
            if let Some(v) = col[r] {
                row.insert(name.clone(), FeatureValue::Number(v));
            }
        }
        for (name, col) in &self.categorical {
            if let Some(v) = &col[r] {
                row.insert(name.clone(), FeatureValue::Category(v.clone()));
            }
        }
        row
    }

    fn feature_lists(&self) -> FeatureLists {
        FeatureLists {
            numeric: self.numeric.iter().map(|(n, _)| n.clone()).collect(),
            categorical: self.categorical.iter().map(|(n, _)| n.clone()).collect(),
        }
    }
}

/// Read a CSV and keep the columns the alias table recognises. `target`
/// overrides target detection through `TARGET_ALIASES`. Rows without a
/// parseable target are dropped.
pub fn load_csv(path: &Path, target: Option<&str>, aliases: &AliasTable) -> PredictorResult<Dataset> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let target_col = match target {
        Some(t) => resolve_column_name(&headers, &[t]),
        None => resolve_column_name(&headers, TARGET_ALIASES),
    }
    .ok_or_else(|| PredictorError::invalid_dataset("target column 'price' not found"))?;

    let locate = |keys: &[&str]| -> Vec<(String, usize)> {
        keys.iter()
            .filter_map(|key| aliases.aliases_for(key))
            .filter_map(|list| resolve_column_name(&headers, list))
            .filter(|col| col != &target_col)
            .filter_map(|col| headers.iter().position(|h| h == &col).map(|i| (col, i)))
            .collect()
    };
    let numeric_cols = locate(NUMERIC_KEYS);
    let categorical_cols = locate(CATEGORICAL_KEYS);
    if numeric_cols.is_empty() && categorical_cols.is_empty() {
        return Err(PredictorError::invalid_dataset("no recognised feature columns"));
    }
    let target_idx = headers
        .iter()
        .position(|h| h == &target_col)
        .ok_or_else(|| PredictorError::invalid_dataset("target column vanished"))?;

    let mut data = Dataset {
        numeric: numeric_cols.iter().map(|(n, _)| (n.clone(), Vec::new())).collect(),
        categorical: categorical_cols.iter().map(|(n, _)| (n.clone(), Vec::new())).collect(),
        target: Vec::new(),
    };

    let mut dropped = 0usize;
    for record in reader.records() {
        let record = record?;
        let Some(price) = record.get(target_idx).and_then(coerce_numeric_str) else {
            dropped += 1;
            continue;
        };
        data.target.push(price);
        for ((_, col), (_, idx)) in data.numeric.iter_mut().zip(&numeric_cols) {
            col.push(record.get(*idx).and_then(coerce_numeric_str));
        }
        for ((_, col), (_, idx)) in data.categorical.iter_mut().zip(&categorical_cols) {
            col.push(
                record
                    .get(*idx)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
            );
        }
    }

    if dropped > 0 {
        warn!(dropped, "dropped rows without a target value");
    }
    info!(
        rows = data.len(),
        numeric = ?data.feature_lists().numeric,
        categorical = ?data.feature_lists().categorical,
        target = %target_col,
        "dataset loaded"
    );
    Ok(data)
}

/// Fitted artifacts ready to be written.
#[derive(Debug, Clone, Serialize)]
pub struct TrainedBundle {
    pub preprocessor: Preprocessor,
    pub model: Regressor,
    pub metadata: PipelineMetadata,
}

impl TrainedBundle {
    pub fn write_to(&self, dir: &Path) -> PredictorResult<()> {
        std::fs::create_dir_all(dir)
            .map_err(|e| PredictorError::io(format!("creating {}", dir.display()), e))?;
        write_json(&dir.join(PREPROCESSOR_FILE), &self.preprocessor)?;
        write_json(&dir.join(MODEL_FILE), &self.model)?;
        write_json(&dir.join(METADATA_FILE), &self.metadata)?;
        info!(dir = %dir.display(), best = %self.metadata.best_model, "artifacts written");
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> PredictorResult<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| PredictorError::invalid_dataset(format!("serializing {}: {e}", path.display())))?;
    std::fs::write(path, bytes).map_err(|e| PredictorError::io(format!("writing {}", path.display()), e))
}

/// Split, fit, evaluate and select the best candidate.
pub fn train(data: &Dataset, options: &TrainingOptions) -> PredictorResult<TrainedBundle> {
    if data.len() < MIN_ROWS {
        return Err(PredictorError::invalid_dataset(format!(
            "need at least {MIN_ROWS} rows with a target, got {}",
            data.len()
        )));
    }

    let (train_rows, test_rows) = split_rows(data.len(), options.test_size, options.seed)?;
    let train_set = data.subset(&train_rows);
    let test_set = data.subset(&test_rows);

    let transformer = ColumnTransformer::fit(&train_set.numeric, &train_set.categorical)?;
    let x_train = design_matrix(&transformer, &train_set)?;
    let x_test = design_matrix(&transformer, &test_set)?;
    let y_train = target_vector(&train_set);
    let y_test = target_vector(&test_set);
    debug!(
        train = x_train.n_rows(),
        test = x_test.n_rows(),
        width = x_train.n_cols(),
        "design matrices built"
    );

    // (model, holdout predictions)
    let mut candidates: Vec<(Regressor, Vector<f32>)> = Vec::new();

    let mut ridge = Ridge::new(RIDGE_ALPHA);
    match ridge.fit(&x_train, &y_train) {
        Ok(()) => {
            let model = LinearModel::from_ridge(&ridge).map_err(PredictorError::invalid_dataset)?;
            candidates.push((Regressor::Linear(model), ridge.predict(&x_test)));
        }
        Err(e) => warn!(error = %e, "linear regression skipped"),
    }

    let mut forest = RandomForestRegressor::new(options.forest.n_trees.max(1))
        .with_max_depth(options.forest.max_depth.max(1))
        .with_random_state(options.seed);
    forest
        .fit(&x_train, &y_train)
        .map_err(|e| PredictorError::invalid_dataset(format!("random forest fit failed: {e}")))?;
    let predictions = forest.predict(&x_test);
    let forest = ForestModel::new(forest).map_err(PredictorError::invalid_dataset)?;
    candidates.push((Regressor::RandomForest(forest), predictions));

    let mut metrics = Vec::with_capacity(candidates.len());
    let mut best: Option<(f64, Regressor)> = None;
    for (candidate, predictions) in candidates {
        let m = evaluate(candidate.label(), &y_test, &predictions);
        info!(model = %m.model, rmse = m.rmse, mae = m.mae, r2 = m.r2, "candidate evaluated");
        let score = m.rmse;
        metrics.push(m);
        if best.as_ref().map_or(true, |(b, _)| score < *b) {
            best = Some((score, candidate));
        }
    }
    let (_, model) = best.ok_or_else(|| PredictorError::invalid_dataset("no candidate model could be fitted"))?;

    Ok(TrainedBundle {
        metadata: PipelineMetadata {
            best_model: model.label().to_string(),
            metrics,
            features: data.feature_lists(),
            training_date: Some(chrono::Utc::now().to_rfc3339()),
        },
        preprocessor: Preprocessor::ColumnTransformer(transformer),
        model,
    })
}

/// Seeded train/holdout split of row indices.
fn split_rows(n: usize, test_size: f64, seed: u64) -> PredictorResult<(Vec<usize>, Vec<usize>)> {
    let ids: Vec<f32> = (0..n).map(|i| i as f32).collect();
    let x = Matrix::from_vec(n, 1, ids.clone()).map_err(PredictorError::invalid_dataset)?;
    let y = Vector::from_slice(&ids);
    let (train_ids, test_ids, _, _) = train_test_split(&x, &y, test_size as f32, Some(seed))
        .map_err(|e| PredictorError::invalid_dataset(format!("cannot split dataset: {e}")))?;

    let rows = |m: &Matrix<f32>| -> Vec<usize> { m.as_slice().iter().map(|&id| id as usize).collect() };
    Ok((rows(&train_ids), rows(&test_ids)))
}

fn design_matrix(transformer: &ColumnTransformer, data: &Dataset) -> PredictorResult<Matrix<f32>> {
    let width = transformer.output_width();
    let mut values = Vec::with_capacity(data.len() * width);
    for r in 0..data.len() {
        values.extend(transformer.transform(&data.row(r))?.into_iter().map(|v| v as f32));
    }
    Matrix::from_vec(data.len(), width, values).map_err(PredictorError::invalid_dataset)
}

fn target_vector(data: &Dataset) -> Vector<f32> {
    let target: Vec<f32> = data.target.iter().map(|&y| y as f32).collect();
    Vector::from_slice(&target)
}

/// Holdout metrics for one candidate.
pub fn evaluate(name: &str, y_true: &Vector<f32>, y_pred: &Vector<f32>) -> ModelMetrics {
    ModelMetrics {
        model: name.to_string(),
        rmse: f64::from(rmse(y_pred, y_true)),
        mae: f64::from(mae(y_pred, y_true)),
        r2: f64::from(r_squared(y_pred, y_true)),
    }
}
