//! Fitted preprocessing pipeline stored as `preprocessor.json`.
//!
//! The column transformer imputes numeric columns with their training median
//! and standardises them, then imputes categorical columns with the most
//! frequent training value and one-hot encodes them. Categories unseen at
//! training time encode as all zeros.

use crate::errors::{PredictorError, PredictorResult};
use crate::feature_reconciler::{FeatureRow, FeatureValue};
use crate::vocabulary::{CategoricalVocabularies, CategoricalVocabulary};
use aprender::preprocessing::StandardScaler;
use aprender::prelude::{Matrix, Transformer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    pub name: String,
    pub median: f64,
    pub mean: f64,
    pub scale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub name: String,
    pub most_frequent: String,
    pub categories: CategoricalVocabulary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTransformer {
    pub numeric: Vec<NumericColumn>,
    pub categorical: Vec<CategoricalColumn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Preprocessor {
    ColumnTransformer(ColumnTransformer),
    /// Emits the named numeric columns unchanged, 0 when absent.
    Passthrough { columns: Vec<String> },
}

impl Preprocessor {
    pub fn input_columns(&self) -> Vec<&str> {
        match self {
            Preprocessor::ColumnTransformer(ct) => ct
                .numeric
                .iter()
                .map(|c| c.name.as_str())
                .chain(ct.categorical.iter().map(|c| c.name.as_str()))
                .collect(),
            Preprocessor::Passthrough { columns } => columns.iter().map(String::as_str).collect(),
        }
    }

    pub fn output_width(&self) -> usize {
        match self {
            Preprocessor::ColumnTransformer(ct) => ct.output_width(),
            Preprocessor::Passthrough { columns } => columns.len(),
        }
    }

    pub fn transform(&self, row: &FeatureRow) -> PredictorResult<Vec<f64>> {
        match self {
            Preprocessor::ColumnTransformer(ct) => ct.transform(row),
            Preprocessor::Passthrough { columns } => columns
                .iter()
                .map(|column| match row.get(column) {
                    None => Ok(0.0),
                    Some(FeatureValue::Number(n)) => Ok(*n),
                    Some(FeatureValue::Category(c)) => Err(PredictorError::prediction_failed(
                        format!("column '{column}' expects a number, got category '{c}'"),
                    )),
                })
                .collect(),
        }
    }

    /// Vocabularies of one-hot encoded columns.
    pub fn vocabularies(&self) -> CategoricalVocabularies {
        match self {
            Preprocessor::ColumnTransformer(ct) => ct
                .categorical
                .iter()
                .map(|c| (c.name.clone(), c.categories.clone()))
                .collect(),
            Preprocessor::Passthrough { .. } => CategoricalVocabularies::new(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            Preprocessor::ColumnTransformer(ct) => {
                for col in &ct.numeric {
                    if !(col.median.is_finite() && col.mean.is_finite()) {
                        return Err(format!("numeric column '{}' has non-finite statistics", col.name));
                    }
                    if !col.scale.is_finite() || col.scale <= 0.0 {
                        return Err(format!("numeric column '{}' has invalid scale {}", col.name, col.scale));
                    }
                }
                for col in &ct.categorical {
                    if col.categories.is_empty() {
                        return Err(format!("categorical column '{}' has no categories", col.name));
                    }
                }
                Ok(())
            }
            Preprocessor::Passthrough { columns } if columns.is_empty() => {
                Err("passthrough preprocessor has no columns".to_string())
            }
            Preprocessor::Passthrough { .. } => Ok(()),
        }
    }
}

impl ColumnTransformer {
    pub fn transform(&self, row: &FeatureRow) -> PredictorResult<Vec<f64>> {
        let mut out = Vec::with_capacity(self.numeric.len());

        for col in &self.numeric {
            let raw = match row.get(&col.name) {
                None => col.median,
                Some(FeatureValue::Number(n)) if n.is_finite() => *n,
                Some(FeatureValue::Number(_)) => col.median,
                Some(FeatureValue::Category(c)) => {
                    return Err(PredictorError::prediction_failed(format!(
                        "numeric column '{}' received category '{c}'",
                        col.name
                    )))
                }
            };
            out.push((raw - col.mean) / col.scale);
        }

        for col in &self.categorical {
            let value = match row.get(&col.name) {
                Some(FeatureValue::Category(c)) => c.as_str(),
                Some(FeatureValue::Number(n)) => {
                    return Err(PredictorError::prediction_failed(format!(
                        "categorical column '{}' received number {n}",
                        col.name
                    )))
                }
                None => col.most_frequent.as_str(),
            };
            let hot = col.categories.index_of(value);
            out.extend((0..col.categories.len()).map(|i| if Some(i) == hot { 1.0 } else { 0.0 }));
        }

        Ok(out)
    }

    pub fn output_width(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(|c| c.categories.len()).sum::<usize>()
    }

    /// Fit imputers, scalers and encoders from column-major training data.
    pub fn fit(
        numeric: &[(String, Vec<Option<f64>>)],
        categorical: &[(String, Vec<Option<String>>)],
    ) -> PredictorResult<Self> {
        let numeric = fit_numeric(numeric)?;
        let categorical = categorical
            .iter()
            .map(|(name, values)| fit_categorical(name, values))
            .collect();
        Ok(Self { numeric, categorical })
    }
}

fn median(values: &[Option<f64>]) -> f64 {
    let mut present: Vec<f64> = values.iter().flatten().copied().filter(|v| v.is_finite()).collect();
    present.sort_by(|a, b| a.total_cmp(b));
    match present.len() {
        0 => 0.0,
        n if n % 2 == 1 => present[n / 2],
        n => (present[n / 2 - 1] + present[n / 2]) / 2.0,
    }
}

/// Median imputation, then a standard scaler fitted on the imputed columns.
fn fit_numeric(columns: &[(String, Vec<Option<f64>>)]) -> PredictorResult<Vec<NumericColumn>> {
    if columns.is_empty() {
        return Ok(Vec::new());
    }
    let medians: Vec<f64> = columns.iter().map(|(_, values)| median(values)).collect();
    let n_rows = columns[0].1.len();

    let mut imputed = Vec::with_capacity(n_rows * columns.len());
    for r in 0..n_rows {
        for ((_, values), fill) in columns.iter().zip(&medians) {
            let v = values.get(r).copied().flatten().filter(|x| x.is_finite()).unwrap_or(*fill);
            imputed.push(v as f32);
        }
    }
    let matrix = Matrix::from_vec(n_rows, columns.len(), imputed).map_err(PredictorError::invalid_dataset)?;

    let mut scaler = StandardScaler::new();
    scaler
        .fit(&matrix)
        .map_err(|e| PredictorError::invalid_dataset(format!("fitting standard scaler: {e}")))?;

    Ok(columns
        .iter()
        .zip(medians)
        .zip(scaler.mean().iter().zip(scaler.std()))
        .map(|(((name, _), median), (&mean, &sd))| NumericColumn {
            name: name.clone(),
            median,
            mean: f64::from(mean),
            // constant columns pass through centred
            scale: if sd > 0.0 { f64::from(sd) } else { 1.0 },
        })
        .collect())
}

fn fit_categorical(name: &str, values: &[Option<String>]) -> CategoricalColumn {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values.iter().flatten() {
        *counts.entry(value.as_str()).or_default() += 1;
    }

    // ties resolve to the lexically smallest value
    let most_frequent = counts
        .iter()
        .max_by(|(a, ca), (b, cb)| ca.cmp(cb).then_with(|| b.cmp(a)))
        .map(|(v, _)| v.to_string())
        .unwrap_or_else(|| "missing".to_string());

    let mut categories: Vec<String> = counts.keys().map(|v| v.to_string()).collect();
    if categories.is_empty() {
        categories.push(most_frequent.clone());
    }
    categories.sort();

    CategoricalColumn {
        name: name.to_string(),
        most_frequent,
        categories: CategoricalVocabulary::new(categories),
    }
}
