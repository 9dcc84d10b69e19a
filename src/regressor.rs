use aprender::linear_model::Ridge;
use aprender::primitives::Matrix;
use aprender::tree::RandomForestRegressor;
use serde::{Deserialize, Serialize};

/// Inference over one preprocessed feature vector.
pub trait Regression {
    fn n_features(&self) -> usize;
    fn predict_row(&self, features: &[f64]) -> Result<f64, String>;
}

fn check_width(expected: usize, features: &[f64]) -> Result<(), String> {
    if features.len() == expected {
        Ok(())
    } else {
        Err(format!(
            "shape mismatch: model expects {expected} features, got {}",
            features.len()
        ))
    }
}

/// Linear model parameters: `intercept + sum(coef_i * x_i)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    /// Export the parameters of a fitted ridge estimator.
    pub fn from_ridge(ridge: &Ridge) -> Result<Self, String> {
        if !ridge.is_fitted() {
            return Err("ridge regression is not fitted".to_string());
        }
        Ok(Self {
            intercept: f64::from(ridge.intercept()),
            coefficients: ridge.coefficients().as_slice().iter().map(|&c| f64::from(c)).collect(),
        })
    }
}

impl Regression for LinearModel {
    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn predict_row(&self, features: &[f64]) -> Result<f64, String> {
        check_width(self.coefficients.len(), features)?;
        Ok(self.intercept
            + features
                .iter()
                .zip(self.coefficients.iter())
                .map(|(x, w)| x * w)
                .sum::<f64>())
    }
}

/// Fitted aprender random forest with the input width it was trained on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestModel {
    pub n_features: usize,
    pub forest: RandomForestRegressor,
}

impl ForestModel {
    pub fn new(forest: RandomForestRegressor) -> Result<Self, String> {
        let n_features = forest
            .feature_importances()
            .map(|importances| importances.len())
            .ok_or_else(|| "random forest is not fitted".to_string())?;
        Ok(Self { n_features, forest })
    }

    fn validate(&self) -> Result<(), String> {
        // `predict` panics on an unfitted forest
        match self.forest.feature_importances() {
            None => Err("random forest is not fitted".to_string()),
            Some(importances) if importances.len() != self.n_features => Err(format!(
                "random forest was fitted on {} features but declares {}",
                importances.len(),
                self.n_features
            )),
            Some(_) => Ok(()),
        }
    }
}

impl Regression for ForestModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_row(&self, features: &[f64]) -> Result<f64, String> {
        check_width(self.n_features, features)?;
        let x = Matrix::from_vec(1, features.len(), features.iter().map(|&v| v as f32).collect())
            .map_err(str::to_string)?;
        self.forest
            .predict(&x)
            .as_slice()
            .first()
            .map(|&y| f64::from(y))
            .ok_or_else(|| "random forest returned no prediction".to_string())
    }
}

/// Fitted model stored as `model.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Regressor {
    Linear(LinearModel),
    RandomForest(ForestModel),
}

impl Regressor {
    /// Candidate name as recorded in training metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Regressor::Linear(_) => "LinearRegression",
            Regressor::RandomForest(_) => "RandomForest",
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            Regressor::Linear(m) => {
                if m.intercept.is_finite() && m.coefficients.iter().all(|c| c.is_finite()) {
                    Ok(())
                } else {
                    Err("linear model has non-finite parameters".to_string())
                }
            }
            Regressor::RandomForest(f) => f.validate(),
        }
    }
}

impl Regression for Regressor {
    fn n_features(&self) -> usize {
        match self {
            Regressor::Linear(m) => m.n_features(),
            Regressor::RandomForest(f) => f.n_features(),
        }
    }

    fn predict_row(&self, features: &[f64]) -> Result<f64, String> {
        match self {
            Regressor::Linear(m) => m.predict_row(features),
            Regressor::RandomForest(f) => f.predict_row(features),
        }
    }
}
