//! Library root for the `carprice` crate

// Core error handling
pub mod api_errors;
pub mod errors;

// Feature schema & reconciliation
pub mod alias_table;
pub mod feature_reconciler;
pub mod feature_schema;
pub mod label_encoding;
pub mod vocabulary;

// Artifacts & inference
pub mod artifact_store;
pub mod prediction_service;
pub mod preprocessor;
pub mod regressor;

// Offline training
pub mod training;

// Configuration, logging & CLI
pub mod cli;
pub mod config_loader;
pub mod log_sink;

// Web server interface
pub mod app_state;
pub mod web;

#[cfg(test)]
mod tests {
    pub mod test_utils;
    pub mod artifacts;
    pub mod prediction;
    pub mod web;
}

pub use alias_table::AliasTable;
pub use artifact_store::ArtifactStore;
pub use errors::{PredictorError, PredictorResult};
pub use feature_reconciler::PredictionRequest;
pub use prediction_service::{PredictionResult, PredictionService};
