//! Encoder-table reconciliation for label-encoded bundles (deprecated).
//!
//! Categories become their index in the training vocabulary, written to
//! `<key>_encoded`. Unknown or missing categories encode as 0. Two engineered
//! features are derived from year and mileage before column ordering.

use crate::alias_table::AliasTable;
use crate::errors::{PredictorError, PredictorResult};
use crate::feature_reconciler::{
    categorical_value, coerce_numeric, FeatureRow, FeatureValue, PredictionRequest,
};
use crate::vocabulary::{CategoricalVocabularies, UNKNOWN_INDEX};

pub const AGE_COLUMN: &str = "age";
pub const KM_PER_YEAR_COLUMN: &str = "km_per_year";
const ENCODED_SUFFIX: &str = "_encoded";
const YEAR_KEY: &str = "year";
const MILEAGE_KEY: &str = "kmDriven";

#[derive(Debug, Clone)]
pub struct EncoderTableReconciler {
    vocabularies: CategoricalVocabularies,
    feature_columns: Vec<String>,
    aliases: AliasTable,
    reference_year: i32,
}

impl EncoderTableReconciler {
    /// Every feature column must be a canonical key, `<key>_encoded` for a key
    /// with a vocabulary, or one of the engineered columns.
    pub fn new(
        vocabularies: CategoricalVocabularies,
        feature_columns: Vec<String>,
        aliases: AliasTable,
        reference_year: i32,
    ) -> PredictorResult<Self> {
        for column in &feature_columns {
            let known = match column.strip_suffix(ENCODED_SUFFIX) {
                Some(key) => aliases.aliases_for(key).is_some(),
                None => {
                    column == AGE_COLUMN
                        || column == KM_PER_YEAR_COLUMN
                        || aliases.aliases_for(column).is_some()
                }
            };
            if !known {
                return Err(PredictorError::unmapped_feature(column.clone()));
            }
        }
        Ok(Self {
            vocabularies,
            feature_columns,
            aliases,
            reference_year,
        })
    }

    fn lookup<'r>(&self, request: &'r PredictionRequest, key: &str) -> Option<&'r serde_json::Value> {
        self.aliases
            .aliases_for(key)
            .and_then(|aliases| request.lookup(aliases))
    }

    /// Fully populated row over `feature_columns`; absent inputs become 0.
    pub fn build_row(&self, request: &PredictionRequest) -> PredictorResult<FeatureRow> {
        let year = self.lookup(request, YEAR_KEY).and_then(coerce_numeric);
        let mileage = self.lookup(request, MILEAGE_KEY).and_then(coerce_numeric);

        let mut row = FeatureRow::default();
        let mut matched = 0usize;

        for column in &self.feature_columns {
            let value = if let Some(key) = column.strip_suffix(ENCODED_SUFFIX) {
                let raw = self.lookup(request, key).and_then(categorical_value);
                if raw.is_some() {
                    matched += 1;
                }
                let index = match (raw, self.vocabularies.get(key)) {
                    (Some(value), Some(vocab)) => vocab.encode(&value),
                    _ => UNKNOWN_INDEX,
                };
                Some(index as f64)
            } else if column == AGE_COLUMN {
                if year.is_some() {
                    matched += 1;
                }
                year.map(|y| self.age(y))
            } else if column == KM_PER_YEAR_COLUMN {
                match (year, mileage) {
                    (Some(y), Some(km)) => Some(km / self.age(y).max(1.0)),
                    _ => None,
                }
            } else {
                let value = self.lookup(request, column).and_then(coerce_numeric);
                if value.is_some() {
                    matched += 1;
                }
                value
            };
            row.insert(column.clone(), FeatureValue::Number(value.unwrap_or(0.0)));
        }

        if matched == 0 {
            return Err(PredictorError::no_matching_features(&self.feature_columns));
        }
        Ok(row)
    }

    fn age(&self, year: f64) -> f64 {
        f64::from(self.reference_year) - year
    }
}
