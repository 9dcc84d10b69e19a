//! Feature reconciliation: maps a loosely-shaped request onto the columns the
//! loaded pipeline was fitted on.
//!
//! The pure helpers (`resolve_column_name`, `coerce_numeric`,
//! `build_feature_row`) take the schema and alias table on every call.
//! `Reconciler` is what the service holds: it resolves bindings once at
//! startup and refuses schemas containing a column no alias can reach.

use crate::alias_table::AliasTable;
use crate::errors::{PredictorError, PredictorResult};
use crate::feature_schema::{EncodingStrategy, FeatureSchema};
use crate::label_encoding::EncoderTableReconciler;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

lazy_static! {
    static ref DECIMAL_PATTERN: Regex = Regex::new(r"[0-9]+\.?[0-9]*").unwrap();
}

/// Flat mapping of optional request fields. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionRequest {
    fields: Map<String, Value>,
}

impl PredictionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Field value, treating explicit nulls as absent.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// First alias with a value present, in alias priority order.
    pub fn lookup<S: AsRef<str>>(&self, aliases: &[S]) -> Option<&Value> {
        aliases.iter().find_map(|alias| self.get(alias.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, Value)> for PredictionRequest {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Category(String),
}

impl FeatureValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(n) => Some(*n),
            FeatureValue::Category(_) => None,
        }
    }
}

/// Single-row table keyed by trained column names. Columns the request did
/// not supply are absent and get imputed by the preprocessing step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureRow {
    values: BTreeMap<String, FeatureValue>,
}

impl FeatureRow {
    pub fn insert(&mut self, column: impl Into<String>, value: FeatureValue) {
        self.values.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&FeatureValue> {
        self.values.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// First alias, in alias-list priority order, that is a trained column.
pub fn resolve_column_name<T, A>(trained_columns: &[T], alias_list: &[A]) -> Option<String>
where
    T: AsRef<str>,
    A: AsRef<str>,
{
    alias_list
        .iter()
        .map(AsRef::as_ref)
        .find(|alias| trained_columns.iter().any(|c| c.as_ref() == *alias))
        .map(str::to_string)
}

/// Numeric view of a request value. Strings lose thousands separators and
/// yield their first decimal substring, so `"32,706 Kms"` becomes 32706.
pub fn coerce_numeric(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => coerce_numeric_str(s),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Numeric view of a string cell or field. Shared by training and serving so
/// both encode flags and missing markers the same way.
pub fn coerce_numeric_str(raw: &str) -> Option<f64> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "nan" | "null" | "none" => None,
        "true" | "yes" => Some(1.0),
        "false" | "no" => Some(0.0),
        _ => {
            let cleaned = raw.replace(',', "");
            DECIMAL_PATTERN
                .find(&cleaned)
                .and_then(|m| m.as_str().parse::<f64>().ok())
        }
    }
}

/// Category view of a request value; blank strings count as missing.
pub fn categorical_value(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// A canonical key bound to the trained column it feeds.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub canonical: String,
    pub column: String,
    pub kind: ColumnKind,
    pub aliases: Vec<String>,
}

impl Binding {
    fn extract(&self, request: &PredictionRequest) -> Option<FeatureValue> {
        let raw = request.lookup(&self.aliases)?;
        match self.kind {
            ColumnKind::Numeric => coerce_numeric(raw).map(FeatureValue::Number),
            ColumnKind::Categorical => categorical_value(raw).map(FeatureValue::Category),
        }
    }
}

fn bind_columns(schema: &FeatureSchema, aliases: &AliasTable) -> Vec<Binding> {
    let trained = schema.trained_columns();
    aliases
        .entries()
        .iter()
        .filter_map(|entry| {
            let column = resolve_column_name(&trained, &entry.aliases)?;
            let kind = if schema.is_numeric(&column) {
                ColumnKind::Numeric
            } else {
                ColumnKind::Categorical
            };
            Some(Binding {
                canonical: entry.canonical.clone(),
                column,
                kind,
                aliases: entry.aliases.clone(),
            })
        })
        .collect()
}

fn row_from_bindings(
    bindings: &[Binding],
    request: &PredictionRequest,
    expected: &[String],
) -> PredictorResult<FeatureRow> {
    let mut row = FeatureRow::default();
    for binding in bindings {
        if let Some(value) = binding.extract(request) {
            row.insert(binding.column.clone(), value);
        }
    }
    if row.is_empty() {
        return Err(PredictorError::no_matching_features(expected));
    }
    Ok(row)
}

/// Map a request onto the trained columns of `schema`.
pub fn build_feature_row(
    request: &PredictionRequest,
    schema: &FeatureSchema,
    aliases: &AliasTable,
) -> PredictorResult<FeatureRow> {
    let bindings = bind_columns(schema, aliases);
    row_from_bindings(&bindings, request, &schema.trained_columns())
}

/// Bindings resolved once against a loaded schema.
#[derive(Debug, Clone)]
pub struct ReconcilePlan {
    bindings: Vec<Binding>,
    expected: Vec<String>,
}

impl ReconcilePlan {
    /// Fails with `UnmappedFeature` when a trained column has no alias.
    pub fn new(schema: &FeatureSchema, aliases: &AliasTable) -> PredictorResult<Self> {
        let bindings = bind_columns(schema, aliases);
        let expected = schema.trained_columns();
        for column in &expected {
            if !bindings.iter().any(|b| &b.column == column) {
                return Err(PredictorError::unmapped_feature(column.clone()));
            }
        }
        Ok(Self { bindings, expected })
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn build_row(&self, request: &PredictionRequest) -> PredictorResult<FeatureRow> {
        row_from_bindings(&self.bindings, request, &self.expected)
    }
}

/// The reconciliation strategy of one deployment, chosen by the bundle.
#[derive(Debug, Clone)]
pub enum Reconciler {
    Pipeline(ReconcilePlan),
    EncoderTable(EncoderTableReconciler),
}

impl Reconciler {
    pub fn for_schema(
        schema: &FeatureSchema,
        aliases: &AliasTable,
        reference_year: i32,
    ) -> PredictorResult<Self> {
        match &schema.encoding {
            EncodingStrategy::Pipeline => Ok(Reconciler::Pipeline(ReconcilePlan::new(schema, aliases)?)),
            EncodingStrategy::EncoderTable {
                vocabularies,
                feature_columns,
            } => {
                tracing::warn!(
                    "loaded a label-encoded bundle; the encoder-table strategy is deprecated, retrain to produce a pipeline bundle"
                );
                Ok(Reconciler::EncoderTable(EncoderTableReconciler::new(
                    vocabularies.clone(),
                    feature_columns.clone(),
                    aliases.clone(),
                    reference_year,
                )?))
            }
        }
    }

    pub fn reconcile(&self, request: &PredictionRequest) -> PredictorResult<FeatureRow> {
        match self {
            Reconciler::Pipeline(plan) => plan.build_row(request),
            Reconciler::EncoderTable(encoder) => encoder.build_row(request),
        }
    }
}
