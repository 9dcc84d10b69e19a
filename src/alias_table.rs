//! Canonical feature keys and the external field names accepted for each.

use crate::errors::{PredictorError, PredictorResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Field names the trainer accepts for the target column.
pub const TARGET_ALIASES: &[&str] = &["price", "selling_price", "Price"];

const DEFAULT_ALIASES: &[(&str, &[&str])] = &[
    ("brand", &["brand", "make", "oem", "Make", "Brand"]),
    ("model", &["model", "Model"]),
    ("year", &["year", "modelYear", "Registration Year", "Year", "year_of_manufacture"]),
    (
        "kmDriven",
        &["kmDriven", "mileage", "km", "kms_driven", "Kms Driven", "kilometers_driven"],
    ),
    ("fuelType", &["fuelType", "fuel_type", "Fuel Type", "ft", "fuel"]),
    ("transmission", &["transmission", "Transmission"]),
    (
        "engineSize",
        &["engineSize", "engine_size", "Engine Displacement", "engine", "Displacement"],
    ),
    ("city", &["city", "City", "location"]),
    ("state", &["state", "State"]),
    ("cngKit", &["cngKit", "cng_kit", "CNG Kit"]),
    ("qualityScore", &["qualityScore", "quality_score", "Quality Score"]),
];

/// One canonical key with its aliases in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    pub canonical: String,
    pub aliases: Vec<String>,
}

/// Ordered mapping from canonical feature key to accepted field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasTable {
    entries: Vec<AliasEntry>,
}

impl Default for AliasTable {
    fn default() -> Self {
        let entries = DEFAULT_ALIASES
            .iter()
            .map(|(canonical, aliases)| AliasEntry {
                canonical: canonical.to_string(),
                aliases: aliases.iter().map(|a| a.to_string()).collect(),
            })
            .collect();
        Self { entries }
    }
}

impl AliasTable {
    pub fn new(entries: Vec<AliasEntry>) -> PredictorResult<Self> {
        let table = Self { entries };
        table.validate()?;
        Ok(table)
    }

    /// Default table extended with configured aliases. Extra aliases for an
    /// existing key rank after the built-in ones; unknown keys are appended.
    pub fn with_extra(extra: &BTreeMap<String, Vec<String>>) -> PredictorResult<Self> {
        let mut table = Self::default();
        for (canonical, aliases) in extra {
            match table.entries.iter_mut().find(|e| &e.canonical == canonical) {
                Some(entry) => {
                    for alias in aliases {
                        if !entry.aliases.contains(alias) {
                            entry.aliases.push(alias.clone());
                        }
                    }
                }
                None => table.entries.push(AliasEntry {
                    canonical: canonical.clone(),
                    aliases: aliases.clone(),
                }),
            }
        }
        table.validate()?;
        Ok(table)
    }

    /// Every key needs at least one alias and no alias may belong to two keys.
    pub fn validate(&self) -> PredictorResult<()> {
        let mut owners: HashMap<&str, &str> = HashMap::new();
        for entry in &self.entries {
            if entry.aliases.is_empty() {
                return Err(PredictorError::config(format!(
                    "alias table entry '{}' has no aliases",
                    entry.canonical
                )));
            }
            for alias in &entry.aliases {
                if let Some(owner) = owners.insert(alias.as_str(), entry.canonical.as_str()) {
                    if owner != entry.canonical {
                        return Err(PredictorError::config(format!(
                            "alias '{alias}' is claimed by both '{owner}' and '{}'",
                            entry.canonical
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn entries(&self) -> &[AliasEntry] {
        &self.entries
    }

    pub fn aliases_for(&self, canonical: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|e| e.canonical == canonical)
            .map(|e| e.aliases.as_slice())
    }

    /// Canonical key owning `name`, if any.
    pub fn canonical_for(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.aliases.iter().any(|a| a == name))
            .map(|e| e.canonical.as_str())
    }
}
