use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Index assigned to values never seen during training.
pub const UNKNOWN_INDEX: usize = 0;

/// Ordered category values seen at training time for one feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct CategoricalVocabulary {
    values: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl CategoricalVocabulary {
    pub fn new(values: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(values.len());
        for (i, value) in values.iter().enumerate() {
            // first occurrence wins, as with a list lookup
            index.entry(value.clone()).or_insert(i);
        }
        Self { values, index }
    }

    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.index.get(value).copied()
    }

    /// Lossy lookup: unseen values collapse onto `UNKNOWN_INDEX`.
    pub fn encode(&self, value: &str) -> usize {
        self.index_of(value).unwrap_or(UNKNOWN_INDEX)
    }

    pub fn value_at(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<String>> for CategoricalVocabulary {
    fn from(values: Vec<String>) -> Self {
        Self::new(values)
    }
}

impl From<CategoricalVocabulary> for Vec<String> {
    fn from(vocab: CategoricalVocabulary) -> Self {
        vocab.values
    }
}

/// Vocabularies keyed by trained feature name.
pub type CategoricalVocabularies = BTreeMap<String, CategoricalVocabulary>;

#[cfg(test)]
mod tests {
    use super::*;

    fn fuel() -> CategoricalVocabulary {
        CategoricalVocabulary::new(vec!["Diesel".into(), "Electric".into(), "Petrol".into()])
    }

    #[test]
    fn maps_both_directions() {
        let vocab = fuel();
        assert_eq!(vocab.index_of("Petrol"), Some(2));
        assert_eq!(vocab.value_at(1), Some("Electric"));
        assert_eq!(vocab.value_at(3), None);
    }

    #[test]
    fn unknown_value_encodes_to_zero() {
        let brands = CategoricalVocabulary::new(vec!["Hyundai".into(), "Maruti Suzuki".into()]);
        assert_eq!(brands.encode("Tesla"), UNKNOWN_INDEX);
        assert_eq!(brands.encode("Maruti Suzuki"), 1);
    }

    #[test]
    fn deserializes_from_plain_list() {
        let vocab: CategoricalVocabulary = serde_json::from_str(r#"["Manual","Automatic"]"#).unwrap();
        assert_eq!(vocab.encode("Automatic"), 1);
        assert_eq!(serde_json::to_string(&vocab).unwrap(), r#"["Manual","Automatic"]"#);
    }
}
