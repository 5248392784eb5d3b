//! Typed entries extracted from product documentation
//!
//! Each entry carries a confidence score in [0, 1] and a normalized
//! identity key used for deduplication when chunk results are merged.

use serde::{Deserialize, Serialize};

/// A compatibility relation between the documented product and another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Kind of relation, e.g. "compatible_with", "replaces", "requires"
    pub relation_type: String,

    /// Name or identifier of the related product
    pub related_product: String,

    /// Text fragment the relation was extracted from
    pub context: String,

    /// Extraction certainty in [0, 1]
    pub confidence: f64,
}

impl Relation {
    /// Normalized dedup key: relation type + related product, lowercased
    pub fn identity_key(&self) -> String {
        format!(
            "{}:{}",
            self.relation_type.trim().to_lowercase(),
            self.related_product.trim().to_lowercase()
        )
    }
}

/// A technical specification of the product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    /// Specification category, e.g. "dimensions", "electrical"
    pub category: String,

    /// Specification name, e.g. "weight", "voltage"
    pub name: String,

    /// Verbatim value as it appears in the documentation
    pub raw_value: String,

    /// Numeric value parsed from `raw_value`, when one exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    /// Unit of measure, if stated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Extraction certainty in [0, 1]
    pub confidence: f64,
}

impl Specification {
    /// Normalized dedup key: category + name, lowercased
    pub fn identity_key(&self) -> String {
        format!(
            "{}:{}",
            self.category.trim().to_lowercase(),
            self.name.trim().to_lowercase()
        )
    }
}

/// A table of values lifted from the documentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    /// Table title or caption
    pub title: String,

    /// Column headers, in order
    pub headers: Vec<String>,

    /// Row values, each the same length as `headers`
    pub rows: Vec<Vec<String>>,

    /// Extraction certainty in [0, 1]
    pub confidence: f64,
}

impl DataTable {
    /// Normalized dedup key: title, lowercased
    pub fn identity_key(&self) -> String {
        self.title.trim().to_lowercase()
    }
}

/// A question/answer pair relevant to the product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    /// The question as phrased in (or inferred from) the documentation
    pub question: String,

    /// The extracted answer
    pub answer: String,

    /// Extraction certainty in [0, 1]
    pub confidence: f64,
}

impl FaqEntry {
    /// Normalized dedup key: question text, lowercased
    pub fn identity_key(&self) -> String {
        self.question.trim().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_key_is_normalized() {
        let a = Relation {
            relation_type: "Compatible_With".to_string(),
            related_product: " Widget X ".to_string(),
            context: "works with Widget X".to_string(),
            confidence: 0.9,
        };
        let b = Relation {
            relation_type: "compatible_with".to_string(),
            related_product: "widget x".to_string(),
            context: "different context".to_string(),
            confidence: 0.5,
        };
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn test_spec_key_ignores_value() {
        let a = Specification {
            category: "Electrical".to_string(),
            name: "Voltage".to_string(),
            raw_value: "230 V".to_string(),
            value: Some(230.0),
            unit: Some("V".to_string()),
            confidence: 0.8,
        };
        let b = Specification {
            raw_value: "240 V".to_string(),
            value: Some(240.0),
            ..a.clone()
        };
        assert_eq!(a.identity_key(), b.identity_key());
    }
}
