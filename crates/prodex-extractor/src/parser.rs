//! Extraction response parsing
//!
//! Models wrap JSON in markdown fences or prose more often than not;
//! the parser peels that off before handing the payload to validation.

use prodex_domain::{DataTable, FaqEntry, Relation, Specification};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The typed shape of one chunk's extraction payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkPayload {
    /// Product relations found in the chunk
    #[serde(default)]
    pub relations: Vec<Relation>,
    /// Technical specifications found in the chunk
    #[serde(default)]
    pub specifications: Vec<Specification>,
    /// Tabular data found in the chunk
    #[serde(default)]
    pub data_tables: Vec<DataTable>,
    /// Question/answer pairs found in the chunk
    #[serde(default)]
    pub faq: Vec<FaqEntry>,
}

impl ChunkPayload {
    /// Total entries across all sections
    pub fn entry_count(&self) -> usize {
        self.relations.len() + self.specifications.len() + self.data_tables.len() + self.faq.len()
    }
}

/// Pull a JSON object out of a raw model response.
///
/// Handles plain JSON, fenced blocks (```json ... ```), and JSON
/// embedded in surrounding prose. The error message is written to be
/// useful inside a correction prompt.
pub fn extract_json(raw: &str) -> Result<Value, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("response is empty".to_string());
    }

    let candidate = strip_fences(trimmed);

    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            // Fall back to the outermost brace pair; models like to
            // preface JSON with an explanation.
            let start = candidate.find('{');
            let end = candidate.rfind('}');
            if let (Some(start), Some(end)) = (start, end) {
                if start < end {
                    if let Ok(value) = serde_json::from_str::<Value>(&candidate[start..=end]) {
                        return Ok(value);
                    }
                }
            }
            Err(format!("response is not valid JSON: {}", first_err))
        }
    }
}

/// Deserialize a validated payload into its typed form
pub fn payload_from_value(value: Value) -> Result<ChunkPayload, String> {
    serde_json::from_value(value).map_err(|e| format!("payload shape mismatch: {}", e))
}

/// Remove a surrounding markdown code fence, if any
fn strip_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip the language tag on the opening fence line
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
