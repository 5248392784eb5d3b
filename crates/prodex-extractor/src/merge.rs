//! Deterministic merging of per-chunk extraction payloads
//!
//! Entries are deduplicated by normalized identity key; on a key
//! collision the higher-confidence entry wins, and a tie keeps the
//! entry from the earlier chunk. Confidence filtering happens before
//! merge so a low-confidence duplicate can never shadow a good entry,
//! and every dropped entry leaves a warning.

use crate::parser::ChunkPayload;
use prodex_domain::{DataTable, FaqEntry, Relation, Specification};
use std::collections::HashMap;
use tracing::debug;

/// One chunk's parsed extraction output, alive only until the merge
#[derive(Debug, Clone)]
pub struct ChunkResult {
    /// Position of the chunk in the document
    pub chunk_index: usize,
    /// The validated, typed payload
    pub payload: ChunkPayload,
}

/// Merged sections plus warnings for everything filtered out
#[derive(Debug, Default)]
pub struct MergeOutcome {
    /// Deduplicated relations in first-seen order
    pub relations: Vec<Relation>,
    /// Deduplicated specifications in first-seen order
    pub specifications: Vec<Specification>,
    /// Deduplicated tables in first-seen order
    pub data_tables: Vec<DataTable>,
    /// Deduplicated FAQ entries in first-seen order
    pub faq: Vec<FaqEntry>,
    /// One line per entry dropped by the confidence filter
    pub warnings: Vec<String>,
}

impl MergeOutcome {
    /// Total entries across all merged sections
    pub fn entry_count(&self) -> usize {
        self.relations.len() + self.specifications.len() + self.data_tables.len() + self.faq.len()
    }
}

/// Merge chunk payloads into one result, filtering by confidence first
pub fn merge_chunks(chunks: &[ChunkResult], confidence_threshold: f64) -> MergeOutcome {
    let mut ordered: Vec<&ChunkResult> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.chunk_index);

    let mut outcome = MergeOutcome::default();

    outcome.relations = merge_section(
        &ordered,
        confidence_threshold,
        &mut outcome.warnings,
        |p| &p.relations,
        |r| r.identity_key(),
        |r| r.confidence,
        |r| format!("relation {} -> {}", r.relation_type, r.related_product),
    );
    outcome.specifications = merge_section(
        &ordered,
        confidence_threshold,
        &mut outcome.warnings,
        |p| &p.specifications,
        |s| s.identity_key(),
        |s| s.confidence,
        |s| format!("specification {}/{}", s.category, s.name),
    );
    outcome.data_tables = merge_section(
        &ordered,
        confidence_threshold,
        &mut outcome.warnings,
        |p| &p.data_tables,
        |t| t.identity_key(),
        |t| t.confidence,
        |t| format!("table {}", t.title),
    );
    outcome.faq = merge_section(
        &ordered,
        confidence_threshold,
        &mut outcome.warnings,
        |p| &p.faq,
        |f| f.identity_key(),
        |f| f.confidence,
        |f| format!("faq {}", f.question),
    );

    debug!(
        chunks = chunks.len(),
        entries = outcome.entry_count(),
        dropped = outcome.warnings.len(),
        "merged chunk payloads"
    );
    outcome
}

fn merge_section<T: Clone>(
    chunks: &[&ChunkResult],
    threshold: f64,
    warnings: &mut Vec<String>,
    extract: impl Fn(&ChunkPayload) -> &[T],
    key: impl Fn(&T) -> String,
    confidence: impl Fn(&T) -> f64,
    label: impl Fn(&T) -> String,
) -> Vec<T> {
    let mut order: Vec<String> = Vec::new();
    let mut best: HashMap<String, (f64, T)> = HashMap::new();

    for chunk in chunks {
        for entry in extract(&chunk.payload) {
            let c = confidence(entry);
            if c < threshold {
                warnings.push(format!(
                    "dropped {} from chunk {}: confidence {:.2} below threshold {:.2}",
                    label(entry),
                    chunk.chunk_index,
                    c,
                    threshold
                ));
                continue;
            }

            let k = key(entry);
            match best.get_mut(&k) {
                None => {
                    order.push(k.clone());
                    best.insert(k, (c, entry.clone()));
                }
                Some((kept, slot)) => {
                    // Strictly greater replaces; a tie keeps the entry
                    // from the earlier chunk.
                    if c > *kept {
                        *kept = c;
                        *slot = entry.clone();
                    }
                }
            }
        }
    }

    order
        .into_iter()
        .filter_map(|k| best.remove(&k))
        .map(|(_, entry)| entry)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relation(relation_type: &str, related: &str, confidence: f64) -> Relation {
        Relation {
            relation_type: relation_type.to_string(),
            related_product: related.to_string(),
            context: String::new(),
            confidence,
        }
    }

    fn spec(category: &str, name: &str, raw: &str, confidence: f64) -> Specification {
        Specification {
            category: category.to_string(),
            name: name.to_string(),
            raw_value: raw.to_string(),
            value: None,
            unit: None,
            confidence,
        }
    }

    fn chunk(index: usize, payload: ChunkPayload) -> ChunkResult {
        ChunkResult {
            chunk_index: index,
            payload,
        }
    }

    #[test]
    fn test_duplicates_keep_higher_confidence() {
        let chunks = vec![
            chunk(
                0,
                ChunkPayload {
                    relations: vec![relation("replacement", "X200", 0.6)],
                    ..Default::default()
                },
            ),
            chunk(
                1,
                ChunkPayload {
                    relations: vec![relation("Replacement", " x200 ", 0.9)],
                    ..Default::default()
                },
            ),
        ];

        let outcome = merge_chunks(&chunks, 0.0);
        assert_eq!(outcome.relations.len(), 1);
        assert_eq!(outcome.relations[0].confidence, 0.9);
    }

    #[test]
    fn test_tie_keeps_earlier_chunk_entry() {
        let chunks = vec![
            chunk(
                0,
                ChunkPayload {
                    specifications: vec![spec("cpu", "clock", "2.4 GHz", 0.8)],
                    ..Default::default()
                },
            ),
            chunk(
                1,
                ChunkPayload {
                    specifications: vec![spec("CPU", "Clock", "2.5 GHz", 0.8)],
                    ..Default::default()
                },
            ),
        ];

        let outcome = merge_chunks(&chunks, 0.0);
        assert_eq!(outcome.specifications.len(), 1);
        assert_eq!(outcome.specifications[0].raw_value, "2.4 GHz");
    }

    #[test]
    fn test_confidence_filter_runs_before_merge() {
        // The low-confidence duplicate must not shadow the good entry,
        // and must show up as a warning.
        let chunks = vec![
            chunk(
                0,
                ChunkPayload {
                    relations: vec![relation("accessory", "Dock", 0.1)],
                    ..Default::default()
                },
            ),
            chunk(
                1,
                ChunkPayload {
                    relations: vec![relation("accessory", "Dock", 0.7)],
                    ..Default::default()
                },
            ),
        ];

        let outcome = merge_chunks(&chunks, 0.3);
        assert_eq!(outcome.relations.len(), 1);
        assert_eq!(outcome.relations[0].confidence, 0.7);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("chunk 0"));
        assert!(outcome.warnings[0].contains("0.10"));
    }

    #[test]
    fn test_merge_is_deterministic() {
        let chunks = vec![
            chunk(
                0,
                ChunkPayload {
                    relations: vec![
                        relation("accessory", "Dock", 0.5),
                        relation("replacement", "X200", 0.9),
                    ],
                    specifications: vec![spec("cpu", "clock", "2.4 GHz", 0.8)],
                    ..Default::default()
                },
            ),
            chunk(
                1,
                ChunkPayload {
                    relations: vec![relation("accessory", "Dock", 0.5)],
                    ..Default::default()
                },
            ),
        ];

        let first = merge_chunks(&chunks, 0.3);
        let second = merge_chunks(&chunks, 0.3);
        assert_eq!(first.relations, second.relations);
        assert_eq!(first.specifications, second.specifications);
        assert_eq!(first.warnings, second.warnings);
        // First-seen order is preserved
        assert_eq!(first.relations[0].related_product, "Dock");
        assert_eq!(first.relations[1].related_product, "X200");
    }

    #[test]
    fn test_unsorted_chunks_merge_in_index_order() {
        let chunks = vec![
            chunk(
                2,
                ChunkPayload {
                    faq: vec![FaqEntry {
                        question: "How?".to_string(),
                        answer: "later answer".to_string(),
                        confidence: 0.5,
                    }],
                    ..Default::default()
                },
            ),
            chunk(
                0,
                ChunkPayload {
                    faq: vec![FaqEntry {
                        question: "how?".to_string(),
                        answer: "earlier answer".to_string(),
                        confidence: 0.5,
                    }],
                    ..Default::default()
                },
            ),
        ];

        let outcome = merge_chunks(&chunks, 0.0);
        assert_eq!(outcome.faq.len(), 1);
        assert_eq!(outcome.faq[0].answer, "earlier answer");
    }
}
