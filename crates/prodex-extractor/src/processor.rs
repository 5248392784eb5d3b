//! The chunk pipeline: split, invoke, parse/correct, merge, persist

use crate::chunking::TextChunker;
use crate::config::ExtractorConfig;
use crate::error::ExtractError;
use crate::merge::{merge_chunks, ChunkResult};
use crate::parser::{extract_json, payload_from_value};
use crate::prompt::extraction_prompt;
use prodex_domain::{
    DocumentRef, DocumentSource, ExtractionStatus, InvokeOptions, ProductResult, ResultStore,
};
use prodex_llm::LlmClient;
use prodex_validator::ValidationEngine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs the full extraction pipeline for one document.
///
/// Chunk-level failures are absorbed into the result's error list;
/// only source failures, oversized documents, cancellation, and
/// exhausted store writes abort the whole run.
pub struct ChunkProcessor {
    llm: Arc<LlmClient>,
    validator: ValidationEngine,
    chunker: TextChunker,
    source: Arc<dyn DocumentSource>,
    store: Arc<dyn ResultStore>,
    config: ExtractorConfig,
}

impl ChunkProcessor {
    /// Assemble a processor from its collaborators
    pub fn new(
        llm: Arc<LlmClient>,
        validator: ValidationEngine,
        source: Arc<dyn DocumentSource>,
        store: Arc<dyn ResultStore>,
        config: ExtractorConfig,
    ) -> Result<Self, ExtractError> {
        config.validate()?;
        let chunker = TextChunker::new(config.chunk_size, config.chunk_overlap);
        Ok(Self {
            llm,
            validator,
            chunker,
            source,
            store,
            config,
        })
    }

    /// Extract a product result from the referenced document.
    ///
    /// The cancel flag is advisory: it is checked before each chunk,
    /// never mid-call, so an in-flight LLM request always completes.
    pub async fn process(
        &self,
        product_id: &str,
        document: &DocumentRef,
        cancel: Option<&AtomicBool>,
    ) -> Result<ProductResult, ExtractError> {
        let started = Instant::now();
        let text = self.source.fetch(document)?;
        let chars = text.chars().count();
        if chars > self.config.max_document_chars {
            return Err(ExtractError::DocumentTooLarge {
                size: chars,
                limit: self.config.max_document_chars,
            });
        }

        let chunks = if text.len() > self.config.chunk_threshold {
            self.chunker.chunk(&text)
        } else {
            vec![crate::chunking::Chunk {
                index: 0,
                start: 0,
                text,
            }]
        };
        let total = chunks.len();
        info!(
            product_id,
            document = %document.display_name(),
            chunks = total,
            "starting extraction"
        );

        let mut result = ProductResult::new(product_id, chars);
        result.status = ExtractionStatus::InProgress;
        result.metadata.chunk_count = total;

        let options = InvokeOptions {
            temperature: Some(self.config.temperature),
            max_tokens: self.config.max_tokens,
        };
        let mut chunk_results: Vec<ChunkResult> = Vec::with_capacity(total);

        for chunk in &chunks {
            if let Some(flag) = cancel {
                if flag.load(Ordering::SeqCst) {
                    info!(product_id, chunk = chunk.index, "cancelled at chunk boundary");
                    return Err(ExtractError::Cancelled {
                        next_chunk: chunk.index,
                    });
                }
            }

            let prompt = extraction_prompt(product_id, &chunk.text, chunk.index, total);
            let invocation = match self.llm.invoke(&prompt, &options).await {
                Ok(invocation) => invocation,
                Err(e) => {
                    warn!(product_id, chunk = chunk.index, error = %e, "chunk LLM call failed");
                    result.metadata.failed_chunks += 1;
                    result.add_error(format!("chunk {}: LLM call failed: {}", chunk.index, e));
                    continue;
                }
            };
            result.metadata.transient_retries += invocation.transient_retries;
            if invocation.used_fallback {
                result.metadata.fallback_uses += 1;
            }

            // Raw-response archiving is auxiliary; failure never blocks
            if let Err(e) = self.store.save_raw(product_id, chunk.index, &invocation.text) {
                result.add_warning(format!(
                    "chunk {}: raw response not archived: {}",
                    chunk.index, e
                ));
            }

            let outcome = self
                .validator
                .ensure_valid(&*self.llm, &invocation.text, extract_json)
                .await;
            result.metadata.correction_attempts += outcome.attempts;

            match outcome.payload {
                Some(value) => match payload_from_value(value) {
                    Ok(payload) => {
                        debug!(
                            product_id,
                            chunk = chunk.index,
                            entries = payload.entry_count(),
                            "chunk extracted"
                        );
                        chunk_results.push(ChunkResult {
                            chunk_index: chunk.index,
                            payload,
                        });
                    }
                    Err(msg) => {
                        result.metadata.failed_chunks += 1;
                        result.add_error(format!("chunk {}: {}", chunk.index, msg));
                    }
                },
                None => {
                    result.metadata.failed_chunks += 1;
                    let mut detail = outcome.report.error_lines().join("; ");
                    if let Some(e) = outcome.llm_error {
                        detail = format!("{} (correction call failed: {})", detail, e);
                    }
                    result.add_error(format!(
                        "chunk {}: invalid after {} correction attempts: {}",
                        chunk.index, outcome.attempts, detail
                    ));
                }
            }
        }

        let merged = merge_chunks(&chunk_results, self.config.confidence_threshold);
        result.relations = merged.relations;
        result.specifications = merged.specifications;
        result.data_tables = merged.data_tables;
        result.faq = merged.faq;
        for warning in merged.warnings {
            result.add_warning(warning);
        }

        result.status = if result.metadata.failed_chunks == total {
            ExtractionStatus::Failed
        } else if result.metadata.failed_chunks > 0 {
            ExtractionStatus::PartiallyCompleted
        } else {
            ExtractionStatus::Completed
        };

        // Only a fully completed result is a candidate for validated
        if result.status == ExtractionStatus::Completed {
            let report = self.validator.validate_product(&result);
            if report.is_valid() {
                result.status = ExtractionStatus::Validated;
            } else {
                result.status = ExtractionStatus::ValidationFailed;
                for line in report.error_lines() {
                    result.add_error(line);
                }
            }
        }

        result.metadata.processing_time_ms = started.elapsed().as_millis() as u64;
        self.persist(&result)?;

        info!(
            product_id,
            status = ?result.status,
            entries = result.entry_count(),
            failed_chunks = result.metadata.failed_chunks,
            elapsed_ms = result.metadata.processing_time_ms,
            "extraction finished"
        );
        Ok(result)
    }

    /// Write the merged result, retrying recoverable failures a bounded
    /// number of times.
    fn persist(&self, result: &ProductResult) -> Result<(), ExtractError> {
        let mut attempt: u32 = 0;
        loop {
            match self.store.save(result) {
                Ok(path) => {
                    debug!(product_id = %result.product_id, path = %path.display(), "result saved");
                    return Ok(());
                }
                Err(e) if e.is_recoverable() && attempt < self.config.store_write_retries => {
                    attempt += 1;
                    warn!(
                        product_id = %result.product_id,
                        attempt,
                        error = %e,
                        "result write failed, retrying"
                    );
                }
                Err(e) => {
                    return Err(ExtractError::Store {
                        attempts: attempt + 1,
                        source: e,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prodex_domain::IoFailure;
    use prodex_llm::{MockService, RetryPolicy};
    use prodex_validator::ValidatorConfig;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Resolves inline documents only; file refs fail critically
    struct InlineSource;

    impl DocumentSource for InlineSource {
        fn fetch(&self, reference: &DocumentRef) -> Result<String, IoFailure> {
            match reference {
                DocumentRef::Inline { text, .. } => Ok(text.clone()),
                DocumentRef::File { path } => {
                    Err(IoFailure::critical(format!("no such file: {}", path.display())))
                }
            }
        }
    }

    #[derive(Default)]
    struct MemStore {
        results: Mutex<Vec<ProductResult>>,
        raws: Mutex<HashMap<usize, String>>,
        save_failures: Mutex<Vec<IoFailure>>,
    }

    impl MemStore {
        fn fail_next_saves(&self, failures: Vec<IoFailure>) {
            *self.save_failures.lock().unwrap() = failures;
        }
    }

    impl ResultStore for MemStore {
        fn save(&self, result: &ProductResult) -> Result<PathBuf, IoFailure> {
            let mut failures = self.save_failures.lock().unwrap();
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
            self.results.lock().unwrap().push(result.clone());
            Ok(PathBuf::from(format!("/mem/{}/result.json", result.product_id)))
        }

        fn save_raw(&self, _product_id: &str, chunk_index: usize, raw: &str) -> Result<PathBuf, IoFailure> {
            self.raws.lock().unwrap().insert(chunk_index, raw.to_string());
            Ok(PathBuf::from(format!("/mem/raw_{}.txt", chunk_index)))
        }
    }

    fn valid_response(question: &str) -> String {
        serde_json::json!({
            "relations": [],
            "specifications": [],
            "data_tables": [],
            "faq": [{"question": question, "answer": "yes", "confidence": 0.9}]
        })
        .to_string()
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_base_ms: 1,
            backoff_cap_ms: 2,
            call_timeout_secs: 5,
        }
    }

    fn inline_doc(text: &str) -> DocumentRef {
        DocumentRef::Inline {
            name: "doc".to_string(),
            text: text.to_string(),
        }
    }

    fn processor_with(
        llm: LlmClient,
        store: Arc<MemStore>,
        config: ExtractorConfig,
    ) -> ChunkProcessor {
        ChunkProcessor::new(
            Arc::new(llm),
            ValidationEngine::new(ValidatorConfig::default()),
            Arc::new(InlineSource),
            store,
            config,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_small_document_single_chunk_validated() {
        let primary = MockService::new(valid_response("works?"));
        let store = Arc::new(MemStore::default());
        let processor = processor_with(
            LlmClient::new(Arc::new(primary), fast_policy(3)),
            store.clone(),
            ExtractorConfig::default(),
        );

        let result = processor
            .process("PX-1", &inline_doc("a short datasheet"), None)
            .await
            .unwrap();

        assert_eq!(result.status, ExtractionStatus::Validated);
        assert_eq!(result.metadata.chunk_count, 1);
        assert_eq!(result.metadata.failed_chunks, 0);
        assert_eq!(result.faq.len(), 1);
        assert_eq!(store.results.lock().unwrap().len(), 1);
        assert!(store.raws.lock().unwrap().contains_key(&0));
    }

    #[tokio::test]
    async fn test_large_document_chunk2_times_out_then_fallback_rescues() {
        // ~50KB document split into 3 overlapping chunks; chunk 2's call
        // hits two transient timeouts on the primary, then the fallback
        // answers.
        let text = "Product details. ".repeat(3_000); // 51_000 chars
        let config = ExtractorConfig {
            chunk_threshold: 20_000,
            chunk_size: 20_000,
            chunk_overlap: 2_000,
            ..Default::default()
        };

        let primary = MockService::new("unused").with_name("primary");
        primary.push_outcome(Ok(valid_response("chunk one?")));
        primary.push_transient_error("timeout");
        primary.push_transient_error("timeout");
        primary.push_outcome(Ok(valid_response("chunk three?")));
        let fallback = MockService::new(valid_response("chunk two?")).with_name("fallback");

        let client = LlmClient::new(Arc::new(primary), fast_policy(2))
            .with_fallback(Arc::new(fallback));
        let store = Arc::new(MemStore::default());
        let processor = processor_with(client, store, config);

        let result = processor
            .process("PX-2", &inline_doc(&text), None)
            .await
            .unwrap();

        assert_eq!(result.status, ExtractionStatus::Validated);
        assert_eq!(result.metadata.chunk_count, 3);
        assert_eq!(result.metadata.failed_chunks, 0);
        assert_eq!(result.metadata.transient_retries, 2);
        assert_eq!(result.metadata.fallback_uses, 1);
        assert_eq!(result.faq.len(), 3);
    }

    #[tokio::test]
    async fn test_partial_completion_when_one_chunk_fails() {
        let text = "x".repeat(150);
        let config = ExtractorConfig {
            chunk_threshold: 100,
            chunk_size: 100,
            chunk_overlap: 10,
            ..Default::default()
        };

        let primary = MockService::new("unused");
        primary.push_outcome(Ok(valid_response("first?")));
        primary.push_permanent_error("invalid request");

        let store = Arc::new(MemStore::default());
        let processor = processor_with(
            LlmClient::new(Arc::new(primary), fast_policy(2)),
            store,
            config,
        );

        let result = processor
            .process("PX-3", &inline_doc(&text), None)
            .await
            .unwrap();

        assert_eq!(result.status, ExtractionStatus::PartiallyCompleted);
        assert_eq!(result.metadata.failed_chunks, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("chunk 1"));
        assert_eq!(result.faq.len(), 1);
    }

    #[tokio::test]
    async fn test_all_chunks_failed() {
        let primary = MockService::new("unused");
        primary.push_permanent_error("dead");

        let store = Arc::new(MemStore::default());
        let processor = processor_with(
            LlmClient::new(Arc::new(primary), fast_policy(2)),
            store.clone(),
            ExtractorConfig::default(),
        );

        let result = processor
            .process("PX-4", &inline_doc("doc"), None)
            .await
            .unwrap();

        assert_eq!(result.status, ExtractionStatus::Failed);
        assert!(!result.errors.is_empty());
        // Failed results are still persisted for inspection
        assert_eq!(store.results.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_response_corrected_once() {
        let primary = MockService::new("unused");
        primary.push_outcome(Ok("Sure! Here you go: not json".to_string()));
        // The correction round-trip answers with valid JSON
        primary.push_outcome(Ok(valid_response("fixed?")));

        let store = Arc::new(MemStore::default());
        let processor = processor_with(
            LlmClient::new(Arc::new(primary), fast_policy(2)),
            store,
            ExtractorConfig::default(),
        );

        let result = processor
            .process("PX-5", &inline_doc("doc"), None)
            .await
            .unwrap();

        assert_eq!(result.status, ExtractionStatus::Validated);
        assert_eq!(result.metadata.correction_attempts, 1);
        assert_eq!(result.faq[0].question, "fixed?");
    }

    #[tokio::test]
    async fn test_cancel_flag_aborts_before_next_chunk() {
        let primary = MockService::new(valid_response("any?"));
        let store = Arc::new(MemStore::default());
        let processor = processor_with(
            LlmClient::new(Arc::new(primary), fast_policy(2)),
            store.clone(),
            ExtractorConfig::default(),
        );

        let cancel = AtomicBool::new(true);
        let err = processor
            .process("PX-6", &inline_doc("doc"), Some(&cancel))
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::Cancelled { next_chunk: 0 }));
        assert!(store.results.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_source_failure_aborts() {
        let primary = MockService::new("unused");
        let store = Arc::new(MemStore::default());
        let processor = processor_with(
            LlmClient::new(Arc::new(primary), fast_policy(2)),
            store,
            ExtractorConfig::default(),
        );

        let missing = DocumentRef::File {
            path: PathBuf::from("/does/not/exist.txt"),
        };
        let err = processor.process("PX-7", &missing, None).await.unwrap_err();
        assert!(matches!(err, ExtractError::Source(_)));
    }

    #[tokio::test]
    async fn test_recoverable_store_failures_retried() {
        let primary = MockService::new(valid_response("saved?"));
        let store = Arc::new(MemStore::default());
        store.fail_next_saves(vec![
            IoFailure::recoverable("disk busy"),
            IoFailure::recoverable("disk busy"),
        ]);

        let processor = processor_with(
            LlmClient::new(Arc::new(primary), fast_policy(2)),
            store.clone(),
            ExtractorConfig::default(),
        );

        let result = processor
            .process("PX-8", &inline_doc("doc"), None)
            .await
            .unwrap();
        assert_eq!(result.status, ExtractionStatus::Validated);
        assert_eq!(store.results.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_critical_store_failure_aborts() {
        let primary = MockService::new(valid_response("lost?"));
        let store = Arc::new(MemStore::default());
        store.fail_next_saves(vec![IoFailure::critical("permission denied")]);

        let processor = processor_with(
            LlmClient::new(Arc::new(primary), fast_policy(2)),
            store,
            ExtractorConfig::default(),
        );

        let err = processor
            .process("PX-9", &inline_doc("doc"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Store { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_document_size_ceiling() {
        let primary = MockService::new("unused");
        let store = Arc::new(MemStore::default());
        let config = ExtractorConfig {
            chunk_size: 10,
            chunk_overlap: 2,
            max_document_chars: 10,
            ..Default::default()
        };
        let processor = processor_with(
            LlmClient::new(Arc::new(primary), fast_policy(2)),
            store,
            config,
        );

        let err = processor
            .process("PX-10", &inline_doc(&"z".repeat(11)), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractError::DocumentTooLarge { size: 11, limit: 10 }
        ));
    }
}
