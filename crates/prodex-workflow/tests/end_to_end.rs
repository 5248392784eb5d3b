//! Full-stack workflow tests over a scripted LLM: submission through
//! queue, workers, extraction, validation, and the result store.

use prodex_domain::{DocumentRef, ExtractionStatus};
use prodex_extractor::ChunkProcessor;
use prodex_llm::{LlmClient, MockService, RetryPolicy};
use prodex_queue::JobStatus;
use prodex_validator::{ValidationEngine, ValidatorConfig};
use prodex_workflow::{
    BatchStatus, ExtractionExecutor, FileSource, JsonFileStore, ProdexConfig, WorkflowManager,
};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn valid_response(question: &str) -> String {
    serde_json::json!({
        "relations": [],
        "specifications": [
            {"category": "general", "name": "weight", "raw_value": "12 kg", "value": 12.0, "unit": "kg", "confidence": 0.9}
        ],
        "data_tables": [],
        "faq": [{"question": question, "answer": "yes", "confidence": 0.8}]
    })
    .to_string()
}

fn test_config(output_dir: &Path, state_dir: &Path) -> ProdexConfig {
    let mut config = ProdexConfig::default();
    config.pool.workers = 2;
    config.pool.poll_interval_ms = 10;
    config.scheduler.tick_interval_ms = 20;
    config.queue.retry_backoff_base_ms = 0;
    config.storage.output_dir = output_dir.to_path_buf();
    config.storage.state_dir = state_dir.to_path_buf();
    config
}

fn manager_with_llm(config: ProdexConfig, llm: MockService) -> WorkflowManager {
    let policy = RetryPolicy {
        max_attempts: 1,
        backoff_base_ms: 1,
        backoff_cap_ms: 2,
        call_timeout_secs: 5,
    };
    let client = LlmClient::new(Arc::new(llm), policy);
    let processor = ChunkProcessor::new(
        Arc::new(client),
        ValidationEngine::new(ValidatorConfig::default()),
        Arc::new(FileSource),
        Arc::new(JsonFileStore::new(&config.storage.output_dir)),
        config.extractor.clone(),
    )
    .unwrap();
    WorkflowManager::new(config, Arc::new(ExtractionExecutor::new(processor))).unwrap()
}

fn inline_doc(text: &str) -> DocumentRef {
    DocumentRef::Inline {
        name: "doc".to_string(),
        text: text.to_string(),
    }
}

#[tokio::test]
async fn test_product_flows_to_validated_result_on_disk() {
    let output = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    let config = test_config(output.path(), state.path());
    let manager = manager_with_llm(config, MockService::new(valid_response("works?")));
    manager.start().unwrap();

    let id = manager
        .submit_product(
            "PX-900",
            inline_doc("A small product datasheet."),
            prodex_queue::JobPriority::Normal,
        )
        .unwrap();

    let status = tokio::time::timeout(
        Duration::from_secs(5),
        manager.wait_for_job(id, Duration::from_millis(10)),
    )
    .await
    .unwrap();
    assert_eq!(status, Some(JobStatus::Completed));
    manager.stop(true).await.unwrap();

    let store = JsonFileStore::new(output.path());
    let result = store.load_latest("PX-900").unwrap().unwrap();
    assert_eq!(result.status, ExtractionStatus::Validated);
    assert_eq!(result.specifications.len(), 1);
    assert_eq!(result.metadata.version, 1);
    // Raw response archived alongside
    assert!(store.product_dir("PX-900").join("raw/chunk_0.txt").exists());
}

#[tokio::test]
async fn test_csv_batch_completes() {
    let output = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();

    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "product_id,text,priority").unwrap();
    writeln!(csv, "CSV-1,first product body,high").unwrap();
    writeln!(csv, "CSV-2,second product body,").unwrap();
    csv.flush().unwrap();

    let config = test_config(output.path(), state.path());
    let manager = manager_with_llm(config, MockService::new(valid_response("csv?")));
    manager.start().unwrap();

    let batch = manager
        .submit_csv(csv.path(), prodex_queue::JobPriority::Normal)
        .unwrap();
    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        manager.wait_for_batch(&batch, Duration::from_millis(10)),
    )
    .await
    .unwrap();

    assert_eq!(summary.status, BatchStatus::Completed);
    assert_eq!(summary.completed, 2);
    manager.stop(true).await.unwrap();

    let store = JsonFileStore::new(output.path());
    assert!(store.load_latest("CSV-1").unwrap().is_some());
    assert!(store.load_latest("CSV-2").unwrap().is_some());
}

#[tokio::test]
async fn test_provider_outage_exhausts_retries_to_terminal_failure() {
    let output = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();

    let llm = MockService::new(valid_response("never used"));
    // One permanent failure per job attempt: initial + 3 retries
    for _ in 0..4 {
        llm.push_permanent_error("model gone");
    }

    let config = test_config(output.path(), state.path());
    let manager = manager_with_llm(config, llm);
    manager.start().unwrap();

    let id = manager
        .submit_product(
            "PX-DOWN",
            inline_doc("unreachable"),
            prodex_queue::JobPriority::Normal,
        )
        .unwrap();

    let status = tokio::time::timeout(
        Duration::from_secs(5),
        manager.wait_for_job(id, Duration::from_millis(10)),
    )
    .await
    .unwrap();
    assert_eq!(status, Some(JobStatus::Failed));

    let job = manager.job(id).unwrap();
    assert_eq!(job.attempt_count, 3);
    assert!(job.last_error.is_some());
    manager.stop(true).await.unwrap();
}
