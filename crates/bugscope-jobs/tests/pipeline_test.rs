//! End-to-end tests for the analysis pipeline against the in-memory store.
//!
//! Covers:
//! - Successful analysis: bug `analyzed`, job `done`
//! - Provider failure and timeout: bug and job `error`, no reprocessing
//! - Missing bug: job `error` with a "not found" message
//! - Idempotency: an analyzed bug is never sent to the provider again
//! - Malformed payloads and context degradation

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bugscope_core::{
    AnalysisRecord, BugRepository, BugStatus, CreateBugRequest, CreateProjectRequest,
    JobRepository, JobStatus, JobType, ProjectRepository, Severity, SubmittedBug, TelemetryLog,
    Viewport,
};
use bugscope_db::MemoryStore;
use bugscope_inference::MockAnalysisProvider;
use bugscope_jobs::{AnalysisPipeline, CycleOutcome};
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

async fn store_with_project() -> (MemoryStore, Uuid) {
    let store = MemoryStore::new();
    let project = ProjectRepository::insert(
        &store,
        CreateProjectRequest {
            name: "Shop".to_string(),
            public_key: "pk_shop".to_string(),
            secret_key: "sk_shop".to_string(),
        },
    )
    .await
    .unwrap();
    (store, project.id)
}

async fn submit_bug(store: &MemoryStore, project_id: Uuid) -> SubmittedBug {
    store
        .submit(CreateBugRequest {
            project_id,
            title: "Checkout button does nothing".to_string(),
            steps: "1. Add item\n2. Click checkout".to_string(),
            expected: "Payment page opens".to_string(),
            actual: "Nothing happens".to_string(),
            severity: Severity::High,
            url: "https://shop.example.com/checkout".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            viewport: Viewport {
                width: 1280,
                height: 720,
            },
            console_logs: TelemetryLog::new(),
            network_errors: TelemetryLog::new(),
            screenshot_data_url: None,
        })
        .await
        .unwrap()
}

fn pipeline(store: &MemoryStore, provider: &MockAnalysisProvider) -> AnalysisPipeline {
    AnalysisPipeline::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(provider.clone()),
    )
}

fn stub_provider() -> MockAnalysisProvider {
    MockAnalysisProvider::new()
        .with_name("stub")
        .with_analysis("ok")
        .with_diff("NONE")
        .with_confidence(0.9)
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_successful_analysis() {
    let (store, project_id) = store_with_project().await;
    let ids = submit_bug(&store, project_id).await;
    let provider = stub_provider();

    let outcome = pipeline(&store, &provider).run_cycle().await;
    assert_eq!(
        outcome,
        CycleOutcome::Completed {
            job_id: ids.job_id,
            bug_id: ids.bug_id,
            provider: "stub".to_string(),
        }
    );

    let bug = BugRepository::get(&store, ids.bug_id).await.unwrap().unwrap();
    assert_eq!(bug.status, BugStatus::Analyzed);
    assert_eq!(bug.ai_analysis.as_deref(), Some("ok"));
    assert!(bug.ai_patch_diff.is_none());
    assert_eq!(bug.confidence, Some(0.9));
    assert_eq!(bug.ai_provider.as_deref(), Some("stub"));

    let job = JobRepository::get(&store, ids.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert!(job.error.is_none());
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_patch_and_confidence_are_normalized() {
    let (store, project_id) = store_with_project().await;
    let ids = submit_bug(&store, project_id).await;
    let diff = "--- a/src/Checkout.tsx\n+++ b/src/Checkout.tsx\n@@ -1 +1 @@\n-a\n+b\n";
    let provider = stub_provider().with_diff(diff).with_confidence(1.5);

    pipeline(&store, &provider).run_cycle().await;

    let bug = BugRepository::get(&store, ids.bug_id).await.unwrap().unwrap();
    assert_eq!(bug.ai_patch_diff.as_deref(), Some(diff));
    assert_eq!(bug.confidence, Some(1.0));
}

#[tokio::test]
async fn test_percentage_confidence_is_scaled() {
    let (store, project_id) = store_with_project().await;
    let ids = submit_bug(&store, project_id).await;
    let provider = stub_provider().with_confidence(85.0);

    pipeline(&store, &provider).run_cycle().await;

    let bug = BugRepository::get(&store, ids.bug_id).await.unwrap().unwrap();
    let confidence = bug.confidence.unwrap();
    assert!((confidence - 0.85).abs() < 1e-9);
}

#[tokio::test]
async fn test_provider_timeout_marks_job_and_bug_error() {
    let (store, project_id) = store_with_project().await;
    let ids = submit_bug(&store, project_id).await;
    let provider = stub_provider().with_latency(Duration::from_millis(500));
    let pipeline = pipeline(&store, &provider).with_timeout(Duration::from_millis(50));

    let outcome = pipeline.run_cycle().await;
    match outcome {
        CycleOutcome::Failed { job_id, bug_id, error } => {
            assert_eq!(job_id, ids.job_id);
            assert_eq!(bug_id, Some(ids.bug_id));
            assert!(error.contains("timed out"));
        }
        other => panic!("expected failure, got {:?}", other),
    }

    let bug = BugRepository::get(&store, ids.bug_id).await.unwrap().unwrap();
    assert_eq!(bug.status, BugStatus::Error);
    assert!(bug.ai_analysis.is_none());

    let job = JobRepository::get(&store, ids.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert!(!job.error.unwrap_or_default().is_empty());

    // The failed job is not picked up again
    assert_eq!(pipeline.run_cycle().await, CycleOutcome::Idle);
    let job = JobRepository::get(&store, ids.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
}

#[tokio::test]
async fn test_provider_error_message_is_recorded() {
    let (store, project_id) = store_with_project().await;
    let ids = submit_bug(&store, project_id).await;
    let provider = stub_provider().failing("quota exceeded");

    let outcome = pipeline(&store, &provider).run_cycle().await;
    assert!(matches!(outcome, CycleOutcome::Failed { .. }));

    let job = JobRepository::get(&store, ids.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert!(job.error.unwrap().contains("quota exceeded"));

    let bug = BugRepository::get(&store, ids.bug_id).await.unwrap().unwrap();
    assert_eq!(bug.status, BugStatus::Error);
}

#[tokio::test]
async fn test_empty_analysis_fails_instead_of_analyzing() {
    let (store, project_id) = store_with_project().await;
    let ids = submit_bug(&store, project_id).await;
    let provider = stub_provider().with_analysis("   ");

    let outcome = pipeline(&store, &provider).run_cycle().await;
    assert!(matches!(outcome, CycleOutcome::Failed { .. }));

    let bug = BugRepository::get(&store, ids.bug_id).await.unwrap().unwrap();
    assert_eq!(bug.status, BugStatus::Error);
    assert!(bug.ai_analysis.is_none());
}

#[tokio::test]
async fn test_missing_bug_fails_job() {
    let (store, _) = store_with_project().await;
    let job_id = store
        .enqueue(JobType::AnalyzeBug, json!({"bugId": "does-not-exist"}))
        .await
        .unwrap();
    let provider = stub_provider();

    let outcome = pipeline(&store, &provider).run_cycle().await;
    assert!(matches!(
        outcome,
        CycleOutcome::Failed { bug_id: None, .. }
    ));

    let job = JobRepository::get(&store, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert!(job.error.unwrap().contains("not found"));

    let bugs = store.list(Default::default()).await.unwrap();
    assert!(bugs.is_empty());
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_unknown_uuid_fails_job() {
    let (store, _) = store_with_project().await;
    let job_id = store
        .enqueue(
            JobType::AnalyzeBug,
            json!({"bugId": Uuid::now_v7().to_string()}),
        )
        .await
        .unwrap();

    pipeline(&store, &stub_provider()).run_cycle().await;

    let job = JobRepository::get(&store, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert!(job.error.unwrap().contains("not found"));
}

#[tokio::test]
async fn test_malformed_payload_touches_no_bug() {
    let (store, project_id) = store_with_project().await;
    let ids = submit_bug(&store, project_id).await;
    // Take the real job out of the way so the malformed one is claimed
    store.claim_next(JobType::AnalyzeBug).await.unwrap();

    let job_id = store
        .enqueue(JobType::AnalyzeBug, json!({"unexpected": true}))
        .await
        .unwrap();
    let provider = stub_provider();

    let outcome = pipeline(&store, &provider).run_cycle().await;
    assert!(matches!(
        outcome,
        CycleOutcome::Failed { bug_id: None, .. }
    ));

    let job = JobRepository::get(&store, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert!(job.error.is_some());

    let bug = BugRepository::get(&store, ids.bug_id).await.unwrap().unwrap();
    assert_eq!(bug.status, BugStatus::Queued);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_analyzed_bug_is_skipped() {
    let (store, project_id) = store_with_project().await;
    let ids = submit_bug(&store, project_id).await;
    store.set_status(ids.bug_id, BugStatus::Analyzing).await.unwrap();
    store
        .record_analysis(
            ids.bug_id,
            &AnalysisRecord {
                analysis: "Already explained.".to_string(),
                patch_diff: None,
                confidence: 0.7,
                provider: "earlier".to_string(),
            },
        )
        .await
        .unwrap();

    let provider = stub_provider();
    let outcome = pipeline(&store, &provider).run_cycle().await;
    assert_eq!(
        outcome,
        CycleOutcome::Skipped {
            job_id: ids.job_id,
            bug_id: ids.bug_id,
        }
    );
    assert_eq!(provider.call_count(), 0);

    let job = JobRepository::get(&store, ids.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);

    let bug = BugRepository::get(&store, ids.bug_id).await.unwrap().unwrap();
    assert_eq!(bug.ai_analysis.as_deref(), Some("Already explained."));
    assert_eq!(bug.ai_provider.as_deref(), Some("earlier"));
}

#[tokio::test]
async fn test_concurrent_duplicate_result_is_discarded() {
    let (store, project_id) = store_with_project().await;
    let ids = submit_bug(&store, project_id).await;
    let second = store
        .enqueue(
            JobType::AnalyzeBug,
            json!({"bugId": ids.bug_id.to_string()}),
        )
        .await
        .unwrap();
    let provider = stub_provider().with_latency(Duration::from_millis(100));
    let pipeline = pipeline(&store, &provider);

    // Both jobs reach the provider while the bug is `analyzing`
    let (first_outcome, second_outcome) =
        tokio::join!(pipeline.run_cycle(), pipeline.run_cycle());
    assert_eq!(provider.call_count(), 2);
    assert!(matches!(first_outcome, CycleOutcome::Completed { .. }));
    assert_eq!(
        second_outcome,
        CycleOutcome::Skipped {
            job_id: second,
            bug_id: ids.bug_id,
        }
    );

    let bug = BugRepository::get(&store, ids.bug_id).await.unwrap().unwrap();
    assert_eq!(bug.status, BugStatus::Analyzed);
    let job = JobRepository::get(&store, second).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
}

#[tokio::test]
async fn test_duplicate_job_analyzes_once() {
    let (store, project_id) = store_with_project().await;
    let ids = submit_bug(&store, project_id).await;
    let second = store
        .enqueue(
            JobType::AnalyzeBug,
            json!({"bugId": ids.bug_id.to_string()}),
        )
        .await
        .unwrap();
    let provider = stub_provider();
    let pipeline = pipeline(&store, &provider);

    assert!(matches!(
        pipeline.run_cycle().await,
        CycleOutcome::Completed { .. }
    ));
    assert!(matches!(
        pipeline.run_cycle().await,
        CycleOutcome::Skipped { .. }
    ));
    assert_eq!(provider.call_count(), 1);

    let job = JobRepository::get(&store, second).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
}

#[tokio::test]
async fn test_empty_queue_is_idle() {
    let (store, _) = store_with_project().await;
    let provider = stub_provider();
    assert!(pipeline(&store, &provider).run_cycle().await.is_idle());
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_jobs_processed_in_submission_order() {
    let (store, project_id) = store_with_project().await;
    let first = submit_bug(&store, project_id).await;
    let second = submit_bug(&store, project_id).await;
    let provider = stub_provider();
    let pipeline = pipeline(&store, &provider);

    assert_eq!(pipeline.run_cycle().await.job_id(), Some(first.job_id));
    assert_eq!(pipeline.run_cycle().await.job_id(), Some(second.job_id));

    let calls = provider.calls();
    assert_eq!(calls[0].bug_id, first.bug_id);
    assert_eq!(calls[1].bug_id, second.bug_id);
}

// ============================================================================
// CONTEXT
// ============================================================================

#[tokio::test]
async fn test_context_is_passed_to_provider() {
    let root = TempDir::new().unwrap();
    std::fs::create_dir_all(root.path().join("src/pages")).unwrap();
    std::fs::write(root.path().join("src/pages/Checkout.tsx"), "export {}").unwrap();
    std::fs::write(root.path().join("src/pages/Home.tsx"), "export {}").unwrap();

    let (store, project_id) = store_with_project().await;
    submit_bug(&store, project_id).await;
    let provider = stub_provider();
    let pipeline =
        pipeline(&store, &provider).with_context_root(Some(root.path().to_path_buf()));

    pipeline.run_cycle().await;

    let calls = provider.calls();
    assert_eq!(
        calls[0].context,
        vec!["src/pages/Checkout.tsx", "src/pages/Home.tsx"]
    );
}

#[tokio::test]
async fn test_missing_context_root_degrades_to_empty() {
    let (store, project_id) = store_with_project().await;
    let ids = submit_bug(&store, project_id).await;
    let provider = stub_provider();
    let pipeline = pipeline(&store, &provider)
        .with_context_root(Some(PathBuf::from("/nonexistent/bugscope-context")));

    let outcome = pipeline.run_cycle().await;
    assert!(matches!(outcome, CycleOutcome::Completed { .. }));
    assert!(provider.calls()[0].context.is_empty());

    let bug = BugRepository::get(&store, ids.bug_id).await.unwrap().unwrap();
    assert_eq!(bug.status, BugStatus::Analyzed);
}
