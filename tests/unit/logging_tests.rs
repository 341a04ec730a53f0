use std::sync::Arc;

use rrf_fusion::search::{EnsembleRetriever, StaticRetriever};
use rrf_fusion::test_utils::fixtures::{FailingRetriever, docs};
use rrf_fusion::test_utils::logging::capture_logs;
use rrf_fusion::{Retriever, assert_log_contains, assert_log_matches, assert_no_warnings};
use tracing::Level;

fn two_retrievers() -> Vec<Arc<dyn Retriever>> {
    vec![
        Arc::new(StaticRetriever::new("semantic", docs(&["a", "b"]))),
        Arc::new(StaticRetriever::new("lexical", docs(&["b", "c"]))),
    ]
}

#[test]
fn missing_weight_logs_warning() {
    let (ensemble, logs) = capture_logs(Level::DEBUG, || {
        EnsembleRetriever::new(two_retrievers(), &[0.5])
    });
    assert_eq!(ensemble.weights(), vec![0.5, 1.0]);
    assert_log_contains!(logs, Level::WARN, "missing weights default to 1.0");
}

#[test]
fn fully_weighted_ensemble_is_quiet() {
    let (fused, logs) = capture_logs(Level::DEBUG, || {
        EnsembleRetriever::new(two_retrievers(), &[0.5, 0.5])
            .fuse("q")
            .unwrap()
    });
    assert_eq!(fused.len(), 3);
    assert_no_warnings!(logs);
    assert_log_matches!(logs, r"^retriever returned$");
    assert_log_contains!(logs, Level::DEBUG, "rrf merge complete");
}

#[test]
fn non_positive_weight_logs_warning() {
    let ((), logs) = capture_logs(Level::WARN, || {
        let _ = EnsembleRetriever::builder()
            .retriever(StaticRetriever::new("semantic", docs(&["a"])), 0.0)
            .build();
    });
    assert_log_contains!(logs, Level::WARN, "non-positive fusion weight");
}

#[test]
fn retriever_failure_is_logged_with_name() {
    let (result, logs) = capture_logs(Level::WARN, || {
        EnsembleRetriever::builder()
            .retriever(FailingRetriever::new("bm25", "index locked"), 1.0)
            .build()
            .unwrap()
            .fuse("q")
    });
    assert!(result.is_err());
    let entry = logs
        .iter()
        .find(|e| e.message == "retriever failed")
        .expect("failure logged");
    assert_eq!(entry.field("retriever"), Some("bm25"));
    assert_eq!(entry.field("error"), Some("index locked"));
}
