use std::sync::Arc;

use rrf_fusion::search::{EnsembleRetriever, FusedDocument, Retriever, StaticRetriever};
use rrf_fusion::test_utils::fixtures::{FailingRetriever, RecordingRetriever, contents, docs};
use rrf_fusion::test_utils::{TestCase, run_table_tests};
use rrf_fusion::{Document, FusionError};

const EPS: f64 = 1e-12;

fn list(name: &str, items: &[&str], weight: f64) -> (StaticRetriever, f64) {
    (StaticRetriever::new(name, docs(items)), weight)
}

fn ensemble(members: Vec<(StaticRetriever, f64)>) -> EnsembleRetriever {
    let mut builder = EnsembleRetriever::builder();
    for (retriever, weight) in members {
        builder = builder.retriever(retriever, weight);
    }
    builder.build().expect("valid ensemble")
}

fn score_of(fused: &[FusedDocument], content: &str) -> f64 {
    fused
        .iter()
        .find(|f| f.document.content == content)
        .map(|f| f.score)
        .expect("document present")
}

#[test]
fn fusion_ordering_table() -> Result<(), String> {
    let cases: Vec<TestCase<Vec<(StaticRetriever, f64)>, Vec<String>>> = vec![
        TestCase {
            name: "overlap_tie_breaks_on_first_seen",
            input: vec![
                list("a", &["doc1", "doc2", "doc3"], 1.0),
                list("b", &["doc2", "doc1"], 1.0),
            ],
            expected: vec!["doc1".into(), "doc2".into(), "doc3".into()],
        },
        TestCase {
            name: "empty_first_retriever",
            input: vec![list("a", &[], 0.5), list("b", &["docX"], 0.5)],
            expected: vec!["docX".into()],
        },
        TestCase {
            name: "single_retriever_unchanged",
            input: vec![list("a", &["docA", "docB", "docC"], 1.0)],
            expected: vec!["docA".into(), "docB".into(), "docC".into()],
        },
        TestCase {
            name: "weight_favors_first",
            input: vec![list("a", &["doc1"], 2.0), list("b", &["doc2"], 1.0)],
            expected: vec!["doc1".into(), "doc2".into()],
        },
        TestCase {
            name: "weight_favors_second",
            input: vec![list("a", &["doc1"], 1.0), list("b", &["doc2"], 2.0)],
            expected: vec!["doc2".into(), "doc1".into()],
        },
        TestCase {
            name: "identical_doc_merged",
            input: vec![list("a", &["same"], 0.5), list("b", &["same"], 0.5)],
            expected: vec!["same".into()],
        },
        TestCase {
            name: "all_empty",
            input: vec![list("a", &[], 1.0), list("b", &[], 1.0)],
            expected: vec![],
        },
    ];

    run_table_tests(cases, |members| {
        let fused = ensemble(members).fuse("query").expect("fusion succeeds");
        contents(&fused)
    })
}

#[test]
fn overlap_scores_match_formula() {
    let fused = ensemble(vec![
        list("a", &["doc1", "doc2", "doc3"], 1.0),
        list("b", &["doc2", "doc1"], 1.0),
    ])
    .fuse_scored("query")
    .unwrap();

    let expected_pair = 1.0 / 60.0 + 1.0 / 61.0;
    assert!((score_of(&fused, "doc1") - expected_pair).abs() < EPS);
    assert!((score_of(&fused, "doc2") - expected_pair).abs() < EPS);
    assert!((score_of(&fused, "doc3") - 1.0 / 62.0).abs() < EPS);
}

#[test]
fn empty_retriever_contributes_nothing() {
    let fused = ensemble(vec![list("a", &[], 0.5), list("b", &["docX"], 0.5)])
        .fuse_scored("query")
        .unwrap();
    assert_eq!(fused.len(), 1);
    assert!((fused[0].score - 0.5 / 60.0).abs() < EPS);
    assert_eq!(fused[0].rank_in("b"), Some(0));
    assert_eq!(fused[0].rank_in("a"), None);
}

#[test]
fn weighted_scores_match_formula() {
    let fused = ensemble(vec![list("a", &["doc1"], 2.0), list("b", &["doc2"], 1.0)])
        .fuse_scored("query")
        .unwrap();
    assert!((score_of(&fused, "doc1") - 2.0 / 60.0).abs() < EPS);
    assert!((score_of(&fused, "doc2") - 1.0 / 60.0).abs() < EPS);
}

#[test]
fn identical_document_counted_once_with_summed_score() {
    let doc = Document::new("shared").with_source("irc482.pdf");
    let fused = EnsembleRetriever::builder()
        .retriever(StaticRetriever::new("semantic", vec![doc.clone()]), 0.5)
        .retriever(StaticRetriever::new("lexical", vec![doc.clone()]), 0.5)
        .build()
        .unwrap()
        .fuse_scored("query")
        .unwrap();

    assert_eq!(fused.len(), 1);
    assert_eq!(fused[0].document, doc);
    assert!((fused[0].score - 1.0 / 60.0).abs() < EPS);
    assert_eq!(fused[0].contributions.len(), 2);
}

#[test]
fn failing_retriever_surfaces_failure_without_partial_result() {
    let healthy = RecordingRetriever::new("semantic", docs(&["a", "b"]));
    let ensemble = EnsembleRetriever::builder()
        .retriever(healthy.clone(), 1.0)
        .retriever(FailingRetriever::new("bm25", "index locked"), 1.0)
        .build()
        .unwrap();

    let err = ensemble.fuse("query").unwrap_err();
    match &err {
        FusionError::RetrieverFailure {
            retriever,
            index,
            source,
        } => {
            assert_eq!(retriever, "bm25");
            assert_eq!(*index, 1);
            assert!(source.to_string().contains("index locked"));
        }
        other => panic!("expected RetrieverFailure, got {other:?}"),
    }
    assert_eq!(healthy.calls(), 1);
}

#[test]
fn failure_in_first_retriever_stops_sequential_run() {
    let later = RecordingRetriever::new("lexical", docs(&["a"]));
    let ensemble = EnsembleRetriever::builder()
        .retriever(FailingRetriever::new("vector", "timeout"), 1.0)
        .retriever(later.clone(), 1.0)
        .build()
        .unwrap();

    assert_eq!(ensemble.fuse("query").unwrap_err().retriever(), Some("vector"));
    assert_eq!(later.calls(), 0);
}

#[test]
fn query_is_passed_verbatim_to_every_retriever() {
    let semantic = RecordingRetriever::new("semantic", vec![]);
    let lexical = RecordingRetriever::new("lexical", vec![]);
    let ensemble = EnsembleRetriever::new(
        vec![Arc::new(semantic.clone()), Arc::new(lexical.clone())],
        &[0.5, 0.5],
    );

    let query = "  Section 482 \"arm's length\"  ";
    assert!(ensemble.fuse(query).unwrap().is_empty());
    assert_eq!(semantic.queries(), vec![query.to_string()]);
    assert_eq!(lexical.queries(), vec![query.to_string()]);
}

#[test]
fn ensemble_is_usable_as_retriever() {
    let inner = ensemble(vec![list("a", &["x", "y"], 1.0)]);
    let as_dyn: Arc<dyn Retriever> = Arc::new(inner);
    assert_eq!(contents(&as_dyn.retrieve("q").unwrap()), vec!["x", "y"]);
}

#[test]
fn custom_constant_changes_scores() {
    let fused = EnsembleRetriever::builder()
        .retriever(StaticRetriever::new("a", docs(&["d0", "d1"])), 1.0)
        .c(1.0)
        .build()
        .unwrap()
        .fuse_scored("q")
        .unwrap();
    assert!((fused[0].score - 1.0).abs() < EPS);
    assert!((fused[1].score - 0.5).abs() < EPS);
}
