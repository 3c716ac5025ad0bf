use dishmark_core::checkpoint::CheckpointStore;
use dishmark_core::report;
use dishmark_core::source::discover_sources;
use dishmark_core::{AppError, Restaurant, RunSummary};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::common::*;

async fn run_once(
    analyzer: &ScriptedAnalyzer,
    dir: &TempDir,
    batch_size: usize,
) -> Result<RunSummary, AppError> {
    let cfg = config(dir.path(), batch_size);
    let sources = discover_sources(&dir.path().join("outputs"))?;
    processor(analyzer, cfg)
        .run(&sources, &CancellationToken::new(), &Silent)
        .await
}

fn ten_parents() -> Vec<Restaurant> {
    (1..=10)
        .map(|i| restaurant(&format!("p{i:02}"), &["dish", "plain"]))
        .collect()
}

#[tokio::test]
async fn second_run_processes_nothing() {
    let dir = TempDir::new().unwrap();
    write_listing(dir.path(), "a.json", &ten_parents()[..4]);
    let analyzer = ScriptedAnalyzer::new();

    let first = run_once(&analyzer, &dir, 100).await.unwrap();
    assert_eq!(first.parents_processed, 4);
    let calls_after_first = analyzer.calls().len();

    let second = run_once(&analyzer, &dir, 100).await.unwrap();
    assert_eq!(second.parents_processed, 0);
    assert_eq!(second.parents_skipped, 4);
    assert_eq!(analyzer.calls().len(), calls_after_first);
    // The first run's batch is left alone and no empty batch is added.
    assert_eq!(batch_files(&config(dir.path(), 100)).len(), 1);
}

#[tokio::test]
async fn halted_run_resumes_after_last_checkpointed_parent() {
    let dir = TempDir::new().unwrap();
    let parents = ten_parents();
    let listing = write_listing(dir.path(), "a.json", &parents);
    let analyzer = ScriptedAnalyzer::new();

    let cancel = CancellationToken::new();
    let halt = HaltAfter::new(cancel.clone(), 3);
    let first = processor(&analyzer, config(dir.path(), 100))
        .run(std::slice::from_ref(&listing), &cancel, &halt)
        .await
        .unwrap();
    assert_eq!(first.parents_processed, 3);

    let resumed = ScriptedAnalyzer::new();
    let second = processor(&resumed, config(dir.path(), 100))
        .run(&[listing], &CancellationToken::new(), &Silent)
        .await
        .unwrap();

    assert_eq!(second.parents_skipped, 3);
    assert_eq!(second.parents_processed, 7);
    let expected: Vec<String> = parents[3..]
        .iter()
        .flat_map(|p| p.photo_urls.clone())
        .collect();
    assert_eq!(resumed.calls(), expected);

    let checkpoint = CheckpointStore::load(config(dir.path(), 100).checkpoint_path);
    assert_eq!(checkpoint.len(), 10);
}

#[tokio::test]
async fn batches_hold_at_most_threshold_entries() {
    let dir = TempDir::new().unwrap();
    let parents: Vec<Restaurant> = (1..=7)
        .map(|i| restaurant(&format!("p{i}"), &["dish"]))
        .collect();
    write_listing(dir.path(), "a.json", &parents);

    let summary = run_once(&ScriptedAnalyzer::new(), &dir, 3).await.unwrap();

    let files = batch_files(&config(dir.path(), 3));
    assert_eq!(summary.batches_written, 3);
    assert_eq!(files.len(), 3);
    let sizes: Vec<usize> = files.iter().map(|f| batch_len(f)).collect();
    assert_eq!(sizes, vec![3, 3, 1]);
    assert_eq!(
        files[2].file_name().unwrap(),
        "knowledge_base_batch_0000000003.json"
    );
}

#[tokio::test]
async fn exact_multiple_leaves_no_empty_trailing_batch() {
    let dir = TempDir::new().unwrap();
    let parents: Vec<Restaurant> = (1..=3)
        .map(|i| restaurant(&format!("p{i}"), &["dish-a", "dish-b"]))
        .collect();
    write_listing(dir.path(), "a.json", &parents);

    run_once(&ScriptedAnalyzer::new(), &dir, 3).await.unwrap();

    let sizes: Vec<usize> = batch_files(&config(dir.path(), 3))
        .iter()
        .map(|f| batch_len(f))
        .collect();
    assert_eq!(sizes, vec![3, 3]);
}

#[tokio::test]
async fn batch_numbering_continues_on_later_runs() {
    let dir = TempDir::new().unwrap();
    write_listing(dir.path(), "a.json", &[restaurant("p1", &["dish"])]);
    run_once(&ScriptedAnalyzer::new(), &dir, 100).await.unwrap();

    write_listing(dir.path(), "b.json", &[restaurant("p2", &["dish"])]);
    run_once(&ScriptedAnalyzer::new(), &dir, 100).await.unwrap();

    let names: Vec<String> = batch_files(&config(dir.path(), 100))
        .iter()
        .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "knowledge_base_batch_0000000001.json",
            "knowledge_base_batch_0000000002.json"
        ]
    );
}

#[tokio::test]
async fn failed_photo_does_not_block_other_restaurants() {
    let dir = TempDir::new().unwrap();
    write_listing(
        dir.path(),
        "a.json",
        &[
            restaurant("p1", &["fail", "dish"]),
            restaurant("p2", &["dish"]),
        ],
    );
    let analyzer = ScriptedAnalyzer::new();

    let summary = run_once(&analyzer, &dir, 100).await.unwrap();

    assert_eq!(analyzer.calls().len(), 3);
    assert_eq!(summary.parents_processed, 2);
    assert_eq!(summary.failures, 1);
    assert_eq!(summary.successes, 2);
    assert_eq!(
        summary.per_parent[0].failed_references,
        vec!["https://img.example/p1/fail.jpg".to_string()]
    );
}

#[tokio::test]
async fn summary_counts_match_the_run() {
    let dir = TempDir::new().unwrap();
    let mut parents = ten_parents();
    parents[5] = restaurant("p06", &["dish", "fail"]);
    write_listing(dir.path(), "a.json", &parents);
    let cfg = config(dir.path(), 100);
    std::fs::create_dir_all(cfg.checkpoint_path.parent().unwrap()).unwrap();
    std::fs::write(&cfg.checkpoint_path, r#"["p01", "p02", "p03"]"#).unwrap();

    let summary = run_once(&ScriptedAnalyzer::new(), &dir, 100).await.unwrap();

    assert_eq!(summary.parents_seen, 10);
    assert_eq!(summary.parents_skipped, 3);
    assert_eq!(summary.parents_processed, 7);
    assert_eq!(summary.children_analyzed, 14);
    assert_eq!(summary.failures, 1);
    assert_eq!(summary.successes, 7);
    assert_eq!(summary.non_matches, 6);
    assert_eq!(summary.knowledge_base_entries, 7);

    let on_disk: RunSummary = serde_json::from_str(
        &std::fs::read_to_string(cfg.report_dir.join(report::SUMMARY_JSON)).unwrap(),
    )
    .unwrap();
    assert_eq!(on_disk.parents_processed, 7);
    assert_eq!(on_disk.failures, 1);
}

#[tokio::test]
async fn corrupt_checkpoint_starts_fresh() {
    let dir = TempDir::new().unwrap();
    write_listing(dir.path(), "a.json", &ten_parents()[..2]);
    let cfg = config(dir.path(), 100);
    std::fs::create_dir_all(cfg.checkpoint_path.parent().unwrap()).unwrap();
    std::fs::write(&cfg.checkpoint_path, "[\"p01\", ").unwrap();

    let summary = run_once(&ScriptedAnalyzer::new(), &dir, 100).await.unwrap();

    assert_eq!(summary.parents_processed, 2);
    let checkpoint = CheckpointStore::load(&cfg.checkpoint_path);
    assert_eq!(checkpoint.keys(), ["p01".to_string(), "p02".to_string()]);
}

#[tokio::test]
async fn unreadable_listing_is_skipped() {
    let dir = TempDir::new().unwrap();
    write_listing(dir.path(), "a.json", &[restaurant("p1", &["dish"])]);
    std::fs::write(dir.path().join("outputs/b.json"), "{ not json").unwrap();
    write_listing(dir.path(), "c.json", &[restaurant("p2", &["dish"])]);

    let summary = run_once(&ScriptedAnalyzer::new(), &dir, 100).await.unwrap();

    assert_eq!(summary.parents_processed, 2);
    assert_eq!(summary.sources.len(), 2);
    assert!(summary.sources.iter().all(|s| !s.ends_with("b.json")));
}

#[tokio::test]
async fn checkpoint_write_failure_stops_run_and_flushes_pending() {
    let dir = TempDir::new().unwrap();
    write_listing(
        dir.path(),
        "a.json",
        &[restaurant("p1", &["dish-a", "dish-b"]), restaurant("p2", &["dish"])],
    );
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let mut cfg = config(dir.path(), 100);
    cfg.checkpoint_path = blocker.join("processed_places.json");
    let sources = discover_sources(&dir.path().join("outputs")).unwrap();
    let analyzer = ScriptedAnalyzer::new();

    let err = processor(&analyzer, cfg.clone())
        .run(&sources, &CancellationToken::new(), &Silent)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::PersistenceError { .. }));
    assert!(err.is_fatal());
    // Stopped at the first parent.
    assert_eq!(analyzer.calls().len(), 2);
    let files = batch_files(&cfg);
    assert_eq!(files.len(), 1);
    assert_eq!(batch_len(&files[0]), 2);
}

#[tokio::test]
async fn partially_failed_restaurant_is_not_retried_by_default() {
    let dir = TempDir::new().unwrap();
    write_listing(dir.path(), "a.json", &[restaurant("p1", &["fail", "dish"])]);

    let first = run_once(&ScriptedAnalyzer::new(), &dir, 100).await.unwrap();
    assert_eq!(first.parents_deferred, 0);

    let again = ScriptedAnalyzer::new();
    let second = run_once(&again, &dir, 100).await.unwrap();
    assert_eq!(second.parents_skipped, 1);
    assert!(again.calls().is_empty());
}

#[tokio::test]
async fn partially_failed_restaurant_is_retried_when_deferral_enabled() {
    let dir = TempDir::new().unwrap();
    let listing = write_listing(dir.path(), "a.json", &[restaurant("p1", &["fail", "dish"])]);
    let cfg = config(dir.path(), 100).with_checkpoint_partial_failures(false);

    let first = processor(&ScriptedAnalyzer::new(), cfg.clone())
        .run(std::slice::from_ref(&listing), &CancellationToken::new(), &Silent)
        .await
        .unwrap();
    assert_eq!(first.parents_deferred, 1);

    let again = ScriptedAnalyzer::new();
    let second = processor(&again, cfg)
        .run(&[listing], &CancellationToken::new(), &Silent)
        .await
        .unwrap();
    assert_eq!(second.parents_skipped, 0);
    assert_eq!(again.calls().len(), 2);
}

#[tokio::test]
async fn retried_restaurant_reaches_batches_once() {
    let dir = TempDir::new().unwrap();
    let listing = write_listing(
        dir.path(),
        "a.json",
        &[
            restaurant("p1", &["dish-a", "dish-b", "fail"]),
            restaurant("p2", &["dish"]),
        ],
    );
    let cfg = config(dir.path(), 100).with_checkpoint_partial_failures(false);

    let first = processor(&ScriptedAnalyzer::new(), cfg.clone())
        .run(std::slice::from_ref(&listing), &CancellationToken::new(), &Silent)
        .await
        .unwrap();
    assert_eq!(first.parents_deferred, 1);
    assert_eq!(first.successes, 3);
    assert_eq!(first.knowledge_base_entries, 1);

    // The failing photo is gone on the next run.
    write_listing(
        dir.path(),
        "a.json",
        &[restaurant("p1", &["dish-a", "dish-b"]), restaurant("p2", &["dish"])],
    );
    let second = processor(&ScriptedAnalyzer::new(), cfg.clone())
        .run(&[listing], &CancellationToken::new(), &Silent)
        .await
        .unwrap();
    assert_eq!(second.parents_deferred, 0);
    assert_eq!(second.parents_skipped, 1);
    assert_eq!(second.knowledge_base_entries, 2);

    let entries: Vec<serde_json::Value> = batch_files(&cfg)
        .iter()
        .flat_map(|f| {
            serde_json::from_str::<Vec<serde_json::Value>>(&std::fs::read_to_string(f).unwrap())
                .unwrap()
        })
        .collect();
    let p1_photos: Vec<&str> = entries
        .iter()
        .filter(|e| e["place_id"] == "p1")
        .map(|e| e["photo_url"].as_str().unwrap())
        .collect();
    assert_eq!(
        p1_photos,
        [
            "https://img.example/p1/dish-a.jpg",
            "https://img.example/p1/dish-b.jpg"
        ]
    );
    assert_eq!(entries.len(), 3);
}

#[tokio::test]
async fn batch_write_failure_leaves_restaurant_unprocessed() {
    let dir = TempDir::new().unwrap();
    write_listing(dir.path(), "a.json", &[restaurant("p1", &["dish"])]);
    let cfg = config(dir.path(), 1);
    let sources = discover_sources(&dir.path().join("outputs")).unwrap();
    let analyzer = ScriptedAnalyzer::new();
    let run = processor(&analyzer, cfg.clone());

    // The knowledge base directory turns into a regular file mid-run.
    std::fs::remove_dir_all(&cfg.knowledge_base_dir).unwrap();
    std::fs::write(&cfg.knowledge_base_dir, "not a directory").unwrap();

    let err = run
        .run(&sources, &CancellationToken::new(), &Silent)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::PersistenceError { .. }));
    assert_eq!(analyzer.calls().len(), 1);
    let checkpoint = CheckpointStore::load(&cfg.checkpoint_path);
    assert!(!checkpoint.is_processed("p1"));
    let on_disk: RunSummary = serde_json::from_str(
        &std::fs::read_to_string(cfg.report_dir.join(report::SUMMARY_JSON)).unwrap(),
    )
    .unwrap();
    assert_eq!(on_disk.successes, 1);
    assert_eq!(on_disk.batches_written, 0);
}
