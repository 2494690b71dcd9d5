//! DefStorage over an on-disk redb store
//!
//! Each test uses its own temp directory.

use defstore::{upstream_of, DefStorage, StoreConfig, TRANSACTION_SENTINEL_KEY};
use serde_json::json;
use tempfile::TempDir;

fn config(dir: &TempDir, max_kb: f64, graph_eviction: bool) -> StoreConfig {
    StoreConfig {
        data_dir: Some(dir.path().to_path_buf()),
        definitions_max_kb: max_kb,
        actions_max_kb: max_kb,
        graph_eviction,
        ..StoreConfig::default()
    }
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    {
        let storage = DefStorage::open(config(&dir, 1024.0, false)).await.unwrap();
        storage
            .store_definitions(vec![
                ("markup://ui:button".into(), json!({"attributes": ["label"]})),
                ("markup://ui:form".into(), json!({"body": [{"descriptor": "markup://ui:button"}]})),
            ])
            .await
            .unwrap();
        storage
            .store_actions(vec![("java://Ctrl/ACTION$load".into(), json!({"ok": true}))])
            .await
            .unwrap();
    }

    let storage = DefStorage::open(config(&dir, 1024.0, false)).await.unwrap();
    let defs = storage.restore_all().await.unwrap();
    assert_eq!(defs.len(), 2);
    assert!(!defs.contains_key(TRANSACTION_SENTINEL_KEY));
    assert_eq!(defs["markup://ui:button"], json!({"attributes": ["label"]}));
    assert_eq!(storage.restore_actions().await.unwrap().len(), 1);

    let graph = storage.dependency_graph().await.unwrap();
    assert_eq!(graph.dependencies_of("markup://ui:form"), vec!["markup://ui:button"]);
}

#[tokio::test]
async fn test_graph_eviction_keeps_closures_whole() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let storage = DefStorage::open(config(&dir, 50.0, true)).await.unwrap();
    let pad = "x".repeat(10 * 1024);

    storage
        .store_definitions(vec![
            ("plant".into(), json!({"pad": pad})),
            ("tree".into(), json!({"descriptor": "plant", "pad": pad})),
            ("leaf".into(), json!({"pad": pad})),
        ])
        .await
        .unwrap();
    storage
        .store_actions(vec![(
            "getTree".into(),
            json!({"descriptor": "tree", "leaf": {"descriptor": "leaf"}, "pad": pad}),
        )])
        .await
        .unwrap();
    let before = storage.dependency_graph().await.unwrap();

    let report = storage.ensure_free_space(75.0).await.unwrap();

    assert!(!report.cleared);
    assert_eq!(report.evicted.first().map(String::as_str), Some("getTree"));
    assert!(report.size_after_kb.is_some_and(|kb| kb <= 15.0));

    // Whatever was evicted took its whole upstream closure with it
    let survivors = storage.dependency_graph().await.unwrap();
    for key in &report.evicted {
        for dependent in upstream_of(key, &before) {
            assert!(!survivors.contains(&dependent), "{} outlived {}", dependent, key);
        }
    }
    assert!(!survivors.is_empty());
}

#[tokio::test]
async fn test_clear_all_empties_both_partitions() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let storage = DefStorage::open(config(&dir, 1024.0, false)).await.unwrap();
    storage
        .store_definitions(vec![("a".into(), json!({}))])
        .await
        .unwrap();
    storage
        .store_actions(vec![("b".into(), json!({}))])
        .await
        .unwrap();

    storage.clear_all("test").await.unwrap();

    assert!(storage.restore_all().await.unwrap().is_empty());
    assert!(storage.restore_actions().await.unwrap().is_empty());
    assert_eq!(storage.partitions().size_kb().await.unwrap(), 0.0);
}
