/// Concurrent transaction tests
///
/// Many transactions committing through the same updater, and index
/// configuration changes racing with them.
/// Run with: cargo test --test concurrent_transaction_tests

use fulltext_sync::{
    EntityKind, FulltextGraph, FulltextProvider, FulltextTransactionEventUpdater,
    InMemoryFulltextIndex, InMemoryGraph, TransactionEventHandler, UpdaterConfig,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_commits_all_reach_the_index() {
    let people = Arc::new(
        InMemoryFulltextIndex::new("people", EntityKind::Node, &["name"])
            .with_latency(Duration::from_millis(2)),
    );
    let graph = Arc::new(FulltextGraph::new(
        UpdaterConfig::new().max_inflight_operations(3),
    ));
    graph.register_index(people.clone()).await.unwrap();

    let mut handles = vec![];
    let num_tasks = 8;
    let commits_per_task = 5;

    for task_id in 0..num_tasks {
        let graph = Arc::clone(&graph);
        handles.push(tokio::spawn(async move {
            let mut ids = vec![];
            for i in 0..commits_per_task {
                let mut tx = graph.begin();
                let node = tx.create_node();
                tx.set_property(EntityKind::Node, node, "name", format!("user_{}_{}", task_id, i))
                    .unwrap();
                graph.commit(tx).await.unwrap();
                ids.push(node);
            }
            ids
        }));
    }

    let mut all_ids = vec![];
    for handle in handles {
        all_ids.extend(handle.await.unwrap());
    }

    assert_eq!(people.document_count().await, num_tasks * commits_per_task);
    assert_eq!(graph.stats().applied as usize, num_tasks * commits_per_task);
    assert!(!graph.provider().is_configuration_locked());
    for id in all_ids {
        assert!(people.document(id).await.is_some());
    }
}

#[tokio::test]
async fn test_index_registration_waits_for_open_transaction() {
    let provider = Arc::new(FulltextProvider::new());
    let people = Arc::new(InMemoryFulltextIndex::new("people", EntityKind::Node, &["name"]));
    provider.register_index(people.clone()).await.unwrap();
    let updater = FulltextTransactionEventUpdater::with_config(provider.clone(), UpdaterConfig::new());

    let graph = InMemoryGraph::new();
    let mut tx = graph.begin();
    let node = tx.create_node();
    tx.set_property(EntityKind::Node, node, "name", "Alice").unwrap();
    let context = updater.before_commit(&tx).await.unwrap();

    let late = Arc::new(InMemoryFulltextIndex::new("late", EntityKind::Node, &["name"]));
    let registration = {
        let provider = Arc::clone(&provider);
        let late = late.clone();
        tokio::spawn(async move { provider.register_index(late).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!registration.is_finished());

    updater.after_commit(&tx, context).await.unwrap();
    registration.await.unwrap().unwrap();

    // The transaction applied against the configuration it captured
    assert_eq!(people.operations().await.len(), 2);
    assert!(late.operations().await.is_empty());
    assert_eq!(provider.index_names().await, vec!["people", "late"]);
}

#[tokio::test]
async fn test_dropped_index_stops_receiving_updates() {
    let people = Arc::new(InMemoryFulltextIndex::new("people", EntityKind::Node, &["name"]));
    let graph = FulltextGraph::new(UpdaterConfig::new());
    graph.register_index(people.clone()).await.unwrap();

    let mut tx = graph.begin();
    let node = tx.create_node();
    tx.set_property(EntityKind::Node, node, "name", "Alice").unwrap();
    graph.commit(tx).await.unwrap();

    graph.provider().drop_index("people").await.unwrap();

    let mut tx = graph.begin();
    tx.set_property(EntityKind::Node, node, "name", "Alicia").unwrap();
    graph.commit(tx).await.unwrap();

    assert_eq!(people.operations().await.len(), 2);
    assert_eq!(people.document(node).await.unwrap().text(), "Alice");
}
