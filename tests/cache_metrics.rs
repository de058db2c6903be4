mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::{FakeThreads, Harness, LAKERS_CELTICS_GDT, script_index};
use courtside::cache::{CacheConfig, CacheTier, MemoryCache, metric_names};
use courtside::domain::error::FetchError;
use courtside::domain::reddit::{SearchRequest, ThreadKind};
use futures::FutureExt;
use metrics_util::debugging::DebuggingRecorder;
use serde_json::json;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // Memory tier hit, miss and eviction.
    let memory = MemoryCache::new(&CacheConfig {
        capacity: 1,
        ..Default::default()
    });
    let ttl = Duration::from_secs(30);
    assert!(memory.get("first").await.is_none());
    memory.set("first", &json!(1), ttl).await;
    assert!(memory.get("first").await.is_some());
    memory.set("second", &json!(2), ttl).await;

    // Two callers on one key: the second joins the first.
    let (a, b) = tokio::join!(
        memory.get_or_fetch(
            "joined",
            ttl,
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, FetchError>(json!("shared"))
            }
            .boxed()
        ),
        memory.get_or_fetch(
            "joined",
            ttl,
            async { Ok::<_, FetchError>(json!("unused")) }.boxed()
        )
    );
    assert_eq!(a, b);

    // Blocked search answered from the feeds, then a sweep.
    let harness = Harness::new();
    script_index(&harness.threads, &[LAKERS_CELTICS_GDT]);
    FakeThreads::script(
        &harness.threads.search,
        Err(FetchError::upstream("reddit", "search", 429)),
    );
    harness
        .reddit()
        .search_thread(&SearchRequest::new(ThreadKind::Post))
        .await
        .expect("feed fallback");
    harness.cache.cleanup().await;

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        metric_names::METRIC_HIT,
        metric_names::METRIC_MISS,
        metric_names::METRIC_EVICT,
        metric_names::METRIC_JOIN,
        metric_names::METRIC_MEMORY_ENTRIES,
        courtside::application::reddit::METRIC_FALLBACK,
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
