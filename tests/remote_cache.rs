use std::time::Duration;

use courtside::cache::CacheTier;
use courtside::infra::remote::RemoteCache;
use courtside::infra::upstream;
use httpmock::MockServer;
use serde_json::json;
use time::macros::datetime;
use url::Url;

const TABLE: &str = "/reddit_cache";

fn remote(server: &MockServer) -> RemoteCache {
    let client = upstream::build_client(Duration::from_secs(5)).expect("http client");
    let base = Url::parse(&server.base_url()).expect("mock server url");
    RemoteCache::new(client, &base, "reddit_cache", Some("secret".to_string()))
}

#[tokio::test]
async fn get_filters_by_key_and_reads_updated_at() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("GET")
                .path(TABLE)
                .query_param("key", "eq.reddit:index")
                .query_param("select", "data,expires_at,updated_at")
                .header("apikey", "secret")
                .header("authorization", "Bearer secret");
            then.status(200).json_body(json!([{
                "data": {"Celtics|Lakers": {"gdt": null}},
                "expires_at": "2999-01-01T00:00:00Z",
                "updated_at": "2024-01-15T12:00:00Z"
            }]));
        })
        .await;

    let entry = remote(&server).get("reddit:index").await.expect("remote hit");

    mock.assert_async().await;
    assert_eq!(entry.value, json!({"Celtics|Lakers": {"gdt": null}}));
    assert_eq!(entry.written_at, datetime!(2024-01-15 12:00 UTC));
}

#[tokio::test]
async fn expired_row_is_deleted_and_misses() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET")
                .path(TABLE)
                .query_param("key", "eq.standings");
            then.status(200).json_body(json!([{
                "data": {"conferences": []},
                "expires_at": "2000-01-01T00:00:00Z",
                "updated_at": "1999-12-31T23:00:00Z"
            }]));
        })
        .await;
    let delete = server
        .mock_async(|when, then| {
            when.method("DELETE")
                .path(TABLE)
                .query_param("key", "eq.standings");
            then.status(204);
        })
        .await;

    assert!(remote(&server).get("standings").await.is_none());
    delete.assert_async().await;
}

#[tokio::test]
async fn missing_row_misses_without_delete() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path(TABLE);
            then.status(200).json_body(json!([]));
        })
        .await;

    assert!(remote(&server).get("boxscore:401").await.is_none());
}

#[tokio::test]
async fn set_upserts_on_key_with_credentials() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("POST")
                .path(TABLE)
                .query_param("on_conflict", "key")
                .header("prefer", "resolution=merge-duplicates,return=minimal")
                .header("apikey", "secret")
                .header("authorization", "Bearer secret")
                .json_body_includes(r#"{"key":"reddit:comments:abc:top","data":{"comments":[]}}"#);
            then.status(201);
        })
        .await;

    remote(&server)
        .set(
            "reddit:comments:abc:top",
            &json!({"comments": []}),
            Duration::from_secs(120),
        )
        .await;

    mock.assert_async().await;
}

#[tokio::test]
async fn cleanup_counts_returned_rows() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("DELETE")
                .path(TABLE)
                .query_param_exists("expires_at")
                .query_param("select", "key")
                .header("prefer", "return=representation");
            then.status(200)
                .json_body(json!([{"key": "standings"}, {"key": "reddit:index"}]));
        })
        .await;

    assert_eq!(remote(&server).cleanup().await, 2);
    mock.assert_async().await;
}

#[tokio::test]
async fn cleanup_without_representation_counts_zero() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("DELETE").path(TABLE);
            then.status(204);
        })
        .await;

    assert_eq!(remote(&server).cleanup().await, 0);
}

#[tokio::test]
async fn server_error_reads_as_miss() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path(TABLE);
            then.status(500).body("database unavailable");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method("DELETE").path(TABLE);
            then.status(500).body("database unavailable");
        })
        .await;

    let cache = remote(&server);
    assert!(cache.get("scoreboard").await.is_none());
    assert_eq!(cache.cleanup().await, 0);
}
