//! Integration tests for the Taskcluster client and the aggregation store
//!
//! These tests run the real reqwest client against a `wiremock` server that
//! mimics the index and queue services.

use sadash_core::config::{DashboardConfig, TaskclusterConfig};
use sadash_core::store::{
    FilePreferenceStore, PreferenceStore, RecordingNavigator, Route, StatsStatus, Store,
    PREFERENCES_KEY,
};
use sadash_core::{Channel, Error, StatsOutcome, TaskclusterApi, TaskclusterClient};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PHABRICATOR_INDEX: &str =
    "/index/tasks/project.releng.services.project.production.shipit_static_analysis.phabricator";
const MOZREVIEW_INDEX: &str =
    "/index/tasks/project.releng.services.project.production.shipit_static_analysis.mozreview";

fn client_config(server: &MockServer) -> TaskclusterConfig {
    TaskclusterConfig {
        index_url: format!("{}/index", server.uri()),
        queue_url: format!("{}/queue", server.uri()),
        timeout_secs: 5,
    }
}

fn indexed_task(id: &str, second: u32) -> serde_json::Value {
    json!({
        "taskId": id,
        "namespace": "project.releng.services.project.production.shipit_static_analysis.phabricator.1",
        "rank": 0,
        "data": {
            "state": "done",
            "issues": 2,
            "indexed": format!("2018-05-02T10:00:{:02}.000000Z", second)
        },
        "expires": "2019-05-02T10:00:00.000Z"
    })
}

fn sample_report() -> serde_json::Value {
    json!({
        "time": 1525255200.0,
        "revision": { "source": "phabricator", "rev": "abcdef", "url": "https://phabricator.example.com/D1" },
        "issues": [
            { "analyzer": "mozlint", "linter": "eslint", "rule": "no-unused", "publishable": true, "path": "a.js", "line": 3 },
            { "analyzer": "clang-tidy", "check": "bugprone-foo", "publishable": false, "path": "a.cpp" },
            { "analyzer": "clang-format", "publishable": true, "path": "a.cpp" }
        ]
    })
}

// ============================================
// Client
// ============================================

#[tokio::test]
async fn test_list_tasks_follows_continuation_tokens() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(PHABRICATOR_INDEX))
        .and(query_param_is_missing("continuationToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "namespace": "x",
            "tasks": [indexed_task("a", 1), indexed_task("b", 2)],
            "continuationToken": "page 2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(PHABRICATOR_INDEX))
        .and(query_param("continuationToken", "page 2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "namespace": "x",
            "tasks": [indexed_task("c", 3)]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = TaskclusterClient::new(&client_config(&server)).unwrap();
    let tasks = client
        .list_indexed_tasks(Channel::Production, "phabricator")
        .await
        .unwrap();

    let ids: Vec<&str> = tasks.iter().map(|t| t.task_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_fetch_report_sets_task_id() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/queue/task/T1/artifacts/public/results/report.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_report()))
        .mount(&server)
        .await;

    let client = TaskclusterClient::new(&client_config(&server)).unwrap();
    let report = client.fetch_report("T1").await.unwrap();

    assert_eq!(report.task_id, "T1");
    assert_eq!(report.issues.len(), 3);
    assert_eq!(report.publishable_issues().count(), 2);
    assert_eq!(report.issues[0].extra["line"], 3);
    assert_eq!(report.revision["rev"], "abcdef");
}

#[tokio::test]
async fn test_fetch_report_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/queue/task/missing/artifacts/public/results/report.json"))
        .respond_with(ResponseTemplate::new(404).set_body_string("ResourceNotFound"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/queue/task/garbled/artifacts/public/results/report.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "issues": "nope" })))
        .mount(&server)
        .await;

    let client = TaskclusterClient::new(&client_config(&server)).unwrap();

    match client.fetch_report("missing").await {
        Err(Error::Api { status, body, .. }) => {
            assert_eq!(status, 404);
            assert_eq!(body, "ResourceNotFound");
        }
        other => panic!("expected API error, got {other:?}"),
    }

    match client.fetch_report("garbled").await {
        Err(Error::Parse { what, .. }) => assert_eq!(what, "report"),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_server_is_transient() {
    let config = TaskclusterConfig {
        index_url: "http://127.0.0.1:9/index".to_string(),
        queue_url: "http://127.0.0.1:9/queue".to_string(),
        timeout_secs: 2,
    };
    let client = TaskclusterClient::new(&config).unwrap();

    let err = client.fetch_report("T1").await.unwrap_err();
    assert!(matches!(err, Error::Http { .. }));
    assert!(err.is_transient());
}

// ============================================
// Store over HTTP
// ============================================

async fn mount_production_indexes(server: &MockServer, count: u32) {
    let tasks: Vec<serde_json::Value> = (0..count)
        .map(|i| indexed_task(&format!("t{}", i), i % 60))
        .collect();

    Mock::given(method("GET"))
        .and(path(PHABRICATOR_INDEX))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tasks": tasks })))
        .expect(1)
        .mount(server)
        .await;

    // The older namespace only carries unindexed leftovers
    Mock::given(method("GET"))
        .and(path(MOZREVIEW_INDEX))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tasks": [{ "taskId": "legacy", "data": { "state": "done", "issues": 1 } }]
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn file_store(
    server: &MockServer,
    prefs: &TempDir,
) -> Store<TaskclusterClient, FilePreferenceStore, RecordingNavigator> {
    let client = TaskclusterClient::new(&client_config(server)).unwrap();
    Store::new(
        client,
        FilePreferenceStore::new(prefs.path()),
        RecordingNavigator::new(),
        &DashboardConfig::default(),
    )
}

#[tokio::test]
async fn test_calc_stats_over_http() {
    let server = MockServer::start().await;
    mount_production_indexes(&server, 25).await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/queue/task/t\d+/artifacts/public/results/report\.json$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_report()))
        .expect(25)
        .mount(&server)
        .await;

    let prefs = TempDir::new().unwrap();
    let store = file_store(&server, &prefs);

    let outcome = store.calc_stats().await.unwrap();
    assert_eq!(outcome, StatsOutcome::Completed { loaded: 25 });

    // Second call is a no-op; the `expect(1)` on the indexes enforces it
    assert_eq!(
        store.calc_stats().await.unwrap(),
        StatsOutcome::AlreadyRunning
    );

    let tasks = store.tasks();
    assert_eq!(tasks.len(), 25);
    assert!(tasks
        .windows(2)
        .all(|pair| pair[0].data.indexed >= pair[1].data.indexed));

    let stats = store.stats().unwrap();
    assert_eq!(stats.status, StatsStatus::Complete);
    assert_eq!(stats.progress(), (25, 25));
    assert_eq!(stats.checks.len(), 2);
    assert_eq!(stats.checks["mozlint.eslint.no-unused"].publishable, 25);
    assert_eq!(stats.checks["clang-tidy.bugprone-foo"].total, 25);
    assert_eq!(stats.start_date.timestamp(), 1525255200);

    let totals = stats.totals();
    assert_eq!((totals.publishable, totals.total), (25, 50));
}

#[tokio::test]
async fn test_failed_report_surfaces_error() {
    let server = MockServer::start().await;
    mount_production_indexes(&server, 3).await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/queue/task/t\d+/artifacts/public/results/report\.json$"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let prefs = TempDir::new().unwrap();
    let store = file_store(&server, &prefs);

    let err = store.calc_stats().await.unwrap_err();
    assert!(matches!(err, Error::ReportBatch { step: 0, failed: 3, .. }));
    assert!(err.is_transient());
    assert!(store.stats().unwrap().is_failed());
}

#[tokio::test]
async fn test_switch_channel_persists_and_navigates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(
            r"^/index/tasks/project\.releng\.services\.project\.staging\.shipit_static_analysis\.(mozreview|phabricator)$",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tasks": [indexed_task("s1", 5)]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let prefs = TempDir::new().unwrap();
    let store = file_store(&server, &prefs);
    store.switch_channel(Channel::Staging).await.unwrap();

    // Both namespaces returned the same task; it is kept once
    assert_eq!(store.tasks().len(), 1);

    let saved = FilePreferenceStore::new(prefs.path())
        .get(PREFERENCES_KEY)
        .unwrap()
        .unwrap();
    assert_eq!(saved, r#"{"channel":"staging"}"#);

    // A fresh store restores the channel
    let restored = file_store(&server, &prefs);
    assert_eq!(restored.channel(), Channel::Production);
    restored.load_preferences();
    assert_eq!(restored.channel(), Channel::Staging);

    assert_eq!(store.navigator().routes(), vec![Route::Tasks]);
    assert!(restored.navigator().routes().is_empty());
}

#[tokio::test]
async fn test_index_failure_propagates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(PHABRICATOR_INDEX))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(MOZREVIEW_INDEX))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tasks": [] })))
        .mount(&server)
        .await;

    let prefs = TempDir::new().unwrap();
    let store = file_store(&server, &prefs);

    let err = store.load_all_indexes().await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 500, .. }));

    // Nothing was computed, so a later run is still allowed
    assert!(store.calc_stats().await.is_err());
    assert!(store.stats().is_none());
}
