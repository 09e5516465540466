//! The real HTTP client against a local mock of the provider API.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::assert_ok;

use stats_ingestion::cancel::CancelToken;
use stats_ingestion::error::FetchError;
use stats_ingestion::models::{League, NormalizedStatRecord, UnitOutcome};
use stats_ingestion::orchestrator::{Orchestrator, PipelineTuning};
use stats_ingestion::paginate::Paginator;
use stats_ingestion::provider::ProviderClient;
use stats_ingestion::retry::RetryPolicy;
use stats_ingestion::store::MemoryStore;

const API_KEY: &str = "test-key";

/// Seasons behave as follows: "2023" always answers 500, "flaky" answers 503
/// once, anything else serves two pages.
#[derive(Default)]
struct MockProvider {
    requests: AtomicUsize,
    flaky_failures: AtomicUsize,
    seen: Mutex<Vec<(String, Option<String>)>>,
}

fn event(season: &str, player: &str, team: &str) -> Value {
    let year = if season.chars().all(|c| c.is_ascii_digit()) {
        season
    } else {
        "2024"
    };
    json!({
        "eventID": format!("{}-{}", season, player),
        "date": format!("{}-11-02T00:30:00Z", year),
        "home_team": "Boston Celtics",
        "away_team": "New York Knicks",
        "players": [{
            "name": player,
            "team": team,
            "position": "F",
            "stats": {"points": 27.5},
            "odds": {"points": {"over": -110, "under": -110}}
        }]
    })
}

async fn events(
    State(mock): State<Arc<MockProvider>>,
    Path(league): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    mock.requests.fetch_add(1, Ordering::SeqCst);
    let season = query.get("season").cloned().unwrap_or_default();
    let cursor = query.get("cursor").cloned();
    mock.seen.lock().unwrap().push((league, cursor.clone()));

    if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad key"})));
    }
    if season == "2023" {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "boom"})));
    }
    if season == "flaky" && mock.flaky_failures.fetch_add(1, Ordering::SeqCst) == 0 {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "busy"})));
    }

    let page = match cursor.as_deref() {
        None => json!({
            "events": [event(&season, "Jayson Tatum", "Boston Celtics")],
            "nextCursor": "page-2",
        }),
        Some(_) => json!({
            "events": [event(&season, "Jalen Brunson", "New York Knicks")],
            "nextCursor": null,
        }),
    };
    (StatusCode::OK, Json(page))
}

async fn serve(mock: Arc<MockProvider>) -> String {
    let app = Router::new()
        .route("/v1/:league/events", get(events))
        .with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/v1", addr)
}

fn client(base: &str, key: &str) -> ProviderClient {
    assert_ok!(ProviderClient::new(base, key, 6000, 50))
}

#[tokio::test]
async fn follows_cursor_until_it_runs_out() {
    let mock = Arc::new(MockProvider::default());
    let base = serve(mock.clone()).await;
    let client = client(&base, API_KEY);

    let outcome = Paginator::new(&client, RetryPolicy::immediate(3), Duration::ZERO)
        .fetch_all("nba", "2024", &CancelToken::new())
        .await;

    assert!(outcome.is_complete());
    assert_eq!(outcome.pages, 2);
    assert_eq!(outcome.requests, 2);
    assert_eq!(outcome.events.len(), 2);
    assert_eq!(outcome.events[1].players[0].name, "Jalen Brunson");

    let seen = mock.seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            ("nba".to_string(), None),
            ("nba".to_string(), Some("page-2".to_string())),
        ]
    );
}

#[tokio::test]
async fn bad_key_is_not_retried() {
    let mock = Arc::new(MockProvider::default());
    let base = serve(mock.clone()).await;
    let client = client(&base, "wrong");

    let outcome = Paginator::new(&client, RetryPolicy::immediate(3), Duration::ZERO)
        .fetch_all("nba", "2024", &CancelToken::new())
        .await;

    assert!(matches!(outcome.failure, Some(FetchError::Status { status: 401, .. })));
    assert_eq!(outcome.requests, 1);
    assert!(outcome.events.is_empty());
}

#[tokio::test]
async fn server_errors_are_retried() {
    let mock = Arc::new(MockProvider::default());
    let base = serve(mock.clone()).await;
    let client = client(&base, API_KEY);

    let outcome = Paginator::new(&client, RetryPolicy::immediate(3), Duration::ZERO)
        .fetch_all("nba", "flaky", &CancelToken::new())
        .await;

    assert!(outcome.is_complete());
    assert_eq!(outcome.events.len(), 2);
    assert_eq!(outcome.requests, 3);
}

#[tokio::test]
async fn backfill_over_http_isolates_the_failing_season() {
    let mock = Arc::new(MockProvider::default());
    let base = serve(mock.clone()).await;
    let client = client(&base, API_KEY);
    let store: MemoryStore<NormalizedStatRecord> = MemoryStore::new();
    let seasons: Vec<String> = ["2022", "2023", "2024"].iter().map(|s| s.to_string()).collect();

    let summary = Orchestrator::new(PipelineTuning::immediate(), CancelToken::new())
        .run_backfill(&client, &store, &[League::Nba], &seasons)
        .await;

    let outcomes: Vec<UnitOutcome> = summary.units.iter().map(|u| u.outcome).collect();
    assert_eq!(
        outcomes,
        vec![UnitOutcome::Completed, UnitOutcome::Failed, UnitOutcome::Completed]
    );
    assert_eq!(summary.unit("nba", "2022").map(|u| u.records_written), Some(2));
    assert_eq!(summary.unit("nba", "2024").map(|u| u.records_written), Some(2));
    assert_eq!(store.len().await, 4);
    // Two pages each for the good seasons, three attempts for the bad one.
    assert_eq!(mock.requests.load(Ordering::SeqCst), 7);

    let rows = store.rows().await;
    assert!(rows.iter().all(|r| r.league == "nba"));
    assert!(rows.iter().any(|r| r.team_code == "NYK" && r.opponent_code == "BOS"));
}
