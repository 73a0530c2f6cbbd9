use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::sync::Arc;
use stock_dashboard::server::{create_router, AppState};
use stock_dashboard::{compute_derived, DashboardConfig, ReturnOrdering, StockRecord, Symbol};
use tower::ServiceExt;
use uuid::Uuid;

fn sample_state(max_sessions: usize) -> Arc<AppState> {
    let rows = [
        ("A", 1, 10.0, 100),
        ("B", 1, 40.0, 50),
        ("A", 2, 11.0, 100),
        ("B", 2, 42.0, 50),
        ("A", 3, 9.0, 100),
        ("C", 3, 3.0, 5),
    ];
    let records = rows
        .iter()
        .map(|&(name, day, close, volume)| {
            StockRecord::new(
                Symbol::new(name).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
                close,
                volume,
            )
        })
        .collect();
    let table = compute_derived(records, ReturnOrdering::RowOrder);
    Arc::new(AppState::new(table, DashboardConfig::default(), max_sessions))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_session(app: &Router) -> String {
    let (status, body) = send(app, Method::POST, "/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    body["session_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_and_symbols() {
    let app = create_router(sample_state(4));

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["rows"], 6);

    let (status, body) = send(&app, Method::GET, "/symbols", None).await;
    assert_eq!(status, StatusCode::OK);
    let symbols: Vec<&str> = body["symbols"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["symbol"].as_str().unwrap())
        .collect();
    assert_eq!(symbols, vec!["A", "B", "C"]);
    assert_eq!(body["date_range"]["start"], "2024-01-01");
    assert_eq!(body["date_range"]["end"], "2024-01-03");
}

#[tokio::test]
async fn test_session_lifecycle() {
    let app = create_router(sample_state(4));

    let (status, body) = send(&app, Method::POST, "/sessions", Some(json!({ "top_n": 1 }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["session_id"].as_str().unwrap().to_string();
    assert_eq!(body["selection"]["active_symbols"], json!(["B"]));
    assert_eq!(body["selection"]["version"], 0);
    assert_eq!(body["stream_url"], format!("/sessions/{}/stream", id));

    let (status, body) = send(&app, Method::GET, &format!("/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_id"], id.as_str());

    let (status, _) = send(&app, Method::DELETE, &format!("/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, &format!("/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "SessionNotFound");
}

async fn post_raw(app: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_malformed_session_request_is_rejected() {
    let state = sample_state(4);
    let app = create_router(Arc::clone(&state));

    for body in [r#"{"top_n": "abc"}"#, r#"{"top_n": -1}"#, "not json"] {
        let (status, response) = post_raw(&app, "/sessions", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {}", body);
        assert_eq!(response["error"], "InvalidParameter");
    }
    assert!(state.sessions.read().await.is_empty());

    let (status, response) = post_raw(&app, "/sessions", "  ").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response["selection"]["active_symbols"], json!(["A", "B", "C"]));
}

#[tokio::test]
async fn test_clear_then_select_all() {
    let app = create_router(sample_state(4));
    let (_, body) = send(&app, Method::POST, "/sessions", Some(json!({ "top_n": 1 }))).await;
    let id = body["session_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::POST, &format!("/sessions/{}/clear", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 1);
    assert_eq!(body["selection"]["active_symbols"], json!([]));

    let (status, body) =
        send(&app, Method::POST, &format!("/sessions/{}/select-all", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 2);
    assert_eq!(body["selection"]["active_symbols"], json!(["A", "B", "C"]));

    let (_, body) = send(&app, Method::GET, &format!("/sessions/{}/summary", id), None).await;
    assert_eq!(body["version"], 2);
    assert_eq!(body["data"]["total_stocks"], 3);
}

#[tokio::test]
async fn test_end_to_end_summary_over_http() {
    let app = create_router(sample_state(4));
    let id = create_session(&app).await;

    let (status, body) = send(&app, Method::POST, &format!("/sessions/{}/clear", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 1);

    let (status, body) =
        send(&app, Method::POST, &format!("/sessions/{}/toggle/A", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["selection"]["active_symbols"], json!(["A"]));

    let range = json!({ "start": "2024-01-01", "end": "2024-01-02" });
    let (status, body) =
        send(&app, Method::PUT, &format!("/sessions/{}/range", id), Some(range)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 3);

    let (status, body) = send(&app, Method::GET, &format!("/sessions/{}/summary", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 3);
    assert_eq!(body["kind"], "summary");
    assert_eq!(body["data"]["total_stocks"], 1);
    assert_eq!(body["data"]["total_volume"], 200);
    let average = body["data"]["average_return"].as_f64().unwrap();
    assert!((average - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_rejected_events_map_to_bad_request() {
    let app = create_router(sample_state(4));
    let id = create_session(&app).await;

    let inverted = json!({ "start": "2024-01-03", "end": "2024-01-01" });
    let (status, body) =
        send(&app, Method::PUT, &format!("/sessions/{}/range", id), Some(inverted)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidDateRange");

    let garbled = json!({ "start": "yesterday", "end": "2024-01-01" });
    let (status, _) =
        send(&app, Method::PUT, &format!("/sessions/{}/range", id), Some(garbled)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) =
        send(&app, Method::POST, &format!("/sessions/{}/toggle/ZZZ", id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "UnknownSymbol");

    let (_, body) = send(&app, Method::GET, &format!("/sessions/{}", id), None).await;
    assert_eq!(body["selection"]["version"], 0);

    let (status, _) = send(&app, Method::GET, "/sessions/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = Uuid::new_v4();
    let (status, _) = send(&app, Method::GET, &format!("/sessions/{}/price", missing), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_limit() {
    let app = create_router(sample_state(1));
    create_session(&app).await;

    let (status, body) = send(&app, Method::POST, "/sessions", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "SessionLimitReached");
}

#[tokio::test]
async fn test_chart_outputs() {
    let app = create_router(sample_state(4));
    let id = create_session(&app).await;

    let (_, body) = send(&app, Method::GET, &format!("/sessions/{}/price", id), None).await;
    assert_eq!(body["kind"], "price_evolution");
    assert_eq!(body["data"]["lines"].as_array().unwrap().len(), 3);

    let (_, body) = send(&app, Method::GET, &format!("/sessions/{}/volatility", id), None).await;
    assert_eq!(body["kind"], "volatility_bars");
    let bars = body["data"]["bars"].as_array().unwrap();
    assert!(bars[0]["volatility"].is_f64());
    assert!(bars[1]["volatility"].is_null());

    let (_, body) = send(&app, Method::GET, &format!("/sessions/{}/scatter", id), None).await;
    assert_eq!(body["data"]["points"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["skipped"], json!(["B", "C"]));

    send(&app, Method::POST, &format!("/sessions/{}/clear", id), None).await;
    let (_, body) = send(&app, Method::GET, &format!("/sessions/{}/price", id), None).await;
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_table_search_and_sort() {
    let app = create_router(sample_state(4));
    let id = create_session(&app).await;

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/sessions/{}/table?search=a&sort=close&direction=desc", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let closes: Vec<f64> = body["data"]["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["close"].as_f64().unwrap())
        .collect();
    assert_eq!(closes, vec![11.0, 10.0, 9.0]);
    assert_eq!(body["data"]["columns"][4]["id"], "return");
    assert_eq!(body["data"]["columns"][4]["label"], "Return (%)");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/sessions/{}/table?sort=colour", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidParameter");
}

async fn cache_stats(state: &AppState, id: Uuid) -> Option<(u64, u64)> {
    let sessions = state.sessions.read().await;
    sessions.get(&id).and_then(|entry| entry.session.cache_stats())
}

#[tokio::test]
async fn test_accepted_events_are_broadcast() {
    let state = sample_state(4);
    let app = create_router(Arc::clone(&state));
    let id = create_session(&app).await;
    let session_id = Uuid::parse_str(&id).unwrap();

    // Without a stream subscribed nothing is filtered or rendered.
    send(&app, Method::POST, &format!("/sessions/{}/toggle/C", id), None).await;
    assert_eq!(cache_stats(&state, session_id).await, Some((0, 0)));

    let mut updates = state.subscribe(session_id).await.unwrap();
    send(&app, Method::POST, &format!("/sessions/{}/toggle/C", id), None).await;
    assert_eq!(cache_stats(&state, session_id).await, Some((0, 1)));

    let mut kinds = Vec::new();
    while let Ok(update) = updates.try_recv() {
        assert_eq!(update.version, 2);
        kinds.push(update.output.kind().as_str());
    }
    assert_eq!(
        kinds,
        vec![
            "summary",
            "price_evolution",
            "volatility_bars",
            "return_volatility",
            "detail_table"
        ]
    );

    // The stream never ends on its own, so only the response head is checked.
    let request = Request::builder()
        .uri(format!("/sessions/{}/stream", id))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
}
