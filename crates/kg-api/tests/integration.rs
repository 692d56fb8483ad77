//! Integration tests: MCP tool calls, resources, SSE, REST and degraded mode.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use kg_api::server::{self, AppState};
use kg_store::{GraphSnapshot, InMemoryGraphBackend, StoreAdapter};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

fn snapshot() -> GraphSnapshot {
    serde_json::from_value(json!({
        "entities": [
            {"id": "requests", "name": "requests", "entity_type": "tool", "trust_score": 0.92,
             "description": "HTTP for humans", "tags": ["http", "python"],
             "properties": {"stars": 51000, "installation": "pip install requests", "key_features": ["sessions"]}},
            {"id": "urllib3", "name": "urllib3", "entity_type": "tool", "trust_score": 0.85,
             "description": "HTTP client", "tags": ["http", "python"]},
            {"id": "six", "name": "six", "entity_type": "tool", "trust_score": 0.6,
             "description": "Compatibility shims", "tags": ["python"]},
            {"id": "httpx", "name": "httpx", "entity_type": "tool", "trust_score": 0.88,
             "description": "Async HTTP client", "tags": ["http", "python", "async"]}
        ],
        "relations": [
            {"id": "r1", "source_id": "requests", "target_id": "urllib3", "relation_type": "depends_on"},
            {"id": "r2", "source_id": "urllib3", "target_id": "six", "relation_type": "depends_on"},
            {"id": "r3", "source_id": "httpx", "target_id": "requests", "relation_type": "alternative_to"}
        ]
    }))
    .unwrap()
}

async fn test_app() -> axum::Router {
    let backend = InMemoryGraphBackend::from_snapshot(snapshot()).await.unwrap();
    let store = Arc::new(StoreAdapter::shared(Arc::new(backend)));
    server::router(Arc::new(AppState::new(store, 0.7, Duration::from_secs(30))))
}

fn degraded_app() -> axum::Router {
    let store = Arc::new(StoreAdapter::unconfigured());
    server::router(Arc::new(AppState::new(store, 0.7, Duration::from_secs(30))))
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let body = res.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

async fn post_json(app: &axum::Router, uri: &str, body: Value) -> Value {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

/// Parse the text payload of a tool-call envelope.
fn envelope_payload(envelope: &Value) -> Value {
    let text = envelope["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}

#[tokio::test]
async fn health_reports_store_availability() {
    let (status, j) = get_json(&test_app().await, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(j["status"], "healthy");
    assert_eq!(j["store"], "available");

    let (_, j) = get_json(&degraded_app(), "/health").await;
    assert_eq!(j["store"], "unavailable");
}

#[tokio::test]
async fn mcp_info_and_tool_list() {
    let app = test_app().await;
    let (_, info) = get_json(&app, "/mcp/info").await;
    assert_eq!(info["name"], "mcp-knowledge-graph");
    assert_eq!(info["protocolVersion"], "2024-11-05");
    assert_eq!(info["capabilities"]["tools"]["call"], true);

    let (_, list) = get_json(&app, "/mcp/tools/list").await;
    let names: Vec<&str> = list["tools"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert_eq!(names.len(), 10);
    assert!(names.contains(&"get_best_practices"));
}

#[tokio::test]
async fn search_tool_applies_default_min_trust() {
    let app = test_app().await;
    let envelope = post_json(
        &app,
        "/mcp/tools/call",
        json!({"name": "search_knowledge", "arguments": {"query": "http"}}),
    )
    .await;
    assert!(envelope.get("isError").is_none());
    let hits = envelope_payload(&envelope);
    let names: Vec<&str> = hits
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|h| h["name"].as_str())
        .collect();
    assert_eq!(names, vec!["requests", "httpx", "urllib3"]);
    assert_eq!(hits[0]["stars"], 51000);
    assert_eq!(hits[0]["installation"], "pip install requests");
}

#[tokio::test]
async fn unknown_tool_yields_error_envelope() {
    let app = test_app().await;
    let envelope = post_json(
        &app,
        "/mcp/tools/call",
        json!({"name": "drop_everything", "arguments": {}}),
    )
    .await;
    assert_eq!(envelope["isError"], true);
    assert_eq!(envelope["content"][0]["text"], "Error: Unknown tool: drop_everything");

    // The server keeps serving after a failed call.
    let (status, _) = get_json(&app, "/knowledge/stats").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn context_and_best_practices_tools() {
    let app = test_app().await;
    let context = envelope_payload(
        &post_json(
            &app,
            "/mcp/tools/call",
            json!({"name": "get_context", "arguments": {"topic": "requests"}}),
        )
        .await,
    );
    assert_eq!(context["entity"]["name"], "requests");
    assert_eq!(context["entity"]["type"], "tool");
    assert_eq!(context["entity"]["trust_score"], 0.92);
    assert!(context["entity"].get("trust_level").is_none());
    assert!(context["entity"].get("entity_type").is_none());
    assert_eq!(context["dependencies"][0]["name"], "urllib3");
    assert_eq!(context["alternatives"][0]["name"], "httpx");
    assert_eq!(context["alternatives"][0]["direction"], "incoming");

    let practices = envelope_payload(
        &post_json(
            &app,
            "/mcp/tools/call",
            json!({"name": "get_best_practices", "arguments": {"name": "requests"}}),
        )
        .await,
    );
    assert_eq!(practices["key_features"], json!(["sessions"]));
    assert_eq!(practices["use_cases"], json!([]));

    let missing = envelope_payload(
        &post_json(
            &app,
            "/mcp/tools/call",
            json!({"name": "get_best_practices", "arguments": {"name": "cobol"}}),
        )
        .await,
    );
    assert_eq!(missing["message"], "No best practices found for this topic");
}

#[tokio::test]
async fn dependency_and_path_tools() {
    let app = test_app().await;
    let chain = envelope_payload(
        &post_json(
            &app,
            "/mcp/tools/call",
            json!({"name": "get_dependencies", "arguments": {"name": "requests"}}),
        )
        .await,
    );
    assert_eq!(chain, json!([
        {"name": "urllib3", "description": "HTTP client", "depth": 1},
        {"name": "six", "description": "Compatibility shims", "depth": 2}
    ]));

    let path = envelope_payload(
        &post_json(
            &app,
            "/mcp/tools/call",
            json!({"name": "find_path", "arguments": {"source": "requests", "target": "six"}}),
        )
        .await,
    );
    assert_eq!(path["confidence"], 0.95);
    assert_eq!(path["result"]["shortest"]["nodes"], json!(["requests", "urllib3", "six"]));
}

#[tokio::test]
async fn ill_typed_argument_is_rejected() {
    let app = test_app().await;
    let envelope = post_json(
        &app,
        "/mcp/tools/call",
        json!({"name": "search_knowledge", "arguments": {"query": "http", "limit": "ten"}}),
    )
    .await;
    assert_eq!(envelope["isError"], true);
}

#[tokio::test]
async fn resources_list_and_read() {
    let app = test_app().await;
    let (_, list) = get_json(&app, "/mcp/resources/list").await;
    assert_eq!(list["resources"][0]["uri"], "knowledge://stats");

    let read = post_json(&app, "/mcp/resources/read", json!({"uri": "knowledge://stats"})).await;
    assert_eq!(read["contents"][0]["mimeType"], "application/json");
    let stats: Value = serde_json::from_str(read["contents"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(stats["total_entities"], 4);
    assert_eq!(stats["entity_types"]["tool"], 4);

    let read = post_json(&app, "/mcp/resources/read", json!({"uri": "knowledge://entities"})).await;
    let entities: Value = serde_json::from_str(read["contents"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(entities.as_array().unwrap().len(), 4);

    let read = post_json(&app, "/mcp/resources/read", json!({"uri": "knowledge://nope"})).await;
    let err: Value = serde_json::from_str(read["contents"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(err["error"], "Unknown resource: knowledge://nope");
}

#[tokio::test]
async fn rest_knowledge_endpoints() {
    let app = test_app().await;

    let (_, hits) = get_json(&app, "/knowledge/search?q=http&min_trust=0.9").await;
    assert_eq!(hits.as_array().unwrap().len(), 1);

    let (_, context) = get_json(&app, "/knowledge/context/requests").await;
    assert_eq!(context["entity"]["type"], "tool");
    assert_eq!(context["entity"]["properties"]["key_features"], json!(["sessions"]));
    assert_eq!(context["relations"]["depends_on"][0]["name"], "urllib3");
    assert_eq!(context["dependency_chain"].as_array().unwrap().len(), 2);

    let (_, deps) = get_json(&app, "/knowledge/dependencies/requests?max_depth=1").await;
    assert_eq!(deps["dependency_chain"].as_array().unwrap().len(), 1);

    let (_, relation) = get_json(&app, "/knowledge/infer/relation?source=requests&target=six").await;
    assert_eq!(relation["confidence"], 0.6);
    assert_eq!(relation["result"]["indirect_relations"][0]["via"], "urllib3");

    let (_, path) = get_json(&app, "/knowledge/infer/path?source=requests&target=six&max_depth=1").await;
    assert_eq!(path["paths"], json!([]));
    assert_eq!(path["shortest"], Value::Null);
    assert_eq!(path["confidence"], 0.1);

    let (_, recs) = get_json(&app, "/knowledge/recommend/requests?type=alternative").await;
    assert_eq!(recs["type"], "alternative");
    assert_eq!(recs["recommendations"][0]["name"], "httpx");

    let (_, recs) = get_json(&app, "/knowledge/recommend/requests?type=bogus").await;
    assert_eq!(recs["type"], "all");
    assert_eq!(recs["recommendations"].as_array().unwrap().len(), 2);

    let (_, similar) = get_json(&app, "/knowledge/similar/requests").await;
    assert_eq!(similar["similar"][0]["name"], "urllib3");
    assert_eq!(similar["similar"][0]["similarity"], 1.0);

    let (_, by_type) = get_json(&app, "/knowledge/entities/by-type/tool?limit=2").await;
    assert_eq!(by_type["count"], 2);
    assert_eq!(by_type["entities"][0]["name"], "requests");
}

#[tokio::test]
async fn categories_catalogue_is_static() {
    let app = test_app().await;
    let (status, body) = get_json(&app, "/knowledge/categories").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["categories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["technology", "asset", "news", "concept", "person"]);
    assert_eq!(body["categories"][2]["sources"], json!(["Hacker News", "CoinDesk"]));
}

#[tokio::test]
async fn search_requires_query_parameter() {
    let app = test_app().await;
    let (status, _) = get_json(&app, "/knowledge/search").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn degraded_mode_serves_empty_results() {
    let app = degraded_app();
    let (_, stats) = get_json(&app, "/knowledge/stats").await;
    assert_eq!(stats["total_entities"], 0);
    assert_eq!(stats["average_trust_score"], 0.0);
    assert_eq!(stats["entity_types"], json!({}));

    let (_, hits) = get_json(&app, "/knowledge/search?q=http").await;
    assert_eq!(hits, json!([]));

    let envelope = post_json(
        &app,
        "/mcp/tools/call",
        json!({"name": "infer_relation", "arguments": {"source": "a", "target": "b"}}),
    )
    .await;
    assert!(envelope.get("isError").is_none());
    let payload = envelope_payload(&envelope);
    assert_eq!(payload["confidence"], 0.2);
    assert_eq!(payload["result"]["relationship_exists"], false);
}

#[tokio::test]
async fn sse_opens_with_connected_then_server_info() {
    let app = test_app().await;
    let req = Request::builder()
        .method("GET")
        .uri("/mcp/sse")
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    let mut body = res.into_body();
    let mut text = String::new();
    let read = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(frame) = body.frame().await {
            let frame = frame.unwrap();
            if let Some(data) = frame.data_ref() {
                text.push_str(&String::from_utf8_lossy(data));
            }
            if text.contains("event: ping") {
                break;
            }
        }
    })
    .await;
    assert!(read.is_ok());

    let connected = text.find("event: connected").unwrap();
    let info = text.find("event: server_info").unwrap();
    let ping = text.find("event: ping").unwrap();
    assert!(connected < info && info < ping);
    assert!(text.contains(r#"data: {"status":"connected"}"#));
    assert!(text.contains("2024-11-05"));
}
