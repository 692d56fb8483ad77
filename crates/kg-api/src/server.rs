//! Axum server and routes.

use crate::resources::{read_resource, resource_list};
use crate::sse::handle_sse;
use crate::tools::{
    error_envelope, success_envelope, tool_list, Toolbox, DEFAULT_DEPENDENCY_DEPTH,
    DEFAULT_LIMIT, DEFAULT_PATH_DEPTH,
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use kg_engine::{GraphQueryService, InferenceEngine};
use kg_store::StoreAdapter;
use kg_types::{EntityDetail, RecommendKind};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

pub const SERVER_NAME: &str = "mcp-knowledge-graph";
pub const SERVER_VERSION: &str = "1.0.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const DEFAULT_TYPE_LIMIT: usize = 50;

pub struct AppState {
    pub store: Arc<StoreAdapter>,
    pub queries: GraphQueryService,
    pub inference: InferenceEngine,
    pub tools: Toolbox,
    pub heartbeat: Duration,
}

impl AppState {
    /// Wire both services to one shared store adapter.
    pub fn new(store: Arc<StoreAdapter>, min_trust: f64, heartbeat: Duration) -> Self {
        let queries = GraphQueryService::new(Arc::clone(&store));
        let inference = InferenceEngine::new(Arc::clone(&store));
        let tools = Toolbox::new(queries.clone(), inference.clone(), min_trust);
        Self {
            store,
            queries,
            inference,
            tools,
            heartbeat,
        }
    }
}

pub fn server_info() -> Value {
    json!({
        "name": SERVER_NAME,
        "version": SERVER_VERSION,
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {"listTools": true, "call": true},
            "resources": {"list": true, "read": true}
        }
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/mcp/info", get(handle_mcp_info))
        .route("/mcp/tools/list", get(handle_tools_list))
        .route("/mcp/tools/call", post(handle_tools_call))
        .route("/mcp/resources/list", get(handle_resources_list))
        .route("/mcp/resources/read", post(handle_resources_read))
        .route("/mcp/sse", get(handle_sse))
        .route("/knowledge/stats", get(handle_stats))
        .route("/knowledge/search", get(handle_search))
        .route("/knowledge/context/:name", get(handle_context))
        .route("/knowledge/dependencies/:name", get(handle_dependencies))
        .route("/knowledge/infer/relation", get(handle_infer_relation))
        .route("/knowledge/infer/path", get(handle_infer_path))
        .route("/knowledge/recommend/:technology", get(handle_recommend))
        .route("/knowledge/similar/:technology", get(handle_similar))
        .route("/knowledge/categories", get(handle_categories))
        .route(
            "/knowledge/entities/by-type/:entity_type",
            get(handle_entities_by_type),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let store = if state.store.is_available().await {
        "available"
    } else {
        "unavailable"
    };
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "store": store,
    }))
}

// ---------- MCP ----------

async fn handle_mcp_info() -> Json<Value> {
    Json(server_info())
}

async fn handle_tools_list(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(tool_list(state.tools.min_trust()))
}

#[derive(Debug, Deserialize)]
pub struct ToolCallRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Map<String, Value>>,
}

async fn handle_tools_call(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ToolCallRequest>,
) -> Json<Value> {
    let args = req.arguments.unwrap_or_default();
    let envelope = match state.tools.call(&req.name, &args).await {
        Ok(result) => success_envelope(&result),
        Err(e) => {
            tracing::info!(tool = %req.name, error = %e, "tool call rejected");
            error_envelope(&e)
        }
    };
    state.store.disconnect().await;
    Json(envelope)
}

async fn handle_resources_list() -> Json<Value> {
    Json(resource_list())
}

#[derive(Debug, Deserialize)]
pub struct ResourceReadRequest {
    #[serde(default)]
    pub uri: String,
}

async fn handle_resources_read(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResourceReadRequest>,
) -> Json<Value> {
    let contents = read_resource(&state.queries, &req.uri).await;
    state.store.disconnect().await;
    Json(contents)
}

// ---------- REST ----------

fn to_json<T: serde::Serialize>(value: &T) -> Json<Value> {
    Json(serde_json::to_value(value).unwrap_or(Value::Null))
}

async fn handle_stats(State(state): State<Arc<AppState>>) -> Json<Value> {
    to_json(&state.queries.get_stats().await)
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default)]
    pub min_trust: Option<f64>,
    #[serde(default)]
    pub limit: Option<usize>,
}

async fn handle_search(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SearchQuery>,
) -> Json<Value> {
    let min_trust = q.min_trust.unwrap_or(state.tools.min_trust());
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT);
    to_json(&state.queries.search_entities(&q.q, min_trust, limit).await)
}

/// Static catalogue of the entity categories collectors populate.
async fn handle_categories() -> Json<Value> {
    Json(json!({
        "categories": [
            {
                "id": "technology",
                "name": "Technology",
                "description": "Frameworks, libraries, tools and other technology",
                "examples": ["langchain", "ollama", "qdrant"]
            },
            {
                "id": "asset",
                "name": "Asset",
                "description": "Investment assets such as cryptocurrencies and stocks",
                "examples": ["bitcoin", "ethereum", "solana"]
            },
            {
                "id": "news",
                "name": "News",
                "description": "News, articles and announcements",
                "sources": ["Hacker News", "CoinDesk"]
            },
            {
                "id": "concept",
                "name": "Concept",
                "description": "Concepts, terms and definitions",
                "examples": ["RAG", "DeFi", "LLM"]
            },
            {
                "id": "person",
                "name": "Person/Organization",
                "description": "People, organizations and companies",
                "examples": ["Vitalik Buterin", "OpenAI", "LangChain Inc"]
            }
        ]
    }))
}

async fn handle_context(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Json<Value> {
    let entity = state.queries.get_entity(&name).await;
    let relations = state.queries.get_relations(&name).await;
    let chain = state
        .queries
        .get_dependency_chain(&name, DEFAULT_DEPENDENCY_DEPTH)
        .await;
    Json(json!({
        "entity": entity.as_ref().map(EntityDetail::from),
        "relations": relations,
        "dependency_chain": chain,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DepthQuery {
    #[serde(default)]
    pub max_depth: Option<usize>,
}

async fn handle_dependencies(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(q): Query<DepthQuery>,
) -> Json<Value> {
    let max_depth = q.max_depth.unwrap_or(DEFAULT_DEPENDENCY_DEPTH);
    let chain = state.queries.get_dependency_chain(&name, max_depth).await;
    Json(json!({ "name": name, "dependency_chain": chain }))
}

#[derive(Debug, Deserialize)]
pub struct PairQuery {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub max_depth: Option<usize>,
}

async fn handle_infer_relation(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PairQuery>,
) -> Json<Value> {
    to_json(&state.inference.find_relation(&q.source, &q.target).await)
}

async fn handle_infer_path(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PairQuery>,
) -> Json<Value> {
    let max_depth = q.max_depth.unwrap_or(DEFAULT_PATH_DEPTH);
    let found = state.inference.find_path(&q.source, &q.target, max_depth).await;
    Json(json!({
        "source": found.result.source,
        "target": found.result.target,
        "paths": found.result.paths,
        "shortest": found.result.shortest,
        "confidence": found.confidence,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

async fn handle_recommend(
    State(state): State<Arc<AppState>>,
    Path(technology): Path<String>,
    Query(q): Query<RecommendQuery>,
) -> Json<Value> {
    let kind = q
        .kind
        .as_deref()
        .map(RecommendKind::from_label)
        .unwrap_or_default();
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT);
    let found = state.inference.recommend(&technology, kind, limit).await;
    Json(json!({
        "base": found.result.base,
        "type": found.result.kind,
        "recommendations": found.result.recommendations,
        "confidence": found.confidence,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

async fn handle_similar(
    State(state): State<Arc<AppState>>,
    Path(technology): Path<String>,
    Query(q): Query<LimitQuery>,
) -> Json<Value> {
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT);
    let found = state.inference.find_similar(&technology, limit).await;
    Json(json!({
        "base": found.result.base,
        "similar": found.result.similar,
        "confidence": found.confidence,
    }))
}

async fn handle_entities_by_type(
    State(state): State<Arc<AppState>>,
    Path(entity_type): Path<String>,
    Query(q): Query<LimitQuery>,
) -> Json<Value> {
    let limit = q.limit.unwrap_or(DEFAULT_TYPE_LIMIT);
    let entities = state.queries.entities_by_type(&entity_type, limit).await;
    Json(json!({ "count": entities.len(), "entities": entities }))
}
