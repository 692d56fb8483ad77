use kg_store::{GraphSnapshot, InMemoryGraphBackend, StoreAdapter};
use serde_json::json;
use std::sync::Arc;

/// A small Python HTTP ecosystem plus an alpha..echo chain for confidence tiers.
pub(crate) fn sample_snapshot() -> GraphSnapshot {
    let snapshot = json!({
        "entities": [
            {"id": "requests", "name": "requests", "entity_type": "tool", "trust_score": 0.92,
             "description": "HTTP for humans", "tags": ["http", "python", "client"],
             "properties": {"stars": 51000, "installation": "pip install requests"}},
            {"id": "urllib3", "name": "urllib3", "entity_type": "tool", "trust_score": 0.85,
             "description": "HTTP client with pooling", "tags": ["http", "python"]},
            {"id": "six", "name": "six", "entity_type": "tool", "trust_score": 0.6,
             "description": "Python 2 and 3 compatibility", "tags": ["python", "compat"]},
            {"id": "httpx", "name": "httpx", "entity_type": "tool", "trust_score": 0.88,
             "description": "Async capable HTTP client", "tags": ["http", "python", "async", "client"]},
            {"id": "aiohttp", "name": "aiohttp", "entity_type": "tool", "trust_score": 0.8,
             "description": "Async HTTP client and server", "tags": ["http", "async"]},
            {"id": "fastapi", "name": "FastAPI", "entity_type": "framework", "trust_score": 0.95,
             "description": "Modern web framework", "tags": ["web", "python"],
             "properties": {"key_features": ["async", "openapi"], "installation": "pip install fastapi"}},
            {"id": "pydantic", "name": "pydantic", "entity_type": "framework", "trust_score": 0.9,
             "description": "Data validation", "tags": ["python", "validation"]},
            {"id": "cyc-one", "name": "cyc-one", "entity_type": "concept", "trust_score": 0.5},
            {"id": "cyc-two", "name": "cyc-two", "entity_type": "concept", "trust_score": 0.5},
            {"id": "alpha", "name": "alpha", "entity_type": "concept", "trust_score": 0.7},
            {"id": "bravo", "name": "bravo", "entity_type": "concept", "trust_score": 0.7},
            {"id": "charlie", "name": "charlie", "entity_type": "concept", "trust_score": 0.7},
            {"id": "delta", "name": "delta", "entity_type": "concept", "trust_score": 0.7},
            {"id": "echo", "name": "echo", "entity_type": "concept", "trust_score": 0.7}
        ],
        "relations": [
            {"id": "r01", "source_id": "requests", "target_id": "urllib3", "relation_type": "depends_on"},
            {"id": "r02", "source_id": "urllib3", "target_id": "six", "relation_type": "depends_on"},
            {"id": "r03", "source_id": "httpx", "target_id": "requests", "relation_type": "alternative_to"},
            {"id": "r04", "source_id": "requests", "target_id": "aiohttp", "relation_type": "competes_with"},
            {"id": "r05", "source_id": "fastapi", "target_id": "pydantic", "relation_type": "integrates_with"},
            {"id": "r06", "source_id": "pydantic", "target_id": "fastapi", "relation_type": "part_of"},
            {"id": "r07", "source_id": "cyc-one", "target_id": "cyc-two", "relation_type": "depends_on"},
            {"id": "r08", "source_id": "cyc-two", "target_id": "cyc-one", "relation_type": "depends_on"},
            {"id": "r09", "source_id": "alpha", "target_id": "bravo", "relation_type": "related_to"},
            {"id": "r10", "source_id": "alpha", "target_id": "charlie", "relation_type": "uses"},
            {"id": "r11", "source_id": "charlie", "target_id": "delta", "relation_type": "extends"}
        ]
    });
    serde_json::from_value(snapshot).unwrap()
}

pub(crate) async fn sample_store() -> Arc<StoreAdapter> {
    store_of(sample_snapshot()).await
}

/// Store over an ad-hoc snapshot written as JSON.
pub(crate) async fn store_from_json(snapshot: serde_json::Value) -> Arc<StoreAdapter> {
    store_of(serde_json::from_value(snapshot).unwrap()).await
}

async fn store_of(snapshot: GraphSnapshot) -> Arc<StoreAdapter> {
    let backend = InMemoryGraphBackend::from_snapshot(snapshot).await.unwrap();
    Arc::new(StoreAdapter::shared(Arc::new(backend)))
}

pub(crate) fn degraded_store() -> Arc<StoreAdapter> {
    Arc::new(StoreAdapter::unconfigured())
}
