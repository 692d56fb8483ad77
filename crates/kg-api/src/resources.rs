//! Read-only MCP resources.

use kg_engine::GraphQueryService;
use serde_json::{json, Value};

pub const STATS_URI: &str = "knowledge://stats";
pub const ENTITIES_URI: &str = "knowledge://entities";

const ENTITY_LISTING_LIMIT: usize = 100;

pub fn resource_list() -> Value {
    json!({
        "resources": [
            {
                "uri": STATS_URI,
                "name": "Knowledge Graph Statistics",
                "description": "Statistics about the knowledge graph",
                "mimeType": "application/json"
            },
            {
                "uri": ENTITIES_URI,
                "name": "Entity List",
                "description": "List of all entities in the knowledge graph",
                "mimeType": "application/json"
            }
        ]
    })
}

/// Resolve a resource URI. Unknown URIs produce an `error` object rather than
/// a failure, wrapped in the same `contents` envelope.
pub async fn read_resource(queries: &GraphQueryService, uri: &str) -> Value {
    let result = match uri {
        STATS_URI => serde_json::to_value(queries.get_stats().await).unwrap_or(Value::Null),
        ENTITIES_URI => serde_json::to_value(
            queries
                .search_entities("", 0.0, ENTITY_LISTING_LIMIT)
                .await,
        )
        .unwrap_or(Value::Null),
        other => {
            tracing::debug!(uri = other, "unknown resource");
            json!({ "error": format!("Unknown resource: {}", other) })
        }
    };
    let text = serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string());
    json!({
        "contents": [{
            "uri": uri,
            "mimeType": "application/json",
            "text": text
        }]
    })
}
