//! MCP tool catalogue and dispatch.

use kg_engine::{GraphQueryService, InferenceEngine};
use kg_types::{EntityDetail, RecommendKind};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::str::FromStr;

pub use kg_engine::{DEFAULT_LIMIT, DEFAULT_MAX_DEPTH as DEFAULT_DEPENDENCY_DEPTH, DEFAULT_PATH_DEPTH};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: String, reason: String },
}

impl ToolError {
    fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ToolError::InvalidArgument {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// The closed set of callable tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    SearchKnowledge,
    GetContext,
    GetDependencies,
    GetAlternatives,
    GetBestPractices,
    GetStats,
    InferRelation,
    FindPath,
    Recommend,
    FindSimilar,
}

impl ToolName {
    pub const ALL: [ToolName; 10] = [
        ToolName::SearchKnowledge,
        ToolName::GetContext,
        ToolName::GetDependencies,
        ToolName::GetAlternatives,
        ToolName::GetBestPractices,
        ToolName::GetStats,
        ToolName::InferRelation,
        ToolName::FindPath,
        ToolName::Recommend,
        ToolName::FindSimilar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::SearchKnowledge => "search_knowledge",
            ToolName::GetContext => "get_context",
            ToolName::GetDependencies => "get_dependencies",
            ToolName::GetAlternatives => "get_alternatives",
            ToolName::GetBestPractices => "get_best_practices",
            ToolName::GetStats => "get_stats",
            ToolName::InferRelation => "infer_relation",
            ToolName::FindPath => "find_path",
            ToolName::Recommend => "recommend",
            ToolName::FindSimilar => "find_similar",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            ToolName::SearchKnowledge => "Search the knowledge graph for verified information. Returns entities with trust scores, descriptions, and metadata.",
            ToolName::GetContext => "Get complete context for a topic including dependencies, alternatives, integrations, and installation instructions.",
            ToolName::GetDependencies => "Get the dependency chain for a technology. Useful for determining installation order.",
            ToolName::GetAlternatives => "Get alternative technologies/tools for comparison.",
            ToolName::GetBestPractices => "Get best practices, common pitfalls, and recommendations for a technology.",
            ToolName::GetStats => "Get knowledge graph statistics including entity counts, relation counts, and trust score distribution.",
            ToolName::InferRelation => "Infer the relationship between two technologies or concepts using graph traversal.",
            ToolName::FindPath => "Find connection paths between two technologies in the knowledge graph.",
            ToolName::Recommend => "Get technology recommendations based on graph relationships.",
            ToolName::FindSimilar => "Find similar technologies based on category and tags.",
        }
    }

    fn input_schema(&self, min_trust: f64) -> Value {
        match self {
            ToolName::SearchKnowledge => json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search query (keyword or natural language)"},
                    "min_trust": {"type": "number", "description": "Minimum trust score (0-1)", "default": min_trust},
                    "limit": {"type": "integer", "description": "Maximum results", "default": DEFAULT_LIMIT}
                },
                "required": ["query"]
            }),
            ToolName::GetContext => json!({
                "type": "object",
                "properties": {
                    "topic": {"type": "string", "description": "Topic name to get context for"}
                },
                "required": ["topic"]
            }),
            ToolName::GetDependencies => json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Technology/library name"},
                    "max_depth": {"type": "integer", "description": "Maximum traversal depth", "default": DEFAULT_DEPENDENCY_DEPTH}
                },
                "required": ["name"]
            }),
            ToolName::GetAlternatives | ToolName::GetBestPractices => json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Technology name"}
                },
                "required": ["name"]
            }),
            ToolName::GetStats => json!({"type": "object", "properties": {}}),
            ToolName::InferRelation => json!({
                "type": "object",
                "properties": {
                    "source": {"type": "string", "description": "First technology/concept name"},
                    "target": {"type": "string", "description": "Second technology/concept name"}
                },
                "required": ["source", "target"]
            }),
            ToolName::FindPath => json!({
                "type": "object",
                "properties": {
                    "source": {"type": "string", "description": "Starting technology name"},
                    "target": {"type": "string", "description": "Target technology name"},
                    "max_depth": {"type": "integer", "description": "Maximum path depth", "default": DEFAULT_PATH_DEPTH}
                },
                "required": ["source", "target"]
            }),
            ToolName::Recommend => json!({
                "type": "object",
                "properties": {
                    "technology": {"type": "string", "description": "Base technology to get recommendations for"},
                    "type": {
                        "type": "string",
                        "description": "Recommendation type",
                        "enum": ["all", "alternative", "complement"],
                        "default": "all"
                    },
                    "limit": {"type": "integer", "description": "Maximum recommendations", "default": DEFAULT_LIMIT}
                },
                "required": ["technology"]
            }),
            ToolName::FindSimilar => json!({
                "type": "object",
                "properties": {
                    "technology": {"type": "string", "description": "Technology to find similar ones for"},
                    "limit": {"type": "integer", "description": "Maximum results", "default": DEFAULT_LIMIT}
                },
                "required": ["technology"]
            }),
        }
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

/// Tool catalogue as served by `/mcp/tools/list`.
pub fn tool_list(min_trust: f64) -> Value {
    let tools: Vec<Value> = ToolName::ALL
        .iter()
        .map(|t| {
            json!({
                "name": t.as_str(),
                "description": t.description(),
                "inputSchema": t.input_schema(min_trust),
            })
        })
        .collect();
    json!({ "tools": tools })
}

/// `{content: [{type: "text", text: <pretty JSON>}]}`
pub fn success_envelope(result: &Value) -> Value {
    let text = serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string());
    json!({ "content": [{ "type": "text", "text": text }] })
}

pub fn error_envelope(err: &ToolError) -> Value {
    json!({
        "content": [{ "type": "text", "text": format!("Error: {}", err) }],
        "isError": true
    })
}

/// Missing or null string arguments are empty.
fn str_arg(args: &Map<String, Value>, name: &str) -> Result<String, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ToolError::invalid(name, "expected a string")),
    }
}

fn f64_arg(args: &Map<String, Value>, name: &str, default: f64) -> Result<f64, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| ToolError::invalid(name, "expected a number")),
    }
}

fn usize_arg(args: &Map<String, Value>, name: &str, default: usize) -> Result<usize, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| ToolError::invalid(name, "expected a non-negative integer")),
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Executes tool calls against the query service and inference engine.
#[derive(Clone)]
pub struct Toolbox {
    queries: GraphQueryService,
    inference: InferenceEngine,
    min_trust: f64,
}

impl Toolbox {
    pub fn new(queries: GraphQueryService, inference: InferenceEngine, min_trust: f64) -> Self {
        Self {
            queries,
            inference,
            min_trust,
        }
    }

    pub fn min_trust(&self) -> f64 {
        self.min_trust
    }

    /// Dispatch a call by tool name. Unknown names and ill-typed arguments are
    /// `ToolError`s; store trouble never is.
    pub async fn call(&self, name: &str, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let tool: ToolName = name.parse()?;
        tracing::debug!(tool = tool.as_str(), "tool call");
        let result = match tool {
            ToolName::SearchKnowledge => {
                let query = str_arg(args, "query")?;
                let min_trust = f64_arg(args, "min_trust", self.min_trust)?;
                let limit = usize_arg(args, "limit", DEFAULT_LIMIT)?;
                to_value(&self.queries.search_entities(&query, min_trust, limit).await)
            }
            ToolName::GetContext => {
                let topic = str_arg(args, "topic")?;
                let entity = self.queries.get_entity(&topic).await;
                let relations = self.queries.get_relations(&topic).await;
                json!({
                    "entity": entity.as_ref().map(EntityDetail::from),
                    "dependencies": relations.depends_on,
                    "integrations": relations.integrates_with,
                    "alternatives": relations.alternative_to,
                })
            }
            ToolName::GetDependencies => {
                let name = str_arg(args, "name")?;
                let max_depth = usize_arg(args, "max_depth", DEFAULT_DEPENDENCY_DEPTH)?;
                to_value(&self.queries.get_dependency_chain(&name, max_depth).await)
            }
            ToolName::GetAlternatives => {
                let name = str_arg(args, "name")?;
                to_value(&self.queries.get_relations(&name).await.alternative_to)
            }
            ToolName::GetBestPractices => {
                let name = str_arg(args, "name")?;
                match self.queries.get_entity(&name).await {
                    Some(entity) => {
                        let prop = |key: &str, default: Value| {
                            entity.properties.get(key).cloned().unwrap_or(default)
                        };
                        json!({
                            "name": entity.name,
                            "key_features": prop("key_features", json!([])),
                            "use_cases": prop("use_cases", json!([])),
                            "limitations": prop("limitations", json!([])),
                            "installation": prop("installation", json!("")),
                        })
                    }
                    None => json!({ "message": "No best practices found for this topic" }),
                }
            }
            ToolName::GetStats => to_value(&self.queries.get_stats().await),
            ToolName::InferRelation => {
                let source = str_arg(args, "source")?;
                let target = str_arg(args, "target")?;
                to_value(&self.inference.find_relation(&source, &target).await)
            }
            ToolName::FindPath => {
                let source = str_arg(args, "source")?;
                let target = str_arg(args, "target")?;
                let max_depth = usize_arg(args, "max_depth", DEFAULT_PATH_DEPTH)?;
                to_value(&self.inference.find_path(&source, &target, max_depth).await)
            }
            ToolName::Recommend => {
                let technology = str_arg(args, "technology")?;
                let kind = match args.get("type") {
                    None | Some(Value::Null) => RecommendKind::All,
                    Some(Value::String(s)) => RecommendKind::from_label(s),
                    Some(_) => return Err(ToolError::invalid("type", "expected a string")),
                };
                let limit = usize_arg(args, "limit", DEFAULT_LIMIT)?;
                to_value(&self.inference.recommend(&technology, kind, limit).await)
            }
            ToolName::FindSimilar => {
                let technology = str_arg(args, "technology")?;
                let limit = usize_arg(args, "limit", DEFAULT_LIMIT)?;
                to_value(&self.inference.find_similar(&technology, limit).await)
            }
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => Map::new(),
        }
    }

    #[test]
    fn tool_names_parse_and_reject_unknowns() {
        for tool in ToolName::ALL {
            assert_eq!(tool.as_str().parse::<ToolName>(), Ok(tool));
        }
        assert_eq!(
            "drop_database".parse::<ToolName>(),
            Err(ToolError::UnknownTool("drop_database".to_string()))
        );
    }

    #[test]
    fn argument_defaults_and_type_errors() {
        let a = args(json!({"query": "rust", "limit": null, "min_trust": "high"}));
        assert_eq!(str_arg(&a, "query").unwrap(), "rust");
        assert_eq!(str_arg(&a, "missing").unwrap(), "");
        assert_eq!(usize_arg(&a, "limit", 10).unwrap(), 10);
        assert!(f64_arg(&a, "min_trust", 0.7).is_err());
        assert!(usize_arg(&args(json!({"limit": -1})), "limit", 10).is_err());
        assert_eq!(f64_arg(&args(json!({"min_trust": 0})), "min_trust", 0.7).unwrap(), 0.0);
    }

    #[test]
    fn envelopes_have_expected_shape() {
        let ok = success_envelope(&json!({"a": 1}));
        assert_eq!(ok["content"][0]["type"], "text");
        assert_eq!(ok["content"][0]["text"], "{\n  \"a\": 1\n}");
        assert!(ok.get("isError").is_none());

        let err = error_envelope(&ToolError::UnknownTool("nope".to_string()));
        assert_eq!(err["content"][0]["text"], "Error: Unknown tool: nope");
        assert_eq!(err["isError"], true);
    }

    #[test]
    fn catalogue_lists_every_tool() {
        let list = tool_list(0.7);
        let tools = list["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 10);
        assert_eq!(tools[0]["inputSchema"]["properties"]["min_trust"]["default"], 0.7);
    }
}
