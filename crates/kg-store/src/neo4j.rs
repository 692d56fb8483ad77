//! Neo4j backend over the HTTP transactional endpoint.
//!
//! Each [`GraphQuery`] is rendered to one parameterized Cypher statement and
//! posted to `{uri}/db/{database}/tx/commit`. Only the variable-length bounds
//! are interpolated into the text (Cypher does not accept them as parameters);
//! they are plain integers.

use crate::StoreError;
use async_trait::async_trait;
use kg_types::{Connector, GraphBackend, GraphQuery, Row};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Connection settings for the Neo4j HTTP API.
#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    /// Base URL, e.g. `http://localhost:7474`.
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: "http://localhost:7474".to_string(),
            user: "neo4j".to_string(),
            password: String::new(),
            database: "neo4j".to_string(),
        }
    }
}

impl Neo4jConfig {
    /// Whether credentials are present at all.
    pub fn has_credentials(&self) -> bool {
        !self.password.is_empty()
    }

    fn commit_url(&self) -> String {
        format!(
            "{}/db/{}/tx/commit",
            self.uri.trim_end_matches('/'),
            self.database
        )
    }
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    #[serde(default)]
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Opens [`Neo4jHttpBackend`] handles after checking the server answers.
pub struct Neo4jConnector {
    config: Neo4jConfig,
    client: reqwest::Client,
}

impl Neo4jConnector {
    pub fn new(config: Neo4jConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Connector for Neo4jConnector {
    async fn connect(&self) -> Result<Arc<dyn GraphBackend>, StoreError> {
        if !self.config.has_credentials() {
            return Err(StoreError::Unavailable(
                "NEO4J_PASSWORD not set".to_string(),
            ));
        }
        let backend = Neo4jHttpBackend::new(self.config.clone(), self.client.clone());
        backend.post("RETURN 1 AS ok", json!({})).await?;
        tracing::info!(uri = %self.config.uri, database = %self.config.database, "connected to neo4j");
        Ok(Arc::new(backend))
    }
}

/// A live handle to one Neo4j database.
pub struct Neo4jHttpBackend {
    config: Neo4jConfig,
    client: reqwest::Client,
    closed: AtomicBool,
}

impl Neo4jHttpBackend {
    pub fn new(config: Neo4jConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            closed: AtomicBool::new(false),
        }
    }

    async fn post(&self, statement: &str, parameters: Value) -> Result<Vec<Row>, StoreError> {
        let body = json!({
            "statements": [{ "statement": statement, "parameters": parameters }]
        });
        let res = self
            .client
            .post(self.config.commit_url())
            .basic_auth(&self.config.user, Some(&self.config.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(StoreError::Unavailable(format!("neo4j rejected credentials ({})", status)));
        }
        if !status.is_success() {
            return Err(StoreError::QueryFailed(format!(
                "neo4j error {}: {}",
                status, text
            )));
        }
        parse_response(&text)
    }
}

#[async_trait]
impl GraphBackend for Neo4jHttpBackend {
    async fn execute(&self, query: &GraphQuery) -> Result<Vec<Row>, StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("neo4j handle closed".to_string()));
        }
        if matches!(
            query,
            GraphQuery::DependencyChain { max_depth: 0, .. }
                | GraphQuery::ShortestPaths { max_depth: 0, .. }
        ) {
            return Ok(Vec::new());
        }
        let (statement, parameters) = to_cypher(query);
        self.post(&statement, parameters).await
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Decode a transactional-endpoint response into rows of the first result.
fn parse_response(text: &str) -> Result<Vec<Row>, StoreError> {
    let parsed: TxResponse = serde_json::from_str(text)
        .map_err(|e| StoreError::QueryFailed(format!("invalid neo4j response: {}", e)))?;
    if let Some(err) = parsed.errors.first() {
        let message = format!("{}: {}", err.code, err.message);
        if err.code.starts_with("Neo.ClientError.Security") {
            return Err(StoreError::Unavailable(message));
        }
        return Err(StoreError::QueryFailed(message));
    }
    let Some(result) = parsed.results.into_iter().next() else {
        return Ok(Vec::new());
    };
    let columns = result.columns;
    Ok(result
        .data
        .into_iter()
        .map(|d| columns.iter().cloned().zip(d.row).collect::<Row>())
        .collect())
}

const ENTITY_COLUMNS: &str = "e.id AS id, e.name AS name, e.entity_type AS entity_type, \
     e.description AS description, e.properties AS properties, e.tags AS tags, \
     e.trust_score AS trust_score, e.trust_level AS trust_level, \
     e.source_url AS source_url, e.source_count AS source_count, \
     e.service_id AS service_id, e.user_id AS user_id, \
     toString(e.created_at) AS created_at, toString(e.updated_at) AS updated_at";

/// Render a query as a Cypher statement plus parameters.
pub(crate) fn to_cypher(query: &GraphQuery) -> (String, Value) {
    match query {
        GraphQuery::EntityByName { name } => (
            format!(
                "MATCH (e:Entity) WHERE toLower(e.name) = toLower($name) \
                 RETURN {ENTITY_COLUMNS} ORDER BY e.created_at, e.id"
            ),
            json!({ "name": name }),
        ),
        GraphQuery::SearchEntities {
            query,
            min_trust,
            limit,
        } => (
            "MATCH (e:Entity) WHERE e.trust_score >= $min_trust \
             AND (toLower(e.name) CONTAINS toLower($query) \
             OR toLower(coalesce(e.description, '')) CONTAINS toLower($query)) \
             RETURN e.name AS name, e.entity_type AS type, e.description AS description, \
             e.trust_score AS trust, e.properties AS properties \
             ORDER BY e.trust_score DESC LIMIT $limit"
                .to_string(),
            json!({ "query": query, "min_trust": min_trust, "limit": limit }),
        ),
        GraphQuery::OutgoingRelations { name } => (
            "MATCH (e:Entity)-[r]->(other:Entity) WHERE toLower(e.name) = toLower($name) \
             RETURN type(r) AS relation, other.name AS name, \
             other.description AS description, other.trust_score AS trust"
                .to_string(),
            json!({ "name": name }),
        ),
        GraphQuery::IncomingRelations { name } => (
            "MATCH (other:Entity)-[r]->(e:Entity) WHERE toLower(e.name) = toLower($name) \
             RETURN type(r) AS relation, other.name AS name, \
             other.description AS description, other.trust_score AS trust"
                .to_string(),
            json!({ "name": name }),
        ),
        GraphQuery::DependencyChain { name, max_depth } => (
            format!(
                "MATCH path = (e:Entity)-[:depends_on*1..{max_depth}]->(dep:Entity) \
                 WHERE toLower(e.name) = toLower($name) \
                 RETURN dep.name AS name, dep.description AS description, \
                 length(path) AS depth ORDER BY depth"
            ),
            json!({ "name": name }),
        ),
        GraphQuery::EntityCount => (
            "MATCH (n:Entity) RETURN count(n) AS count".to_string(),
            json!({}),
        ),
        GraphQuery::RelationCount => (
            "MATCH ()-[r]->() RETURN count(r) AS count".to_string(),
            json!({}),
        ),
        GraphQuery::AverageTrust => (
            "MATCH (n:Entity) RETURN avg(n.trust_score) AS avg".to_string(),
            json!({}),
        ),
        GraphQuery::EntityTypeCounts => (
            "MATCH (n:Entity) RETURN n.entity_type AS type, count(n) AS count \
             ORDER BY count DESC"
                .to_string(),
            json!({}),
        ),
        GraphQuery::EntitiesOfType { entity_type, limit } => (
            format!(
                "MATCH (e:Entity) WHERE toLower(e.entity_type) = toLower($entity_type) \
                 RETURN {ENTITY_COLUMNS} ORDER BY e.trust_score DESC LIMIT $limit"
            ),
            json!({ "entity_type": entity_type, "limit": limit }),
        ),
        GraphQuery::DirectRelations { source, target } => (
            "MATCH (a:Entity)-[r]-(b:Entity) \
             WHERE toLower(a.name) CONTAINS toLower($source) \
             AND toLower(b.name) CONTAINS toLower($target) \
             RETURN a.name AS source, type(r) AS relation, b.name AS target"
                .to_string(),
            json!({ "source": source, "target": target }),
        ),
        GraphQuery::IndirectRelations {
            source,
            target,
            limit,
        } => (
            "MATCH (a:Entity)-[r1]-(mid:Entity)-[r2]-(b:Entity) \
             WHERE toLower(a.name) CONTAINS toLower($source) \
             AND toLower(b.name) CONTAINS toLower($target) \
             RETURN a.name AS source, mid.name AS via, type(r1) AS relation1, \
             type(r2) AS relation2, b.name AS target LIMIT $limit"
                .to_string(),
            json!({ "source": source, "target": target, "limit": limit }),
        ),
        GraphQuery::ShortestPaths {
            source,
            target,
            max_depth,
            limit,
        } => (
            format!(
                "MATCH (a:Entity), (b:Entity) \
                 WHERE toLower(a.name) CONTAINS toLower($source) \
                 AND toLower(b.name) CONTAINS toLower($target) AND a <> b \
                 MATCH path = shortestPath((a)-[*1..{max_depth}]-(b)) \
                 RETURN [n IN nodes(path) | n.name] AS nodes, \
                 [r IN relationships(path) | type(r)] AS relations, \
                 length(path) AS length ORDER BY length LIMIT $limit"
            ),
            json!({ "source": source, "target": target, "limit": limit }),
        ),
        GraphQuery::Neighbors {
            name,
            relation_types,
            limit,
        } => {
            let types: Vec<&str> = relation_types.iter().map(|t| t.as_str()).collect();
            (
                "MATCH (a:Entity)-[r]-(b:Entity) \
                 WHERE toLower(a.name) CONTAINS toLower($name) \
                 AND (size($types) = 0 OR type(r) IN $types) \
                 WITH b, collect(type(r))[0] AS relation \
                 RETURN b.name AS name, b.description AS description, \
                 b.trust_score AS trust_score, relation \
                 ORDER BY trust_score DESC LIMIT $limit"
                    .to_string(),
                json!({ "name": name, "types": types, "limit": limit }),
            )
        }
        GraphQuery::BaseEntity { name } => (
            "MATCH (e:Entity) WHERE toLower(e.name) CONTAINS toLower($name) \
             RETURN e.entity_type AS type, e.tags AS tags \
             ORDER BY e.trust_score DESC LIMIT 1"
                .to_string(),
            json!({ "name": name }),
        ),
        GraphQuery::SimilarCandidates {
            entity_type,
            exclude,
            limit,
        } => (
            "MATCH (e:Entity) WHERE e.entity_type = $type \
             AND NOT toLower(e.name) CONTAINS toLower($name) \
             RETURN e.name AS name, e.description AS description, \
             e.trust_score AS trust_score, e.tags AS tags \
             ORDER BY e.trust_score DESC LIMIT $limit"
                .to_string(),
            json!({ "type": entity_type, "name": exclude, "limit": limit }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kg_types::RelationType;

    #[test]
    fn depth_bound_is_interpolated_and_name_is_a_parameter() {
        let (cypher, params) = to_cypher(&GraphQuery::DependencyChain {
            name: "requests'; DROP".to_string(),
            max_depth: 3,
        });
        assert!(cypher.contains("[:depends_on*1..3]"));
        assert!(!cypher.contains("DROP"));
        assert_eq!(params["name"], json!("requests'; DROP"));
    }

    #[test]
    fn neighbor_filter_passes_type_labels() {
        let (cypher, params) = to_cypher(&GraphQuery::Neighbors {
            name: "react".to_string(),
            relation_types: vec![RelationType::IntegratesWith, RelationType::DependsOn],
            limit: 10,
        });
        assert!(cypher.contains("type(r) IN $types"));
        assert_eq!(params["types"], json!(["integrates_with", "depends_on"]));
        assert_eq!(params["limit"], json!(10));
    }

    #[test]
    fn response_rows_follow_column_order() {
        let text = r#"{
            "results": [{
                "columns": ["name", "depth"],
                "data": [{"row": ["urllib3", 1], "meta": [null, null]}, {"row": ["six", 2]}]
            }],
            "errors": []
        }"#;
        let rows = parse_response(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["name"], json!("six"));
        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys, vec!["name", "depth"]);
    }

    #[test]
    fn response_errors_are_classified() {
        let denied = r#"{"results": [], "errors": [{"code": "Neo.ClientError.Security.Unauthorized", "message": "no"}]}"#;
        assert!(matches!(parse_response(denied), Err(StoreError::Unavailable(_))));

        let syntax = r#"{"results": [], "errors": [{"code": "Neo.ClientError.Statement.SyntaxError", "message": "bad"}]}"#;
        assert!(matches!(parse_response(syntax), Err(StoreError::QueryFailed(_))));

        assert!(matches!(parse_response("<html>"), Err(StoreError::QueryFailed(_))));
        assert!(parse_response(r#"{"results": [], "errors": []}"#).unwrap().is_empty());
    }

    #[tokio::test]
    async fn connector_without_password_is_unavailable() {
        let connector = Neo4jConnector::new(Neo4jConfig::default());
        let err = connector.connect().await.err();
        assert!(matches!(err, Some(StoreError::Unavailable(_))));
    }
}
