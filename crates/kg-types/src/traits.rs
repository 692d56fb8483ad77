//! Store-facing vocabulary: bounded graph queries, rows, and backend traits.

use crate::RelationType;
use async_trait::async_trait;
use std::sync::Arc;

/// One result row: column name -> value, in column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A bounded graph pattern query.
///
/// Every variant is a fixed pattern with its parameters inline, so backends can
/// translate it to their own query language (or evaluate it directly) without
/// accepting arbitrary query text. Name matching marked "contains" is a
/// case-insensitive substring match; "equals" is case-insensitive equality.
/// The columns each variant yields are listed on the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphQuery {
    /// Entities whose name equals `name`. Columns: every `Entity` field, with
    /// `properties` either an object or a serialized JSON string.
    EntityByName { name: String },
    /// Entities whose name or description contains `query`, with
    /// `trust_score >= min_trust`, trust descending.
    /// Columns: `name`, `type`, `description`, `trust`, `properties`.
    SearchEntities {
        query: String,
        min_trust: f64,
        limit: usize,
    },
    /// Edges leaving the entity named `name`.
    /// Columns: `relation`, `name`, `description`, `trust`.
    OutgoingRelations { name: String },
    /// Edges entering the entity named `name`. Same columns as outgoing.
    IncomingRelations { name: String },
    /// Every `depends_on` path of 1..=max_depth hops from the entity named
    /// `name`, one row per path, depth ascending.
    /// Columns: `name`, `description`, `depth`.
    DependencyChain { name: String, max_depth: usize },
    /// Columns: `count`.
    EntityCount,
    /// Columns: `count`.
    RelationCount,
    /// Columns: `avg` (null when there are no entities).
    AverageTrust,
    /// Columns: `type` (null when absent), `count`; count descending.
    EntityTypeCounts,
    /// Entities of one type, trust descending. Columns as `EntityByName`.
    EntitiesOfType { entity_type: String, limit: usize },
    /// Edges in either direction between a node containing `source` and a
    /// node containing `target`. Columns: `source`, `relation`, `target`.
    DirectRelations { source: String, target: String },
    /// Two-hop undirected paths source - mid - target over distinct edges.
    /// Columns: `source`, `via`, `relation1`, `relation2`, `target`.
    IndirectRelations {
        source: String,
        target: String,
        limit: usize,
    },
    /// One shortest undirected path per (source match, target match) pair with
    /// distinct endpoints, at most `max_depth` hops, shortest first.
    /// Columns: `nodes` (names), `relations` (labels), `length`.
    ShortestPaths {
        source: String,
        target: String,
        max_depth: usize,
        limit: usize,
    },
    /// Distinct neighbors (either direction) of any node containing `name`,
    /// restricted to `relation_types` unless it is empty, trust descending.
    /// Columns: `name`, `description`, `trust_score`, `relation`.
    Neighbors {
        name: String,
        relation_types: Vec<RelationType>,
        limit: usize,
    },
    /// The highest-trust entity whose name contains `name`.
    /// Columns: `type`, `tags`.
    BaseEntity { name: String },
    /// Entities of `entity_type` whose name does not contain `exclude`,
    /// trust descending. Columns: `name`, `description`, `trust_score`, `tags`.
    SimilarCandidates {
        entity_type: String,
        exclude: String,
        limit: usize,
    },
}

impl GraphQuery {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            GraphQuery::EntityByName { .. } => "entity_by_name",
            GraphQuery::SearchEntities { .. } => "search_entities",
            GraphQuery::OutgoingRelations { .. } => "outgoing_relations",
            GraphQuery::IncomingRelations { .. } => "incoming_relations",
            GraphQuery::DependencyChain { .. } => "dependency_chain",
            GraphQuery::EntityCount => "entity_count",
            GraphQuery::RelationCount => "relation_count",
            GraphQuery::AverageTrust => "average_trust",
            GraphQuery::EntityTypeCounts => "entity_type_counts",
            GraphQuery::EntitiesOfType { .. } => "entities_of_type",
            GraphQuery::DirectRelations { .. } => "direct_relations",
            GraphQuery::IndirectRelations { .. } => "indirect_relations",
            GraphQuery::ShortestPaths { .. } => "shortest_paths",
            GraphQuery::Neighbors { .. } => "neighbors",
            GraphQuery::BaseEntity { .. } => "base_entity",
            GraphQuery::SimilarCandidates { .. } => "similar_candidates",
        }
    }
}

/// A live connection to a graph store.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    /// Execute one bounded query. "No rows" is `Ok(vec![])`, never an error.
    async fn execute(&self, query: &GraphQuery) -> Result<Vec<Row>, StoreError>;

    /// Release the connection. Later `execute` calls may fail with `Unavailable`.
    async fn close(&self) {}
}

/// Establishes backend connections for the store adapter.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn GraphBackend>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No connection or credentials configured, or connecting failed.
    #[error("graph store unavailable: {0}")]
    Unavailable(String),
    /// The store rejected or errored on a specific query.
    #[error("graph query failed: {0}")]
    QueryFailed(String),
}
