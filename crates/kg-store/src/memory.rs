//! In-memory graph backend.
//!
//! Stands in for the external graph database: the collector (or a snapshot
//! file) inserts entities and relations, and the engine reads through
//! [`GraphBackend::execute`]. Traversals visit edges sorted by id so results do
//! not depend on hash-map ordering.

use crate::StoreError;
use async_trait::async_trait;
use kg_types::{Connector, Entity, GraphBackend, GraphQuery, Relation, RelationType, Row};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

type EdgeIndex = HashMap<String, Vec<String>>;

/// Serialized graph contents, as loaded from `KG_SNAPSHOT`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Walk {
    Outbound,
    Inbound,
    Both,
}

#[derive(Default)]
struct GraphState {
    /// entity_id -> entity.
    entities: HashMap<String, Entity>,
    /// relation_id -> relation.
    relations: HashMap<String, Relation>,
    /// source_id -> relation_ids.
    out_index: EdgeIndex,
    /// target_id -> relation_ids.
    in_index: EdgeIndex,
}

/// In-memory implementation of [`GraphBackend`]. Clones share the same graph.
#[derive(Clone, Default)]
pub struct InMemoryGraphBackend {
    state: Arc<RwLock<GraphState>>,
}

impl InMemoryGraphBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a backend from a snapshot.
    pub async fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self, StoreError> {
        let backend = Self::new();
        backend.load_snapshot(snapshot).await?;
        Ok(backend)
    }

    /// Read a JSON snapshot file and build a backend from it.
    pub async fn from_snapshot_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            StoreError::Unavailable(format!("cannot read snapshot {}: {}", path.display(), e))
        })?;
        let snapshot: GraphSnapshot = serde_json::from_str(&content).map_err(|e| {
            StoreError::Unavailable(format!("invalid snapshot {}: {}", path.display(), e))
        })?;
        tracing::info!(
            path = %path.display(),
            entities = snapshot.entities.len(),
            relations = snapshot.relations.len(),
            "loaded graph snapshot"
        );
        Self::from_snapshot(snapshot).await
    }

    /// Insert entities first, then relations, so edges can reference any entity
    /// in the snapshot.
    pub async fn load_snapshot(&self, snapshot: GraphSnapshot) -> Result<(), StoreError> {
        for entity in snapshot.entities {
            self.insert_entity(entity).await;
        }
        for relation in snapshot.relations {
            self.insert_relation(relation).await?;
        }
        Ok(())
    }

    /// Producer-side insert (or replace by id). The trust level is re-derived
    /// from the score so stored entities always agree with `classify`.
    pub async fn insert_entity(&self, mut entity: Entity) {
        entity.normalize_trust_level();
        let mut state = self.state.write().await;
        state.entities.insert(entity.id.clone(), entity);
    }

    /// Producer-side insert (or replace by id). Both endpoints must exist.
    pub async fn insert_relation(&self, relation: Relation) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.entities.contains_key(&relation.source_id) {
            return Err(StoreError::QueryFailed(format!(
                "source entity not found: {}",
                relation.source_id
            )));
        }
        if !state.entities.contains_key(&relation.target_id) {
            return Err(StoreError::QueryFailed(format!(
                "target entity not found: {}",
                relation.target_id
            )));
        }
        let GraphState {
            relations,
            out_index,
            in_index,
            ..
        } = &mut *state;
        if let Some(old) = relations.insert(relation.id.clone(), relation.clone()) {
            remove_edge_from_index(out_index, &old.source_id, &old.id);
            remove_edge_from_index(in_index, &old.target_id, &old.id);
        }
        add_edge_to_index(out_index, &relation.source_id, &relation.id);
        add_edge_to_index(in_index, &relation.target_id, &relation.id);
        Ok(())
    }

    pub async fn entity_count(&self) -> usize {
        self.state.read().await.entities.len()
    }

    pub async fn relation_count(&self) -> usize {
        self.state.read().await.relations.len()
    }
}

fn add_edge_to_index(index: &mut EdgeIndex, node_id: &str, edge_id: &str) {
    let list = index.entry(node_id.to_string()).or_default();
    if !list.iter().any(|x| x == edge_id) {
        list.push(edge_id.to_string());
    }
}

fn remove_edge_from_index(index: &mut EdgeIndex, node_id: &str, edge_id: &str) {
    if let Some(list) = index.get_mut(node_id) {
        list.retain(|x| x != edge_id);
        if list.is_empty() {
            index.remove(node_id);
        }
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn by_trust_desc(a: &Entity, b: &Entity) -> Ordering {
    b.trust_score
        .partial_cmp(&a.trust_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.name.cmp(&b.name))
}

fn entity_row(entity: &Entity) -> Row {
    match serde_json::to_value(entity) {
        Ok(Value::Object(map)) => map,
        _ => Row::new(),
    }
}

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

impl GraphState {
    /// Entities whose name equals `name` (case-insensitive), oldest first.
    fn named(&self, name: &str) -> Vec<&Entity> {
        let needle = name.to_lowercase();
        let mut found: Vec<&Entity> = self
            .entities
            .values()
            .filter(|e| e.name.to_lowercase() == needle)
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        found
    }

    /// Entities whose name contains `needle` (case-insensitive), by name.
    fn matching(&self, needle: &str) -> Vec<&Entity> {
        let mut found: Vec<&Entity> = self
            .entities
            .values()
            .filter(|e| contains_ci(&e.name, needle))
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        found
    }

    /// Edges touching `node_id` in the given direction, deduplicated, by id.
    fn incident(&self, node_id: &str, walk: Walk) -> Vec<&Relation> {
        let mut edge_ids: Vec<&String> = Vec::new();
        if walk != Walk::Inbound {
            edge_ids.extend(self.out_index.get(node_id).into_iter().flatten());
        }
        if walk != Walk::Outbound {
            edge_ids.extend(self.in_index.get(node_id).into_iter().flatten());
        }
        let mut seen = HashSet::new();
        let mut edges: Vec<&Relation> = edge_ids
            .into_iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| self.relations.get(id))
            .collect();
        edges.sort_by(|a, b| a.id.cmp(&b.id));
        edges
    }

    fn other_end<'a>(edge: &'a Relation, node_id: &str) -> &'a str {
        if edge.source_id == node_id {
            &edge.target_id
        } else {
            &edge.source_id
        }
    }

    fn execute(&self, query: &GraphQuery) -> Vec<Row> {
        match query {
            GraphQuery::EntityByName { name } => {
                self.named(name).into_iter().map(entity_row).collect()
            }
            GraphQuery::SearchEntities {
                query,
                min_trust,
                limit,
            } => self.search(query, *min_trust, *limit),
            GraphQuery::OutgoingRelations { name } => self.relations_of(name, Walk::Outbound),
            GraphQuery::IncomingRelations { name } => self.relations_of(name, Walk::Inbound),
            GraphQuery::DependencyChain { name, max_depth } => {
                self.dependency_chain(name, *max_depth)
            }
            GraphQuery::EntityCount => vec![row(json!({ "count": self.entities.len() }))],
            GraphQuery::RelationCount => vec![row(json!({ "count": self.relations.len() }))],
            GraphQuery::AverageTrust => {
                let avg = if self.entities.is_empty() {
                    Value::Null
                } else {
                    let sum: f64 = self.entities.values().map(|e| e.trust_score).sum();
                    json!(sum / self.entities.len() as f64)
                };
                vec![row(json!({ "avg": avg }))]
            }
            GraphQuery::EntityTypeCounts => self.type_counts(),
            GraphQuery::EntitiesOfType { entity_type, limit } => {
                let mut found: Vec<&Entity> = self
                    .entities
                    .values()
                    .filter(|e| {
                        e.type_label()
                            .is_some_and(|t| t.eq_ignore_ascii_case(entity_type))
                    })
                    .collect();
                found.sort_by(|a, b| by_trust_desc(a, b));
                found.into_iter().take(*limit).map(entity_row).collect()
            }
            GraphQuery::DirectRelations { source, target } => self.direct(source, target),
            GraphQuery::IndirectRelations {
                source,
                target,
                limit,
            } => self.indirect(source, target, *limit),
            GraphQuery::ShortestPaths {
                source,
                target,
                max_depth,
                limit,
            } => self.shortest_paths(source, target, *max_depth, *limit),
            GraphQuery::Neighbors {
                name,
                relation_types,
                limit,
            } => self.neighbors(name, relation_types, *limit),
            GraphQuery::BaseEntity { name } => {
                let mut found = self.matching(name);
                found.sort_by(|a, b| by_trust_desc(a, b));
                found
                    .first()
                    .map(|e| vec![row(json!({ "type": e.type_label(), "tags": e.tags }))])
                    .unwrap_or_default()
            }
            GraphQuery::SimilarCandidates {
                entity_type,
                exclude,
                limit,
            } => {
                let mut found: Vec<&Entity> = self
                    .entities
                    .values()
                    .filter(|e| e.type_label() == Some(entity_type.as_str()))
                    .filter(|e| !contains_ci(&e.name, exclude))
                    .collect();
                found.sort_by(|a, b| by_trust_desc(a, b));
                found
                    .into_iter()
                    .take(*limit)
                    .map(|e| {
                        row(json!({
                            "name": e.name,
                            "description": e.description,
                            "trust_score": e.trust_score,
                            "tags": e.tags,
                        }))
                    })
                    .collect()
            }
        }
    }

    fn search(&self, query: &str, min_trust: f64, limit: usize) -> Vec<Row> {
        let mut found: Vec<&Entity> = self
            .entities
            .values()
            .filter(|e| e.trust_score >= min_trust)
            .filter(|e| contains_ci(&e.name, query) || contains_ci(&e.description, query))
            .collect();
        found.sort_by(|a, b| by_trust_desc(a, b));
        found
            .into_iter()
            .take(limit)
            .map(|e| {
                row(json!({
                    "name": e.name,
                    "type": e.type_label(),
                    "description": e.description,
                    "trust": e.trust_score,
                    "properties": e.properties,
                }))
            })
            .collect()
    }

    fn relations_of(&self, name: &str, walk: Walk) -> Vec<Row> {
        let mut rows = Vec::new();
        for entity in self.named(name) {
            for edge in self.incident(&entity.id, walk) {
                let Some(other) = self.entities.get(Self::other_end(edge, &entity.id)) else {
                    continue;
                };
                rows.push(row(json!({
                    "relation": edge.relation_type.as_str(),
                    "name": other.name,
                    "description": other.description,
                    "trust": other.trust_score,
                })));
            }
        }
        rows
    }

    /// One entry per `depends_on` path; an edge is never reused within a
    /// path, and the depth bound caps expansion even on cycles.
    fn dependency_chain(&self, name: &str, max_depth: usize) -> Vec<Row> {
        let mut found: Vec<(usize, &str)> = Vec::new();
        for root in self.named(name) {
            let mut used: HashSet<&str> = HashSet::new();
            self.walk_dependencies(&root.id, 0, max_depth, &mut used, &mut found);
        }
        // Stable: DFS order is kept within a depth.
        found.sort_by_key(|(depth, _)| *depth);
        found
            .into_iter()
            .filter_map(|(depth, id)| self.entities.get(id).map(|e| (depth, e)))
            .map(|(depth, e)| {
                row(json!({ "name": e.name, "description": e.description, "depth": depth }))
            })
            .collect()
    }

    fn walk_dependencies<'a>(
        &'a self,
        node_id: &str,
        depth: usize,
        max_depth: usize,
        used: &mut HashSet<&'a str>,
        found: &mut Vec<(usize, &'a str)>,
    ) {
        if depth >= max_depth {
            return;
        }
        for edge in self.incident(node_id, Walk::Outbound) {
            if edge.relation_type != RelationType::DependsOn || !used.insert(edge.id.as_str()) {
                continue;
            }
            found.push((depth + 1, edge.target_id.as_str()));
            self.walk_dependencies(&edge.target_id, depth + 1, max_depth, used, found);
            used.remove(edge.id.as_str());
        }
    }

    /// Unset types come out as a null `type`.
    fn type_counts(&self) -> Vec<Row> {
        let mut counts: HashMap<Option<&str>, u64> = HashMap::new();
        for e in self.entities.values() {
            *counts.entry(e.type_label()).or_insert(0) += 1;
        }
        let mut counts: Vec<(Option<&str>, u64)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
            .into_iter()
            .map(|(t, c)| row(json!({ "type": t, "count": c })))
            .collect()
    }

    fn direct(&self, source: &str, target: &str) -> Vec<Row> {
        let mut edges: Vec<&Relation> = self.relations.values().collect();
        edges.sort_by(|a, b| a.id.cmp(&b.id));
        let mut rows = Vec::new();
        for edge in edges {
            let (Some(from), Some(to)) = (
                self.entities.get(&edge.source_id),
                self.entities.get(&edge.target_id),
            ) else {
                continue;
            };
            let label = edge.relation_type.as_str();
            if contains_ci(&from.name, source) && contains_ci(&to.name, target) {
                rows.push(row(json!({ "source": from.name, "relation": label, "target": to.name })));
            }
            if from.id != to.id && contains_ci(&to.name, source) && contains_ci(&from.name, target) {
                rows.push(row(json!({ "source": to.name, "relation": label, "target": from.name })));
            }
        }
        rows
    }

    fn indirect(&self, source: &str, target: &str, limit: usize) -> Vec<Row> {
        let mut rows = Vec::new();
        for a in self.matching(source) {
            for r1 in self.incident(&a.id, Walk::Both) {
                let mid_id = Self::other_end(r1, &a.id);
                let Some(mid) = self.entities.get(mid_id) else {
                    continue;
                };
                for r2 in self.incident(mid_id, Walk::Both) {
                    if r2.id == r1.id {
                        continue;
                    }
                    let Some(b) = self.entities.get(Self::other_end(r2, mid_id)) else {
                        continue;
                    };
                    if !contains_ci(&b.name, target) {
                        continue;
                    }
                    if rows.len() >= limit {
                        return rows;
                    }
                    rows.push(row(json!({
                        "source": a.name,
                        "via": mid.name,
                        "relation1": r1.relation_type.as_str(),
                        "relation2": r2.relation_type.as_str(),
                        "target": b.name,
                    })));
                }
            }
        }
        rows
    }

    /// Breadth-first search from `source_id` over undirected edges, recording
    /// for each reached node the (previous node, edge) it was first reached by.
    fn bfs_tree<'a>(
        &'a self,
        source_id: &'a str,
        max_depth: usize,
    ) -> HashMap<&'a str, (&'a str, &'a Relation)> {
        let mut prev: HashMap<&str, (&str, &Relation)> = HashMap::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
        visited.insert(source_id);
        queue.push_back((source_id, 0));

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for edge in self.incident(current, Walk::Both) {
                let next = Self::other_end(edge, current);
                if !self.entities.contains_key(next) || !visited.insert(next) {
                    continue;
                }
                prev.insert(next, (current, edge));
                queue.push_back((next, depth + 1));
            }
        }
        prev
    }

    fn shortest_paths(
        &self,
        source: &str,
        target: &str,
        max_depth: usize,
        limit: usize,
    ) -> Vec<Row> {
        if max_depth == 0 || limit == 0 {
            return Vec::new();
        }
        let targets = self.matching(target);
        let mut paths: Vec<(Vec<String>, Vec<String>)> = Vec::new();
        for a in self.matching(source) {
            let prev = self.bfs_tree(&a.id, max_depth);
            for b in &targets {
                if b.id == a.id || !prev.contains_key(b.id.as_str()) {
                    continue;
                }
                let mut nodes = vec![b.name.clone()];
                let mut relations = Vec::new();
                let mut cursor = b.id.as_str();
                while cursor != a.id {
                    let Some((p, edge)) = prev.get(cursor) else {
                        break;
                    };
                    relations.push(edge.relation_type.as_str().to_string());
                    if let Some(e) = self.entities.get(*p) {
                        nodes.push(e.name.clone());
                    }
                    cursor = *p;
                }
                nodes.reverse();
                relations.reverse();
                paths.push((nodes, relations));
            }
        }
        paths.sort_by_key(|(_, relations)| relations.len());
        paths
            .into_iter()
            .take(limit)
            .map(|(nodes, relations)| {
                let length = relations.len();
                row(json!({ "nodes": nodes, "relations": relations, "length": length }))
            })
            .collect()
    }

    fn neighbors(&self, name: &str, relation_types: &[RelationType], limit: usize) -> Vec<Row> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut found: Vec<(&Entity, &str)> = Vec::new();
        for a in self.matching(name) {
            for edge in self.incident(&a.id, Walk::Both) {
                if !relation_types.is_empty() && !relation_types.contains(&edge.relation_type) {
                    continue;
                }
                let Some(b) = self.entities.get(Self::other_end(edge, &a.id)) else {
                    continue;
                };
                if seen.insert(b.id.as_str()) {
                    found.push((b, edge.relation_type.as_str()));
                }
            }
        }
        found.sort_by(|x, y| {
            y.0.trust_score
                .partial_cmp(&x.0.trust_score)
                .unwrap_or(Ordering::Equal)
        });
        found
            .into_iter()
            .take(limit)
            .map(|(b, relation)| {
                row(json!({
                    "name": b.name,
                    "description": b.description,
                    "trust_score": b.trust_score,
                    "relation": relation,
                }))
            })
            .collect()
    }
}

#[async_trait]
impl GraphBackend for InMemoryGraphBackend {
    async fn execute(&self, query: &GraphQuery) -> Result<Vec<Row>, StoreError> {
        let state = self.state.read().await;
        let rows = state.execute(query);
        tracing::trace!(query = query.label(), rows = rows.len(), "in-memory query");
        Ok(rows)
    }
}

#[async_trait]
impl Connector for InMemoryGraphBackend {
    async fn connect(&self) -> Result<Arc<dyn GraphBackend>, StoreError> {
        Ok(Arc::new(self.clone()))
    }
}
