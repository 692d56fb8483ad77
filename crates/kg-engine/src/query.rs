//! GraphQueryService: typed lookups over the store adapter.

use crate::rows_or_empty;
use kg_store::{
    entity_from_row, f64_col, opt_f64_col, opt_str_col, parse_properties, str_col, u64_col,
    StoreAdapter,
};
use kg_types::{
    DependencyEntry, Direction, Entity, EntitySummary, GraphQuery, GraphStats, RelatedEntity,
    RelationBuckets, Row, TypeCounts,
};
use serde_json::Value;
use std::sync::Arc;

/// Default dependency-chain depth.
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Lookups by name, keyword search, bucketed relations, dependency chains and
/// aggregate statistics. Every method returns its empty value when the store
/// is unavailable or rejects the query.
#[derive(Clone)]
pub struct GraphQueryService {
    store: Arc<StoreAdapter>,
}

impl GraphQueryService {
    pub fn new(store: Arc<StoreAdapter>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<StoreAdapter> {
        &self.store
    }

    async fn rows(&self, query: GraphQuery) -> Vec<Row> {
        rows_or_empty(&self.store, &query).await
    }

    /// Entity whose name equals `name` (case-insensitive). The first match wins
    /// when several entities share a name.
    pub async fn get_entity(&self, name: &str) -> Option<Entity> {
        let rows = self
            .rows(GraphQuery::EntityByName {
                name: name.to_string(),
            })
            .await;
        if rows.len() > 1 {
            tracing::debug!(name, matches = rows.len(), "ambiguous entity name, using first");
        }
        rows.first().map(entity_from_row)
    }

    /// Keyword search over name and description.
    pub async fn search_entities(
        &self,
        query: &str,
        min_trust: f64,
        limit: usize,
    ) -> Vec<EntitySummary> {
        if limit == 0 {
            return Vec::new();
        }
        self.rows(GraphQuery::SearchEntities {
            query: query.to_string(),
            min_trust,
            limit,
        })
        .await
        .iter()
        .map(summary_from_row)
        .collect()
    }

    /// Outgoing then incoming edges of `name`, sorted into fixed buckets.
    pub async fn get_relations(&self, name: &str) -> RelationBuckets {
        let mut buckets = RelationBuckets::default();
        let passes = [
            (
                GraphQuery::OutgoingRelations {
                    name: name.to_string(),
                },
                Direction::Outgoing,
            ),
            (
                GraphQuery::IncomingRelations {
                    name: name.to_string(),
                },
                Direction::Incoming,
            ),
        ];
        for (query, direction) in passes {
            for row in self.rows(query).await {
                let entry = RelatedEntity {
                    name: str_col(&row, "name"),
                    description: str_col(&row, "description"),
                    trust_score: f64_col(&row, "trust"),
                    direction,
                    relation: None,
                };
                buckets.insert(&str_col(&row, "relation"), entry);
            }
        }
        buckets
    }

    /// Every entity reachable over `depends_on` edges within `max_depth` hops,
    /// one entry per path, depth ascending.
    pub async fn get_dependency_chain(&self, name: &str, max_depth: usize) -> Vec<DependencyEntry> {
        if max_depth == 0 {
            return Vec::new();
        }
        self.rows(GraphQuery::DependencyChain {
            name: name.to_string(),
            max_depth,
        })
        .await
        .iter()
        .map(|row| DependencyEntry {
            name: str_col(row, "name"),
            description: str_col(row, "description"),
            depth: u64_col(row, "depth") as usize,
        })
        .collect()
    }

    pub async fn get_stats(&self) -> GraphStats {
        let total_entities = self
            .rows(GraphQuery::EntityCount)
            .await
            .first()
            .map(|r| u64_col(r, "count"))
            .unwrap_or(0);
        let total_relations = self
            .rows(GraphQuery::RelationCount)
            .await
            .first()
            .map(|r| u64_col(r, "count"))
            .unwrap_or(0);
        let average_trust_score = self
            .rows(GraphQuery::AverageTrust)
            .await
            .first()
            .and_then(|r| opt_f64_col(r, "avg"))
            .unwrap_or(0.0);

        let mut counts: Vec<(String, u64)> = Vec::new();
        for row in self.rows(GraphQuery::EntityTypeCounts).await {
            let entity_type = opt_str_col(&row, "type")
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "unknown".to_string());
            let count = u64_col(&row, "count");
            match counts.iter_mut().find(|(t, _)| *t == entity_type) {
                Some((_, c)) => *c += count,
                None => counts.push((entity_type, count)),
            }
        }

        GraphStats {
            total_entities,
            total_relations,
            average_trust_score,
            entity_types: TypeCounts::new(counts),
        }
    }

    /// Full entities of one type, trust descending.
    pub async fn entities_by_type(&self, entity_type: &str, limit: usize) -> Vec<Entity> {
        if limit == 0 {
            return Vec::new();
        }
        self.rows(GraphQuery::EntitiesOfType {
            entity_type: entity_type.to_string(),
            limit,
        })
        .await
        .iter()
        .map(entity_from_row)
        .collect()
    }
}

fn summary_from_row(row: &Row) -> EntitySummary {
    let properties = row
        .get("properties")
        .map(parse_properties)
        .unwrap_or_default();
    let stars = match properties.get("stars") {
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        None => 0,
    };
    let installation = properties
        .get("installation")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    EntitySummary {
        name: str_col(row, "name"),
        entity_type: str_col(row, "type"),
        description: str_col(row, "description"),
        trust_score: f64_col(row, "trust"),
        stars,
        installation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{degraded_store, sample_store, store_from_json};
    use serde_json::json;
    use kg_types::{EntityType, TrustLevel};

    #[tokio::test]
    async fn get_entity_is_case_insensitive_and_decodes_properties() {
        let service = GraphQueryService::new(sample_store().await);
        let entity = service.get_entity("FASTAPI").await.unwrap();
        assert_eq!(entity.name, "FastAPI");
        assert_eq!(entity.entity_type, Some(EntityType::Framework));
        assert_eq!(entity.trust_level, TrustLevel::Verified);
        assert!(entity.properties.contains_key("key_features"));
        assert!(service.get_entity("fast").await.is_none());
    }

    #[tokio::test]
    async fn search_surfaces_stars_and_installation() {
        let service = GraphQueryService::new(sample_store().await);
        let hits = service.search_entities("http", 0.0, 10).await;
        assert_eq!(hits[0].name, "requests");
        assert_eq!(hits[0].stars, 51000);
        assert_eq!(hits[0].installation, "pip install requests");
        let urllib3 = hits.iter().find(|h| h.name == "urllib3").unwrap();
        assert_eq!(urllib3.stars, 0);
        assert_eq!(urllib3.installation, "");
        assert!(hits.windows(2).all(|w| w[0].trust_score >= w[1].trust_score));
    }

    #[tokio::test]
    async fn raising_min_trust_only_removes_hits() {
        let service = GraphQueryService::new(sample_store().await);
        let loose = service.search_entities("", 0.0, 100).await;
        let strict = service.search_entities("", 0.85, 100).await;
        assert!(strict.len() < loose.len());
        assert!(strict.iter().all(|s| s.trust_score >= 0.85));
        assert!(strict
            .iter()
            .all(|s| loose.iter().any(|l| l.name == s.name)));
        assert_eq!(service.search_entities("", 0.0, 3).await.len(), 3);
    }

    #[tokio::test]
    async fn dependency_chain_follows_depends_on() {
        let service = GraphQueryService::new(sample_store().await);
        let chain = service.get_dependency_chain("requests", 3).await;
        let got: Vec<(&str, usize)> = chain.iter().map(|d| (d.name.as_str(), d.depth)).collect();
        assert_eq!(got, vec![("urllib3", 1), ("six", 2)]);

        let shallow = service.get_dependency_chain("requests", 1).await;
        assert_eq!(shallow.len(), 1);
        assert!(service.get_dependency_chain("requests", 0).await.is_empty());
    }

    #[tokio::test]
    async fn dependency_chain_terminates_on_cycles() {
        let service = GraphQueryService::new(sample_store().await);
        let chain = service.get_dependency_chain("cyc-one", 5).await;
        assert_eq!(chain.len(), 2);
        assert!(chain.iter().all(|d| d.depth <= 5));
    }

    #[tokio::test]
    async fn every_edge_lands_in_exactly_one_bucket() {
        let service = GraphQueryService::new(sample_store().await);
        let buckets = service.get_relations("requests").await;
        // out: depends_on urllib3, competes_with aiohttp; in: alternative_to from httpx
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets.depends_on[0].name, "urllib3");
        assert_eq!(buckets.depends_on[0].direction, Direction::Outgoing);
        assert_eq!(buckets.alternative_to[0].name, "httpx");
        assert_eq!(buckets.alternative_to[0].direction, Direction::Incoming);
        assert_eq!(buckets.other[0].relation.as_deref(), Some("competes_with"));
    }

    #[tokio::test]
    async fn stats_aggregate_the_graph() {
        let service = GraphQueryService::new(sample_store().await);
        let stats = service.get_stats().await;
        assert_eq!(stats.total_entities, 14);
        assert_eq!(stats.total_relations, 11);
        assert!(stats.average_trust_score > 0.0);
        assert_eq!(stats.entity_types.get("concept"), Some(7));
        assert_eq!(stats.entity_types.iter().next(), Some(("concept", 7)));
    }

    #[tokio::test]
    async fn untyped_entities_count_as_unknown() {
        let service = GraphQueryService::new(
            store_from_json(json!({
                "entities": [
                    {"id": "x", "name": "mystery", "trust_score": 0.5},
                    {"id": "y", "name": "enigma", "entity_type": null, "trust_score": 0.4},
                    {"id": "z", "name": "blank", "entity_type": "", "trust_score": 0.3},
                    {"id": "t", "name": "tokio", "entity_type": "framework", "trust_score": 0.9}
                ]
            }))
            .await,
        );
        let stats = service.get_stats().await;
        assert_eq!(stats.total_entities, 4);
        assert_eq!(stats.entity_types.get("unknown"), Some(3));
        assert_eq!(stats.entity_types.get("framework"), Some(1));
        assert_eq!(stats.entity_types.get("concept"), None);
        assert_eq!(stats.entity_types.iter().next(), Some(("unknown", 3)));
    }

    #[tokio::test]
    async fn entities_by_type_is_trust_ordered() {
        let service = GraphQueryService::new(sample_store().await);
        let frameworks = service.entities_by_type("framework", 50).await;
        let names: Vec<&str> = frameworks.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["FastAPI", "pydantic"]);
    }

    #[tokio::test]
    async fn degraded_store_yields_empty_values() {
        let service = GraphQueryService::new(degraded_store());
        assert!(service.get_entity("requests").await.is_none());
        assert!(service.search_entities("http", 0.0, 10).await.is_empty());
        assert!(service.get_relations("requests").await.is_empty());
        assert!(service.get_dependency_chain("requests", 3).await.is_empty());
        assert!(service.entities_by_type("tool", 10).await.is_empty());
        let stats = service.get_stats().await;
        assert_eq!(stats, GraphStats::default());
    }
}
