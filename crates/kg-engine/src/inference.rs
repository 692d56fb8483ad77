//! InferenceEngine: relation discovery, path finding, recommendations and
//! tag-based similarity, each wrapped in an [`InferenceResult`].

use crate::rows_or_empty;
use kg_store::{f64_col, str_col, strings_col, u64_col, StoreAdapter};
use kg_types::{
    DirectRelation, GraphPath, GraphQuery, IndirectRelation, InferenceResult, PathInference,
    RecommendKind, Recommendation, Recommendations, RelationInference, Row, SimilarEntities,
    SimilarEntity,
};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_PATH_DEPTH: usize = 4;
pub const DEFAULT_LIMIT: usize = 10;

const INDIRECT_LIMIT: usize = 10;
const PATH_LIMIT: usize = 5;

const DIRECT_CONFIDENCE: f64 = 0.9;
const INDIRECT_CONFIDENCE: f64 = 0.6;
const PATH_CONFIDENCE: f64 = 0.95;
const RECOMMEND_CONFIDENCE: f64 = 0.8;
const SIMILAR_CONFIDENCE: f64 = 0.7;
const NO_RELATION_CONFIDENCE: f64 = 0.2;
const NO_PATH_CONFIDENCE: f64 = 0.1;

/// Multi-hop reasoning over the graph. Endpoints are matched by
/// case-insensitive name substring, so one argument may match several nodes.
#[derive(Clone)]
pub struct InferenceEngine {
    store: Arc<StoreAdapter>,
}

impl InferenceEngine {
    pub fn new(store: Arc<StoreAdapter>) -> Self {
        Self { store }
    }

    async fn rows(&self, query: GraphQuery) -> Vec<Row> {
        rows_or_empty(&self.store, &query).await
    }

    /// Release the handle after an operation; a no-op on the shared handle.
    async fn release(&self) {
        self.store.disconnect().await;
    }

    /// How `source` and `target` are connected: adjacent, or through one
    /// intermediate node.
    pub async fn find_relation(&self, source: &str, target: &str) -> InferenceResult<RelationInference> {
        let direct: Vec<DirectRelation> = self
            .rows(GraphQuery::DirectRelations {
                source: source.to_string(),
                target: target.to_string(),
            })
            .await
            .iter()
            .map(|row| DirectRelation {
                source: str_col(row, "source"),
                relation: str_col(row, "relation"),
                target: str_col(row, "target"),
            })
            .collect();
        let indirect: Vec<IndirectRelation> = self
            .rows(GraphQuery::IndirectRelations {
                source: source.to_string(),
                target: target.to_string(),
                limit: INDIRECT_LIMIT,
            })
            .await
            .iter()
            .map(|row| IndirectRelation {
                source: str_col(row, "source"),
                via: str_col(row, "via"),
                relation1: str_col(row, "relation1"),
                relation2: str_col(row, "relation2"),
                target: str_col(row, "target"),
            })
            .collect();
        self.release().await;

        let confidence = if !direct.is_empty() {
            DIRECT_CONFIDENCE
        } else if !indirect.is_empty() {
            INDIRECT_CONFIDENCE
        } else {
            NO_RELATION_CONFIDENCE
        };
        let reasoning = vec![
            format!("Direct relations: {}", direct.len()),
            format!("Indirect relations (1-hop): {}", indirect.len()),
        ];
        InferenceResult {
            query: format!("{} → {}", source, target),
            result: RelationInference {
                source: source.to_string(),
                target: target.to_string(),
                relationship_exists: !direct.is_empty() || !indirect.is_empty(),
                direct_relations: direct,
                indirect_relations: indirect,
            },
            confidence,
            reasoning,
        }
    }

    /// Up to five shortest undirected paths of at most `max_depth` hops.
    pub async fn find_path(
        &self,
        source: &str,
        target: &str,
        max_depth: usize,
    ) -> InferenceResult<PathInference> {
        let paths: Vec<GraphPath> = if max_depth == 0 {
            Vec::new()
        } else {
            self.rows(GraphQuery::ShortestPaths {
                source: source.to_string(),
                target: target.to_string(),
                max_depth,
                limit: PATH_LIMIT,
            })
            .await
            .iter()
            .map(|row| {
                let relations = strings_col(row, "relations");
                let length = match u64_col(row, "length") {
                    0 => relations.len(),
                    n => n as usize,
                };
                GraphPath {
                    nodes: strings_col(row, "nodes"),
                    relations,
                    length,
                }
            })
            .collect()
        };
        self.release().await;

        InferenceResult {
            query: format!("Path: {} → {}", source, target),
            confidence: if paths.is_empty() {
                NO_PATH_CONFIDENCE
            } else {
                PATH_CONFIDENCE
            },
            reasoning: vec![format!("Found {} paths", paths.len())],
            result: PathInference {
                source: source.to_string(),
                target: target.to_string(),
                shortest: paths.first().cloned(),
                paths,
            },
        }
    }

    /// Distinct neighbors of `technology` over the edges `kind` allows,
    /// highest trust first.
    pub async fn recommend(
        &self,
        technology: &str,
        kind: RecommendKind,
        limit: usize,
    ) -> InferenceResult<Recommendations> {
        let recommendations: Vec<Recommendation> = if limit == 0 {
            Vec::new()
        } else {
            self.rows(GraphQuery::Neighbors {
                name: technology.to_string(),
                relation_types: kind.relation_types(),
                limit,
            })
            .await
            .iter()
            .map(|row| Recommendation {
                name: str_col(row, "name"),
                description: str_col(row, "description"),
                trust_score: f64_col(row, "trust_score"),
                relation: str_col(row, "relation"),
            })
            .collect()
        };
        self.release().await;

        InferenceResult {
            query: format!("Recommend for: {}", technology),
            confidence: if recommendations.is_empty() {
                NO_RELATION_CONFIDENCE
            } else {
                RECOMMEND_CONFIDENCE
            },
            reasoning: vec![format!(
                "Found {} related technologies",
                recommendations.len()
            )],
            result: Recommendations {
                base: technology.to_string(),
                kind,
                recommendations,
            },
        }
    }

    /// Entities of the same type as `technology`, scored by tag overlap.
    pub async fn find_similar(&self, technology: &str, limit: usize) -> InferenceResult<SimilarEntities> {
        let similar = self.similar_to(technology, limit).await;
        self.release().await;

        InferenceResult {
            query: format!("Similar to: {}", technology),
            confidence: if similar.is_empty() {
                NO_RELATION_CONFIDENCE
            } else {
                SIMILAR_CONFIDENCE
            },
            reasoning: vec![format!("Found {} similar technologies", similar.len())],
            result: SimilarEntities {
                base: technology.to_string(),
                similar,
            },
        }
    }

    async fn similar_to(&self, technology: &str, limit: usize) -> Vec<SimilarEntity> {
        if limit == 0 {
            return Vec::new();
        }
        let base = self
            .rows(GraphQuery::BaseEntity {
                name: technology.to_string(),
            })
            .await;
        let Some(base) = base.first() else {
            return Vec::new();
        };
        let base_tags = strings_col(base, "tags");

        let mut similar: Vec<SimilarEntity> = self
            .rows(GraphQuery::SimilarCandidates {
                entity_type: str_col(base, "type"),
                exclude: technology.to_string(),
                limit,
            })
            .await
            .iter()
            .map(|row| SimilarEntity {
                name: str_col(row, "name"),
                description: str_col(row, "description"),
                trust_score: f64_col(row, "trust_score"),
                similarity: tag_similarity(&base_tags, &strings_col(row, "tags")),
            })
            .collect();
        // Stable, so equal scores keep the store's trust order.
        similar.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });
        similar
    }
}

/// `|A ∩ B| / max(|A|, |B|, 1)` over tag sets, rounded to two decimals.
pub fn tag_similarity(a: &[String], b: &[String]) -> f64 {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    let overlap = a.intersection(&b).count() as f64;
    let denominator = a.len().max(b.len()).max(1) as f64;
    (overlap / denominator * 100.0).round() / 100.0
}
