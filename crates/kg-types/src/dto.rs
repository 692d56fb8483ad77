//! Response records produced by the query service and the inference engine.

use crate::{Entity, Properties, RelationType};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Search hit: entity summary plus the two properties callers ask for most.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub description: String,
    pub trust_score: f64,
    /// `properties.stars`, 0 when absent.
    pub stars: u64,
    /// `properties.installation`, empty when absent.
    pub installation: String,
}

/// Entity as handed to context callers: identity, type, trust and properties,
/// without bookkeeping fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDetail {
    pub name: String,
    /// Null when the entity has no type.
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    pub description: String,
    pub trust_score: f64,
    pub properties: Properties,
}

impl From<&Entity> for EntityDetail {
    fn from(entity: &Entity) -> Self {
        Self {
            name: entity.name.clone(),
            entity_type: entity.type_label().map(str::to_string),
            description: entity.description.clone(),
            trust_score: entity.trust_score,
            properties: entity.properties.clone(),
        }
    }
}

/// Edge direction relative to the queried entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// Neighbor reached through one edge, as listed in a relation bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub name: String,
    pub description: String,
    pub trust_score: f64,
    pub direction: Direction,
    /// Original edge label; only kept for entries in the `other` bucket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
}

/// The fixed buckets relations are sorted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationBucket {
    DependsOn,
    IntegratesWith,
    AlternativeTo,
    PartOf,
    Other,
}

impl RelationBucket {
    /// Route an edge label to its bucket (case-insensitive).
    pub fn for_label(label: &str) -> Self {
        match RelationType::from_label(label) {
            RelationType::DependsOn => RelationBucket::DependsOn,
            RelationType::IntegratesWith => RelationBucket::IntegratesWith,
            RelationType::AlternativeTo => RelationBucket::AlternativeTo,
            RelationType::PartOf => RelationBucket::PartOf,
            _ => RelationBucket::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationBucket::DependsOn => "depends_on",
            RelationBucket::IntegratesWith => "integrates_with",
            RelationBucket::AlternativeTo => "alternative_to",
            RelationBucket::PartOf => "part_of",
            RelationBucket::Other => "other",
        }
    }
}

/// Relations of one entity, bucketed by type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationBuckets {
    pub depends_on: Vec<RelatedEntity>,
    pub integrates_with: Vec<RelatedEntity>,
    pub alternative_to: Vec<RelatedEntity>,
    pub part_of: Vec<RelatedEntity>,
    pub other: Vec<RelatedEntity>,
}

impl RelationBuckets {
    /// File an entry under the bucket for `label`. Entries landing in `other`
    /// keep the label so callers can still tell edge types apart.
    pub fn insert(&mut self, label: &str, mut entry: RelatedEntity) {
        let bucket = RelationBucket::for_label(label);
        if bucket == RelationBucket::Other {
            entry.relation = Some(label.to_string());
        }
        self.bucket_mut(bucket).push(entry);
    }

    pub fn bucket(&self, bucket: RelationBucket) -> &[RelatedEntity] {
        match bucket {
            RelationBucket::DependsOn => &self.depends_on,
            RelationBucket::IntegratesWith => &self.integrates_with,
            RelationBucket::AlternativeTo => &self.alternative_to,
            RelationBucket::PartOf => &self.part_of,
            RelationBucket::Other => &self.other,
        }
    }

    fn bucket_mut(&mut self, bucket: RelationBucket) -> &mut Vec<RelatedEntity> {
        match bucket {
            RelationBucket::DependsOn => &mut self.depends_on,
            RelationBucket::IntegratesWith => &mut self.integrates_with,
            RelationBucket::AlternativeTo => &mut self.alternative_to,
            RelationBucket::PartOf => &mut self.part_of,
            RelationBucket::Other => &mut self.other,
        }
    }

    pub fn len(&self) -> usize {
        self.depends_on.len()
            + self.integrates_with.len()
            + self.alternative_to.len()
            + self.part_of.len()
            + self.other.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One step of a dependency chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyEntry {
    pub name: String,
    pub description: String,
    pub depth: usize,
}

/// Entity counts per type, kept in count-descending order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "std::collections::HashMap<String, u64>")]
pub struct TypeCounts(Vec<(String, u64)>);

impl TypeCounts {
    /// Build from unordered pairs; sorts by count descending, then type name.
    pub fn new(mut counts: Vec<(String, u64)>) -> Self {
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Self(counts)
    }

    pub fn get(&self, entity_type: &str) -> Option<u64> {
        self.0
            .iter()
            .find(|(t, _)| t == entity_type)
            .map(|(_, c)| *c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(t, c)| (t.as_str(), *c))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<std::collections::HashMap<String, u64>> for TypeCounts {
    fn from(map: std::collections::HashMap<String, u64>) -> Self {
        Self::new(map.into_iter().collect())
    }
}

impl Serialize for TypeCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (t, c) in &self.0 {
            map.serialize_entry(t, c)?;
        }
        map.end()
    }
}

/// Aggregate graph statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_entities: u64,
    pub total_relations: u64,
    pub average_trust_score: f64,
    pub entity_types: TypeCounts,
}

/// Output of every inference operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult<T> {
    /// Human-readable restatement of the question.
    pub query: String,
    pub result: T,
    /// Discretized evidence score, not a probability.
    pub confidence: f64,
    /// Informational counts, not meant to be parsed.
    pub reasoning: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectRelation {
    pub source: String,
    pub relation: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndirectRelation {
    pub source: String,
    pub via: String,
    pub relation1: String,
    pub relation2: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationInference {
    pub source: String,
    pub target: String,
    pub direct_relations: Vec<DirectRelation>,
    pub indirect_relations: Vec<IndirectRelation>,
    pub relationship_exists: bool,
}

/// A structural path: `relations.len() == nodes.len() - 1 == length`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPath {
    pub nodes: Vec<String>,
    pub relations: Vec<String>,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathInference {
    pub source: String,
    pub target: String,
    pub paths: Vec<GraphPath>,
    pub shortest: Option<GraphPath>,
}

/// Which edges a recommendation may follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendKind {
    #[default]
    All,
    /// `alternative_to` edges only.
    Alternative,
    /// `integrates_with` and `depends_on` edges.
    Complement,
}

impl RecommendKind {
    /// Parse a caller-supplied kind; anything unrecognized means `All`.
    pub fn from_label(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "alternative" => RecommendKind::Alternative,
            "complement" => RecommendKind::Complement,
            _ => RecommendKind::All,
        }
    }

    /// Edge filter for this kind; empty means no filter.
    pub fn relation_types(&self) -> Vec<RelationType> {
        match self {
            RecommendKind::All => Vec::new(),
            RecommendKind::Alternative => vec![RelationType::AlternativeTo],
            RecommendKind::Complement => {
                vec![RelationType::IntegratesWith, RelationType::DependsOn]
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub name: String,
    pub description: String,
    pub trust_score: f64,
    pub relation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub base: String,
    #[serde(rename = "type")]
    pub kind: RecommendKind,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarEntity {
    pub name: String,
    pub description: String,
    pub trust_score: f64,
    /// Tag overlap score in [0, 1], rounded to two decimals.
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarEntities {
    pub base: String,
    pub similar: Vec<SimilarEntity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> RelatedEntity {
        RelatedEntity {
            name: name.to_string(),
            description: String::new(),
            trust_score: 0.5,
            direction: Direction::Outgoing,
            relation: None,
        }
    }

    #[test]
    fn buckets_route_known_labels_and_keep_other_labels() {
        let mut b = RelationBuckets::default();
        b.insert("depends_on", entry("a"));
        b.insert("INTEGRATES_WITH", entry("b"));
        b.insert("alternative_to", entry("c"));
        b.insert("part_of", entry("d"));
        b.insert("uses", entry("e"));
        assert_eq!(b.depends_on.len(), 1);
        assert_eq!(b.integrates_with.len(), 1);
        assert_eq!(b.alternative_to.len(), 1);
        assert_eq!(b.part_of.len(), 1);
        assert_eq!(b.other.len(), 1);
        assert_eq!(b.other[0].relation.as_deref(), Some("uses"));
        assert!(b.depends_on[0].relation.is_none());
        assert_eq!(b.len(), 5);
    }

    #[test]
    fn type_counts_serialize_count_descending() {
        let counts = TypeCounts::new(vec![
            ("tool".to_string(), 1),
            ("framework".to_string(), 5),
            ("unknown".to_string(), 3),
        ]);
        let text = serde_json::to_string(&counts).unwrap();
        assert_eq!(text, r#"{"framework":5,"unknown":3,"tool":1}"#);
    }

    #[test]
    fn recommend_kind_falls_back_to_all() {
        assert_eq!(RecommendKind::from_label("Alternative"), RecommendKind::Alternative);
        assert_eq!(RecommendKind::from_label("complement"), RecommendKind::Complement);
        assert_eq!(RecommendKind::from_label("whatever"), RecommendKind::All);
        assert!(RecommendKind::All.relation_types().is_empty());
    }

    #[test]
    fn entity_detail_drops_bookkeeping_fields() {
        let entity = Entity::new("requests", crate::EntityType::Tool)
            .with_trust(0.92)
            .with_description("HTTP for humans")
            .with_property("stars", serde_json::json!(50000));
        let json = serde_json::to_value(EntityDetail::from(&entity)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "requests",
                "type": "tool",
                "description": "HTTP for humans",
                "trust_score": 0.92,
                "properties": {"stars": 50000}
            })
        );

        let untyped = EntityDetail::from(&Entity::default());
        assert_eq!(untyped.entity_type, None);
    }
}
