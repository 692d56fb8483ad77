//! Entity and relation types for the knowledge graph.
//!
//! Enumerations serialize as their snake_case labels. Labels outside the closed
//! sets are kept verbatim in a `Custom` variant so nothing the producer wrote
//! is lost on a round trip through the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Open, schema-less property bag attached to entities and relations.
pub type Properties = HashMap<String, serde_json::Value>;

/// Entity type enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityType {
    Concept,
    Technology,
    Framework,
    Model,
    Service,
    Tool,
    Language,
    Pattern,
    BestPractice,
    Project,
    Organization,
    Person,
    Document,
    News,
    Cryptocurrency,
    Stock,
    Asset,
    /// Any label outside the closed set, stored as written.
    Custom(String),
}

impl EntityType {
    pub fn as_str(&self) -> &str {
        match self {
            EntityType::Concept => "concept",
            EntityType::Technology => "technology",
            EntityType::Framework => "framework",
            EntityType::Model => "model",
            EntityType::Service => "service",
            EntityType::Tool => "tool",
            EntityType::Language => "language",
            EntityType::Pattern => "pattern",
            EntityType::BestPractice => "best_practice",
            EntityType::Project => "project",
            EntityType::Organization => "organization",
            EntityType::Person => "person",
            EntityType::Document => "document",
            EntityType::News => "news",
            EntityType::Cryptocurrency => "cryptocurrency",
            EntityType::Stock => "stock",
            EntityType::Asset => "asset",
            EntityType::Custom(s) => s,
        }
    }

    /// Parse from a label (case-insensitive).
    pub fn from_label(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "concept" => EntityType::Concept,
            "technology" => EntityType::Technology,
            "framework" => EntityType::Framework,
            "model" => EntityType::Model,
            "service" => EntityType::Service,
            "tool" => EntityType::Tool,
            "language" => EntityType::Language,
            "pattern" => EntityType::Pattern,
            "best_practice" => EntityType::BestPractice,
            "project" => EntityType::Project,
            "organization" => EntityType::Organization,
            "person" => EntityType::Person,
            "document" => EntityType::Document,
            "news" => EntityType::News,
            "cryptocurrency" => EntityType::Cryptocurrency,
            "stock" => EntityType::Stock,
            "asset" => EntityType::Asset,
            _ => EntityType::Custom(s.to_string()),
        }
    }

    /// Like [`EntityType::from_label`], but a missing or blank label is unset.
    pub fn from_optional_label(s: Option<&str>) -> Option<Self> {
        s.filter(|l| !l.trim().is_empty()).map(Self::from_label)
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for EntityType {
    fn from(s: String) -> Self {
        EntityType::from_label(&s)
    }
}

impl From<EntityType> for String {
    fn from(t: EntityType) -> Self {
        t.as_str().to_string()
    }
}

/// Relation types between entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelationType {
    #[default]
    RelatedTo,
    DependsOn,
    AlternativeTo,
    SimilarTo,
    IntegratesWith,
    PartOf,
    Extends,
    Uses,
    CreatedBy,
    References,
    CompetesWith,
    /// Any label outside the closed set, stored as written.
    Custom(String),
}

impl RelationType {
    pub fn as_str(&self) -> &str {
        match self {
            RelationType::RelatedTo => "related_to",
            RelationType::DependsOn => "depends_on",
            RelationType::AlternativeTo => "alternative_to",
            RelationType::SimilarTo => "similar_to",
            RelationType::IntegratesWith => "integrates_with",
            RelationType::PartOf => "part_of",
            RelationType::Extends => "extends",
            RelationType::Uses => "uses",
            RelationType::CreatedBy => "created_by",
            RelationType::References => "references",
            RelationType::CompetesWith => "competes_with",
            RelationType::Custom(s) => s,
        }
    }

    /// Parse from a label (case-insensitive, so `DEPENDS_ON` and `depends_on` agree).
    pub fn from_label(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "related_to" => RelationType::RelatedTo,
            "depends_on" => RelationType::DependsOn,
            "alternative_to" => RelationType::AlternativeTo,
            "similar_to" => RelationType::SimilarTo,
            "integrates_with" => RelationType::IntegratesWith,
            "part_of" => RelationType::PartOf,
            "extends" => RelationType::Extends,
            "uses" => RelationType::Uses,
            "created_by" => RelationType::CreatedBy,
            "references" => RelationType::References,
            "competes_with" => RelationType::CompetesWith,
            _ => RelationType::Custom(s.to_string()),
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for RelationType {
    fn from(s: String) -> Self {
        RelationType::from_label(&s)
    }
}

impl From<RelationType> for String {
    fn from(t: RelationType) -> Self {
        t.as_str().to_string()
    }
}

/// Discrete trust classification derived from a trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    /// [0.9, 1.0]
    Verified,
    /// [0.7, 0.9)
    High,
    /// [0.5, 0.7)
    #[default]
    Medium,
    /// [0.3, 0.5)
    Low,
    /// [0.0, 0.3)
    Unverified,
}

impl TrustLevel {
    /// Classify a trust score. Boundaries are half-open from below, so 0.7 is
    /// `High` and 0.9 is `Verified`. Scores above 1.0 clamp to `Verified`;
    /// negative or NaN scores are `Unverified`.
    pub fn classify(trust_score: f64) -> Self {
        if trust_score >= 0.9 {
            TrustLevel::Verified
        } else if trust_score >= 0.7 {
            TrustLevel::High
        } else if trust_score >= 0.5 {
            TrustLevel::Medium
        } else if trust_score >= 0.3 {
            TrustLevel::Low
        } else {
            TrustLevel::Unverified
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustLevel::Verified => "verified",
            TrustLevel::High => "high",
            TrustLevel::Medium => "medium",
            TrustLevel::Low => "low",
            TrustLevel::Unverified => "unverified",
        }
    }

    /// Parse a stored label; unknown labels yield `None`.
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "verified" => Some(TrustLevel::Verified),
            "high" => Some(TrustLevel::High),
            "medium" => Some(TrustLevel::Medium),
            "low" => Some(TrustLevel::Low),
            "unverified" => Some(TrustLevel::Unverified),
            _ => None,
        }
    }
}

/// Shorthand for [`TrustLevel::classify`].
pub fn classify(trust_score: f64) -> TrustLevel {
    TrustLevel::classify(trust_score)
}

pub const DEFAULT_TRUST_SCORE: f64 = 0.5;
pub const DEFAULT_SERVICE_ID: &str = "global";
pub const DEFAULT_USER_ID: &str = "shared";

/// A node in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entity {
    /// Opaque unique identifier, immutable after creation.
    pub id: String,
    /// Display and lookup key.
    pub name: String,
    /// `None` when the producer left the type out, wrote null, or wrote "".
    #[serde(deserialize_with = "optional_entity_type")]
    pub entity_type: Option<EntityType>,
    pub description: String,
    /// Consumer-interpreted attributes such as `stars` or `installation`.
    pub properties: Properties,
    /// Tag set used for similarity scoring; order is irrelevant.
    pub tags: Vec<String>,
    pub trust_score: f64,
    /// Always `classify(trust_score)` for well-formed producers.
    pub trust_level: TrustLevel,
    pub source_url: String,
    pub source_count: u32,
    pub service_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Entity {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: String::new(),
            entity_type: None,
            description: String::new(),
            properties: HashMap::new(),
            tags: Vec::new(),
            trust_score: DEFAULT_TRUST_SCORE,
            trust_level: TrustLevel::classify(DEFAULT_TRUST_SCORE),
            source_url: String::new(),
            source_count: 1,
            service_id: DEFAULT_SERVICE_ID.to_string(),
            user_id: DEFAULT_USER_ID.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity {
    /// Create a new entity with a fresh id and default trust.
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            name: name.into(),
            entity_type: Some(entity_type),
            ..Self::default()
        }
    }

    /// Type label, `None` when unset.
    pub fn type_label(&self) -> Option<&str> {
        self.entity_type.as_ref().map(EntityType::as_str)
    }

    /// Builder-style trust assignment; keeps `trust_level` consistent.
    pub fn with_trust(mut self, trust_score: f64) -> Self {
        self.set_trust_score(trust_score);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Update the trust score, recompute the level and bump `updated_at`.
    pub fn set_trust_score(&mut self, trust_score: f64) {
        self.trust_score = trust_score;
        self.trust_level = TrustLevel::classify(trust_score);
        self.touch();
    }

    /// Re-derive `trust_level` from `trust_score` without touching timestamps.
    pub fn normalize_trust_level(&mut self) {
        self.trust_level = TrustLevel::classify(self.trust_score);
    }

    fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = now.max(self.created_at);
    }
}

fn optional_entity_type<'de, D>(deserializer: D) -> Result<Option<EntityType>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let label = Option::<String>::deserialize(deserializer)?;
    Ok(EntityType::from_optional_label(label.as_deref()))
}

/// A directed, typed edge between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Relation {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub relation_type: RelationType,
    pub properties: Properties,
    /// Influence factor of this edge.
    pub weight: f64,
    pub trust_score: f64,
    pub created_at: DateTime<Utc>,
}

impl Default for Relation {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_id: String::new(),
            target_id: String::new(),
            relation_type: RelationType::default(),
            properties: HashMap::new(),
            weight: 1.0,
            trust_score: DEFAULT_TRUST_SCORE,
            created_at: Utc::now(),
        }
    }
}

impl Relation {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relation_type: RelationType,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relation_type,
            ..Self::default()
        }
    }
}
