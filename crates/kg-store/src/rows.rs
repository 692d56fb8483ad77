//! Mapping raw store rows back to records. Every decoder here is tolerant:
//! a missing or mistyped column yields a default instead of an error.

use chrono::{DateTime, NaiveDateTime, Utc};
use kg_types::{Entity, EntityType, Properties, Row, TrustLevel};
use serde_json::Value;

/// Decode a stored property bag. Accepts a JSON object or a string holding a
/// serialized object; anything else (including malformed JSON) is empty.
pub fn parse_properties(raw: &Value) -> Properties {
    match raw {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Value::String(s) if !s.trim().is_empty() => {
            match serde_json::from_str::<Properties>(s) {
                Ok(props) => props,
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring malformed properties");
                    Properties::new()
                }
            }
        }
        _ => Properties::new(),
    }
}

pub fn opt_str_col(row: &Row, key: &str) -> Option<String> {
    row.get(key).and_then(Value::as_str).map(str::to_string)
}

/// String column, empty when null or absent.
pub fn str_col(row: &Row, key: &str) -> String {
    opt_str_col(row, key).unwrap_or_default()
}

pub fn opt_f64_col(row: &Row, key: &str) -> Option<f64> {
    row.get(key).and_then(Value::as_f64)
}

/// Numeric column, 0.0 when null or absent.
pub fn f64_col(row: &Row, key: &str) -> f64 {
    opt_f64_col(row, key).unwrap_or(0.0)
}

/// Non-negative integer column; floats are truncated, anything else is 0.
pub fn u64_col(row: &Row, key: &str) -> u64 {
    match row.get(key) {
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        None => 0,
    }
}

/// List-of-strings column (tags, path nodes, relation labels).
pub fn strings_col(row: &Row, key: &str) -> Vec<String> {
    match row.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// RFC 3339 timestamp, or a naive ISO timestamp taken as UTC.
fn time_col(row: &Row, key: &str) -> Option<DateTime<Utc>> {
    let raw = row.get(key).and_then(Value::as_str)?;
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|t| t.and_utc())
        })
        .ok()
}

/// Rebuild an entity from a row carrying entity columns. Missing fields fall
/// back to producer defaults; `entity_type` is also accepted as `type`.
pub fn entity_from_row(row: &Row) -> Entity {
    let mut entity = Entity::default();
    if let Some(id) = opt_str_col(row, "id") {
        entity.id = id;
    }
    entity.name = str_col(row, "name");
    entity.entity_type = EntityType::from_optional_label(
        opt_str_col(row, "entity_type")
            .or_else(|| opt_str_col(row, "type"))
            .as_deref(),
    );
    entity.description = str_col(row, "description");
    entity.properties = row.get("properties").map(parse_properties).unwrap_or_default();
    entity.tags = strings_col(row, "tags");
    if let Some(score) = opt_f64_col(row, "trust_score").or_else(|| opt_f64_col(row, "trust")) {
        entity.trust_score = score;
    }
    entity.trust_level = opt_str_col(row, "trust_level")
        .and_then(|l| TrustLevel::from_label(&l))
        .unwrap_or_else(|| TrustLevel::classify(entity.trust_score));
    if let Some(url) = opt_str_col(row, "source_url") {
        entity.source_url = url;
    }
    if row.get("source_count").is_some_and(|v| !v.is_null()) {
        entity.source_count = u64_col(row, "source_count").min(u32::MAX as u64) as u32;
    }
    if let Some(service_id) = opt_str_col(row, "service_id") {
        entity.service_id = service_id;
    }
    if let Some(user_id) = opt_str_col(row, "user_id") {
        entity.user_id = user_id;
    }
    if let Some(created) = time_col(row, "created_at") {
        entity.created_at = created;
        entity.updated_at = created;
    }
    if let Some(updated) = time_col(row, "updated_at") {
        entity.updated_at = updated.max(entity.created_at);
    }
    entity
}
