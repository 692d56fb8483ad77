//! Read-side services over the knowledge graph: typed lookups
//! ([`GraphQueryService`]) and multi-hop reasoning ([`InferenceEngine`]).
//!
//! Neither service surfaces store errors. A missing or failing store is logged
//! and turns into the operation's empty value, so callers always get a
//! well-formed answer.

mod inference;
mod query;

#[cfg(test)]
mod fixtures;

pub use inference::{tag_similarity, InferenceEngine, DEFAULT_LIMIT, DEFAULT_PATH_DEPTH};
pub use query::{GraphQueryService, DEFAULT_MAX_DEPTH};

use kg_store::{StoreAdapter, StoreError};
use kg_types::{GraphQuery, Row};

/// Run a query, degrading any store error to "no rows".
pub(crate) async fn rows_or_empty(store: &StoreAdapter, query: &GraphQuery) -> Vec<Row> {
    match store.run(query).await {
        Ok(rows) => rows,
        Err(StoreError::Unavailable(reason)) => {
            tracing::debug!(query = query.label(), %reason, "graph store unavailable");
            Vec::new()
        }
        Err(StoreError::QueryFailed(reason)) => {
            tracing::warn!(query = query.label(), %reason, "graph query failed");
            Vec::new()
        }
    }
}
