//! Store adapter and graph backends.
//!
//! [`StoreAdapter`] owns the connection lifecycle and is the only thing the
//! engine talks to. Backends implement [`GraphBackend`]; the in-memory one is
//! always available, the Neo4j one sits behind the `neo4j` feature.

mod adapter;
mod memory;
mod rows;

#[cfg(feature = "neo4j")]
mod neo4j;

pub use adapter::StoreAdapter;
pub use kg_types::{Connector, GraphBackend, GraphQuery, Row, StoreError};
pub use memory::{GraphSnapshot, InMemoryGraphBackend};
pub use rows::{
    entity_from_row, f64_col, opt_f64_col, opt_str_col, parse_properties, str_col, strings_col,
    u64_col,
};

#[cfg(feature = "neo4j")]
pub use neo4j::{Neo4jConfig, Neo4jConnector, Neo4jHttpBackend};
