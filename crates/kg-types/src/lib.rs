//! Core types and traits for the trust-scored knowledge graph.
//!
//! Entities and relations are produced by an external collector; everything in
//! this crate is read-side: the data model, the bounded query vocabulary the
//! store adapter understands, and the records the engine hands back to callers.

mod dto;
mod model;
mod traits;

pub use dto::*;
pub use model::*;
pub use traits::*;
