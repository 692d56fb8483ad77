//! HTTP surface for the knowledge graph: MCP tool calls and resources, an SSE
//! heartbeat stream, and plain REST endpoints.

pub mod config;
pub mod resources;
pub mod server;
pub mod sse;
pub mod tools;
