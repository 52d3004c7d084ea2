//! graphmem-drivers - Graph database drivers for graphmem.
//!
//! Each driver implements [`GraphDriver`] so the memory service can run the
//! same Cypher against either backend.
//!
//! # Supported Backends
//!
//! - **Neo4j** (feature: `neo4j`) - Neo4j over Bolt
//! - **FalkorDB** (feature: `falkordb`) - FalkorDB over the Redis protocol

mod factory;

#[cfg(feature = "neo4j")]
mod neo4j;

#[cfg(feature = "falkordb")]
mod falkordb;

pub use factory::DriverFactory;

#[cfg(feature = "neo4j")]
pub use neo4j::Neo4jDriver;

#[cfg(feature = "falkordb")]
pub use falkordb::FalkorDriver;

// Re-export core types
pub use graphmem_core::traits::{GraphDriver, GraphProvider};
