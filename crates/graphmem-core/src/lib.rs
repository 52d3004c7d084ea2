//! graphmem-core - Core library for graphmem.
//!
//! This crate provides the error type, configuration, the uniform graph
//! driver capability, the knowledge-graph memory service and the per-group
//! episode queue that serializes writes.
//!
//! # Example
//!
//! ```ignore
//! use graphmem_core::{EpisodeInput, EpisodeQueue, GraphMemory, QueueConfig};
//!
//! let memory = Arc::new(GraphMemory::without_extraction(driver));
//! let queue = EpisodeQueue::new(&QueueConfig::default());
//!
//! let ack = queue.submit("team-a", "standup notes", {
//!     let memory = memory.clone();
//!     move || async move {
//!         memory.add_episode(EpisodeInput::new("standup", "Alice joined Acme", "team-a"), &[]).await?;
//!         Ok(())
//!     }
//! });
//! println!("queued at position {}", ack.position);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod queue;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{DatabaseConfig, FalkorDbConfig, Neo4jConfig, ServerConfig};
pub use error::{ErrorCode, GraphMemError, GraphMemResult};
pub use graph::{EpisodeWrite, GraphMemory, GraphStatus, SearchRequest, DEFAULT_SEARCH_LIMIT};
pub use queue::{
    EpisodeQueue, FailurePolicy, GroupStatus, LogAndContinue, QueueAck, QueueConfig, WorkerState,
};
pub use traits::{EntityExtractor, GraphDriver, GraphProvider, NoopExtractor};
pub use types::{
    default_entity_types, EntityEdge, EntityNode, EntityType, Episode, EpisodeInput,
    EpisodeSource, ExtractedEntity, ExtractedFact, Extraction, Params, Query, QueryResult,
    QueryValue, Record,
};
