//! MCP server for graphmem knowledge-graph memory.
//!
//! Provides MCP tools backed by a Neo4j or FalkorDB graph.
//!
//! # Tools
//!
//! - `add_memory` - Queue an episode for its group
//! - `search_memory_nodes` - Search entity nodes
//! - `search_memory_facts` - Search facts between entities
//! - `get_entity_edge` / `delete_entity_edge` - Fetch or remove a fact
//! - `delete_episode` - Remove an episode
//! - `get_episodes` - Most recent episodes of a group
//! - `clear_graph` - Wipe the graph and rebuild indices
//! - `get_status` - Database connectivity check
//!
//! # Configuration
//!
//! See [`graphmem_core::config`] for the environment variables. A `.env`
//! file in the working directory is loaded at startup.
//!
//! # Usage with an MCP client
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "graphmem": {
//!       "command": "/path/to/graphmem-mcp",
//!       "args": ["--database", "falkordb"]
//!     }
//!   }
//! }
//! ```

pub mod cli;
pub mod server;
pub mod tools;

pub use cli::Cli;
pub use server::GraphMemServer;
