//! Command-line flags for the MCP server.
//!
//! Flags are applied on top of the file and environment configuration.

use std::path::PathBuf;

use clap::Parser;

use graphmem_core::config::ServerConfig;
use graphmem_core::error::GraphMemResult;
use graphmem_core::GraphProvider;

/// graphmem MCP server - knowledge-graph memory over stdio.
#[derive(Parser, Debug, Default)]
#[command(name = "graphmem-mcp", version, about, long_about = None)]
pub struct Cli {
    /// Config file (.toml, .json or .yaml).
    #[arg(long, env = "GRAPHMEM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Graph database backend: neo4j or falkordb.
    #[arg(long)]
    pub database: Option<String>,

    /// Default group for tool calls that name none.
    #[arg(long)]
    pub group_id: Option<String>,

    /// Offer the predefined custom entity types to the extractor.
    #[arg(long)]
    pub use_custom_entities: bool,

    /// Clear the graph on startup.
    #[arg(long)]
    pub destroy_graph: bool,

    /// Retire a group's worker after this many idle seconds (0 keeps workers alive).
    #[arg(long)]
    pub idle_timeout_secs: Option<u64>,
}

impl Cli {
    /// Load the file and environment configuration, then apply these flags.
    pub fn load_config(&self) -> GraphMemResult<ServerConfig> {
        let config = ServerConfig::load(self.config.as_deref())?;
        self.apply(config)
    }

    /// Apply flags to an already loaded configuration.
    pub fn apply(&self, mut config: ServerConfig) -> GraphMemResult<ServerConfig> {
        if let Some(database) = &self.database {
            config.database.provider = GraphProvider::parse(database)?;
        }
        if let Some(group_id) = &self.group_id {
            config.group_id = group_id.clone();
        }
        if self.use_custom_entities {
            config.use_custom_entities = true;
        }
        if self.destroy_graph {
            config.destroy_graph = true;
        }
        if let Some(secs) = self.idle_timeout_secs {
            config.queue.idle_timeout_secs = Some(secs).filter(|s| *s > 0);
        }
        config.validate()?;
        Ok(config)
    }
}
