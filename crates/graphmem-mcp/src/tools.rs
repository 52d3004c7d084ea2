//! MCP tool input/output type definitions.
//!
//! Inputs derive `schemars::JsonSchema` so MCP clients can see the tool
//! parameters. Outputs are serialized to pretty JSON text.

use rmcp::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

use graphmem_core::{EntityEdge, EntityNode, Episode, DEFAULT_SEARCH_LIMIT};

/// Input for the add_memory tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AddMemoryInput {
    /// Name of the episode.
    pub name: String,

    /// The content of the episode. When `source` is "json" this must be a
    /// JSON document serialized as a string.
    pub episode_body: String,

    /// Group the episode belongs to. Defaults to the server's configured group.
    #[serde(default)]
    pub group_id: Option<String>,

    /// Source type: "text", "json" or "message". Unknown values are treated as text.
    #[serde(default = "default_source")]
    pub source: String,

    /// Description of where the episode came from.
    #[serde(default)]
    pub source_description: String,

    /// Optional uuid for the episode.
    #[serde(default)]
    pub uuid: Option<String>,
}

fn default_source() -> String {
    "text".to_string()
}

/// Input for the search_memory_nodes tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchNodesInput {
    /// The search query.
    pub query: String,

    /// Groups to search. Defaults to the server's configured group.
    #[serde(default)]
    pub group_ids: Option<Vec<String>>,

    /// Maximum number of nodes to return.
    #[serde(default = "default_limit")]
    pub max_nodes: usize,

    /// Only return nodes near this node.
    #[serde(default)]
    pub center_node_uuid: Option<String>,

    /// Only return entities of this type, e.g. "Preference". Empty means any.
    #[serde(default)]
    pub entity: String,
}

/// Input for the search_memory_facts tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchFactsInput {
    /// The search query.
    pub query: String,

    /// Groups to search. Defaults to the server's configured group.
    #[serde(default)]
    pub group_ids: Option<Vec<String>>,

    /// Maximum number of facts to return.
    #[serde(default = "default_limit")]
    pub max_facts: usize,

    /// Only return facts around this node.
    #[serde(default)]
    pub center_node_uuid: Option<String>,
}

fn default_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

/// Input for tools addressing a single edge or episode.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UuidInput {
    /// UUID of the item.
    pub uuid: String,
}

/// Input for the get_episodes tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetEpisodesInput {
    /// Group to list. Defaults to the server's configured group.
    #[serde(default)]
    pub group_id: Option<String>,

    /// Number of most recent episodes to return.
    #[serde(default = "default_limit")]
    pub last_n: usize,
}

/// A plain acknowledgement.
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResult {
    pub message: String,
}

impl SuccessResult {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeSearchResult {
    pub message: String,
    pub nodes: Vec<EntityNode>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FactSearchResult {
    pub message: String,
    pub facts: Vec<EntityEdge>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EpisodesResult {
    pub message: String,
    pub episodes: Vec<Episode>,
}

/// Result of the get_status tool.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResult {
    /// "ok" or "error".
    pub status: String,
    pub message: String,
}
