//! MCP server implementation for graphmem.
//!
//! Uses the rmcp SDK's macro-based approach for defining tools. Writes go
//! through the [`EpisodeQueue`] so episodes of one group are processed in
//! order; reads go straight to the graph.

use std::sync::Arc;

use chrono::Utc;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    schemars, tool, tool_handler, tool_router,
    ErrorData as McpError, RoleServer, ServerHandler,
};
use serde::Serialize;
use tracing::{debug, info};

use graphmem_core::{
    default_entity_types, EntityType, EpisodeInput, EpisodeQueue, EpisodeSource, GraphMemError,
    GraphMemResult, GraphMemory, QueueAck, SearchRequest, ServerConfig,
};

use crate::tools::*;

/// MCP server for graph memory operations.
#[derive(Clone)]
pub struct GraphMemServer {
    memory: Arc<GraphMemory>,
    queue: EpisodeQueue,
    config: Arc<ServerConfig>,
    entity_types: Arc<Vec<EntityType>>,
    tool_router: ToolRouter<GraphMemServer>,
}

impl GraphMemServer {
    /// Group used when a call names none (or an empty one).
    pub fn effective_group(&self, group_id: Option<&str>) -> String {
        group_id
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.config.group_id.clone())
    }

    fn effective_groups(&self, group_ids: Option<Vec<String>>) -> Vec<String> {
        match group_ids {
            Some(ids) if !ids.is_empty() => ids,
            _ => vec![self.config.group_id.clone()],
        }
    }

    /// Queue an episode write for its group and return the acknowledgement.
    pub fn queue_episode(&self, input: AddMemoryInput) -> QueueAck {
        let group_id = self.effective_group(input.group_id.as_deref());
        let mut episode = EpisodeInput::new(input.name, input.episode_body, group_id.clone())
            .with_source(EpisodeSource::from_str_lossy(&input.source))
            .with_source_description(input.source_description);
        if let Some(uuid) = input.uuid.filter(|u| !u.trim().is_empty()) {
            episode = episode.with_uuid(uuid);
        }

        let label = episode.name.clone();
        let memory = Arc::clone(&self.memory);
        let entity_types = Arc::clone(&self.entity_types);
        self.queue.submit(group_id, label, move || async move {
            let write = memory
                .add_episode(episode.with_reference_time(Utc::now()), &entity_types)
                .await?;
            info!(
                uuid = %write.episode.uuid,
                entities = write.entities,
                facts = write.facts,
                "Episode processed"
            );
            Ok(())
        })
    }

    pub async fn find_nodes(&self, input: SearchNodesInput) -> GraphMemResult<NodeSearchResult> {
        let mut request = SearchRequest::new(input.query, self.effective_groups(input.group_ids))
            .with_limit(input.max_nodes);
        if let Some(center) = input.center_node_uuid.filter(|c| !c.is_empty()) {
            request = request.with_center(center);
        }
        if !input.entity.trim().is_empty() {
            request = request.with_entity_label(input.entity.trim());
        }

        let nodes = self.memory.search_nodes(&request).await?;
        let message = if nodes.is_empty() {
            "No relevant nodes found"
        } else {
            "Nodes retrieved successfully"
        };
        Ok(NodeSearchResult {
            message: message.to_string(),
            nodes,
        })
    }

    pub async fn find_facts(&self, input: SearchFactsInput) -> GraphMemResult<FactSearchResult> {
        let mut request = SearchRequest::new(input.query, self.effective_groups(input.group_ids))
            .with_limit(input.max_facts);
        if let Some(center) = input.center_node_uuid.filter(|c| !c.is_empty()) {
            request = request.with_center(center);
        }

        let facts = self.memory.search_facts(&request).await?;
        let message = if facts.is_empty() {
            "No relevant facts found"
        } else {
            "Facts retrieved successfully"
        };
        Ok(FactSearchResult {
            message: message.to_string(),
            facts,
        })
    }

    pub async fn recent_episodes(&self, input: GetEpisodesInput) -> GraphMemResult<EpisodesResult> {
        let group_id = self.effective_group(input.group_id.as_deref());
        let episodes = self.memory.get_episodes(&group_id, input.last_n).await?;
        let message = if episodes.is_empty() {
            format!("No episodes found for group {}", group_id)
        } else {
            "Episodes retrieved successfully".to_string()
        };
        Ok(EpisodesResult { message, episodes })
    }

    /// Clear the graph and rebuild its indices.
    pub async fn reset_graph(&self) -> GraphMemResult<SuccessResult> {
        self.memory.clear().await?;
        self.memory.build_indices().await?;
        Ok(SuccessResult::new("Graph cleared successfully and indices rebuilt"))
    }

    pub async fn status(&self) -> StatusResult {
        let status = self.memory.status().await;
        StatusResult {
            status: if status.ok { "ok" } else { "error" }.to_string(),
            message: status.message,
        }
    }
}

/// Map a graph memory error onto an MCP error. Caller mistakes become
/// invalid params; everything else is internal.
pub fn to_mcp_error(e: GraphMemError) -> McpError {
    match e {
        GraphMemError::Validation { .. }
        | GraphMemError::Parse { .. }
        | GraphMemError::NotFound { .. } => McpError::invalid_params(e.to_string(), None),
        other => McpError::internal_error(other.to_string(), None),
    }
}

fn json_result<T: Serialize>(output: &T) -> CallToolResult {
    CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(output).unwrap_or_default(),
    )])
}

#[tool_router]
impl GraphMemServer {
    /// Create a server over `memory`, submitting writes to `queue`.
    pub fn new(memory: Arc<GraphMemory>, queue: EpisodeQueue, config: Arc<ServerConfig>) -> Self {
        let entity_types = if config.use_custom_entities {
            default_entity_types()
        } else {
            Vec::new()
        };
        Self {
            memory,
            queue,
            config,
            entity_types: Arc::new(entity_types),
            tool_router: Self::tool_router(),
        }
    }

    /// Add an episode to the graph.
    ///
    /// Returns as soon as the write is queued; episodes of the same group
    /// are processed one at a time in submission order.
    #[tool(
        name = "add_memory",
        description = "Add an episode to memory. The episode is queued and processed in the background; episodes for the same group_id are processed sequentially. Use source 'json' for structured data, 'message' for conversations, 'text' otherwise."
    )]
    async fn add_memory(
        &self,
        Parameters(input): Parameters<AddMemoryInput>,
    ) -> Result<CallToolResult, McpError> {
        let name = input.name.clone();
        let ack = self.queue_episode(input);
        debug!(group_id = %ack.group_id, position = ack.position, "Episode queued");
        Ok(json_result(&SuccessResult::new(format!(
            "Episode '{}' queued for processing (position: {})",
            name, ack.position
        ))))
    }

    #[tool(
        name = "search_memory_nodes",
        description = "Search the graph memory for relevant entity nodes. Optionally restrict to the neighbourhood of a center node or to one entity type."
    )]
    async fn search_memory_nodes(
        &self,
        Parameters(input): Parameters<SearchNodesInput>,
    ) -> Result<CallToolResult, McpError> {
        let output = self.find_nodes(input).await.map_err(to_mcp_error)?;
        Ok(json_result(&output))
    }

    #[tool(
        name = "search_memory_facts",
        description = "Search the graph memory for relevant facts (relationships between entities). Optionally restrict to facts around a center node."
    )]
    async fn search_memory_facts(
        &self,
        Parameters(input): Parameters<SearchFactsInput>,
    ) -> Result<CallToolResult, McpError> {
        let output = self.find_facts(input).await.map_err(to_mcp_error)?;
        Ok(json_result(&output))
    }

    #[tool(
        name = "get_entity_edge",
        description = "Get an entity edge (fact) by its UUID."
    )]
    async fn get_entity_edge(
        &self,
        Parameters(input): Parameters<UuidInput>,
    ) -> Result<CallToolResult, McpError> {
        let edge = self
            .memory
            .get_entity_edge(&input.uuid)
            .await
            .map_err(to_mcp_error)?;
        Ok(json_result(&edge))
    }

    #[tool(
        name = "delete_entity_edge",
        description = "Delete an entity edge (fact) from the graph memory."
    )]
    async fn delete_entity_edge(
        &self,
        Parameters(input): Parameters<UuidInput>,
    ) -> Result<CallToolResult, McpError> {
        self.memory
            .delete_entity_edge(&input.uuid)
            .await
            .map_err(to_mcp_error)?;
        Ok(json_result(&SuccessResult::new(format!(
            "Entity edge with UUID {} deleted successfully",
            input.uuid
        ))))
    }

    #[tool(
        name = "delete_episode",
        description = "Delete an episode from the graph memory."
    )]
    async fn delete_episode(
        &self,
        Parameters(input): Parameters<UuidInput>,
    ) -> Result<CallToolResult, McpError> {
        self.memory
            .delete_episode(&input.uuid)
            .await
            .map_err(to_mcp_error)?;
        Ok(json_result(&SuccessResult::new(format!(
            "Episode with UUID {} deleted successfully",
            input.uuid
        ))))
    }

    #[tool(
        name = "get_episodes",
        description = "Get the most recent episodes for a group, newest first."
    )]
    async fn get_episodes(
        &self,
        Parameters(input): Parameters<GetEpisodesInput>,
    ) -> Result<CallToolResult, McpError> {
        let output = self.recent_episodes(input).await.map_err(to_mcp_error)?;
        Ok(json_result(&output))
    }

    #[tool(
        name = "clear_graph",
        description = "Clear all data from the graph memory and rebuild indices. This cannot be undone."
    )]
    async fn clear_graph(&self) -> Result<CallToolResult, McpError> {
        let output = self.reset_graph().await.map_err(to_mcp_error)?;
        Ok(json_result(&output))
    }

    #[tool(
        name = "get_status",
        description = "Get the status of the memory server and its graph database connection."
    )]
    async fn get_status(&self) -> Result<CallToolResult, McpError> {
        Ok(json_result(&self.status().await))
    }
}

#[tool_handler]
impl ServerHandler for GraphMemServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "graphmem - knowledge-graph memory for AI assistants. Use add_memory to store \
                 episodes (text, JSON or messages), search_memory_nodes and search_memory_facts \
                 to find entities and the facts between them, get_episodes to list recent \
                 episodes, and the delete tools to remove edges or episodes. Each group_id is \
                 an independent memory namespace."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let not_found = to_mcp_error(GraphMemError::edge_not_found("e-1"));
        assert_eq!(not_found.code, ErrorCode::INVALID_PARAMS);
        assert!(not_found.message.contains("e-1"));

        let invalid = to_mcp_error(GraphMemError::validation("limit must be a positive integer"));
        assert_eq!(invalid.code, ErrorCode::INVALID_PARAMS);

        let internal = to_mcp_error(GraphMemError::connection("down"));
        assert_eq!(internal.code, ErrorCode::INTERNAL_ERROR);
        assert!(internal.message.contains("down"));
    }
}
