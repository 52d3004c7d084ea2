//! Knowledge-graph memory on top of a [`GraphDriver`].
//!
//! Episodes are stored as `Episodic` nodes. Entities found by the extractor
//! become `Entity` nodes linked from the episode with `MENTIONS`, and facts
//! become `RELATES_TO` edges between entities.

mod queries;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{GraphMemError, GraphMemResult};
use crate::traits::{EntityExtractor, GraphDriver, GraphProvider, NoopExtractor};
use crate::types::{
    EntityEdge, EntityNode, EntityType, Episode, EpisodeInput, EpisodeSource, Query,
};

/// Default number of results for searches and episode listings.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Parameters for node and fact searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Case-insensitive substring to look for.
    pub query: String,
    pub group_ids: Vec<String>,
    pub limit: usize,
    /// Restrict results to the neighbourhood of this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center_node_uuid: Option<String>,
    /// Only entities carrying this label (node search only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_label: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, group_ids: Vec<String>) -> Self {
        Self {
            query: query.into(),
            group_ids,
            limit: DEFAULT_SEARCH_LIMIT,
            center_node_uuid: None,
            entity_label: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_center(mut self, uuid: impl Into<String>) -> Self {
        self.center_node_uuid = Some(uuid.into());
        self
    }

    pub fn with_entity_label(mut self, label: impl Into<String>) -> Self {
        self.entity_label = Some(label.into());
        self
    }

    fn validate(&self) -> GraphMemResult<()> {
        if self.limit == 0 {
            return Err(GraphMemError::validation_with_suggestion(
                "limit must be a positive integer",
                "Pass a limit of at least 1",
            ));
        }
        Ok(())
    }
}

/// Result of a connectivity check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStatus {
    pub ok: bool,
    pub provider: GraphProvider,
    pub database: String,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    pub message: String,
}

/// What `add_episode` wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeWrite {
    pub episode: Episode,
    pub entities: usize,
    pub facts: usize,
}

#[derive(Deserialize)]
struct NodeRow {
    uuid: String,
    name: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    labels: Vec<String>,
    group_id: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    attributes: Option<String>,
}

impl NodeRow {
    fn into_node(self) -> EntityNode {
        let attributes = self
            .attributes
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default();
        EntityNode {
            uuid: self.uuid,
            name: self.name,
            summary: self.summary,
            labels: self.labels,
            group_id: self.group_id,
            created_at: self.created_at,
            attributes,
        }
    }
}

#[derive(Deserialize)]
struct NeighborRow {
    uuid: String,
    distance: i64,
}

/// Knowledge-graph memory service.
pub struct GraphMemory {
    driver: Arc<dyn GraphDriver>,
    extractor: Arc<dyn EntityExtractor>,
}

impl GraphMemory {
    pub fn new(driver: Arc<dyn GraphDriver>, extractor: Arc<dyn EntityExtractor>) -> Self {
        Self { driver, extractor }
    }

    /// Memory that stores episodes without extracting entities.
    pub fn without_extraction(driver: Arc<dyn GraphDriver>) -> Self {
        Self::new(driver, Arc::new(NoopExtractor))
    }

    pub fn driver(&self) -> &Arc<dyn GraphDriver> {
        &self.driver
    }

    pub fn provider(&self) -> GraphProvider {
        self.driver.provider()
    }

    /// Create the indexes the memory relies on.
    pub async fn build_indices(&self) -> GraphMemResult<()> {
        let provider = self.driver.provider();
        for statement in queries::index_statements(provider) {
            self.driver.execute(Query::new(statement)).await?;
        }
        debug!(provider = %provider, "Indices built");
        Ok(())
    }

    /// Delete every node and relationship.
    pub async fn clear(&self) -> GraphMemResult<()> {
        self.driver.execute(Query::new(queries::CLEAR_GRAPH)).await?;
        info!(database = %self.driver.database(), "Graph cleared");
        Ok(())
    }

    /// Persist an episode, then store whatever the extractor finds in it.
    #[instrument(skip(self, input, entity_types), fields(group_id = %input.group_id, name = %input.name))]
    pub async fn add_episode(
        &self,
        input: EpisodeInput,
        entity_types: &[EntityType],
    ) -> GraphMemResult<EpisodeWrite> {
        validate_episode(&input)?;

        let uuid = input
            .uuid
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = Utc::now();
        let valid_at = input.reference_time.unwrap_or(now);

        self.driver
            .execute(
                Query::new(queries::SAVE_EPISODE)
                    .param("uuid", &uuid)
                    .param("name", &input.name)
                    .param("content", &input.body)
                    .param("source", input.source.to_string())
                    .param("source_description", &input.source_description)
                    .param("group_id", &input.group_id)
                    .param("created_at", now)
                    .param("valid_at", valid_at),
            )
            .await?;

        let extraction = self.extractor.extract(&input, entity_types).await?;

        for entity in &extraction.entities {
            let mut labels = vec!["Entity".to_string()];
            labels.extend(entity.labels.iter().cloned());
            let attributes = serde_json::to_string(&entity.attributes)?;

            self.driver
                .execute(
                    Query::new(queries::MERGE_ENTITY)
                        .param("uuid", Uuid::new_v4().to_string())
                        .param("name", &entity.name)
                        .param("group_id", &input.group_id)
                        .param("summary", &entity.summary)
                        .param("labels", labels)
                        .param("attributes", attributes)
                        .param("created_at", now)
                        .param("episode_uuid", &uuid),
                )
                .await?;
        }

        let mut facts = 0;
        for fact in &extraction.facts {
            let result = self
                .driver
                .execute(
                    Query::new(queries::CREATE_FACT)
                        .param("uuid", Uuid::new_v4().to_string())
                        .param("source", &fact.source)
                        .param("target", &fact.target)
                        .param("name", &fact.name)
                        .param("fact", &fact.fact)
                        .param("group_id", &input.group_id)
                        .param("created_at", now)
                        .param("valid_at", valid_at)
                        .param("episode_uuid", &uuid),
                )
                .await?;
            if result.is_empty() {
                warn!(
                    source = %fact.source,
                    target = %fact.target,
                    "Skipping fact between unknown entities"
                );
            } else {
                facts += 1;
            }
        }

        info!(
            uuid = %uuid,
            extractor = self.extractor.name(),
            entities = extraction.entities.len(),
            facts,
            "Episode stored"
        );

        Ok(EpisodeWrite {
            episode: Episode {
                uuid,
                name: input.name,
                content: input.body,
                source: input.source,
                source_description: input.source_description,
                group_id: input.group_id,
                created_at: format_timestamp(now),
                valid_at: Some(format_timestamp(valid_at)),
            },
            entities: extraction.entities.len(),
            facts,
        })
    }

    /// Entities whose name or summary contains the query.
    pub async fn search_nodes(&self, request: &SearchRequest) -> GraphMemResult<Vec<EntityNode>> {
        request.validate()?;
        let neighbors = self.neighborhood(request.center_node_uuid.as_deref()).await?;

        let text = queries::search_nodes(
            request.entity_label.is_some(),
            neighbors.is_some(),
            request.limit,
        );
        let mut query = Query::new(text)
            .param("group_ids", request.group_ids.clone())
            .param("query", request.query.to_lowercase());
        if let Some(label) = &request.entity_label {
            query = query.param("label", label);
        }
        if let Some(neighbors) = &neighbors {
            query = query.param("neighbors", neighbors.keys().cloned().collect::<Vec<_>>());
        }

        let mut nodes: Vec<EntityNode> = self
            .driver
            .execute(query)
            .await?
            .into_typed::<NodeRow>()?
            .into_iter()
            .map(NodeRow::into_node)
            .collect();

        if let Some(distances) = &neighbors {
            nodes.sort_by_key(|node| distances.get(&node.uuid).copied().unwrap_or(i64::MAX));
        }
        Ok(nodes)
    }

    /// Facts whose text or name contains the query.
    pub async fn search_facts(&self, request: &SearchRequest) -> GraphMemResult<Vec<EntityEdge>> {
        request.validate()?;
        let neighbors = self.neighborhood(request.center_node_uuid.as_deref()).await?;

        let mut query = Query::new(queries::search_facts(neighbors.is_some(), request.limit))
            .param("group_ids", request.group_ids.clone())
            .param("query", request.query.to_lowercase());
        if let Some(neighbors) = &neighbors {
            query = query.param("neighbors", neighbors.keys().cloned().collect::<Vec<_>>());
        }

        let mut edges: Vec<EntityEdge> = self.driver.execute(query).await?.into_typed()?;
        if let Some(distances) = &neighbors {
            let distance = |edge: &EntityEdge| {
                let s = distances.get(&edge.source_node_uuid).copied().unwrap_or(i64::MAX);
                let t = distances.get(&edge.target_node_uuid).copied().unwrap_or(i64::MAX);
                s.min(t)
            };
            edges.sort_by_key(distance);
        }
        Ok(edges)
    }

    pub async fn get_entity_edge(&self, uuid: &str) -> GraphMemResult<EntityEdge> {
        self.driver
            .execute(Query::new(queries::get_entity_edge()).param("uuid", uuid))
            .await?
            .first_typed()?
            .ok_or_else(|| GraphMemError::edge_not_found(uuid))
    }

    pub async fn delete_entity_edge(&self, uuid: &str) -> GraphMemResult<()> {
        self.get_entity_edge(uuid).await?;
        self.driver
            .execute(Query::new(queries::DELETE_ENTITY_EDGE).param("uuid", uuid))
            .await?;
        info!(uuid = %uuid, "Entity edge deleted");
        Ok(())
    }

    pub async fn get_episode(&self, uuid: &str) -> GraphMemResult<Episode> {
        self.driver
            .execute(Query::new(queries::get_episode()).param("uuid", uuid))
            .await?
            .first_typed()?
            .ok_or_else(|| GraphMemError::episode_not_found(uuid))
    }

    pub async fn delete_episode(&self, uuid: &str) -> GraphMemResult<()> {
        self.get_episode(uuid).await?;
        self.driver
            .execute(Query::new(queries::DELETE_EPISODE).param("uuid", uuid))
            .await?;
        info!(uuid = %uuid, "Episode deleted");
        Ok(())
    }

    /// The `last_n` most recent episodes of a group, newest first.
    pub async fn get_episodes(&self, group_id: &str, last_n: usize) -> GraphMemResult<Vec<Episode>> {
        if last_n == 0 {
            return Ok(Vec::new());
        }
        self.driver
            .execute(
                Query::new(queries::recent_episodes(last_n))
                    .param("group_ids", vec![group_id.to_string()])
                    .param("reference_time", Utc::now()),
            )
            .await?
            .into_typed()
    }

    /// Round-trip the backend and time it. Never fails; problems are
    /// reported in the returned status.
    pub async fn status(&self) -> GraphStatus {
        let provider = self.driver.provider();
        let database = self.driver.database();
        let started = Instant::now();
        let outcome = self.driver.verify_connectivity().await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(()) => GraphStatus {
                ok: true,
                provider,
                database,
                elapsed,
                message: format!(
                    "Server is running and connected to {} (connection check: {:.3}s)",
                    provider,
                    elapsed.as_secs_f64()
                ),
            },
            Err(e) => {
                warn!(provider = %provider, error = %e, "Connectivity check failed");
                GraphStatus {
                    ok: false,
                    provider,
                    database,
                    elapsed,
                    message: format!(
                        "Server is running but {} connection failed: {}",
                        provider, e
                    ),
                }
            }
        }
    }

    /// Hop distance of every entity near `center`, including `center` itself.
    async fn neighborhood(
        &self,
        center: Option<&str>,
    ) -> GraphMemResult<Option<HashMap<String, i64>>> {
        let Some(center) = center else {
            return Ok(None);
        };
        let rows: Vec<NeighborRow> = self
            .driver
            .execute(Query::new(queries::NEIGHBORHOOD).param("center", center))
            .await?
            .into_typed()?;

        let mut distances: HashMap<String, i64> =
            rows.into_iter().map(|r| (r.uuid, r.distance)).collect();
        distances.insert(center.to_string(), 0);
        Ok(Some(distances))
    }
}

fn validate_episode(input: &EpisodeInput) -> GraphMemResult<()> {
    if input.name.trim().is_empty() {
        return Err(GraphMemError::validation("Episode name cannot be empty"));
    }
    if input.group_id.trim().is_empty() {
        return Err(GraphMemError::validation("group_id cannot be empty"));
    }
    if input.source == EpisodeSource::Json {
        serde_json::from_str::<serde_json::Value>(&input.body).map_err(|e| {
            GraphMemError::parse(format!("Episode body is not valid JSON: {}", e))
        })?;
    }
    Ok(())
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_defaults() {
        let request = SearchRequest::new("acme", vec!["g1".into()]);
        assert_eq!(request.limit, DEFAULT_SEARCH_LIMIT);
        assert!(request.validate().is_ok());
        assert!(request.with_limit(0).validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_validate_episode() {
        assert!(validate_episode(&EpisodeInput::new("n", "body", "g1")).is_ok());
        assert!(validate_episode(&EpisodeInput::new(" ", "body", "g1")).is_err());
        assert!(validate_episode(&EpisodeInput::new("n", "body", "")).is_err());

        let bad_json = EpisodeInput::new("n", "{not json", "g1").with_source(EpisodeSource::Json);
        let err = validate_episode(&bad_json).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::ParseInvalidValue);

        let good_json =
            EpisodeInput::new("n", r#"{"company": "Acme"}"#, "g1").with_source(EpisodeSource::Json);
        assert!(validate_episode(&good_json).is_ok());
    }

    #[test]
    fn test_node_row_parses_attributes() {
        let row = NodeRow {
            uuid: "u1".into(),
            name: "Alice".into(),
            summary: String::new(),
            labels: vec!["Entity".into()],
            group_id: "g1".into(),
            created_at: "2024-01-01T00:00:00Z".into(),
            attributes: Some(r#"{"role": "engineer"}"#.into()),
        };
        let node = row.into_node();
        assert_eq!(node.attributes["role"], "engineer");
    }

    #[test]
    fn test_format_timestamp() {
        use chrono::TimeZone;
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(format_timestamp(at), "2024-05-01T12:00:00.000000Z");
    }
}
