//! Knowledge-graph types: episodes, entity nodes and fact edges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How the body of an episode should be interpreted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EpisodeSource {
    /// Plain text.
    #[default]
    Text,
    /// A JSON document.
    Json,
    /// Conversation-style content ("speaker: text" lines).
    Message,
}

impl EpisodeSource {
    /// Lenient mapping used by the tool layer: unknown values fall back to text.
    pub fn from_str_lossy(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

/// Input for adding an episode to the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeInput {
    pub name: String,
    pub body: String,
    pub group_id: String,
    #[serde(default)]
    pub source: EpisodeSource,
    #[serde(default)]
    pub source_description: String,
    /// Caller-supplied uuid; generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Time the episode refers to; defaults to now.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_time: Option<DateTime<Utc>>,
}

impl EpisodeInput {
    /// Create a text episode for a group.
    pub fn new(
        name: impl Into<String>,
        body: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            group_id: group_id.into(),
            source: EpisodeSource::Text,
            source_description: String::new(),
            uuid: None,
            reference_time: None,
        }
    }

    /// Builder: set the source type.
    pub fn with_source(mut self, source: EpisodeSource) -> Self {
        self.source = source;
        self
    }

    /// Builder: set the source description.
    pub fn with_source_description(mut self, description: impl Into<String>) -> Self {
        self.source_description = description.into();
        self
    }

    /// Builder: set an explicit uuid.
    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    /// Builder: set the reference time.
    pub fn with_reference_time(mut self, at: DateTime<Utc>) -> Self {
        self.reference_time = Some(at);
        self
    }
}

/// A stored episode.
///
/// Timestamps are kept as the strings the backend returns, since Neo4j and
/// FalkorDB store them differently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub uuid: String,
    pub name: String,
    pub content: String,
    pub source: EpisodeSource,
    #[serde(default)]
    pub source_description: String,
    pub group_id: String,
    pub created_at: String,
    #[serde(default)]
    pub valid_at: Option<String>,
}

/// An entity node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityNode {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub group_id: String,
    pub created_at: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// A fact: a directed relationship between two entity nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEdge {
    pub uuid: String,
    pub name: String,
    pub fact: String,
    pub group_id: String,
    pub source_node_uuid: String,
    pub target_node_uuid: String,
    pub created_at: String,
    #[serde(default)]
    pub valid_at: Option<String>,
    #[serde(default)]
    pub invalid_at: Option<String>,
    #[serde(default)]
    pub episodes: Vec<String>,
}

/// A custom entity type offered to the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    pub description: String,
}

impl EntityType {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// The predefined custom entity types.
pub fn default_entity_types() -> Vec<EntityType> {
    vec![
        EntityType::new(
            "Requirement",
            "A specific need, feature, or functionality that a product or service must fulfill. \
             Always linked to the project it belongs to.",
        ),
        EntityType::new(
            "Preference",
            "A user's expressed like, dislike, or preference for something, with its category \
             (e.g. 'Brands', 'Food', 'Music').",
        ),
        EntityType::new(
            "Procedure",
            "Steps informing the agent what actions to take or how to perform in certain \
             scenarios.",
        ),
    ]
}

/// An entity produced by an extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub name: String,
    #[serde(default)]
    pub summary: String,
    /// Extra labels such as a custom entity type name.
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl ExtractedEntity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            summary: String::new(),
            labels: Vec::new(),
            attributes: serde_json::Map::new(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }
}

/// A fact produced by an extractor, referencing entities by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFact {
    pub source: String,
    pub target: String,
    /// Relationship name, e.g. `WORKS_AT`.
    pub name: String,
    /// Natural-language statement of the fact.
    pub fact: String,
}

/// Everything an extractor found in one episode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub entities: Vec<ExtractedEntity>,
    pub facts: Vec<ExtractedFact>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.facts.is_empty()
    }
}
