//! Configuration system for graphmem.
//!
//! Values are layered: defaults, then an optional config file, then
//! environment variables. Command-line flags are applied on top by the
//! binaries.

mod database;
mod falkordb;

pub use database::*;
pub use falkordb::*;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GraphMemError, GraphMemResult};
use crate::queue::QueueConfig;

pub const DEFAULT_GROUP_ID: &str = "default";

pub const ENV_GROUP_ID: &str = "GRAPHMEM_GROUP_ID";
pub const ENV_USE_CUSTOM_ENTITIES: &str = "GRAPHMEM_USE_CUSTOM_ENTITIES";
pub const ENV_DESTROY_GRAPH: &str = "GRAPHMEM_DESTROY_GRAPH";
pub const ENV_QUEUE_IDLE_TIMEOUT_SECS: &str = "GRAPHMEM_QUEUE_IDLE_TIMEOUT_SECS";

/// Top-level server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Backend selection and connection settings.
    pub database: DatabaseConfig,
    /// Group used when a tool call does not name one.
    pub group_id: String,
    /// Offer the predefined custom entity types to the extractor.
    pub use_custom_entities: bool,
    /// Clear the graph on startup.
    pub destroy_graph: bool,
    /// Episode queue settings.
    pub queue: QueueConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            group_id: DEFAULT_GROUP_ID.to_string(),
            use_custom_entities: false,
            destroy_graph: false,
            queue: QueueConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<Path>) -> GraphMemResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| GraphMemError::Configuration(e.to_string()))
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| GraphMemError::Configuration(e.to_string())),
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| GraphMemError::Configuration(e.to_string())),
            _ => Err(GraphMemError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> GraphMemResult<Self> {
        Self::default().overlay_env()
    }

    /// Load an optional file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> GraphMemResult<Self> {
        let base = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        base.overlay_env()
    }

    /// Apply process environment overrides.
    pub fn overlay_env(self) -> GraphMemResult<Self> {
        self.overlay(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn overlay<F>(mut self, lookup: F) -> GraphMemResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.database = self.database.overlay(&lookup)?;

        if let Some(group_id) = lookup(ENV_GROUP_ID).filter(|g| !g.trim().is_empty()) {
            self.group_id = group_id;
        }
        if let Some(flag) = lookup(ENV_USE_CUSTOM_ENTITIES) {
            self.use_custom_entities = parse_flag(&flag);
        }
        if let Some(flag) = lookup(ENV_DESTROY_GRAPH) {
            self.destroy_graph = parse_flag(&flag);
        }
        if let Some(secs) = lookup(ENV_QUEUE_IDLE_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                GraphMemError::validation(format!(
                    "{} must be a whole number of seconds, got: {}",
                    ENV_QUEUE_IDLE_TIMEOUT_SECS, secs
                ))
            })?;
            self.queue.idle_timeout_secs = Some(secs).filter(|s| *s > 0);
        }

        Ok(self)
    }

    /// Validate the settings needed at startup.
    pub fn validate(&self) -> GraphMemResult<()> {
        if self.group_id.trim().is_empty() {
            return Err(GraphMemError::validation("group_id cannot be empty"));
        }
        self.database.validate()
    }
}

/// Truthy values: `true`, `1`, `yes`, `on` (case-insensitive).
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::GraphProvider;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.group_id, "default");
        assert!(!config.use_custom_entities);
        assert!(!config.destroy_graph);
        assert!(config.queue.idle_timeout_secs.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overlay() {
        let config = ServerConfig::default()
            .overlay(lookup(&[
                ("GRAPHMEM_GROUP_ID", "team-a"),
                ("GRAPHMEM_USE_CUSTOM_ENTITIES", "TRUE"),
                ("GRAPHMEM_DESTROY_GRAPH", "no"),
                ("GRAPHMEM_QUEUE_IDLE_TIMEOUT_SECS", "30"),
                ("GRAPHMEM_DB_TYPE", "falkordb"),
            ]))
            .unwrap();
        assert_eq!(config.group_id, "team-a");
        assert!(config.use_custom_entities);
        assert!(!config.destroy_graph);
        assert_eq!(config.queue.idle_timeout_secs, Some(30));
        assert_eq!(config.database.provider, GraphProvider::FalkorDb);
    }

    #[test]
    fn test_zero_idle_timeout_means_persistent_workers() {
        let config = ServerConfig::default()
            .overlay(lookup(&[("GRAPHMEM_QUEUE_IDLE_TIMEOUT_SECS", "0")]))
            .unwrap();
        assert!(config.queue.idle_timeout_secs.is_none());
    }

    #[test]
    fn test_invalid_idle_timeout() {
        let err = ServerConfig::default()
            .overlay(lookup(&[("GRAPHMEM_QUEUE_IDLE_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
group_id = "from-file"
use_custom_entities = true

[database]
provider = "falkordb"

[database.falkordb]
host = "graph.local"
port = 6390

[queue]
idle_timeout_secs = 120
"#
        )
        .unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.group_id, "from-file");
        assert!(config.use_custom_entities);
        assert_eq!(config.database.provider, GraphProvider::FalkorDb);
        assert_eq!(config.database.falkordb.host, "graph.local");
        assert_eq!(config.database.falkordb.port, 6390);
        assert_eq!(config.database.neo4j.user, "neo4j");
        assert_eq!(config.queue.idle_timeout_secs, Some(120));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"group_id": "json-group"}}"#).unwrap();
        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.group_id, "json-group");
    }

    #[test]
    fn test_unsupported_file_format() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = ServerConfig::from_file(file.path()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" Yes "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }
}
