//! Database selection and Neo4j connection settings.

use serde::{Deserialize, Serialize};

use super::falkordb::FalkorDbConfig;
use crate::error::{GraphMemError, GraphMemResult};
use crate::traits::GraphProvider;

pub const DEFAULT_NEO4J_URI: &str = "bolt://localhost:7687";
pub const DEFAULT_NEO4J_USER: &str = "neo4j";
pub const DEFAULT_NEO4J_PASSWORD: &str = "password";

pub const ENV_DB_TYPE: &str = "GRAPHMEM_DB_TYPE";
pub const ENV_DB_NAME: &str = "GRAPHMEM_DB_NAME";
pub const ENV_NEO4J_URI: &str = "NEO4J_URI";
pub const ENV_NEO4J_USER: &str = "NEO4J_USER";
pub const ENV_NEO4J_PASSWORD: &str = "NEO4J_PASSWORD";

/// Neo4j connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_NEO4J_URI.to_string(),
            user: DEFAULT_NEO4J_USER.to_string(),
            password: DEFAULT_NEO4J_PASSWORD.to_string(),
        }
    }
}

impl Neo4jConfig {
    /// Every connection parameter must be non-empty.
    pub fn validate(&self) -> GraphMemResult<()> {
        const HINT: &str = "NEO4J_URI, NEO4J_USER, and NEO4J_PASSWORD must be set for Neo4j";
        if self.uri.trim().is_empty() {
            return Err(GraphMemError::missing_field(ENV_NEO4J_URI, HINT));
        }
        if self.user.trim().is_empty() {
            return Err(GraphMemError::missing_field(ENV_NEO4J_USER, HINT));
        }
        if self.password.is_empty() {
            return Err(GraphMemError::missing_field(ENV_NEO4J_PASSWORD, HINT));
        }
        Ok(())
    }
}

/// Which backend to use and how to reach it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub provider: GraphProvider,
    /// Database (Neo4j) or graph (FalkorDB) name override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    pub neo4j: Neo4jConfig,
    pub falkordb: FalkorDbConfig,
}

impl DatabaseConfig {
    /// Load from the process environment.
    pub fn from_env() -> GraphMemResult<Self> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Apply environment-style overrides on top of `self`. Unset variables
    /// leave the current value untouched.
    pub fn overlay<F>(mut self, lookup: F) -> GraphMemResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db_type) = lookup(ENV_DB_TYPE).filter(|v| !v.trim().is_empty()) {
            self.provider = GraphProvider::parse(&db_type)?;
        }
        if let Some(name) = lookup(ENV_DB_NAME).filter(|v| !v.trim().is_empty()) {
            self.database = Some(name);
        }
        if let Some(uri) = lookup(ENV_NEO4J_URI) {
            self.neo4j.uri = uri;
        }
        if let Some(user) = lookup(ENV_NEO4J_USER) {
            self.neo4j.user = user;
        }
        if let Some(password) = lookup(ENV_NEO4J_PASSWORD) {
            self.neo4j.password = password;
        }

        let touches_falkor = [
            super::falkordb::ENV_FALKORDB_CONNECTION_STRING,
            super::falkordb::ENV_FALKORDB_URL,
            super::falkordb::ENV_FALKORDB_HOST,
            super::falkordb::ENV_FALKORDB_PORT,
            super::falkordb::ENV_FALKORDB_DATABASE,
            super::falkordb::ENV_FALKORDB_PASSWORD,
        ]
        .iter()
        .any(|key| lookup(key).is_some());
        if touches_falkor {
            self.falkordb = FalkorDbConfig::from_lookup(&lookup)?;
        }

        Ok(self)
    }

    /// Builder: select a provider.
    pub fn with_provider(mut self, provider: GraphProvider) -> Self {
        self.provider = provider;
        self
    }

    /// Builder: override the database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Validate the parameters the selected backend needs.
    pub fn validate(&self) -> GraphMemResult<()> {
        match self.provider {
            GraphProvider::Neo4j => self.neo4j.validate(),
            GraphProvider::FalkorDb => self.falkordb.validate(),
        }
    }

    /// Database the driver should target. `None` means the Neo4j server default.
    pub fn effective_database(&self) -> Option<String> {
        match self.provider {
            GraphProvider::Neo4j => self.database.clone(),
            GraphProvider::FalkorDb => Some(
                self.database
                    .clone()
                    .unwrap_or_else(|| self.falkordb.graph_name()),
            ),
        }
    }

    /// Connection target for logs, with credentials masked.
    pub fn display_target(&self) -> String {
        match self.provider {
            GraphProvider::Neo4j => self.neo4j.uri.clone(),
            GraphProvider::FalkorDb => self.falkordb.redacted_url(),
        }
    }
}
