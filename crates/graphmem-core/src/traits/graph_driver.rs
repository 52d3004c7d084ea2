//! Graph driver trait and provider enum.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{GraphMemError, GraphMemResult};
use crate::types::{Query, QueryResult};

/// Graph database backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum GraphProvider {
    /// Neo4j over Bolt.
    #[default]
    Neo4j,
    /// FalkorDB, a graph module on the Redis protocol.
    #[strum(serialize = "falkordb")]
    #[serde(rename = "falkordb")]
    FalkorDb,
}

impl GraphProvider {
    /// All supported providers, in display order.
    pub const ALL: [GraphProvider; 2] = [GraphProvider::Neo4j, GraphProvider::FalkorDb];

    /// Parse a provider name, failing with a configuration error on unknown names.
    pub fn parse(name: &str) -> GraphMemResult<Self> {
        name.trim().parse().map_err(|_| {
            GraphMemError::Configuration(format!(
                "Unsupported database type: {}. Supported types: 'neo4j', 'falkordb'",
                name
            ))
        })
    }
}

/// Uniform query-execution capability implemented by every backend adapter.
#[async_trait]
pub trait GraphDriver: Send + Sync {
    /// Which backend this driver talks to.
    fn provider(&self) -> GraphProvider;

    /// Name of the database (Neo4j) or graph (FalkorDB) queries run against.
    fn database(&self) -> String;

    /// Run a query and return its rows, column names and summary.
    async fn execute(&self, query: Query) -> GraphMemResult<QueryResult>;

    /// Release the underlying connection.
    async fn close(&self) -> GraphMemResult<()>;

    /// A driver for another database on the same server.
    async fn with_database(&self, database: &str) -> GraphMemResult<Arc<dyn GraphDriver>>;

    /// Round-trip a trivial query.
    async fn verify_connectivity(&self) -> GraphMemResult<()> {
        self.execute(Query::new("RETURN 1")).await.map(|_| ())
    }
}
