//! Factory for creating graph drivers.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use graphmem_core::config::DatabaseConfig;
use graphmem_core::error::{GraphMemError, GraphMemResult};
use graphmem_core::traits::{GraphDriver, GraphProvider};

/// Factory for creating graph drivers.
pub struct DriverFactory;

impl DriverFactory {
    /// Validate `config` and connect to the selected backend.
    pub async fn create(config: &DatabaseConfig) -> GraphMemResult<Arc<dyn GraphDriver>> {
        config.validate()?;

        let started = Instant::now();
        let result = Self::connect(config).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(driver) => info!(
                provider = %config.provider,
                target = %config.display_target(),
                database = %driver.database(),
                elapsed_ms,
                "Graph driver ready"
            ),
            Err(e) => error!(
                provider = %config.provider,
                target = %config.display_target(),
                elapsed_ms,
                "Failed to create graph driver: {}",
                e
            ),
        }
        result
    }

    /// Build a driver from environment variables.
    pub async fn from_env() -> GraphMemResult<Arc<dyn GraphDriver>> {
        Self::create(&DatabaseConfig::from_env()?).await
    }

    /// Providers compiled into this build.
    pub fn available_providers() -> Vec<GraphProvider> {
        GraphProvider::ALL
            .into_iter()
            .filter(|p| Self::is_available(*p))
            .collect()
    }

    pub fn is_available(provider: GraphProvider) -> bool {
        match provider {
            GraphProvider::Neo4j => cfg!(feature = "neo4j"),
            GraphProvider::FalkorDb => cfg!(feature = "falkordb"),
        }
    }

    async fn connect(config: &DatabaseConfig) -> GraphMemResult<Arc<dyn GraphDriver>> {
        match config.provider {
            #[cfg(feature = "neo4j")]
            GraphProvider::Neo4j => {
                let driver =
                    crate::neo4j::Neo4jDriver::connect(&config.neo4j, config.effective_database())
                        .await?;
                Ok(Arc::new(driver))
            }

            #[cfg(feature = "falkordb")]
            GraphProvider::FalkorDb => {
                let graph = config
                    .effective_database()
                    .unwrap_or_else(|| config.falkordb.graph_name());
                let driver = crate::falkordb::FalkorDriver::connect(&config.falkordb, graph).await?;
                Ok(Arc::new(driver))
            }

            #[allow(unreachable_patterns)]
            provider => Err(GraphMemError::UnsupportedProvider {
                provider: provider.to_string(),
            }),
        }
    }
}
