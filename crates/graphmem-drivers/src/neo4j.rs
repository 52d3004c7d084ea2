//! Neo4j driver over Bolt.

use std::sync::Arc;

use async_trait::async_trait;
use neo4rs::{
    query, BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString,
    BoltType, ConfigBuilder, Graph,
};
use tracing::debug;

use graphmem_core::config::Neo4jConfig;
use graphmem_core::error::{GraphMemError, GraphMemResult};
use graphmem_core::traits::{GraphDriver, GraphProvider};
use graphmem_core::types::{Query, QueryResult, QueryValue, Record};

/// Label used in logs and `database()` when no database was named.
const SERVER_DEFAULT_DATABASE: &str = "neo4j";

/// Neo4j driver.
pub struct Neo4jDriver {
    graph: Graph,
    config: Neo4jConfig,
    database: Option<String>,
}

impl Neo4jDriver {
    /// Connect with the given credentials. `database` of `None` uses the
    /// server's default database.
    pub async fn connect(config: &Neo4jConfig, database: Option<String>) -> GraphMemResult<Self> {
        let mut builder = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_str());
        if let Some(db) = &database {
            builder = builder.db(db.as_str());
        }
        let bolt_config = builder.build().map_err(|e| {
            GraphMemError::Configuration(format!("Invalid Neo4j configuration: {}", e))
        })?;

        let graph = Graph::connect(bolt_config)
            .await
            .map_err(|e| connect_error(&config.uri, e))?;

        Ok(Self {
            graph,
            config: config.clone(),
            database,
        })
    }
}

fn connect_error(uri: &str, e: neo4rs::Error) -> GraphMemError {
    let message = e.to_string();
    let lower = message.to_lowercase();
    if lower.contains("unauthorized") || lower.contains("authentication") {
        GraphMemError::Connection {
            message: format!("Neo4j authentication failed at {}: {}", uri, message),
            code: graphmem_core::error::ErrorCode::ConnAuthFailed,
            source: Some(Box::new(e)),
        }
    } else {
        GraphMemError::connection_with_source(format!("Failed to connect to Neo4j at {}", uri), e)
    }
}

/// Convert a parameter to its Bolt form.
fn to_bolt(value: QueryValue) -> BoltType {
    match value {
        QueryValue::Null => BoltType::Null(BoltNull),
        QueryValue::Bool(b) => BoltType::Boolean(BoltBoolean::new(b)),
        QueryValue::Int(i) => BoltType::Integer(BoltInteger::new(i)),
        QueryValue::Float(f) => BoltType::Float(BoltFloat::new(f)),
        QueryValue::String(s) => BoltType::String(BoltString::new(&s)),
        QueryValue::DateTime(dt) => BoltType::from(dt.fixed_offset()),
        QueryValue::List(items) => BoltType::List(BoltList {
            value: items.into_iter().map(to_bolt).collect(),
        }),
        QueryValue::Map(entries) => BoltType::Map(BoltMap {
            value: entries
                .into_iter()
                .map(|(k, v)| (BoltString::new(&k), to_bolt(v)))
                .collect(),
        }),
    }
}

#[async_trait]
impl GraphDriver for Neo4jDriver {
    fn provider(&self) -> GraphProvider {
        GraphProvider::Neo4j
    }

    fn database(&self) -> String {
        self.database
            .clone()
            .unwrap_or_else(|| SERVER_DEFAULT_DATABASE.to_string())
    }

    async fn execute(&self, q: Query) -> GraphMemResult<QueryResult> {
        let mut bolt_query = query(&q.text);
        for (key, value) in q.params {
            bolt_query = bolt_query.param(&key, to_bolt(value));
        }

        let mut stream = self
            .graph
            .execute(bolt_query)
            .await
            .map_err(|e| GraphMemError::query(format!("Neo4j query failed: {}", e)))?;

        let mut rows: Vec<Record> = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| GraphMemError::query(format!("Failed to fetch row: {}", e)))?
        {
            let record: Record = row
                .to()
                .map_err(|e| GraphMemError::invalid_response(format!("Failed to decode row: {}", e)))?;
            rows.push(record);
        }

        let columns = rows
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        debug!(rows = rows.len(), "Neo4j query complete");

        Ok(QueryResult {
            rows,
            columns,
            summary: None,
        })
    }

    async fn close(&self) -> GraphMemResult<()> {
        // Connections are pooled inside `Graph` and released on drop.
        debug!(uri = %self.config.uri, "Closing Neo4j driver");
        Ok(())
    }

    async fn with_database(&self, database: &str) -> GraphMemResult<Arc<dyn GraphDriver>> {
        let driver = Self::connect(&self.config, Some(database.to_string())).await?;
        Ok(Arc::new(driver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    #[test]
    fn test_scalars_to_bolt() {
        assert!(matches!(to_bolt(QueryValue::Null), BoltType::Null(_)));
        assert_eq!(
            to_bolt(QueryValue::Int(42)),
            BoltType::Integer(BoltInteger::new(42))
        );
        assert_eq!(
            to_bolt(QueryValue::String("acme".into())),
            BoltType::String(BoltString::new("acme"))
        );
    }

    #[test]
    fn test_nested_values_to_bolt() {
        let mut map = BTreeMap::new();
        map.insert("tags".to_string(), QueryValue::from(vec!["a", "b"]));
        let bolt = to_bolt(QueryValue::Map(map));

        match bolt {
            BoltType::Map(m) => {
                let tags = m.value.get(&BoltString::new("tags")).unwrap();
                match tags {
                    BoltType::List(list) => assert_eq!(list.value.len(), 2),
                    other => panic!("expected list, got {:?}", other),
                }
            }
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_datetime_to_bolt() {
        let dt = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert!(matches!(
            to_bolt(QueryValue::DateTime(dt)),
            BoltType::DateTime(_)
        ));
    }
}
