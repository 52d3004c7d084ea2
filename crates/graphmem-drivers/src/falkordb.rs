//! FalkorDB driver over the Redis protocol.
//!
//! Queries go through `GRAPH.QUERY` in compact mode. FalkorDB has no
//! parameter binding on the wire, so parameters are rendered as Cypher
//! literals in a `CYPHER k=v ...` prefix.

use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, RedisResult, Value};
use serde_json::{Map, Number, Value as Json};
use tracing::{debug, info};

use graphmem_core::config::FalkorDbConfig;
use graphmem_core::error::{GraphMemError, GraphMemResult};
use graphmem_core::traits::{GraphDriver, GraphProvider};
use graphmem_core::types::{Params, Query, QueryResult, QueryValue, Record};

/// Value type tags in compact replies.
mod tag {
    pub const NULL: i64 = 1;
    pub const STRING: i64 = 2;
    pub const INTEGER: i64 = 3;
    pub const BOOLEAN: i64 = 4;
    pub const DOUBLE: i64 = 5;
    pub const ARRAY: i64 = 6;
    pub const EDGE: i64 = 7;
    pub const NODE: i64 = 8;
    pub const PATH: i64 = 9;
    pub const MAP: i64 = 10;
    pub const POINT: i64 = 11;
}

/// FalkorDB driver bound to one graph.
pub struct FalkorDriver {
    client: Client,
    connection: MultiplexedConnection,
    config: FalkorDbConfig,
    graph: String,
}

impl FalkorDriver {
    /// Open a multiplexed connection and bind it to `graph`.
    pub async fn connect(config: &FalkorDbConfig, graph: impl Into<String>) -> GraphMemResult<Self> {
        let client = Client::open(config.client_url()).map_err(|e| {
            GraphMemError::connection_with_source(
                format!("Failed to create FalkorDB client for {}", config.redacted_url()),
                e,
            )
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                GraphMemError::connection_with_source(
                    format!("Failed to connect to FalkorDB at {}", config.redacted_url()),
                    e,
                )
            })?;

        Ok(Self {
            client,
            connection,
            config: config.clone(),
            graph: graph.into(),
        })
    }
}

#[async_trait]
impl GraphDriver for FalkorDriver {
    fn provider(&self) -> GraphProvider {
        GraphProvider::FalkorDb
    }

    fn database(&self) -> String {
        self.graph.clone()
    }

    async fn execute(&self, query: Query) -> GraphMemResult<QueryResult> {
        let mut conn = self.connection.clone();
        let text = build_query(&query.text, query.params)?;

        let reply: RedisResult<Value> = redis::cmd("GRAPH.QUERY")
            .arg(&self.graph)
            .arg(&text)
            .arg("--compact")
            .query_async(&mut conn)
            .await;

        match reply {
            Ok(value) => parse_reply(value),
            Err(e) => {
                // Index creation is not idempotent on FalkorDB.
                if e.to_string().contains("already indexed") {
                    info!(graph = %self.graph, "Index already exists: {}", e);
                    Ok(QueryResult::empty())
                } else {
                    Err(GraphMemError::query(format!("FalkorDB query failed: {}", e)))
                }
            }
        }
    }

    async fn close(&self) -> GraphMemResult<()> {
        debug!(graph = %self.graph, "Closing FalkorDB driver");
        Ok(())
    }

    async fn with_database(&self, database: &str) -> GraphMemResult<Arc<dyn GraphDriver>> {
        Ok(Arc::new(Self {
            client: self.client.clone(),
            connection: self.connection.clone(),
            config: self.config.clone(),
            graph: database.to_string(),
        }))
    }
}

/// Prefix `text` with its parameters as Cypher literals.
fn build_query(text: &str, params: Params) -> GraphMemResult<String> {
    if params.is_empty() {
        return Ok(text.to_string());
    }
    let mut out = String::from("CYPHER");
    for (key, value) in params {
        out.push(' ');
        out.push_str(&key);
        out.push('=');
        write_literal(&mut out, &value.with_datetimes_as_strings())?;
    }
    out.push(' ');
    out.push_str(text);
    Ok(out)
}

fn write_literal(out: &mut String, value: &QueryValue) -> GraphMemResult<()> {
    match value {
        QueryValue::Null => out.push_str("null"),
        QueryValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        QueryValue::Int(i) => out.push_str(&i.to_string()),
        QueryValue::Float(f) => {
            if !f.is_finite() {
                return Err(GraphMemError::validation(format!(
                    "Cannot pass non-finite number {} to FalkorDB",
                    f
                )));
            }
            out.push_str(&format!("{:?}", f));
        }
        QueryValue::String(s) => quote_string(out, s),
        QueryValue::DateTime(dt) => quote_string(out, &dt.to_rfc3339()),
        QueryValue::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_literal(out, item)?;
            }
            out.push(']');
        }
        QueryValue::Map(entries) => {
            out.push('{');
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(key);
                out.push_str(": ");
                write_literal(out, item)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn quote_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out.push('"');
}

/// Reshape a compact reply into rows keyed by column.
///
/// Queries with a RETURN clause reply `[header, rows, stats]`; write-only
/// queries reply `[stats]`.
fn parse_reply(reply: Value) -> GraphMemResult<QueryResult> {
    let mut parts = match reply {
        Value::Bulk(parts) => parts,
        other => {
            return Err(GraphMemError::invalid_response(format!(
                "Unexpected GRAPH.QUERY reply: {:?}",
                other
            )))
        }
    };

    match parts.len() {
        1 => Ok(QueryResult {
            rows: Vec::new(),
            columns: Vec::new(),
            summary: Some(parse_stats(parts.remove(0))),
        }),
        3 => {
            let stats = parse_stats(parts.remove(2));
            let raw_rows = parts.remove(1);
            let columns = parse_header(parts.remove(0))?;

            let rows = match raw_rows {
                Value::Bulk(rows) => rows
                    .into_iter()
                    .map(|row| parse_row(&columns, row))
                    .collect::<GraphMemResult<Vec<_>>>()?,
                Value::Nil => Vec::new(),
                other => {
                    return Err(GraphMemError::invalid_response(format!(
                        "Unexpected result rows: {:?}",
                        other
                    )))
                }
            };

            Ok(QueryResult {
                rows,
                columns,
                summary: Some(stats),
            })
        }
        n => Err(GraphMemError::invalid_response(format!(
            "GRAPH.QUERY reply has {} sections, expected 1 or 3",
            n
        ))),
    }
}

/// Column names. Compact headers are `[type, name]` pairs.
fn parse_header(header: Value) -> GraphMemResult<Vec<String>> {
    let Value::Bulk(entries) = header else {
        return Err(GraphMemError::invalid_response("Result header is not an array"));
    };
    entries
        .into_iter()
        .map(|entry| match entry {
            Value::Bulk(mut pair) if pair.len() == 2 => as_string(pair.remove(1)),
            other => as_string(other),
        })
        .collect()
}

fn parse_row(columns: &[String], row: Value) -> GraphMemResult<Record> {
    let Value::Bulk(values) = row else {
        return Err(GraphMemError::invalid_response("Result row is not an array"));
    };
    let mut values = values.into_iter();
    let mut record = Map::new();
    for column in columns {
        // Short rows are padded with nulls.
        let value = match values.next() {
            Some(v) => decode_value(v)?,
            None => Json::Null,
        };
        record.insert(column.clone(), value);
    }
    Ok(record)
}

/// Decode a compact `[type, value]` pair.
fn decode_value(value: Value) -> GraphMemResult<Json> {
    let mut pair = match value {
        Value::Bulk(pair) => pair,
        other => {
            return Err(GraphMemError::invalid_response(format!(
                "Expected a typed value, got {:?}",
                other
            )))
        }
    };
    if pair.len() != 2 {
        return Err(GraphMemError::invalid_response(format!(
            "Typed value has {} parts, expected 2",
            pair.len()
        )));
    }
    let raw = pair.remove(1);
    let kind = match pair.remove(0) {
        Value::Int(kind) => kind,
        other => {
            return Err(GraphMemError::invalid_response(format!(
                "Value type tag is not an integer: {:?}",
                other
            )))
        }
    };

    match kind {
        tag::NULL => Ok(Json::Null),
        tag::STRING => Ok(Json::String(as_string(raw)?)),
        tag::INTEGER => match raw {
            Value::Int(i) => Ok(Json::from(i)),
            other => as_string(other)?
                .parse::<i64>()
                .map(Json::from)
                .map_err(|e| GraphMemError::invalid_response(format!("Bad integer: {}", e))),
        },
        tag::BOOLEAN => Ok(Json::Bool(as_string(raw)? == "true")),
        tag::DOUBLE => {
            let f: f64 = as_string(raw)?
                .parse()
                .map_err(|e| GraphMemError::invalid_response(format!("Bad double: {}", e)))?;
            Ok(Number::from_f64(f).map(Json::Number).unwrap_or(Json::Null))
        }
        tag::ARRAY => match raw {
            Value::Bulk(items) => Ok(Json::Array(
                items
                    .into_iter()
                    .map(decode_value)
                    .collect::<GraphMemResult<Vec<_>>>()?,
            )),
            _ => Ok(Json::Array(Vec::new())),
        },
        tag::MAP => {
            let Value::Bulk(items) = raw else {
                return Ok(Json::Object(Map::new()));
            };
            let mut map = Map::new();
            let mut items = items.into_iter();
            while let (Some(key), Some(value)) = (items.next(), items.next()) {
                map.insert(as_string(key)?, decode_value(value)?);
            }
            Ok(Json::Object(map))
        }
        // Entity internals need label/property name lookups; only the id is kept.
        tag::NODE | tag::EDGE => match raw {
            Value::Bulk(mut fields) if !fields.is_empty() => match fields.remove(0) {
                Value::Int(id) => Ok(serde_json::json!({ "id": id })),
                _ => Ok(Json::Null),
            },
            _ => Ok(Json::Null),
        },
        tag::POINT => match raw {
            Value::Bulk(coords) if coords.len() == 2 => {
                let mut coords = coords.into_iter();
                let lat = coords.next().map(as_string).transpose()?;
                let lon = coords.next().map(as_string).transpose()?;
                Ok(serde_json::json!({
                    "latitude": lat.and_then(|s| s.parse::<f64>().ok()),
                    "longitude": lon.and_then(|s| s.parse::<f64>().ok()),
                }))
            }
            _ => Ok(Json::Null),
        },
        tag::PATH => Ok(Json::Null),
        other => Err(GraphMemError::invalid_response(format!(
            "Unknown value type {}",
            other
        ))),
    }
}

/// Turn `["Nodes created: 1", ...]` into `{"Nodes created": "1", ...}`.
fn parse_stats(stats: Value) -> Json {
    let mut map = Map::new();
    if let Value::Bulk(lines) = stats {
        for line in lines {
            if let Ok(line) = as_string(line) {
                if let Some((key, value)) = line.split_once(':') {
                    map.insert(key.trim().to_string(), Json::String(value.trim().to_string()));
                }
            }
        }
    }
    Json::Object(map)
}

fn as_string(value: Value) -> GraphMemResult<String> {
    match value {
        Value::Data(bytes) => String::from_utf8(bytes)
            .map_err(|e| GraphMemError::invalid_response(format!("Invalid UTF-8: {}", e))),
        Value::Status(s) => Ok(s),
        Value::Int(i) => Ok(i.to_string()),
        Value::Okay => Ok("OK".to_string()),
        other => Err(GraphMemError::invalid_response(format!(
            "Expected a string, got {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tokio_test::assert_ok;

    fn data(s: &str) -> Value {
        Value::Data(s.as_bytes().to_vec())
    }

    fn typed(kind: i64, value: Value) -> Value {
        Value::Bulk(vec![Value::Int(kind), value])
    }

    #[test]
    fn test_query_without_params_is_unchanged() {
        assert_eq!(assert_ok!(build_query("RETURN 1", Params::new())), "RETURN 1");
    }

    #[test]
    fn test_params_rendered_as_literals() {
        let q = Query::new("MATCH (n {uuid: $uuid}) RETURN n")
            .param("uuid", "a\"b\\c")
            .param("limit", 5_i64)
            .param("ids", vec!["x", "y"])
            .param("missing", Option::<String>::None)
            .param("score", 0.5_f64);
        let text = build_query(&q.text, q.params).unwrap();

        assert_eq!(
            text,
            r#"CYPHER ids=["x", "y"] limit=5 missing=null score=0.5 uuid="a\"b\\c" MATCH (n {uuid: $uuid}) RETURN n"#
        );
    }

    #[test]
    fn test_datetime_params_become_strings() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let q = Query::new("RETURN $at").param("at", at);
        let text = build_query(&q.text, q.params).unwrap();
        assert_eq!(text, r#"CYPHER at="2024-05-01T12:00:00.000000Z" RETURN $at"#);
    }

    #[test]
    fn test_non_finite_float_rejected() {
        let q = Query::new("RETURN $x").param("x", f64::NAN);
        assert!(build_query(&q.text, q.params).unwrap_err().is_validation());
    }

    #[test]
    fn test_map_literal() {
        let mut out = String::new();
        let mut map = std::collections::BTreeMap::new();
        map.insert("name".to_string(), QueryValue::from("Alice"));
        map.insert("age".to_string(), QueryValue::from(30_i64));
        write_literal(&mut out, &QueryValue::Map(map)).unwrap();
        assert_eq!(out, r#"{age: 30, name: "Alice"}"#);
    }

    #[test]
    fn test_parse_result_set() {
        let reply = Value::Bulk(vec![
            Value::Bulk(vec![
                Value::Bulk(vec![Value::Int(1), data("name")]),
                Value::Bulk(vec![Value::Int(1), data("age")]),
                Value::Bulk(vec![Value::Int(1), data("tags")]),
            ]),
            Value::Bulk(vec![
                Value::Bulk(vec![
                    typed(tag::STRING, data("Alice")),
                    typed(tag::INTEGER, Value::Int(30)),
                    typed(
                        tag::ARRAY,
                        Value::Bulk(vec![typed(tag::STRING, data("a")), typed(tag::BOOLEAN, data("true"))]),
                    ),
                ]),
                // Short row: trailing columns missing.
                Value::Bulk(vec![typed(tag::STRING, data("Bob"))]),
            ]),
            Value::Bulk(vec![
                data("Cached execution: 0"),
                data("Query internal execution time: 0.2 milliseconds"),
            ]),
        ]);

        let result = parse_reply(reply).unwrap();
        assert_eq!(result.columns, vec!["name", "age", "tags"]);
        assert_eq!(result.len(), 2);
        assert_eq!(result.rows[0]["name"], "Alice");
        assert_eq!(result.rows[0]["age"], 30);
        assert_eq!(result.rows[0]["tags"], serde_json::json!(["a", true]));
        assert_eq!(result.rows[1]["name"], "Bob");
        assert_eq!(result.rows[1]["age"], Json::Null);
        assert_eq!(result.rows[1]["tags"], Json::Null);

        let summary = result.summary.unwrap();
        assert_eq!(summary["Cached execution"], "0");
    }

    #[test]
    fn test_parse_write_only_reply() {
        let reply = Value::Bulk(vec![Value::Bulk(vec![data("Nodes created: 2")])]);
        let result = parse_reply(reply).unwrap();
        assert!(result.is_empty());
        assert!(result.columns.is_empty());
        assert_eq!(result.summary.unwrap()["Nodes created"], "2");
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(decode_value(typed(tag::NULL, Value::Nil)).unwrap(), Json::Null);
        assert_eq!(
            decode_value(typed(tag::DOUBLE, data("1.5"))).unwrap(),
            serde_json::json!(1.5)
        );
        assert_eq!(
            decode_value(typed(tag::BOOLEAN, data("false"))).unwrap(),
            Json::Bool(false)
        );
        let map = typed(
            tag::MAP,
            Value::Bulk(vec![data("k"), typed(tag::INTEGER, Value::Int(7))]),
        );
        assert_eq!(decode_value(map).unwrap(), serde_json::json!({"k": 7}));
    }

    #[test]
    fn test_unexpected_reply_is_invalid_response() {
        let err = parse_reply(Value::Okay).unwrap_err();
        assert_eq!(
            err.code(),
            graphmem_core::error::ErrorCode::QryInvalidResponse
        );
        assert!(parse_reply(Value::Bulk(vec![Value::Nil, Value::Nil])).is_err());
    }
}
