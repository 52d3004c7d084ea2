//! Tool behaviour of the MCP server against a mocked driver.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mockall::mock;
use serde_json::json;

use graphmem_core::{
    EpisodeQueue, GraphDriver, GraphMemError, GraphMemResult, GraphMemory, GraphProvider, Query,
    QueryResult, QueryValue, QueueConfig, Record, ServerConfig,
};
use graphmem_mcp::tools::{AddMemoryInput, GetEpisodesInput, SearchFactsInput, SearchNodesInput};
use graphmem_mcp::GraphMemServer;

mock! {
    pub Driver {}

    #[async_trait]
    impl GraphDriver for Driver {
        fn provider(&self) -> GraphProvider;
        fn database(&self) -> String;
        async fn execute(&self, query: Query) -> GraphMemResult<QueryResult>;
        async fn close(&self) -> GraphMemResult<()>;
        async fn with_database(&self, database: &str) -> GraphMemResult<Arc<dyn GraphDriver>>;
        async fn verify_connectivity(&self) -> GraphMemResult<()>;
    }
}

fn rows(values: Vec<serde_json::Value>) -> QueryResult {
    let rows: Vec<Record> = values
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect();
    QueryResult {
        rows,
        columns: Vec::new(),
        summary: None,
    }
}

fn server_with(
    log: Arc<Mutex<Vec<Query>>>,
    respond: impl Fn(&Query) -> GraphMemResult<QueryResult> + Send + Sync + 'static,
    config: ServerConfig,
) -> (GraphMemServer, EpisodeQueue) {
    let mut driver = MockDriver::new();
    driver.expect_provider().return_const(GraphProvider::FalkorDb);
    driver.expect_database().return_const("default_db".to_string());
    driver.expect_execute().returning(move |query| {
        let result = respond(&query);
        log.lock().unwrap().push(query);
        result
    });
    driver
        .expect_verify_connectivity()
        .returning(|| Err(GraphMemError::connection("connection refused")));

    let memory = Arc::new(GraphMemory::without_extraction(Arc::new(driver)));
    let queue = EpisodeQueue::new(&QueueConfig::default());
    let server = GraphMemServer::new(memory, queue.clone(), Arc::new(config));
    (server, queue)
}

fn config(group_id: &str) -> ServerConfig {
    ServerConfig {
        group_id: group_id.to_string(),
        ..ServerConfig::default()
    }
}

fn add_input(name: &str, group_id: Option<&str>) -> AddMemoryInput {
    serde_json::from_value(json!({
        "name": name,
        "episode_body": "Alice joined Acme",
        "group_id": group_id,
    }))
    .unwrap()
}

#[tokio::test]
async fn test_add_memory_uses_configured_group_and_processes_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (server, queue) = server_with(log.clone(), |_| Ok(QueryResult::empty()), config("team"));

    let first = server.queue_episode(add_input("first", None));
    let second = server.queue_episode(add_input("second", Some("")));
    assert_eq!(first.group_id, "team");
    assert_eq!(second.group_id, "team");
    assert_eq!(first.position, 1);

    queue.join("team").await;

    let names: Vec<QueryValue> = log
        .lock()
        .unwrap()
        .iter()
        .filter(|q| q.text.contains("MERGE (e:Episodic"))
        .map(|q| q.params["name"].clone())
        .collect();
    assert_eq!(
        names,
        vec![QueryValue::from("first"), QueryValue::from("second")]
    );
    queue.shutdown().await;
}

#[tokio::test]
async fn test_add_memory_maps_source_and_uuid() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (server, queue) = server_with(log.clone(), |_| Ok(QueryResult::empty()), config("team"));

    let input: AddMemoryInput = serde_json::from_value(json!({
        "name": "crm",
        "episode_body": "{\"customer\": \"Acme\"}",
        "group_id": "sales",
        "source": "JSON",
        "source_description": "CRM export",
        "uuid": "ep-42"
    }))
    .unwrap();
    server.queue_episode(input);
    queue.join("sales").await;

    let log = log.lock().unwrap();
    let save = log
        .iter()
        .find(|q| q.text.contains("MERGE (e:Episodic"))
        .expect("episode written");
    assert_eq!(save.params["uuid"], QueryValue::from("ep-42"));
    assert_eq!(save.params["source"], QueryValue::from("json"));
    assert_eq!(save.params["group_id"], QueryValue::from("sales"));
    assert_eq!(save.params["source_description"], QueryValue::from("CRM export"));
    drop(log);
    queue.shutdown().await;
}

#[tokio::test]
async fn test_failed_write_does_not_block_later_episodes() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (server, queue) = server_with(
        log.clone(),
        |q| match q.params.get("name") {
            Some(QueryValue::String(name)) if name == "broken" => {
                Err(GraphMemError::query("constraint violated"))
            }
            _ => Ok(QueryResult::empty()),
        },
        config("team"),
    );

    server.queue_episode(add_input("broken", None));
    server.queue_episode(add_input("after", None));
    queue.join("team").await;

    assert_eq!(queue.pending("team"), 0);
    let written = log
        .lock()
        .unwrap()
        .iter()
        .filter(|q| q.params.get("name") == Some(&QueryValue::from("after")))
        .count();
    assert_eq!(written, 1);
    queue.shutdown().await;
}

#[tokio::test]
async fn test_search_nodes_defaults_group_and_entity_filter() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (server, _queue) = server_with(
        log.clone(),
        |_| {
            Ok(rows(vec![json!({
                "uuid": "n1",
                "name": "Acme",
                "summary": "A company",
                "labels": ["Entity", "Preference"],
                "group_id": "team",
                "created_at": "2024-05-01T12:00:00Z",
                "attributes": "{}"
            })]))
        },
        config("team"),
    );

    let input: SearchNodesInput =
        serde_json::from_value(json!({"query": "acme", "entity": "Preference"})).unwrap();
    let output = server.find_nodes(input).await.unwrap();

    assert_eq!(output.message, "Nodes retrieved successfully");
    assert_eq!(output.nodes.len(), 1);
    let log = log.lock().unwrap();
    assert_eq!(
        log[0].params["group_ids"],
        QueryValue::from(vec!["team".to_string()])
    );
    assert_eq!(log[0].params["label"], QueryValue::from("Preference"));
}

#[tokio::test]
async fn test_search_facts_rejects_zero_limit() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (server, _queue) = server_with(log.clone(), |_| Ok(QueryResult::empty()), config("team"));

    let input: SearchFactsInput =
        serde_json::from_value(json!({"query": "acme", "max_facts": 0})).unwrap();
    let err = server.find_facts(input).await.unwrap_err();
    assert!(err.is_validation());
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_search_facts_empty_message() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (server, _queue) = server_with(log, |_| Ok(QueryResult::empty()), config("team"));

    let input: SearchFactsInput = serde_json::from_value(json!({"query": "nothing"})).unwrap();
    let output = server.find_facts(input).await.unwrap();
    assert_eq!(output.message, "No relevant facts found");
    assert!(output.facts.is_empty());
}

#[tokio::test]
async fn test_get_episodes_for_empty_group() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (server, _queue) = server_with(log, |_| Ok(QueryResult::empty()), config("team"));

    let output = server
        .recent_episodes(GetEpisodesInput {
            group_id: None,
            last_n: 5,
        })
        .await
        .unwrap();
    assert_eq!(output.message, "No episodes found for group team");
}

#[tokio::test]
async fn test_reset_graph_clears_then_rebuilds_indices() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (server, _queue) = server_with(log.clone(), |_| Ok(QueryResult::empty()), config("team"));

    let output = server.reset_graph().await.unwrap();
    assert_eq!(output.message, "Graph cleared successfully and indices rebuilt");

    let log = log.lock().unwrap();
    assert_eq!(log[0].text, "MATCH (n) DETACH DELETE n");
    assert!(log.len() > 1);
    assert!(log[1..].iter().all(|q| q.text.contains("INDEX")));
}

#[tokio::test]
async fn test_status_reports_connection_failure() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (server, _queue) = server_with(log, |_| Ok(QueryResult::empty()), config("team"));

    let status = server.status().await;
    assert_eq!(status.status, "error");
    assert!(status
        .message
        .starts_with("Server is running but falkordb connection failed"));
}
