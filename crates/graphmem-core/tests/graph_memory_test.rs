//! Integration tests for the graph memory service against a mocked driver.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mockall::mock;
use serde_json::json;
use tokio_test::assert_ok;

use graphmem_core::{
    EntityExtractor, EntityType, EpisodeInput, EpisodeSource, ErrorCode, ExtractedEntity,
    ExtractedFact, Extraction, GraphDriver, GraphMemResult, GraphMemory, GraphProvider, Query,
    QueryResult, QueryValue, Record, SearchRequest,
};

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
    let columns = rows
        .first()
        .map(|r| r.keys().cloned().collect())
        .unwrap_or_default();
    QueryResult {
        rows,
        columns,
        summary: None,
    }
}

fn edge_row(uuid: &str) -> serde_json::Value {
    json!({
        "uuid": uuid,
        "name": "WORKS_AT",
        "fact": "Alice works at Acme",
        "group_id": "g1",
        "source_node_uuid": "n-alice",
        "target_node_uuid": "n-acme",
        "created_at": "2024-05-01T12:00:00.000000Z",
        "valid_at": "2024-05-01T12:00:00.000000Z",
        "invalid_at": null,
        "episodes": ["ep-1"]
    })
}

/// Driver that records every query and answers from a closure.
fn recording_driver(
    provider: GraphProvider,
    log: Arc<Mutex<Vec<Query>>>,
    respond: impl Fn(&Query) -> GraphMemResult<QueryResult> + Send + Sync + 'static,
) -> MockDriver {
    let mut driver = MockDriver::new();
    driver.expect_provider().return_const(provider);
    driver.expect_database().return_const("test_db".to_string());
    driver.expect_execute().returning(move |query| {
        let result = respond(&query);
        log.lock().unwrap().push(query);
        result
    });
    driver
}

struct FixedExtractor(Extraction);

#[async_trait]
impl EntityExtractor for FixedExtractor {
    async fn extract(
        &self,
        _episode: &EpisodeInput,
        _entity_types: &[EntityType],
    ) -> GraphMemResult<Extraction> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

#[tokio::test]
async fn test_build_indices_uses_provider_statements() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let driver = recording_driver(GraphProvider::FalkorDb, log.clone(), |_| {
        Ok(QueryResult::empty())
    });
    let memory = GraphMemory::without_extraction(Arc::new(driver));

    assert_ok!(memory.build_indices().await);

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 7);
    assert!(log.iter().all(|q| q.text.starts_with("CREATE INDEX FOR")));
}

#[tokio::test]
async fn test_add_episode_writes_episode_entities_and_facts() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let driver = recording_driver(GraphProvider::Neo4j, log.clone(), |query| {
        if query.text.contains("RELATES_TO {") {
            Ok(rows(vec![json!({"uuid": "f1"})]))
        } else {
            Ok(QueryResult::empty())
        }
    });
    let extraction = Extraction {
        entities: vec![
            ExtractedEntity::new("Alice").with_summary("An engineer"),
            ExtractedEntity::new("Acme").with_label("Organization"),
        ],
        facts: vec![ExtractedFact {
            source: "Alice".into(),
            target: "Acme".into(),
            name: "WORKS_AT".into(),
            fact: "Alice works at Acme".into(),
        }],
    };
    let memory = GraphMemory::new(Arc::new(driver), Arc::new(FixedExtractor(extraction)));

    let input = EpisodeInput::new("standup", "Alice works at Acme", "g1")
        .with_source_description("notes")
        .with_uuid("ep-1");
    let written = memory.add_episode(input, &[]).await.unwrap();

    assert_eq!(written.episode.uuid, "ep-1");
    assert_eq!(written.episode.group_id, "g1");
    assert_eq!(written.episode.source, EpisodeSource::Text);
    assert_eq!(written.entities, 2);
    assert_eq!(written.facts, 1);

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 4);
    assert!(log[0].text.contains("MERGE (e:Episodic {uuid: $uuid})"));
    assert_eq!(log[0].params["uuid"], QueryValue::from("ep-1"));
    assert_eq!(log[0].params["source"], QueryValue::from("text"));
    assert!(log[1].text.contains("MERGE (n:Entity"));
    assert_eq!(log[2].params["labels"], QueryValue::from(vec!["Entity", "Organization"]));
    assert_eq!(log[3].params["episode_uuid"], QueryValue::from("ep-1"));
}

#[tokio::test]
async fn test_add_episode_rejects_invalid_json_body() {
    let driver = MockDriver::new();
    let memory = GraphMemory::without_extraction(Arc::new(driver));

    let input = EpisodeInput::new("crm", "{broken", "g1").with_source(EpisodeSource::Json);
    let err = memory.add_episode(input, &[]).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ParseInvalidValue);
}

#[tokio::test]
async fn test_search_facts_lowercases_query_and_scopes_groups() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let driver = recording_driver(GraphProvider::Neo4j, log.clone(), |_| {
        Ok(rows(vec![edge_row("e1")]))
    });
    let memory = GraphMemory::without_extraction(Arc::new(driver));

    let request = SearchRequest::new("ACME", vec!["g1".into(), "g2".into()]).with_limit(5);
    let facts = memory.search_facts(&request).await.unwrap();

    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].fact, "Alice works at Acme");
    assert_eq!(facts[0].invalid_at, None);
    assert_eq!(facts[0].episodes, vec!["ep-1"]);

    let log = log.lock().unwrap();
    assert_eq!(log[0].params["query"], QueryValue::from("acme"));
    assert_eq!(log[0].params["group_ids"], QueryValue::from(vec!["g1", "g2"]));
    assert!(log[0].text.ends_with("LIMIT 5"));
}

#[tokio::test]
async fn test_search_facts_rejects_zero_limit() {
    let memory = GraphMemory::without_extraction(Arc::new(MockDriver::new()));
    let request = SearchRequest::new("acme", vec!["g1".into()]).with_limit(0);
    let err = memory.search_facts(&request).await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_centered_node_search_orders_by_distance() {
    let driver = recording_driver(GraphProvider::FalkorDb, Arc::default(), |query| {
        if query.text.contains("min(length(p))") {
            Ok(rows(vec![
                json!({"uuid": "near", "distance": 1}),
                json!({"uuid": "far", "distance": 2}),
            ]))
        } else {
            Ok(rows(vec![
                json!({"uuid": "far", "name": "Far", "group_id": "g1",
                       "created_at": "2024-01-02", "labels": ["Entity"], "attributes": "{}"}),
                json!({"uuid": "near", "name": "Near", "group_id": "g1",
                       "created_at": "2024-01-01", "labels": ["Entity"],
                       "attributes": "{\"kind\": \"person\"}"}),
            ]))
        }
    });
    let memory = GraphMemory::without_extraction(Arc::new(driver));

    let request = SearchRequest::new("", vec!["g1".into()]).with_center("center");
    let nodes = memory.search_nodes(&request).await.unwrap();

    let names: Vec<_> = nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["Near", "Far"]);
    assert_eq!(nodes[0].attributes["kind"], "person");
}

#[tokio::test]
async fn test_get_entity_edge_not_found() {
    let driver = recording_driver(GraphProvider::Neo4j, Arc::default(), |_| {
        Ok(QueryResult::empty())
    });
    let memory = GraphMemory::without_extraction(Arc::new(driver));

    let err = memory.get_entity_edge("missing").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NfEdge);
}

#[tokio::test]
async fn test_delete_entity_edge_checks_existence_first() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let driver = recording_driver(GraphProvider::Neo4j, log.clone(), |query| {
        if query.text.contains("DELETE r") {
            Ok(QueryResult::empty())
        } else {
            Ok(rows(vec![edge_row("e1")]))
        }
    });
    let memory = GraphMemory::without_extraction(Arc::new(driver));

    assert_ok!(memory.delete_entity_edge("e1").await);

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 2);
    assert!(log[1].text.contains("DELETE r"));
}

#[tokio::test]
async fn test_delete_episode_not_found() {
    let driver = recording_driver(GraphProvider::FalkorDb, Arc::default(), |_| {
        Ok(QueryResult::empty())
    });
    let memory = GraphMemory::without_extraction(Arc::new(driver));

    let err = memory.delete_episode("missing").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NfEpisode);
}

#[tokio::test]
async fn test_get_episodes_decodes_rows() {
    let driver = recording_driver(GraphProvider::Neo4j, Arc::default(), |_| {
        Ok(rows(vec![json!({
            "uuid": "ep-2",
            "name": "later",
            "content": "{\"a\": 1}",
            "source": "json",
            "source_description": "",
            "group_id": "g1",
            "created_at": "2024-05-02T00:00:00Z",
            "valid_at": "2024-05-02T00:00:00Z"
        })]))
    });
    let memory = GraphMemory::without_extraction(Arc::new(driver));

    let episodes = memory.get_episodes("g1", 10).await.unwrap();
    assert_eq!(episodes.len(), 1);
    assert_eq!(episodes[0].source, EpisodeSource::Json);

    assert!(memory.get_episodes("g1", 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_status_reports_failures_without_erroring() {
    let mut driver = MockDriver::new();
    driver.expect_provider().return_const(GraphProvider::FalkorDb);
    driver.expect_database().return_const("default_db".to_string());
    driver
        .expect_verify_connectivity()
        .returning(|| Err(graphmem_core::GraphMemError::connection("refused")));
    let memory = GraphMemory::without_extraction(Arc::new(driver));

    let status = memory.status().await;
    assert!(!status.ok);
    assert_eq!(status.database, "default_db");
    assert!(status.message.contains("falkordb connection failed"));
}
