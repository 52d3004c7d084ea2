//! Benchmark steps against a mocked driver.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mockall::mock;

use graphmem_bench::{benchmark_driver, BenchmarkMetrics};
use graphmem_core::{GraphDriver, GraphMemError, GraphMemResult, GraphProvider, Query, QueryResult};

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

fn driver(log: Arc<Mutex<Vec<Query>>>, connected: bool) -> MockDriver {
    let mut driver = MockDriver::new();
    driver.expect_provider().return_const(GraphProvider::FalkorDb);
    driver.expect_database().return_const("benchmark_db".to_string());
    driver.expect_verify_connectivity().returning(move || {
        if connected {
            Ok(())
        } else {
            Err(GraphMemError::connection("connection refused"))
        }
    });
    driver.expect_execute().returning(move |query| {
        log.lock().unwrap().push(query);
        Ok(QueryResult::empty())
    });
    driver
}

#[tokio::test]
async fn test_all_steps_are_timed() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut metrics = BenchmarkMetrics::new(GraphProvider::FalkorDb);

    benchmark_driver(Arc::new(driver(log.clone(), true)), 5, &mut metrics).await;

    assert!(metrics.succeeded());
    assert!(metrics.connection_secs.is_some());
    assert!(metrics.index_build_secs.is_some());
    assert!(metrics.first_operation_secs.is_some());
    assert!(metrics.search_secs.is_some());
    assert_eq!(metrics.search_results, 0);
    assert!(metrics.queue_throughput.is_some());

    let episode_writes = log
        .lock()
        .unwrap()
        .iter()
        .filter(|q| q.text.contains("MERGE (e:Episodic"))
        .count();
    // One direct write plus five through the queue
    assert_eq!(episode_writes, 6);
}

#[tokio::test]
async fn test_connection_failure_stops_the_run() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut metrics = BenchmarkMetrics::new(GraphProvider::FalkorDb);

    benchmark_driver(Arc::new(driver(log.clone(), false)), 5, &mut metrics).await;

    assert!(!metrics.succeeded());
    assert!(metrics.error.as_deref().unwrap().contains("connection refused"));
    assert!(metrics.index_build_secs.is_none());
    assert!(log.lock().unwrap().is_empty());
}
