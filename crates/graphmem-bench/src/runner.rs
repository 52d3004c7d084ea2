//! Runs the benchmark steps against one backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, warn};

use graphmem_core::{
    DatabaseConfig, EpisodeInput, EpisodeQueue, GraphDriver, GraphMemResult, GraphMemory,
    QueueConfig, SearchRequest,
};
use graphmem_drivers::DriverFactory;

use crate::metrics::BenchmarkMetrics;

pub const BENCHMARK_GROUP: &str = "benchmark_group";
const QUEUE_GROUP: &str = "benchmark_queue";

/// Connect with `config`, then run every step. Failures are recorded in the
/// returned metrics rather than returned.
pub async fn benchmark_provider(config: &DatabaseConfig, episodes: usize) -> BenchmarkMetrics {
    let mut metrics = BenchmarkMetrics::new(config.provider);

    let started = Instant::now();
    let driver = match DriverFactory::create(config).await {
        Ok(driver) => driver,
        Err(e) => {
            metrics.startup_secs = started.elapsed().as_secs_f64();
            metrics.error = Some(e.to_string());
            return metrics;
        }
    };
    metrics.startup_secs = started.elapsed().as_secs_f64();

    benchmark_driver(driver.clone(), episodes, &mut metrics).await;
    if let Err(e) = driver.close().await {
        warn!(provider = %config.provider, error = %e, "Failed to close driver");
    }
    metrics
}

/// Time connectivity, index build, one write, one search and queue
/// throughput on an already connected driver.
pub async fn benchmark_driver(
    driver: Arc<dyn GraphDriver>,
    episodes: usize,
    metrics: &mut BenchmarkMetrics,
) {
    if let Err(e) = run_steps(driver, episodes, metrics).await {
        warn!(provider = %metrics.provider, error = %e, "Benchmark step failed");
        metrics.error = Some(e.to_string());
    }
}

async fn run_steps(
    driver: Arc<dyn GraphDriver>,
    episodes: usize,
    metrics: &mut BenchmarkMetrics,
) -> GraphMemResult<()> {
    let memory = Arc::new(GraphMemory::without_extraction(driver.clone()));

    let (_, elapsed) = timed(driver.verify_connectivity()).await?;
    metrics.connection_secs = Some(elapsed.as_secs_f64());

    let (_, elapsed) = timed(memory.build_indices()).await?;
    metrics.index_build_secs = Some(elapsed.as_secs_f64());

    let first = EpisodeInput::new(
        "Benchmark Test",
        "This is a test episode for benchmarking.",
        BENCHMARK_GROUP,
    )
    .with_reference_time(Utc::now());
    let (_, elapsed) = timed(memory.add_episode(first, &[])).await?;
    metrics.first_operation_secs = Some(elapsed.as_secs_f64());

    let request =
        SearchRequest::new("benchmark test", vec![BENCHMARK_GROUP.to_string()]).with_limit(5);
    let (facts, elapsed) = timed(memory.search_facts(&request)).await?;
    metrics.search_secs = Some(elapsed.as_secs_f64());
    metrics.search_results = facts.len();

    if episodes > 0 {
        metrics.queue_throughput = Some(queue_throughput(&memory, episodes).await);
    }

    info!(provider = %metrics.provider, "Benchmark steps complete");
    Ok(())
}

/// Episodes per second written through the episode queue for one group.
async fn queue_throughput(memory: &Arc<GraphMemory>, episodes: usize) -> f64 {
    let queue = EpisodeQueue::new(&QueueConfig::default());
    let started = Instant::now();

    for i in 0..episodes {
        let memory = Arc::clone(memory);
        let input = EpisodeInput::new(
            format!("Queued Episode {}", i),
            format!("Queued benchmark episode number {}.", i),
            QUEUE_GROUP,
        );
        queue.submit(QUEUE_GROUP, format!("bench-{}", i), move || async move {
            memory
                .add_episode(input.with_reference_time(Utc::now()), &[])
                .await
                .map(|_| ())
        });
    }
    queue.join(QUEUE_GROUP).await;

    let elapsed = started.elapsed().as_secs_f64();
    queue.shutdown().await;
    if elapsed > 0.0 {
        episodes as f64 / elapsed
    } else {
        0.0
    }
}

async fn timed<T>(
    fut: impl std::future::Future<Output = GraphMemResult<T>>,
) -> GraphMemResult<(T, Duration)> {
    let started = Instant::now();
    let value = fut.await?;
    Ok((value, started.elapsed()))
}
