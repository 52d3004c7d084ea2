//! graphmem-bench binary.
//!
//! ```text
//! graphmem-bench --database neo4j
//! graphmem-bench --database falkordb --episodes 50
//! graphmem-bench --compare
//! ```

use anyhow::{bail, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use graphmem_bench::{benchmark_provider, comparison_report, summary, BenchmarkMetrics};
use graphmem_core::{DatabaseConfig, GraphProvider};

/// Benchmark graphmem against Neo4j and FalkorDB.
#[derive(Parser, Debug)]
#[command(name = "graphmem-bench", version, about, long_about = None)]
struct Cli {
    /// Backend to benchmark: neo4j or falkordb.
    #[arg(long, conflicts_with = "compare")]
    database: Option<String>,

    /// Benchmark both backends and compare them.
    #[arg(long)]
    compare: bool,

    /// Episodes pushed through the episode queue for the throughput step.
    #[arg(long, default_value_t = 20)]
    episodes: usize,

    /// Print the metrics as JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Keep driver chatter out of the report
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .init();

    let cli = Cli::parse();
    let base = DatabaseConfig::from_env()?;

    let providers = if cli.compare {
        GraphProvider::ALL.to_vec()
    } else if let Some(name) = &cli.database {
        vec![GraphProvider::parse(name)?]
    } else {
        bail!("Please specify --database <neo4j|falkordb> or --compare");
    };

    let mut results: Vec<BenchmarkMetrics> = Vec::new();
    for provider in providers {
        let config = base.clone().with_provider(provider);
        if !cli.json {
            println!("{}", "=".repeat(60));
            println!("Benchmarking {}", provider.to_string().to_uppercase());
            println!("{}", "=".repeat(60));
        }
        let metrics = benchmark_provider(&config, cli.episodes).await;
        if !cli.json {
            for line in summary(&metrics) {
                println!("{}", line);
            }
        }
        results.push(metrics);
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if let [neo4j, falkordb] = results.as_slice() {
        println!("\n{}", "=".repeat(80));
        println!("PERFORMANCE COMPARISON");
        println!("{}", "=".repeat(80));
        for line in comparison_report(neo4j, falkordb) {
            println!("{}", line);
        }
        println!(
            "\nFalkorDB startup < 5s: {} ({:.2}s)",
            if falkordb.startup_target_met() { "PASSED" } else { "FAILED" },
            falkordb.startup_secs
        );
    }

    if results.iter().any(|m| !m.succeeded()) {
        bail!("Benchmark failed for at least one backend");
    }
    Ok(())
}
