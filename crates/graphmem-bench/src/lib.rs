//! Backend benchmarks for graphmem.
//!
//! Measures driver startup, connectivity, index build, a first episode
//! write, a fact search and episode-queue throughput for Neo4j and
//! FalkorDB, and prints a side-by-side comparison.

pub mod metrics;
pub mod runner;

pub use metrics::{comparison_report, format_comparison, summary, BenchmarkMetrics};
pub use runner::{benchmark_driver, benchmark_provider};
