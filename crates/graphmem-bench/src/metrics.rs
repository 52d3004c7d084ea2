//! Benchmark measurements and the side-by-side report.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use graphmem_core::GraphProvider;

/// Startup must finish within this for the startup target to pass.
pub const STARTUP_TARGET: Duration = Duration::from_secs(5);

/// Timings collected for one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkMetrics {
    pub provider: GraphProvider,
    /// Driver creation, including configuration validation and connect.
    pub startup_secs: f64,
    pub connection_secs: Option<f64>,
    pub index_build_secs: Option<f64>,
    pub first_operation_secs: Option<f64>,
    pub search_secs: Option<f64>,
    pub search_results: usize,
    /// Episodes per second pushed through the episode queue.
    pub queue_throughput: Option<f64>,
    pub error: Option<String>,
}

impl BenchmarkMetrics {
    pub fn new(provider: GraphProvider) -> Self {
        Self {
            provider,
            startup_secs: 0.0,
            connection_secs: None,
            index_build_secs: None,
            first_operation_secs: None,
            search_secs: None,
            search_results: 0,
            queue_throughput: None,
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    pub fn startup_target_met(&self) -> bool {
        self.succeeded() && self.startup_secs < STARTUP_TARGET.as_secs_f64()
    }
}

/// One line comparing a Neo4j and a FalkorDB measurement.
///
/// A missing or zero value on either side yields `N/A`, since no relative
/// change can be computed.
pub fn format_comparison(
    label: &str,
    neo4j: Option<f64>,
    falkordb: Option<f64>,
    unit: &str,
    lower_is_better: bool,
) -> String {
    let (neo, falkor) = match (neo4j, falkordb) {
        (Some(n), Some(f)) if n != 0.0 && f != 0.0 => (n, f),
        _ => return format!("{:<25} Neo4j: N/A, FalkorDB: N/A", label),
    };

    let (change, falkor_wins) = if lower_is_better {
        ((neo - falkor) / neo * 100.0, falkor < neo)
    } else {
        ((falkor - neo) / neo * 100.0, falkor > neo)
    };
    let winner = if falkor_wins { "FalkorDB" } else { "Neo4j" };

    format!(
        "{:<25} Neo4j: {:.3}{unit}, FalkorDB: {:.3}{unit} ({:+.1}%) faster: {}",
        label,
        neo,
        falkor,
        change,
        winner,
        unit = unit
    )
}

/// The comparison table for a Neo4j run and a FalkorDB run.
pub fn comparison_report(neo4j: &BenchmarkMetrics, falkordb: &BenchmarkMetrics) -> Vec<String> {
    let mut lines = vec![
        format_comparison(
            "Startup Time",
            Some(neo4j.startup_secs),
            Some(falkordb.startup_secs),
            "s",
            true,
        ),
        format_comparison(
            "Connection Time",
            neo4j.connection_secs,
            falkordb.connection_secs,
            "s",
            true,
        ),
        format_comparison(
            "Index Build",
            neo4j.index_build_secs,
            falkordb.index_build_secs,
            "s",
            true,
        ),
    ];
    if neo4j.first_operation_secs.is_some() && falkordb.first_operation_secs.is_some() {
        lines.push(format_comparison(
            "First Operation",
            neo4j.first_operation_secs,
            falkordb.first_operation_secs,
            "s",
            true,
        ));
    }
    if neo4j.search_secs.is_some() && falkordb.search_secs.is_some() {
        lines.push(format_comparison(
            "Search Operation",
            neo4j.search_secs,
            falkordb.search_secs,
            "s",
            true,
        ));
    }
    if neo4j.queue_throughput.is_some() && falkordb.queue_throughput.is_some() {
        lines.push(format_comparison(
            "Queue Throughput",
            neo4j.queue_throughput,
            falkordb.queue_throughput,
            " ep/s",
            false,
        ));
    }
    lines
}

/// Summary lines for one backend's run.
pub fn summary(metrics: &BenchmarkMetrics) -> Vec<String> {
    let mut lines = vec![format!(
        "{} startup: {:.3}s",
        metrics.provider, metrics.startup_secs
    )];
    let timed = [
        ("connection", metrics.connection_secs),
        ("index build", metrics.index_build_secs),
        ("first add_episode", metrics.first_operation_secs),
        ("search", metrics.search_secs),
    ];
    for (label, value) in timed {
        if let Some(secs) = value {
            lines.push(format!("{} {}: {:.3}s", metrics.provider, label, secs));
        }
    }
    if metrics.search_secs.is_some() {
        lines.push(format!(
            "{} search results: {}",
            metrics.provider, metrics.search_results
        ));
    }
    if let Some(rate) = metrics.queue_throughput {
        lines.push(format!(
            "{} queue throughput: {:.1} episodes/s",
            metrics.provider, rate
        ));
    }
    if let Some(error) = &metrics.error {
        lines.push(format!("{} failed: {}", metrics.provider, error));
    }
    lines
}
