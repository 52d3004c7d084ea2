//! Core types for graphmem.

mod graph;
mod query;

pub use graph::*;
pub use query::*;
