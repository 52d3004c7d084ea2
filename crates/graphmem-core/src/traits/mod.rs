//! Core traits for graphmem backends and collaborators.

mod extractor;
mod graph_driver;

pub use extractor::*;
pub use graph_driver::*;
