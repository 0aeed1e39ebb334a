//! Threaded streaming graph and the file based receiver built on it.

pub mod blocks;
pub mod io;
pub mod msc_graph;

pub use blocks::{Block, TopBlock};
pub use io::{ByteFileSink, ByteFileSource, VectorFileSink, VectorFileSource};
pub use msc_graph::{MscFlowgraph, RunSummary, TaggedSymbols};
