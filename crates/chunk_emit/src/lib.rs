//! Chunk planning and printing.
//!
//! The planner partitions live modules into output chunks and orders them;
//! the printer stitches per-module text into the final bundle with a
//! runtime prelude, in the requested output format, tracking source-map
//! segments as it goes.

pub mod chunk;
pub mod printer;
pub mod rewrite;
pub mod runtime;
pub mod source_map;

pub use chunk::{plan_chunks, Chunk, ChunkMode};
pub use printer::{print_chunk, CrossChunkImport, OutputFormat, PrintOptions, PrintedChunk};
pub use source_map::SourceMapBuilder;
