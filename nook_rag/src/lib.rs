//! Extraction, chunking, embedding and search for the Nook retrieval
//! engine, built on the persistence primitives `nook_core` exports.
//!
//! `facade::RetrievalFacade` is the single entry point that wires these
//! pieces together; `nook_mcp` and the root `nook` binary both depend on
//! this crate rather than on each other.

pub mod block_extractor;
pub mod chunker;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod facade;
pub mod indexer;
pub mod lexical;
pub mod searcher;
pub mod types;

pub use error::{RagError, Result};
pub use facade::RetrievalFacade;
