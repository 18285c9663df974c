//! Core persistence layer for a local-first knowledge base: document
//! metadata, block-tree storage, tags, configuration, the vector store, and
//! a filesystem watcher. `nook_rag` builds extraction/chunking/search on
//! top of the types exported here; `nook_mcp` and the root `nook` crate
//! expose it over JSON-RPC and a CLI respectively.

pub mod atomic;
pub mod config;
pub mod document;
pub mod error;
pub mod path_layout;
pub mod tags;
pub mod vector;
pub mod watcher;

pub use error::{Error, Result};
pub use path_layout::PathLayout;
