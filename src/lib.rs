//! Process wiring for the `nook` binary: CLI argument parsing and the
//! small amount of glue between `nook_rag::RetrievalFacade` and
//! `nook_mcp::serve`. The retrieval and persistence logic itself lives in
//! `nook_core` and `nook_rag`; this crate only assembles them.

pub mod cli;

pub use cli::{run, Cli, Command};
