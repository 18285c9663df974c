//! Vector storage: id scheme (`types`) and the SQLite-backed store
//! (`sqlite_store`) — spec.md §3, §4.5.

mod sqlite_store;
mod types;

pub use sqlite_store::{cosine_similarity, IndexStats, SearchFilter, SearchHit, VectorStore};
pub use types::{
    aggregated_chunk_id, external_chunk_id, parse_chunk_id, plain_chunk_id, ChunkVector,
    ExternalContent, ExternalKind, ParsedChunkId,
};
