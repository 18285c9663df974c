//! `RetrievalFacade` — the single public entry point aggregating
//! persistence, indexing, and search (spec.md §4.11, §6). The UI, the
//! `nook_mcp` tool host, and the root `nook` CLI all go through this and
//! nothing else: it is the only component allowed to hold Indexer +
//! VectorStore + Searcher concurrently, enforcing the single-writer
//! invariant spec.md §5 requires.

use std::sync::{Arc, RwLock};

use nook_core::config::{self, EmbeddingConfig};
use nook_core::document::{Block, BlockKind, Document, DocumentContent, DocumentRepo, DocumentStore};
use nook_core::path_layout::PathLayout;
use nook_core::tags::{Tag, TagStore};
use nook_core::vector::{ExternalContent, ExternalKind, SearchFilter, VectorStore};
use nook_core::watcher::{ChangeKind, FileWatcher, WatchEvent};

use crate::embedding::{self, EmbeddingClient};
use crate::error::{RagError, Result};
use crate::indexer::{IndexReport, Indexer, ReindexProgress};
use crate::lexical::LexicalIndex;
use crate::searcher::{DocVector, DocumentGraph, DocumentHit, ChunkHit, LexicalHit, Searcher};

/// Aggregate read-only status surfaced by `get_rag_status` (spec.md §4.5
/// `stats()` plus the document count the VectorStore doesn't own).
pub use nook_core::vector::IndexStats;

pub struct RetrievalFacade {
    layout: PathLayout,
    document_repo: Arc<DocumentRepo>,
    document_store: Arc<DocumentStore>,
    tag_store: Arc<TagStore>,
    vector_store: Arc<VectorStore>,
    lexical: Arc<LexicalIndex>,
    indexer: Arc<Indexer>,
    searcher: Arc<Searcher>,
    embedding_client: Arc<dyn EmbeddingClient>,
    config: RwLock<EmbeddingConfig>,
    _watcher: Option<FileWatcher>,
}

impl RetrievalFacade {
    /// Open (or create) the knowledge base rooted at `layout`: load
    /// configuration, probe the embedding model's dimensionality, and
    /// bootstrap the vector store against it (spec.md §4.5 "Dimension
    /// lock" — a mismatch here is a hard, surfaced error, never
    /// auto-recovered).
    pub async fn open(layout: PathLayout) -> Result<Self> {
        layout.ensure_dirs()?;

        let config = config::load_embedding_config(&layout)?;
        config.validate()?;
        let embedding_client: Arc<dyn EmbeddingClient> = Arc::from(embedding::client_for(&config));
        let dimension = embedding_client.dimension().await?;

        let document_repo = Arc::new(DocumentRepo::open(layout.clone())?);
        let document_store = Arc::new(DocumentStore::new(layout.clone()));
        let tag_store = Arc::new(TagStore::open(layout.clone())?);
        let vector_store = Arc::new(VectorStore::bootstrap(
            &layout.vectors_db(),
            dimension,
            &config.model,
            provider_name(&config),
        )?);
        let lexical = Arc::new(LexicalIndex::new());

        let indexer = Arc::new(Indexer::new(
            vector_store.clone(),
            lexical.clone(),
            document_repo.clone(),
            document_store.clone(),
            embedding_client.clone(),
            config.max_chunk_size,
            config.overlap,
        ));
        let searcher = Arc::new(Searcher::new(
            vector_store.clone(),
            lexical.clone(),
            document_repo.clone(),
            embedding_client.clone(),
        ));

        Ok(Self {
            layout,
            document_repo,
            document_store,
            tag_store,
            vector_store,
            lexical,
            indexer,
            searcher,
            embedding_client,
            config: RwLock::new(config),
            _watcher: None,
        })
    }

    /// Start the filesystem watcher and return the event receiver; the
    /// caller pumps `on_watch_event` over it on whatever task runs the
    /// process's main loop (spec.md §4.10, §5 — watcher events never fire
    /// from inside a store transaction).
    pub fn start_watching(&mut self) -> Result<tokio::sync::mpsc::UnboundedReceiver<WatchEvent>> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let watcher = FileWatcher::start(self.layout.base(), tx)?;
        self._watcher = Some(watcher);
        Ok(rx)
    }

    /// React to one debounced watcher event: reindex on write/rename,
    /// prune on remove, reload-only on an `index.json` change (spec.md
    /// §4.6.3). Reloading the repo itself happens in the caller, since
    /// `DocumentRepo` already re-reads from disk on next `list()`/`get()`
    /// only if asked to — here we simply skip acting on it.
    pub async fn on_watch_event(&self, event: &WatchEvent) -> Result<()> {
        if event.is_index {
            return Ok(());
        }
        match (&event.kind, &event.doc_id) {
            (ChangeKind::Remove, Some(doc_id)) => {
                self.vector_store.delete_by_doc_id(doc_id)?;
                self.lexical.remove(doc_id);
                Ok(())
            }
            (_, Some(_)) => self.indexer.on_document_changed(event).await,
            _ => Ok(()),
        }
    }

    // ---- indexing -----------------------------------------------------

    pub async fn index_document(&self, doc_id: &str) -> Result<IndexReport> {
        self.indexer.index_document(doc_id).await
    }

    pub async fn reindex_all(&self, progress: impl FnMut(ReindexProgress)) -> IndexReport {
        self.indexer.reindex_all(progress).await
    }

    pub async fn index_bookmark_content(&self, url: &str, doc_id: &str, block_id: &str) -> Result<IndexReport> {
        self.indexer
            .on_external_block_added(doc_id, block_id, ExternalKind::Bookmark, url)
            .await
    }

    pub async fn index_file_content(&self, path: &str, doc_id: &str, block_id: &str) -> Result<IndexReport> {
        self.indexer
            .on_external_block_added(doc_id, block_id, ExternalKind::File, path)
            .await
    }

    pub async fn index_folder_content(&self, path: &str, doc_id: &str, block_id: &str) -> Result<IndexReport> {
        self.indexer
            .on_external_block_added(doc_id, block_id, ExternalKind::Folder, path)
            .await
    }

    pub fn get_external_block_content(&self, doc_id: &str, block_id: &str) -> Result<Option<ExternalContent>> {
        Ok(self.vector_store.get_external_content(doc_id, block_id)?)
    }

    /// The text a single block contributes: plain block text, or the
    /// stored extraction for an external-reference block. Backs the MCP
    /// `get_block_content` tool.
    pub fn get_block_content(&self, doc_id: &str, block_id: &str) -> Result<String> {
        let content = self.document_store.load(doc_id)?;
        let block = find_block(&content.blocks, block_id)
            .ok_or_else(|| RagError::Core(nook_core::Error::NotFound(format!("block {block_id}"))))?;
        match &block.kind {
            BlockKind::Bookmark { .. } | BlockKind::File { .. } | BlockKind::Folder { .. } => {
                Ok(self
                    .vector_store
                    .get_external_content(doc_id, block_id)?
                    .map(|ec| ec.content)
                    .unwrap_or_default())
            }
            other => Ok(block_text(other)),
        }
    }

    // ---- search ---------------------------------------------------

    pub fn search_lexical(&self, query: &str) -> Vec<LexicalHit> {
        self.searcher.lexical(query)
    }

    pub async fn search_semantic_chunks(
        &self,
        query: &str,
        k: usize,
        filter: Option<SearchFilter>,
    ) -> Result<Vec<ChunkHit>> {
        self.searcher.semantic_chunks(query, k, filter).await
    }

    pub async fn search_semantic_documents(&self, query: &str, k: usize) -> Result<Vec<DocumentHit>> {
        self.searcher.semantic_documents(query, k).await
    }

    pub async fn find_related_documents(
        &self,
        source_content: &str,
        k: usize,
        exclude_doc_id: &str,
    ) -> Result<Vec<DocumentHit>> {
        self.searcher.related_documents(source_content, k, exclude_doc_id).await
    }

    pub fn get_document_graph(&self, threshold: f32) -> Result<DocumentGraph> {
        self.searcher.graph(threshold)
    }

    pub fn get_document_vectors(&self) -> Result<Vec<DocVector>> {
        self.searcher.vectors()
    }

    pub fn get_rag_status(&self) -> Result<IndexStats> {
        Ok(self.vector_store.stats(self.document_repo.list().len())?)
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        Ok(self.embedding_client.list_models().await?)
    }

    pub async fn test_connection(&self) -> Result<usize> {
        Ok(self.embedding_client.test_connection().await?)
    }

    pub fn get_rag_config(&self) -> EmbeddingConfig {
        self.config.read().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// Persist a new embedding configuration. A provider/model change that
    /// alters dimensionality is *not* reconciled here — the caller (UI's
    /// "Rebuild index" flow) must delete `vectors.db` and re-open the
    /// facade, per spec.md §9 "Graceful provider changes".
    pub fn set_rag_config(&self, new_config: EmbeddingConfig) -> Result<()> {
        new_config.validate()?;
        config::save_embedding_config(&self.layout, &new_config)?;
        *self.config.write().unwrap_or_else(std::sync::PoisonError::into_inner) = new_config;
        Ok(())
    }

    // ---- document CRUD (the persistence contract this engine reacts to) ---

    pub fn list_documents(&self) -> Vec<Document> {
        self.document_repo.list()
    }

    pub fn get_document(&self, doc_id: &str) -> Result<Document> {
        self.document_repo
            .get(doc_id)
            .ok_or_else(|| RagError::Core(nook_core::Error::NotFound(format!("document {doc_id}"))))
    }

    pub fn get_document_content(&self, doc_id: &str) -> Result<DocumentContent> {
        Ok(self.document_store.load(doc_id)?)
    }

    pub fn create_document(&self, title: &str) -> Result<Document> {
        let doc = self.document_repo.create(title)?;
        self.document_store.save(&doc.id, &DocumentContent::default())?;
        Ok(doc)
    }

    pub fn rename_document(&self, doc_id: &str, title: &str) -> Result<Document> {
        Ok(self.document_repo.rename(doc_id, title)?)
    }

    pub async fn update_document_content(&self, doc_id: &str, content: &DocumentContent) -> Result<IndexReport> {
        self.document_store.save(doc_id, content)?;
        self.index_document(doc_id).await
    }

    /// Replace the first occurrence of `old_str` with `new_str` in
    /// `block_id`'s text, save, and re-index — the MCP host's
    /// `edit_document` (str_replace) tool.
    pub async fn edit_document_str_replace(
        &self,
        doc_id: &str,
        block_id: &str,
        old_str: &str,
        new_str: &str,
    ) -> Result<IndexReport> {
        let mut content = self.document_store.load(doc_id)?;
        let block = find_block_mut(&mut content.blocks, block_id)
            .ok_or_else(|| RagError::Core(nook_core::Error::NotFound(format!("block {block_id}"))))?;
        let text = block_text_mut(&mut block.kind)
            .ok_or_else(|| RagError::Extraction(format!("block {block_id} has no editable text")))?;
        if !text.contains(old_str) {
            return Err(RagError::Extraction(format!("\"{old_str}\" not found in block {block_id}")));
        }
        *text = text.replacen(old_str, new_str, 1);
        self.update_document_content(doc_id, &content).await
    }

    pub async fn delete_document(&self, doc_id: &str) -> Result<()> {
        self.document_repo.delete(doc_id)?;
        self.document_store.delete(doc_id)?;
        self.vector_store.delete_by_doc_id(doc_id)?;
        self.lexical.remove(doc_id);
        Ok(())
    }

    // ---- tags -----------------------------------------------------

    pub fn list_tags(&self) -> Vec<Tag> {
        self.tag_store.list()
    }

    pub fn add_tag(&self, doc_id: &str, tag: &str) -> Result<Document> {
        self.tag_store.ensure(tag)?;
        Ok(self.document_repo.add_tag(doc_id, tag)?)
    }

    pub fn remove_tag(&self, doc_id: &str, tag: &str) -> Result<Document> {
        Ok(self.document_repo.remove_tag(doc_id, tag)?)
    }

    pub fn pin_tag(&self, tag: &str, order: i64) -> Result<Tag> {
        Ok(self.tag_store.pin(tag, order)?)
    }

    pub fn unpin_tag(&self, tag: &str) -> Result<Tag> {
        Ok(self.tag_store.unpin(tag)?)
    }

    pub fn rename_tag(&self, old_name: &str, new_name: &str) -> Result<Tag> {
        Ok(self.tag_store.rename(old_name, new_name)?)
    }

    pub fn delete_tag(&self, tag: &str) -> Result<()> {
        Ok(self.tag_store.delete(tag)?)
    }

    // ---- external-reference blocks ---------------------------------

    /// Insert a new bookmark block after `after_block_id` (or at the end
    /// of the document if `None`), then extract and index it.
    pub async fn add_bookmark_block(
        &self,
        doc_id: &str,
        url: &str,
        after_block_id: Option<&str>,
    ) -> Result<IndexReport> {
        let block = Block {
            id: uuid::Uuid::new_v4().to_string(),
            kind: BlockKind::Bookmark {
                url: url.to_string(),
                title: None,
                description: None,
                image: None,
                favicon: None,
                site_name: None,
                indexed: false,
                indexing: false,
                index_error: None,
            },
            children: Vec::new(),
        };
        self.insert_block(doc_id, block, after_block_id).await
    }

    pub async fn add_file_reference_block(
        &self,
        doc_id: &str,
        path: &str,
        after_block_id: Option<&str>,
    ) -> Result<IndexReport> {
        let file_path = std::path::Path::new(path);
        let metadata = std::fs::metadata(file_path).ok();
        let block = Block {
            id: uuid::Uuid::new_v4().to_string(),
            kind: BlockKind::File {
                original_path: path.to_string(),
                archived_path: None,
                file_name: file_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.to_string()),
                file_type: file_path
                    .extension()
                    .map(|e| e.to_string_lossy().to_string())
                    .unwrap_or_default(),
                file_size: metadata.map(|m| m.len()).unwrap_or(0),
                mime_type: None,
                indexed: false,
                indexing: false,
                index_error: None,
            },
            children: Vec::new(),
        };
        self.insert_block(doc_id, block, after_block_id).await
    }

    pub async fn add_folder_reference_block(
        &self,
        doc_id: &str,
        path: &str,
        after_block_id: Option<&str>,
    ) -> Result<IndexReport> {
        let folder_path = std::path::Path::new(path);
        let file_count = std::fs::read_dir(folder_path)
            .map(|entries| entries.count() as u64)
            .unwrap_or(0);
        let block = Block {
            id: uuid::Uuid::new_v4().to_string(),
            kind: BlockKind::Folder {
                folder_path: path.to_string(),
                folder_name: folder_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.to_string()),
                file_count,
                indexed_count: 0,
                indexed: false,
                index_error: None,
            },
            children: Vec::new(),
        };
        self.insert_block(doc_id, block, after_block_id).await
    }

    async fn insert_block(&self, doc_id: &str, block: Block, after_block_id: Option<&str>) -> Result<IndexReport> {
        let mut content = self.document_store.load(doc_id)?;
        match after_block_id {
            Some(after) if insert_after(&mut content.blocks, after, block.clone()) => {}
            _ => content.blocks.push(block),
        }
        self.update_document_content(doc_id, &content).await
    }

    pub async fn aggregate_folder(&self, doc_id: &str, block_id: &str) -> Result<()> {
        self.indexer.aggregate_folder(doc_id, block_id).await
    }
}

fn provider_name(config: &EmbeddingConfig) -> &'static str {
    match config.provider {
        nook_core::config::EmbeddingProviderKind::Ollama => "ollama",
        nook_core::config::EmbeddingProviderKind::OpenAiCompatible => "openai-compatible",
    }
}

fn find_block<'a>(blocks: &'a [Block], id: &str) -> Option<&'a Block> {
    for block in blocks {
        if block.id == id {
            return Some(block);
        }
        if let Some(found) = find_block(&block.children, id) {
            return Some(found);
        }
    }
    None
}

fn find_block_mut<'a>(blocks: &'a mut [Block], id: &str) -> Option<&'a mut Block> {
    for block in blocks {
        if block.id == id {
            return Some(block);
        }
        if let Some(found) = find_block_mut(&mut block.children, id) {
            return Some(found);
        }
    }
    None
}

/// Insert `new_block` directly after the block with id `after_id`,
/// recursing into children. Returns whether an insertion point was found.
fn insert_after(blocks: &mut Vec<Block>, after_id: &str, new_block: Block) -> bool {
    if let Some(pos) = blocks.iter().position(|b| b.id == after_id) {
        blocks.insert(pos + 1, new_block);
        return true;
    }
    for block in blocks.iter_mut() {
        if insert_after(&mut block.children, after_id, new_block.clone()) {
            return true;
        }
    }
    false
}

fn block_text(kind: &BlockKind) -> String {
    match kind {
        BlockKind::Paragraph { text }
        | BlockKind::Heading { text, .. }
        | BlockKind::BulletListItem { text }
        | BlockKind::NumberedListItem { text }
        | BlockKind::CheckListItem { text, .. }
        | BlockKind::CodeBlock { text, .. } => text.clone(),
        _ => String::new(),
    }
}

fn block_text_mut(kind: &mut BlockKind) -> Option<&mut String> {
    match kind {
        BlockKind::Paragraph { text }
        | BlockKind::Heading { text, .. }
        | BlockKind::BulletListItem { text }
        | BlockKind::NumberedListItem { text }
        | BlockKind::CheckListItem { text, .. }
        | BlockKind::CodeBlock { text, .. } => Some(text),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use nook_core::config::EmbeddingProviderKind;

    use super::*;

    const DIM: usize = 4;

    struct FakeEmbeddingClient;

    #[async_trait]
    impl EmbeddingClient for FakeEmbeddingClient {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0f32; DIM];
            for (i, b) in text.bytes().enumerate() {
                v[i % DIM] += b as f32;
            }
            Ok(v)
        }

        async fn list_models(&self) -> Result<Vec<String>> {
            Ok(vec!["fake".to_string()])
        }

        fn provider(&self) -> EmbeddingProviderKind {
            EmbeddingProviderKind::Ollama
        }

        fn base_url(&self) -> &str {
            "http://fake.local"
        }

        fn model(&self) -> &str {
            "fake"
        }
    }

    /// Builds a `RetrievalFacade` directly (bypassing `open`'s embedding
    /// provider probe) over a deterministic client, so the external-block
    /// indexing methods can be exercised offline.
    fn facade(dir: &std::path::Path) -> RetrievalFacade {
        let layout = PathLayout::new(dir);
        layout.ensure_dirs().unwrap();

        let document_repo = Arc::new(DocumentRepo::open(layout.clone()).unwrap());
        let document_store = Arc::new(DocumentStore::new(layout.clone()));
        let tag_store = Arc::new(TagStore::open(layout.clone()).unwrap());
        let vector_store =
            Arc::new(VectorStore::bootstrap(&layout.vectors_db(), DIM, "fake", "ollama").unwrap());
        let lexical = Arc::new(LexicalIndex::new());
        let embedding_client: Arc<dyn EmbeddingClient> = Arc::new(FakeEmbeddingClient);

        let indexer = Arc::new(Indexer::new(
            vector_store.clone(),
            lexical.clone(),
            document_repo.clone(),
            document_store.clone(),
            embedding_client.clone(),
            1000,
            200,
        ));
        let searcher = Arc::new(Searcher::new(
            vector_store.clone(),
            lexical.clone(),
            document_repo.clone(),
            embedding_client.clone(),
        ));

        RetrievalFacade {
            layout,
            document_repo,
            document_store,
            tag_store,
            vector_store,
            lexical,
            indexer,
            searcher,
            embedding_client,
            config: RwLock::new(EmbeddingConfig {
                provider: nook_core::config::EmbeddingProviderKind::Ollama,
                base_url: "http://fake.local".to_string(),
                model: "fake".to_string(),
                api_key: None,
                max_chunk_size: 1000,
                overlap: 200,
            }),
            _watcher: None,
        }
    }

    #[tokio::test]
    async fn index_file_content_indexes_only_the_target_block() {
        let dir = tempfile::tempdir().unwrap();
        let facade = facade(dir.path());
        facade
            .document_store
            .save(
                "doc",
                &DocumentContent {
                    blocks: vec![Block {
                        id: "p1".to_string(),
                        kind: BlockKind::Paragraph { text: "intro".to_string() },
                        children: vec![],
                    }],
                },
            )
            .unwrap();
        facade.index_document("doc").await.unwrap();

        let note_path = dir.path().join("note.txt");
        std::fs::write(&note_path, "note body").unwrap();
        let report = facade
            .index_file_content(note_path.to_str().unwrap(), "doc", "f1")
            .await
            .unwrap();
        assert_eq!(report.indexed, 1);
        assert_eq!(report.failed, 0);

        let content = facade.get_external_block_content("doc", "f1").unwrap().unwrap();
        assert_eq!(content.content, "note body");

        // The paragraph block indexed before the file block is untouched —
        // this was never a full-document reindex.
        let block_text = facade.get_block_content("doc", "p1").unwrap();
        assert_eq!(block_text, "intro");
    }

    #[tokio::test]
    async fn index_bookmark_content_and_index_folder_content_store_their_own_block() {
        let dir = tempfile::tempdir().unwrap();
        let facade = facade(dir.path());

        let folder = dir.path().join("refs");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("a.txt"), "folder file a").unwrap();
        let folder_report = facade
            .index_folder_content(folder.to_str().unwrap(), "doc", "folder1")
            .await
            .unwrap();
        assert_eq!(folder_report.indexed, 1);
        let folder_content = facade.get_external_block_content("doc", "folder1").unwrap().unwrap();
        assert!(folder_content.content.contains("folder file a"));

        // A second, distinct external block on the same document must not
        // disturb the folder block's chunk or content row.
        let bookmark_err = facade.index_bookmark_content("http://127.0.0.1:1/unreachable", "doc", "bm1").await;
        assert!(bookmark_err.is_err(), "nothing listens on that port in this sandbox");

        let folder_content_after = facade.get_external_block_content("doc", "folder1").unwrap().unwrap();
        assert_eq!(folder_content_after.content, folder_content.content);
    }

    #[test]
    fn insert_after_finds_nested_target() {
        let mut blocks = vec![Block {
            id: "parent".into(),
            kind: BlockKind::Paragraph { text: "p".into() },
            children: vec![Block {
                id: "child".into(),
                kind: BlockKind::Paragraph { text: "c".into() },
                children: vec![],
            }],
        }];
        let new_block = Block {
            id: "new".into(),
            kind: BlockKind::Paragraph { text: "n".into() },
            children: vec![],
        };
        assert!(insert_after(&mut blocks, "child", new_block));
        assert_eq!(blocks[0].children[1].id, "new");
    }

    #[test]
    fn block_text_mut_rejects_non_text_blocks() {
        let mut kind = BlockKind::Image { caption: None };
        assert!(block_text_mut(&mut kind).is_none());
    }
}
