//! Orchestrates document -> blocks -> chunks -> embeddings -> store
//! (spec.md §4.6), with per-fingerprint idempotence and diff-based pruning.
//!
//! All writes funnel through a single spawned worker task reading off a
//! bounded `mpsc` channel (spec.md §5's single-writer rule): `Indexer`
//! itself only ever enqueues, it never touches the store directly, the
//! way `lumosai_mcp/src/client.rs`'s `execute_tool_stream` owns a spawned
//! task draining one side of an `mpsc::channel` and leaves every caller
//! talking only to the channel. Calls that race for the same document
//! coalesce onto whichever job is still queued for it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use nook_core::document::{DocumentRepo, DocumentStore};
use nook_core::vector::{ChunkVector, ExternalContent, ExternalKind, VectorStore};
use nook_core::watcher::{ChangeKind, WatchEvent};

use crate::block_extractor::BlockTextExtractor;
use crate::chunker::Chunker;
use crate::embedding::{embed_batch_with_retry, EmbeddingClient};
use crate::error::{RagError, Result};
use crate::extractor::ExtractorRegistry;
use crate::lexical::LexicalIndex;
use crate::types::{Chunk, ExtractedUnit};

const EXTERNAL_BLOCK_TIMEOUT: Duration = Duration::from_secs(10);
const BOOKMARK_BODY_CAP: u64 = 5 * 1024 * 1024;
const EMBED_BATCH_SIZE: usize = 64;
const JOB_QUEUE_CAPACITY: usize = 16;

#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexReport {
    pub indexed: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl IndexReport {
    fn merge(&mut self, other: IndexReport) {
        self.indexed += other.indexed;
        self.failed += other.failed;
        self.errors.extend(other.errors);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexPhase {
    Documents,
    External,
}

#[derive(Debug, Clone)]
pub struct ReindexProgress {
    pub phase: ReindexPhase,
    pub current: usize,
    pub total: usize,
}

/// The job types a single worker task executes, one at a time, in
/// submission order.
enum Job {
    /// Full re-index of a document, keyed so concurrent callers for the
    /// same `doc_id` coalesce onto one run.
    Document(String),
    /// A single newly-added external-reference block, never coalesced
    /// with another (each carries its own kind/locator).
    ExternalBlock {
        doc_id: String,
        block_id: String,
        kind: ExternalKind,
        locator: String,
    },
    AggregateFolder { doc_id: String, block_id: String },
}

/// Result broadcast to every caller coalesced onto one job. `RagError`
/// isn't `Clone` (it wraps `std::io::Error`/`reqwest::Error`), so the
/// worker reduces it to its display string before fanning it out.
type JobResult = std::result::Result<IndexReport, String>;

struct IndexerInner {
    vector_store: Arc<VectorStore>,
    lexical: Arc<LexicalIndex>,
    document_repo: Arc<DocumentRepo>,
    document_store: Arc<DocumentStore>,
    extractors: ExtractorRegistry,
    embedding_client: Arc<dyn EmbeddingClient>,
    block_extractor: BlockTextExtractor,
    chunker: Chunker,
    http: reqwest::Client,
}

/// Funnels every mutating operation through one spawned worker task
/// reading a bounded channel (capacity `JOB_QUEUE_CAPACITY`), so the
/// store's diff/upsert/prune sequence is never interleaved across two
/// documents (or two writes to the same one) at once.
pub struct Indexer {
    inner: Arc<IndexerInner>,
    job_tx: mpsc::Sender<(String, Job)>,
    pending: Arc<Mutex<HashMap<String, Vec<oneshot::Sender<JobResult>>>>>,
    job_seq: AtomicU64,
}

impl Indexer {
    pub fn new(
        vector_store: Arc<VectorStore>,
        lexical: Arc<LexicalIndex>,
        document_repo: Arc<DocumentRepo>,
        document_store: Arc<DocumentStore>,
        embedding_client: Arc<dyn EmbeddingClient>,
        max_chunk_size: usize,
        overlap: usize,
    ) -> Self {
        let inner = Arc::new(IndexerInner {
            vector_store,
            lexical,
            document_repo,
            document_store,
            extractors: ExtractorRegistry::with_defaults(),
            embedding_client,
            block_extractor: BlockTextExtractor::new(),
            chunker: Chunker::new(max_chunk_size, overlap),
            http: reqwest::Client::new(),
        });
        let (job_tx, job_rx) = mpsc::channel(JOB_QUEUE_CAPACITY);
        let pending: Arc<Mutex<HashMap<String, Vec<oneshot::Sender<JobResult>>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(run_worker(inner.clone(), pending.clone(), job_rx));

        Self {
            inner,
            job_tx,
            pending,
            job_seq: AtomicU64::new(0),
        }
    }

    /// Submit `job` under `key`. A caller whose key already has a job
    /// queued is folded into it: both get the same result once the
    /// worker (which re-reads the key's waiter list only when it
    /// dequeues) runs it. A job already being executed doesn't count as
    /// "queued" — a request arriving after dequeue starts a fresh job.
    async fn submit(&self, key: String, job: Job) -> Result<IndexReport> {
        let (tx, rx) = oneshot::channel();
        let should_enqueue = {
            let mut pending = self.pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let waiters = pending.entry(key.clone()).or_insert_with(Vec::new);
            let first = waiters.is_empty();
            waiters.push(tx);
            first
        };
        if should_enqueue {
            self.job_tx
                .send((key, job))
                .await
                .map_err(|_| RagError::Extraction("indexer worker task is no longer running".to_string()))?;
        }
        match rx.await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(msg)) => Err(RagError::Extraction(msg)),
            Err(_) => Err(RagError::Extraction("indexer worker task dropped the response channel".to_string())),
        }
    }

    fn next_job_id(&self) -> u64 {
        self.job_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Full re-index of one document: extract, diff against the store,
    /// embed only what changed, commit, update the lexical cache.
    pub async fn index_document(&self, doc_id: &str) -> Result<IndexReport> {
        self.submit(format!("doc:{doc_id}"), Job::Document(doc_id.to_string())).await
    }

    /// Iterate documents in repository order, indexing each; failures are
    /// logged per-doc and don't abort the run (spec.md §4.6.2).
    pub async fn reindex_all(&self, mut progress: impl FnMut(ReindexProgress)) -> IndexReport {
        let docs = self.inner.document_repo.list();
        let total = docs.len();
        let mut aggregate = IndexReport::default();

        for (i, doc) in docs.iter().enumerate() {
            progress(ReindexProgress {
                phase: ReindexPhase::Documents,
                current: i + 1,
                total,
            });
            match self.index_document(&doc.id).await {
                Ok(report) => aggregate.merge(report),
                Err(e) => {
                    tracing::error!(doc_id = %doc.id, error = %e, "failed to index document");
                    aggregate.failed += 1;
                    aggregate.errors.push(format!("{}: {e}", doc.id));
                }
            }
        }
        aggregate
    }

    /// React to a filesystem change (spec.md §4.6.3). Index-file changes
    /// (`is_index`) only trigger a repo reload, handled by the caller —
    /// here we only act on per-document blobs.
    pub async fn on_document_changed(&self, event: &WatchEvent) -> Result<()> {
        if event.is_index {
            return Ok(());
        }
        let Some(doc_id) = &event.doc_id else {
            return Ok(());
        };
        match event.kind {
            ChangeKind::Create | ChangeKind::Write | ChangeKind::Rename => {
                self.index_document(doc_id).await?;
            }
            ChangeKind::Remove => {
                self.inner.vector_store.delete_by_doc_id(doc_id)?;
                self.inner.lexical.remove(doc_id);
            }
        }
        Ok(())
    }

    /// Extract a newly-added external block and index only its own
    /// chunks and content row (spec.md §4.6.4) — every other block's
    /// chunks are left untouched, unlike a full `index_document` pass.
    /// Never coalesced with another call: each carries its own
    /// `kind`/`locator`, so folding two together would silently drop one.
    pub async fn on_external_block_added(
        &self,
        doc_id: &str,
        block_id: &str,
        kind: ExternalKind,
        locator: &str,
    ) -> Result<IndexReport> {
        let key = format!("ext:{}", self.next_job_id());
        self.submit(
            key,
            Job::ExternalBlock {
                doc_id: doc_id.to_string(),
                block_id: block_id.to_string(),
                kind,
                locator: locator.to_string(),
            },
        )
        .await
    }

    /// Compute and store an `agg_*` summary embedding for a folder block.
    /// Created only on demand (spec.md §9) — a plain re-index never
    /// fabricates one, and it is excluded from the diff/pruning pass
    /// entirely (it is never in `existing_fingerprints`' comparison set
    /// because its doc/source_block_id pairing is synthetic).
    pub async fn aggregate_folder(&self, doc_id: &str, block_id: &str) -> Result<()> {
        let key = format!("agg:{}", self.next_job_id());
        self.submit(
            key,
            Job::AggregateFolder {
                doc_id: doc_id.to_string(),
                block_id: block_id.to_string(),
            },
        )
        .await?;
        Ok(())
    }
}

/// Drains `job_rx` one job at a time for the lifetime of its `Indexer`.
/// Each job's waiter list is taken out of `pending` only at dequeue time,
/// so anything that coalesced in while the job sat in the channel is
/// still delivered the same result.
async fn run_worker(
    inner: Arc<IndexerInner>,
    pending: Arc<Mutex<HashMap<String, Vec<oneshot::Sender<JobResult>>>>>,
    mut job_rx: mpsc::Receiver<(String, Job)>,
) {
    while let Some((key, job)) = job_rx.recv().await {
        let waiters = pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&key)
            .unwrap_or_default();

        let result: JobResult = match job {
            Job::Document(doc_id) => inner.index_document_inner(&doc_id).await.map_err(|e| e.to_string()),
            Job::ExternalBlock { doc_id, block_id, kind, locator } => inner
                .index_external_block_inner(&doc_id, &block_id, kind, &locator)
                .await
                .map_err(|e| e.to_string()),
            Job::AggregateFolder { doc_id, block_id } => inner
                .aggregate_folder_inner(&doc_id, &block_id)
                .await
                .map_err(|e| e.to_string()),
        };
        for tx in waiters {
            let _ = tx.send(result.clone());
        }
    }
}

impl IndexerInner {
    async fn index_document_inner(&self, doc_id: &str) -> Result<IndexReport> {
        let content = self.document_store.load(doc_id)?;
        let units = self.block_extractor.extract(&content.blocks);
        let model = self.embedding_client.model().to_string();

        let mut desired: Vec<Chunk> = Vec::new();
        let mut plain_text = String::new();
        let mut external_contents: Vec<ExternalContent> = Vec::new();
        let mut report = IndexReport::default();

        for unit in &units {
            match unit {
                ExtractedUnit::PlainText {
                    block_id,
                    block_type,
                    text,
                    heading_context,
                } => {
                    plain_text.push_str(text);
                    plain_text.push('\n');
                    desired.extend(self.chunker.chunk_plain(
                        block_id,
                        block_type,
                        heading_context,
                        text,
                        &model,
                    ));
                }
                ExtractedUnit::ExternalRef {
                    block_id,
                    kind,
                    locator,
                    heading_context,
                } => {
                    match self.extract_external_text(*kind, locator).await {
                        Ok((title, text)) => {
                            desired.extend(self.chunker.chunk_external(
                                doc_id,
                                block_id,
                                *kind,
                                heading_context,
                                &text,
                                &model,
                            ));
                            external_contents.push(ExternalContent {
                                id: format!("{doc_id}_{block_id}"),
                                doc_id: doc_id.to_string(),
                                block_id: block_id.clone(),
                                block_type: *kind,
                                url: matches!(kind, ExternalKind::Bookmark).then(|| locator.clone()),
                                file_path: (!matches!(kind, ExternalKind::Bookmark)).then(|| locator.clone()),
                                title,
                                content: text,
                                extracted_at: chrono::Utc::now(),
                            });
                        }
                        Err(e) => {
                            report.failed += 1;
                            report.errors.push(format!("{block_id}: {e}"));
                        }
                    }
                }
            }
        }

        let existing = self.vector_store.existing_blocks(doc_id)?;
        let desired_ids: std::collections::HashSet<&str> =
            desired.iter().map(|c| c.id.as_str()).collect();
        let to_remove: Vec<String> = existing
            .iter()
            .filter(|(id, _, _, _)| !desired_ids.contains(id.as_str()))
            .map(|(id, _, _, _)| id.clone())
            .collect();

        let existing_fp: std::collections::HashMap<&str, &str> = existing
            .iter()
            .map(|(id, fp, _, _)| (id.as_str(), fp.as_str()))
            .collect();
        let to_embed: Vec<&Chunk> = desired
            .iter()
            .filter(|c| existing_fp.get(c.id.as_str()) != Some(&c.fingerprint.as_str()))
            .collect();

        for batch in to_embed.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch
                .iter()
                .map(|c| format!("context: {}\n\n{}", c.heading_context, c.content))
                .collect();
            let embeddings = match embed_batch_with_retry(self.embedding_client.as_ref(), &texts).await {
                Ok(e) => e,
                Err(e) => {
                    report.failed += batch.len();
                    report.errors.push(e.to_string());
                    continue;
                }
            };
            for (chunk, embedding) in batch.iter().zip(embeddings) {
                let vector = ChunkVector {
                    id: chunk.id.clone(),
                    doc_id: doc_id.to_string(),
                    source_block_id: chunk.source_block_id.clone(),
                    block_type: chunk.block_type.clone(),
                    heading_context: chunk.heading_context.clone(),
                    content: chunk.content.clone(),
                    fingerprint: chunk.fingerprint.clone(),
                    embedding,
                };
                self.vector_store.upsert(&vector)?;
                report.indexed += 1;
            }
        }

        // External blocks (bookmark/file/folder) whose source block is no
        // longer present this pass get their chunks *and* their
        // `external_block_contents` row cleaned up via `delete_by_source_block`
        // — `delete_ids` alone only touches `block_vectors`/`vec_blocks` and
        // would leave the content row orphaned (spec.md §3 ExternalContent
        // lifecycle).
        let current_external_block_ids: std::collections::HashSet<&str> =
            external_contents.iter().map(|ec| ec.block_id.as_str()).collect();
        let external_kinds = [ExternalKind::Bookmark, ExternalKind::File, ExternalKind::Folder];
        let removed_external_blocks: std::collections::HashSet<&str> = existing
            .iter()
            .filter(|(id, _, source_block_id, block_type)| {
                !desired_ids.contains(id.as_str())
                    && !current_external_block_ids.contains(source_block_id.as_str())
                    && external_kinds.iter().any(|k| k.as_str() == block_type.as_str())
            })
            .map(|(_, _, source_block_id, _)| source_block_id.as_str())
            .collect();
        for block_id in removed_external_blocks {
            self.vector_store.delete_by_source_block(doc_id, block_id)?;
        }

        self.vector_store.delete_ids(&to_remove)?;

        // Additional, type-scoped safety net alongside the diff-based prune
        // above: only fires when something was actually removed this pass,
        // so a stable re-index never calls it (spec.md §8 S3). Never a
        // substitute for `delete_ids` — it only ever touches external-kind
        // rows, and only those whose kind isn't among this pass's kinds.
        if !to_remove.is_empty() {
            let kept_kinds: Vec<ExternalKind> = external_contents.iter().map(|ec| ec.block_type).collect();
            self.vector_store.delete_by_doc_id_except(doc_id, &kept_kinds)?;
        }

        for ec in &external_contents {
            self.vector_store.put_external_content(ec)?;
        }

        self.lexical.update(doc_id, &plain_text);
        Ok(report)
    }

    /// Extract a single newly-added external block and index only its own
    /// chunks and content row (spec.md §4.6.4). `kind`/`locator` come from
    /// the caller (the block was just written, so it reflects current
    /// document state); the heading context is looked up fresh from the
    /// document tree so it's correct even if the block moved under a
    /// different heading since the document was last fully indexed.
    async fn index_external_block_inner(
        &self,
        doc_id: &str,
        block_id: &str,
        kind: ExternalKind,
        locator: &str,
    ) -> Result<IndexReport> {
        let heading_context = self.heading_context_for_block(doc_id, block_id);
        let model = self.embedding_client.model().to_string();
        let mut report = IndexReport::default();

        let (title, text) = self.extract_external_text(kind, locator).await?;
        let chunks = self
            .chunker
            .chunk_external(doc_id, block_id, kind, &heading_context, &text, &model);

        // Clear any chunks/content row this block previously held (e.g. a
        // kind swap at the same block id) before writing the fresh set —
        // scoped to this block, every other chunk in the document is
        // untouched.
        self.vector_store.delete_by_source_block(doc_id, block_id)?;

        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch
                .iter()
                .map(|c| format!("context: {}\n\n{}", c.heading_context, c.content))
                .collect();
            let embeddings = match embed_batch_with_retry(self.embedding_client.as_ref(), &texts).await {
                Ok(e) => e,
                Err(e) => {
                    report.failed += batch.len();
                    report.errors.push(e.to_string());
                    continue;
                }
            };
            for (chunk, embedding) in batch.iter().zip(embeddings) {
                let vector = ChunkVector {
                    id: chunk.id.clone(),
                    doc_id: doc_id.to_string(),
                    source_block_id: chunk.source_block_id.clone(),
                    block_type: chunk.block_type.clone(),
                    heading_context: chunk.heading_context.clone(),
                    content: chunk.content.clone(),
                    fingerprint: chunk.fingerprint.clone(),
                    embedding,
                };
                self.vector_store.upsert(&vector)?;
                report.indexed += 1;
            }
        }

        let ec = ExternalContent {
            id: format!("{doc_id}_{block_id}"),
            doc_id: doc_id.to_string(),
            block_id: block_id.to_string(),
            block_type: kind,
            url: matches!(kind, ExternalKind::Bookmark).then(|| locator.to_string()),
            file_path: (!matches!(kind, ExternalKind::Bookmark)).then(|| locator.to_string()),
            title,
            content: text,
            extracted_at: chrono::Utc::now(),
        };
        self.vector_store.put_external_content(&ec)?;

        Ok(report)
    }

    /// The nearest preceding heading (spec.md §4.2's rule) for `block_id`,
    /// looked up by re-walking the document tree. Empty if the block or
    /// document can't be found — the scoped re-index still proceeds with
    /// no heading context rather than failing outright.
    fn heading_context_for_block(&self, doc_id: &str, block_id: &str) -> String {
        let Ok(content) = self.document_store.load(doc_id) else {
            return String::new();
        };
        self.block_extractor
            .extract(&content.blocks)
            .into_iter()
            .find_map(|unit| match unit {
                ExtractedUnit::ExternalRef { block_id: id, heading_context, .. } if id == block_id => {
                    Some(heading_context)
                }
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Compute and store an `agg_*` summary embedding for a folder block.
    /// Created only on demand (spec.md §9) — a plain re-index never
    /// fabricates one, and it is excluded from the diff/pruning pass
    /// entirely (it is never in `existing_fingerprints`' comparison set
    /// because its doc/source_block_id pairing is synthetic).
    async fn aggregate_folder_inner(&self, doc_id: &str, block_id: &str) -> Result<IndexReport> {
        let ec = self
            .vector_store
            .get_external_content(doc_id, block_id)?
            .ok_or_else(|| RagError::Core(nook_core::Error::NotFound(format!("{doc_id}/{block_id}"))))?;

        let model = self.embedding_client.model().to_string();
        let summary_text = ec.content.chars().take(4000).collect::<String>();
        let embedding = self.embedding_client.embed(&summary_text).await?;
        let folder_key = format!("{doc_id}_{block_id}");
        let fingerprint = crate::chunker::fingerprint(&model, "", &summary_text);

        let vector = ChunkVector {
            id: nook_core::vector::aggregated_chunk_id(&folder_key),
            doc_id: doc_id.to_string(),
            source_block_id: block_id.to_string(),
            block_type: "folder".to_string(),
            heading_context: String::new(),
            content: summary_text,
            fingerprint,
            embedding,
        };
        self.vector_store.upsert(&vector)?;
        Ok(IndexReport {
            indexed: 1,
            failed: 0,
            errors: Vec::new(),
        })
    }

    async fn extract_external_text(&self, kind: ExternalKind, locator: &str) -> Result<(String, String)> {
        let fut = async {
            match kind {
                ExternalKind::Bookmark => self.fetch_bookmark(locator).await,
                ExternalKind::File => {
                    let path = std::path::PathBuf::from(locator);
                    let title = path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    let text = self.extractors.extract(&path)?;
                    Ok((title, text))
                }
                ExternalKind::Folder => self.extract_folder(locator),
            }
        };
        tokio::time::timeout(EXTERNAL_BLOCK_TIMEOUT, fut)
            .await
            .map_err(|_| RagError::Timeout(EXTERNAL_BLOCK_TIMEOUT))?
    }

    async fn fetch_bookmark(&self, url: &str) -> Result<(String, String)> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| RagError::Transport(e.to_string()))?;
        if let Some(len) = response.content_length() {
            if len > BOOKMARK_BODY_CAP {
                return Err(RagError::Extraction("bookmark body exceeds 5 MiB cap".to_string()));
            }
        }
        let body = response.text().await.map_err(|e| RagError::Transport(e.to_string()))?;
        if body.len() as u64 > BOOKMARK_BODY_CAP {
            return Err(RagError::Extraction("bookmark body exceeds 5 MiB cap".to_string()));
        }
        let title = scraper::Html::parse_document(&body)
            .select(&scraper::Selector::parse("title").unwrap())
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();
        let text = crate::extractor::html_extract_text(&body);
        Ok((title, text))
    }

    /// Recursively walk a folder, extracting every supported file found.
    /// Unreadable entries are skipped, not fatal.
    fn extract_folder(&self, folder_path: &str) -> Result<(String, String)> {
        let root = std::path::PathBuf::from(folder_path);
        let mut out = String::new();
        let mut stack = vec![root.clone()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if self.extractors.is_supported(&path) {
                    if let Ok(text) = self.extractors.extract(&path) {
                        out.push_str(&format!("=== {} ===\n", path.display()));
                        out.push_str(&text);
                        out.push('\n');
                    }
                }
            }
        }
        let title = root.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        Ok((title, out))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use nook_core::config::EmbeddingProviderKind;
    use nook_core::document::{Block, BlockKind, DocumentContent, DocumentRepo, DocumentStore};
    use nook_core::path_layout::PathLayout;

    use super::*;

    const DIM: usize = 4;

    struct DeterministicEmbedder;

    #[async_trait]
    impl EmbeddingClient for DeterministicEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0f32; DIM];
            for (i, b) in text.bytes().enumerate() {
                v[i % DIM] += b as f32;
            }
            Ok(v)
        }

        async fn list_models(&self) -> Result<Vec<String>> {
            Ok(vec!["det".to_string()])
        }

        fn provider(&self) -> EmbeddingProviderKind {
            EmbeddingProviderKind::Ollama
        }

        fn base_url(&self) -> &str {
            "http://det.local"
        }

        fn model(&self) -> &str {
            "det"
        }
    }

    fn new_indexer(dir: &std::path::Path) -> Indexer {
        let layout = PathLayout::new(dir);
        layout.ensure_dirs().unwrap();
        let vector_store = Arc::new(
            nook_core::vector::VectorStore::bootstrap(&layout.vectors_db(), DIM, "det", "ollama").unwrap(),
        );
        Indexer::new(
            vector_store,
            Arc::new(LexicalIndex::new()),
            Arc::new(DocumentRepo::open(layout.clone()).unwrap()),
            Arc::new(DocumentStore::new(layout)),
            Arc::new(DeterministicEmbedder),
            1000,
            200,
        )
    }

    fn save_paragraph(indexer: &Indexer, dir: &std::path::Path, doc_id: &str, block_id: &str, text: &str) {
        let store = DocumentStore::new(PathLayout::new(dir));
        store
            .save(
                doc_id,
                &DocumentContent {
                    blocks: vec![Block {
                        id: block_id.to_string(),
                        kind: BlockKind::Paragraph { text: text.to_string() },
                        children: vec![],
                    }],
                },
            )
            .unwrap();
        let _ = indexer;
    }

    #[tokio::test]
    async fn stable_reindex_diff_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = new_indexer(dir.path());
        save_paragraph(&indexer, dir.path(), "d1", "b1", "hello");

        let first = indexer.index_document("d1").await.unwrap();
        assert_eq!(first.indexed, 1);

        let second = indexer.index_document("d1").await.unwrap();
        assert_eq!(second.indexed, 0);
        assert_eq!(indexer.inner.vector_store.existing_fingerprints("d1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn removing_the_only_block_prunes_its_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = new_indexer(dir.path());
        save_paragraph(&indexer, dir.path(), "d1", "b1", "hello");
        indexer.index_document("d1").await.unwrap();
        assert_eq!(indexer.inner.vector_store.existing_fingerprints("d1").unwrap().len(), 1);

        let store = DocumentStore::new(PathLayout::new(dir.path()));
        store.save("d1", &DocumentContent { blocks: vec![] }).unwrap();
        indexer.index_document("d1").await.unwrap();

        assert!(indexer.inner.vector_store.existing_fingerprints("d1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn editing_text_reuses_the_same_chunk_id() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = new_indexer(dir.path());
        save_paragraph(&indexer, dir.path(), "d1", "b1", "hello");
        indexer.index_document("d1").await.unwrap();
        let before = indexer.inner.vector_store.existing_fingerprints("d1").unwrap();

        save_paragraph(&indexer, dir.path(), "d1", "b1", "hello there");
        indexer.index_document("d1").await.unwrap();
        let after = indexer.inner.vector_store.existing_fingerprints("d1").unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 1);
        assert_eq!(before[0].0, after[0].0, "editing in place keeps the same chunk id");
        assert_ne!(before[0].1, after[0].1, "content change must change the fingerprint");
    }

    #[tokio::test]
    async fn concurrent_index_document_calls_for_the_same_doc_are_coalesced() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = Arc::new(new_indexer(dir.path()));
        save_paragraph(&indexer, dir.path(), "d1", "b1", "hello");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let indexer = indexer.clone();
            handles.push(tokio::spawn(async move { indexer.index_document("d1").await }));
        }
        for handle in handles {
            let report = handle.await.unwrap().unwrap();
            assert_eq!(report.failed, 0);
        }

        // One writer means the diff/upsert pass never ran concurrently
        // against itself: exactly one chunk survives, not eight.
        assert_eq!(indexer.inner.vector_store.existing_fingerprints("d1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn on_external_block_added_indexes_only_the_target_block() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = new_indexer(dir.path());
        save_paragraph(&indexer, dir.path(), "d1", "p1", "intro paragraph");
        indexer.index_document("d1").await.unwrap();
        assert_eq!(indexer.inner.vector_store.existing_fingerprints("d1").unwrap().len(), 1);

        let file_path = dir.path().join("note.txt");
        std::fs::write(&file_path, "file contents here").unwrap();

        let report = indexer
            .on_external_block_added("d1", "f1", ExternalKind::File, file_path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(report.indexed, 1);
        assert_eq!(report.failed, 0);

        let fingerprints = indexer.inner.vector_store.existing_fingerprints("d1").unwrap();
        assert_eq!(fingerprints.len(), 2, "the paragraph chunk is untouched, the file chunk is new");

        let content = indexer.inner.vector_store.get_external_content("d1", "f1").unwrap().unwrap();
        assert_eq!(content.content, "file contents here");
        assert_eq!(content.title, "note.txt");
    }

    #[tokio::test]
    async fn on_external_block_added_swap_cleans_up_the_prior_kind() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = new_indexer(dir.path());

        let first_path = dir.path().join("a.txt");
        std::fs::write(&first_path, "first file").unwrap();
        indexer
            .on_external_block_added("d1", "x", ExternalKind::File, first_path.to_str().unwrap())
            .await
            .unwrap();
        let before = indexer.inner.vector_store.existing_blocks("d1").unwrap();
        assert!(before.iter().any(|(_, _, _, kind)| kind == "file"));

        let second_path = dir.path().join("sub");
        std::fs::create_dir(&second_path).unwrap();
        std::fs::write(second_path.join("b.txt"), "second file").unwrap();
        indexer
            .on_external_block_added("d1", "x", ExternalKind::Folder, second_path.to_str().unwrap())
            .await
            .unwrap();

        let after = indexer.inner.vector_store.existing_blocks("d1").unwrap();
        assert!(
            after.iter().all(|(_, _, _, kind)| kind != "file"),
            "swapping block x from file to folder must drop its stale file-kind rows"
        );
        assert!(after.iter().any(|(_, _, _, kind)| kind == "folder"));
    }
}
