//! Three query surfaces plus related-documents and graph assembly
//! (spec.md §4.7).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use nook_core::document::DocumentRepo;
use nook_core::vector::{SearchFilter, VectorStore};

use crate::embedding::EmbeddingClient;
use crate::error::Result;
use crate::lexical::LexicalIndex;

const SNIPPET_RADIUS: usize = 60;
const SEMANTIC_DOC_OVERFETCH: usize = 5;
const CHUNKS_PER_DOC: usize = 3;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LexicalHit {
    pub doc_id: String,
    pub title: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkHit {
    pub doc_id: String,
    pub doc_title: String,
    pub block_id: String,
    pub source_block_id: Option<String>,
    pub content: String,
    pub block_type: String,
    pub heading_context: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentHit {
    pub doc_id: String,
    pub doc_title: String,
    pub max_score: f32,
    pub matched_chunks: Vec<ChunkHit>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub node_type: String,
    pub title: String,
    pub tags: Vec<String>,
    pub val: usize,
    pub parent_doc_id: Option<String>,
    pub parent_block_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    pub similarity: f32,
    pub has_semantic: bool,
    pub has_tags: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentGraph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

pub struct Searcher {
    vector_store: Arc<VectorStore>,
    lexical: Arc<LexicalIndex>,
    document_repo: Arc<DocumentRepo>,
    embedding_client: Arc<dyn EmbeddingClient>,
}

impl Searcher {
    pub fn new(
        vector_store: Arc<VectorStore>,
        lexical: Arc<LexicalIndex>,
        document_repo: Arc<DocumentRepo>,
        embedding_client: Arc<dyn EmbeddingClient>,
    ) -> Self {
        Self {
            vector_store,
            lexical,
            document_repo,
            embedding_client,
        }
    }

    /// Case-insensitive substring search over title, tags, and cached
    /// body text, unified with deterministic precedence title > tag >
    /// content (spec.md §4.7).
    pub fn lexical(&self, query: &str) -> Vec<LexicalHit> {
        let needle = query.to_lowercase();
        let docs = self.document_repo.list();
        let mut title_hits = Vec::new();
        let mut tag_hits = Vec::new();
        let mut content_ids: HashSet<String> = self.lexical.search(query).into_iter().collect();

        for doc in &docs {
            if doc.title.to_lowercase().contains(&needle) {
                title_hits.push(doc.id.clone());
                content_ids.remove(&doc.id);
            } else if doc.tags.iter().any(|t| t.to_lowercase().contains(&needle)) {
                tag_hits.push(doc.id.clone());
                content_ids.remove(&doc.id);
            }
        }

        let mut content_hits: Vec<String> = content_ids.into_iter().collect();
        content_hits.sort();

        title_hits
            .into_iter()
            .chain(tag_hits)
            .chain(content_hits)
            .filter_map(|doc_id| {
                let doc = docs.iter().find(|d| d.id == doc_id)?;
                let snippet = self
                    .lexical
                    .snippet(&doc_id, query, SNIPPET_RADIUS)
                    .unwrap_or_default();
                Some(LexicalHit {
                    doc_id,
                    title: doc.title.clone(),
                    snippet,
                })
            })
            .collect()
    }

    pub async fn semantic_chunks(
        &self,
        query: &str,
        k: usize,
        filter: Option<SearchFilter>,
    ) -> Result<Vec<ChunkHit>> {
        let query_vector = self.embedding_client.embed(query).await?;
        let hits = self.vector_store.search_by_vector(&query_vector, k, filter.as_ref())?;
        let docs = self.document_repo.list();

        let mut results: Vec<ChunkHit> = hits
            .into_iter()
            .map(|hit| {
                let title = docs
                    .iter()
                    .find(|d| d.id == hit.doc_id)
                    .map(|d| d.title.clone())
                    .unwrap_or_default();
                ChunkHit {
                    doc_id: hit.doc_id,
                    doc_title: title,
                    block_id: hit.id,
                    source_block_id: Some(hit.source_block_id),
                    content: hit.content,
                    block_type: hit.block_type,
                    heading_context: hit.heading_context,
                    score: (1.0 - hit.distance).clamp(0.0, 1.0),
                }
            })
            .collect();
        tie_break_chunks(&mut results);
        Ok(results)
    }

    /// Group the top `k' = 5k` chunks by document, keep the best `m=3`
    /// chunks per doc, sort by `maxScore` desc (spec.md §4.7).
    pub async fn semantic_documents(&self, query: &str, k: usize) -> Result<Vec<DocumentHit>> {
        let overfetched = self
            .semantic_chunks(query, k * SEMANTIC_DOC_OVERFETCH, None)
            .await?;
        Ok(group_into_documents(overfetched, k, None))
    }

    pub async fn related_documents(
        &self,
        source_content: &str,
        k: usize,
        exclude_doc_id: &str,
    ) -> Result<Vec<DocumentHit>> {
        let overfetched = self
            .semantic_chunks(source_content, k * SEMANTIC_DOC_OVERFETCH, None)
            .await?;
        Ok(group_into_documents(overfetched, k, Some(exclude_doc_id)))
    }

    /// Document-similarity graph: nodes are documents and external
    /// content rows; an edge is drawn when semantic similarity reaches
    /// `threshold` or the two nodes share a tag (spec.md §4.7).
    pub fn graph(&self, threshold: f32) -> Result<DocumentGraph> {
        let docs = self.document_repo.list();
        let mut nodes = Vec::new();
        let mut tags_by_doc: HashMap<String, HashSet<String>> = HashMap::new();
        let mut chunk_counts: HashMap<String, usize> = HashMap::new();

        for doc in &docs {
            let count = self.vector_store.existing_fingerprints(&doc.id)?.len();
            chunk_counts.insert(doc.id.clone(), count);
            tags_by_doc.insert(doc.id.clone(), doc.tags.iter().cloned().collect());
            nodes.push(GraphNode {
                id: doc.id.clone(),
                node_type: "document".to_string(),
                title: doc.title.clone(),
                tags: doc.tags.clone(),
                val: count,
                parent_doc_id: None,
                parent_block_id: None,
            });
        }

        for ec in self.vector_store.all_external_contents()? {
            nodes.push(GraphNode {
                id: ec.id.clone(),
                node_type: ec.block_type.as_str().to_string(),
                title: ec.title.clone(),
                tags: Vec::new(),
                val: 1,
                parent_doc_id: Some(ec.doc_id.clone()),
                parent_block_id: Some(ec.block_id.clone()),
            });
        }

        let vectors = self.vectors()?;
        let mut links = Vec::new();
        let mut seen_pairs: HashSet<(String, String)> = HashSet::new();

        for i in 0..vectors.len() {
            for j in (i + 1)..vectors.len() {
                let a = &vectors[i];
                let b = &vectors[j];
                if a.doc_id == b.doc_id {
                    continue;
                }
                let similarity = nook_core::vector::cosine_similarity(&a.vector, &b.vector);
                let has_semantic = similarity >= threshold;
                let has_tags = tags_by_doc
                    .get(&a.doc_id)
                    .zip(tags_by_doc.get(&b.doc_id))
                    .map(|(ta, tb)| ta.intersection(tb).next().is_some())
                    .unwrap_or(false);

                if !has_semantic && !has_tags {
                    continue;
                }

                let pair = if a.doc_id < b.doc_id {
                    (a.doc_id.clone(), b.doc_id.clone())
                } else {
                    (b.doc_id.clone(), a.doc_id.clone())
                };
                if !seen_pairs.insert(pair.clone()) {
                    continue;
                }

                links.push(GraphLink {
                    source: pair.0,
                    target: pair.1,
                    similarity,
                    has_semantic,
                    has_tags,
                });
            }
        }

        Ok(DocumentGraph { nodes, links })
    }

    /// Raw vectors for UI-side 2-D projection: one representative vector
    /// per document, the mean of all its chunk embeddings.
    pub fn vectors(&self) -> Result<Vec<DocVector>> {
        let docs = self.document_repo.list();
        let mut out = Vec::with_capacity(docs.len());
        for doc in &docs {
            let embeddings = self.vector_store.doc_embeddings(&doc.id)?;
            out.push(DocVector {
                doc_id: doc.id.clone(),
                title: doc.title.clone(),
                tags: doc.tags.clone(),
                vector: mean_vector(&embeddings),
            });
        }
        Ok(out)
    }
}

fn mean_vector(embeddings: &[Vec<f32>]) -> Vec<f32> {
    let Some(dim) = embeddings.first().map(|v| v.len()) else {
        return Vec::new();
    };
    let mut sum = vec![0.0f32; dim];
    for embedding in embeddings {
        for (i, v) in embedding.iter().enumerate() {
            if i < dim {
                sum[i] += v;
            }
        }
    }
    let n = embeddings.len() as f32;
    sum.iter().map(|v| v / n).collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocVector {
    pub doc_id: String,
    pub title: String,
    pub tags: Vec<String>,
    pub vector: Vec<f32>,
}

fn tie_break_chunks(hits: &mut [ChunkHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.block_id.cmp(&b.block_id))
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    });
}

fn group_into_documents(chunks: Vec<ChunkHit>, k: usize, exclude_doc_id: Option<&str>) -> Vec<DocumentHit> {
    let mut by_doc: HashMap<String, Vec<ChunkHit>> = HashMap::new();
    for chunk in chunks {
        if Some(chunk.doc_id.as_str()) == exclude_doc_id {
            continue;
        }
        by_doc.entry(chunk.doc_id.clone()).or_default().push(chunk);
    }

    let mut docs: Vec<DocumentHit> = by_doc
        .into_iter()
        .map(|(doc_id, mut chunks)| {
            tie_break_chunks(&mut chunks);
            let max_score = chunks.first().map(|c| c.score).unwrap_or(0.0);
            let doc_title = chunks.first().map(|c| c.doc_title.clone()).unwrap_or_default();
            chunks.truncate(CHUNKS_PER_DOC);
            DocumentHit {
                doc_id,
                doc_title,
                max_score,
                matched_chunks: chunks,
            }
        })
        .collect();

    docs.sort_by(|a, b| {
        b.max_score
            .partial_cmp(&a.max_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    });
    docs.truncate(k);
    docs
}
