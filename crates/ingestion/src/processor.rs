//! Ingestion processor
//!
//! Core pipeline for documents: chunk, embed in batches through a bounded
//! worker pool, insert into the vector index, prune stale chunks.

use crate::chunker::Chunker;
use crate::errors::IngestionError;
use crate::ledger::DocumentLedger;
use crate::loader;
use dealflow_common::config::AppConfig;
use dealflow_common::embeddings::{Embedder, Embedding};
use dealflow_common::errors::AppError;
use dealflow_common::metrics;
use dealflow_common::models::{Chunk, CompanyRecord, Document, DocumentType};
use dealflow_search::index::{IndexEntry, VectorIndex};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Pipeline tuning
#[derive(Debug, Clone)]
pub struct IngestionSettings {
    pub chunk_max_length: usize,
    pub chunk_overlap: usize,
    pub embedding_batch_size: usize,
    pub embedding_workers: usize,
    pub max_concurrent_documents: usize,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for IngestionSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            chunk_max_length: config.engine.chunk_max_length,
            chunk_overlap: config.engine.chunk_overlap,
            embedding_batch_size: config.embedding.batch_size,
            embedding_workers: config.embedding.workers,
            max_concurrent_documents: config.ingestion.max_concurrent_documents,
        }
    }
}

/// Outcome of one successfully ingested document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub document_id: Uuid,
    pub company_id: Uuid,
    pub chunks: usize,

    /// Chunks of this id beyond the new chunk count, removed after indexing
    pub pruned: usize,
    pub duration_ms: u64,
}

/// A document that could not be ingested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub document_id: Uuid,
    pub title: String,
    pub error: String,
    pub retryable: bool,
}

/// Per-document results of a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub succeeded: Vec<IngestionReport>,
    pub failed: Vec<DocumentFailure>,

    /// Documents never started because the batch was cancelled
    pub cancelled: Vec<Uuid>,
}

enum Outcome {
    Done(IngestionReport),
    Failed(DocumentFailure),
    Cancelled(Uuid),
}

/// Cancellation channel for [`IngestionProcessor::ingest_batch`].
///
/// Send `true` to stop scheduling further documents.
pub fn cancellation() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Document ingestion pipeline
pub struct IngestionProcessor {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    ledger: DocumentLedger,
    embed_permits: Arc<Semaphore>,
    batch_size: usize,
    max_concurrent_documents: usize,
}

impl IngestionProcessor {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<VectorIndex>,
        settings: IngestionSettings,
    ) -> Result<Self, IngestionError> {
        let chunker = Chunker::new(settings.chunk_max_length, settings.chunk_overlap)?;

        if settings.chunk_max_length > embedder.max_input_chars() {
            return Err(AppError::invalid_argument(format!(
                "chunk_max_length {} exceeds embedder input limit {}",
                settings.chunk_max_length,
                embedder.max_input_chars()
            ))
            .into());
        }
        if embedder.model_id() != index.model_id() {
            return Err(AppError::ModelMismatch {
                expected: index.model_id().to_string(),
                actual: embedder.model_id().to_string(),
            }
            .into());
        }
        if embedder.dimension() != index.dimension() {
            return Err(AppError::Configuration {
                message: format!(
                    "embedder dimension {} does not match index dimension {}",
                    embedder.dimension(),
                    index.dimension()
                ),
            }
            .into());
        }

        Ok(Self {
            chunker,
            embedder,
            index,
            ledger: DocumentLedger::default(),
            embed_permits: Arc::new(Semaphore::new(settings.embedding_workers.max(1))),
            batch_size: settings.embedding_batch_size.max(1),
            max_concurrent_documents: settings.max_concurrent_documents.max(1),
        })
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Chunk, embed and index one document.
    ///
    /// Nothing is inserted unless every chunk embedded into a vector the
    /// index accepts. A document id stays bound to the content it was first
    /// ingested with: re-ingesting identical content is idempotent, different
    /// content fails with [`AppError::DocumentConflict`] until the document is
    /// deleted.
    #[instrument(skip(self, document), fields(document_id = %document.id, company_id = %document.company_id))]
    pub async fn ingest(&self, document: &Document) -> Result<IngestionReport, IngestionError> {
        let start = Instant::now();
        let claim = self.ledger.claim(document)?;

        let chunks = self.chunker.chunk_document(document);
        if chunks.is_empty() {
            warn!("Document has no text; indexing nothing");
        }

        let embeddings = self.embed_chunks(&chunks).await?;
        let entries: Vec<IndexEntry> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry::for_chunk(document, chunk, embedding))
            .collect();
        for entry in &entries {
            self.index.check_embedding(&entry.embedding)?;
        }
        for entry in entries {
            self.index.insert(entry)?;
        }
        let pruned = self.index.prune_document(&document.id, chunks.len() as u32);
        claim.indexed();

        let duration = start.elapsed();
        metrics::record_ingestion(
            duration.as_secs_f64(),
            chunks.len(),
            document_type_label(document.document_type),
        );
        metrics::record_index_size(self.index.len());

        info!(
            chunks = chunks.len(),
            pruned,
            duration_ms = duration.as_millis() as u64,
            "Document ingested"
        );

        Ok(IngestionReport {
            document_id: document.id,
            company_id: document.company_id,
            chunks: chunks.len(),
            pruned,
            duration_ms: duration.as_millis() as u64,
        })
    }

    /// Embed chunk texts in batches, at most `embedding_workers` batches at a time
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Embedding>, IngestionError> {
        let batches = chunks.chunks(self.batch_size).map(|batch| async move {
            let _permit = self
                .embed_permits
                .acquire()
                .await
                .map_err(|e| AppError::Internal {
                    message: format!("embedding pool closed: {}", e),
                })?;

            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let started = Instant::now();
            let result = self.embedder.embed_batch(&texts).await;
            metrics::record_embedding(
                started.elapsed().as_secs_f64(),
                self.embedder.model_id(),
                texts.len(),
                result.is_ok(),
            );

            let embeddings = result?;
            if embeddings.len() != texts.len() {
                return Err(AppError::embedding(format!(
                    "embedder returned {} vectors for {} inputs",
                    embeddings.len(),
                    texts.len()
                )));
            }
            debug!(batch_size = texts.len(), "Embedded batch");
            Ok(embeddings)
        });

        let results = futures::future::try_join_all(batches).await?;
        Ok(results.into_iter().flatten().collect())
    }

    /// Ingest many documents concurrently.
    ///
    /// Each document succeeds or fails on its own. Once `cancel` reads `true`
    /// no further documents start; finished ones stay searchable.
    #[instrument(skip(self, documents, cancel), fields(documents = documents.len()))]
    pub async fn ingest_batch(
        &self,
        documents: Vec<Document>,
        cancel: watch::Receiver<bool>,
    ) -> BatchReport {
        let outcomes: Vec<Outcome> = stream::iter(documents)
            .map(|document| {
                let cancel = cancel.clone();
                async move {
                    if *cancel.borrow() {
                        return Outcome::Cancelled(document.id);
                    }
                    match self.ingest(&document).await {
                        Ok(report) => Outcome::Done(report),
                        Err(e) => {
                            error!(
                                document_id = %document.id,
                                title = %document.title,
                                error = %e,
                                "Failed to ingest document"
                            );
                            let e = AppError::from(e);
                            Outcome::Failed(DocumentFailure {
                                document_id: document.id,
                                title: document.title.clone(),
                                retryable: e.is_retryable(),
                                error: e.to_string(),
                            })
                        }
                    }
                }
            })
            .buffer_unordered(self.max_concurrent_documents)
            .collect()
            .await;

        let mut report = BatchReport::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Done(r) => report.succeeded.push(r),
                Outcome::Failed(f) => report.failed.push(f),
                Outcome::Cancelled(id) => report.cancelled.push(id),
            }
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled.len(),
            "Batch ingestion complete"
        );
        report
    }

    /// Load a file from disk and ingest it for `company_id`
    #[instrument(skip(self, industry), fields(path = %path.display()))]
    pub async fn ingest_path(
        &self,
        path: &Path,
        company_id: Uuid,
        industry: Option<String>,
    ) -> Result<IngestionReport, IngestionError> {
        let document = load_document(path.to_path_buf(), company_id, industry).await?;
        self.ingest(&document).await
    }

    /// Ingest every supported file in `dir` for `company_id`
    pub async fn ingest_directory(
        &self,
        dir: &Path,
        company_id: Uuid,
        industry: Option<String>,
        cancel: watch::Receiver<bool>,
    ) -> Result<BatchReport, IngestionError> {
        let mut documents = Vec::new();
        let mut load_failures = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || loader::SourceFormat::from_path(&path).is_err() {
                continue;
            }
            match load_document(path.clone(), company_id, industry.clone()).await {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                    let e = AppError::from(e);
                    load_failures.push(DocumentFailure {
                        document_id: Uuid::nil(),
                        title: path.display().to_string(),
                        retryable: e.is_retryable(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let mut report = self.ingest_batch(documents, cancel).await;
        report.failed.extend(load_failures);
        Ok(report)
    }

    /// Embed a company's synthesized description as its profile entry
    #[instrument(skip(self, record), fields(company_id = %record.id))]
    pub async fn index_company_profile(&self, record: &CompanyRecord) -> Result<Uuid, IngestionError> {
        let mut text = record.synthesize_description();
        let limit = self.embedder.max_input_chars();
        if text.chars().count() > limit {
            text = text.chars().take(limit).collect();
        }

        let embedding = self.embedder.embed(&text).await?;
        let entry = IndexEntry::for_company_profile(record, text, embedding);
        let id = entry.id;
        self.index.insert(entry)?;
        metrics::record_index_size(self.index.len());

        debug!(entry_id = %id, "Company profile indexed");
        Ok(id)
    }

    /// Remove every chunk of a document
    pub fn delete_document(&self, document_id: &Uuid) -> Result<usize, AppError> {
        let removed = self.index.delete_document(document_id);
        self.ledger.forget(document_id);
        if removed == 0 {
            return Err(AppError::DocumentNotFound {
                id: document_id.to_string(),
            });
        }
        metrics::record_index_size(self.index.len());
        info!(document_id = %document_id, removed, "Document deleted");
        Ok(removed)
    }
}

/// Build a document from a file, extracting text off the async runtime
pub async fn load_document(
    path: PathBuf,
    company_id: Uuid,
    industry: Option<String>,
) -> Result<Document, IngestionError> {
    let title = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Untitled".to_string());

    let text = tokio::task::spawn_blocking(move || loader::load_text(&path))
        .await
        .map_err(|e| AppError::Internal {
            message: format!("loader task failed: {}", e),
        })??;

    let mut document = Document::new(company_id, title.clone(), DocumentType::from_filename(&title), text);
    document.industry = industry;
    Ok(document)
}

fn document_type_label(document_type: DocumentType) -> &'static str {
    match document_type {
        DocumentType::Filing => "filing",
        DocumentType::Deck => "deck",
        DocumentType::Report => "report",
        DocumentType::ResearchNote => "research_note",
        DocumentType::Other => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dealflow_common::embeddings::HashingEmbedder;
    use dealflow_common::errors::Result as AppResult;
    use dealflow_search::index::EntryFilter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MODEL: &str = "hash-test";
    const DIM: usize = 128;

    fn settings() -> IngestionSettings {
        IngestionSettings {
            chunk_max_length: 120,
            chunk_overlap: 20,
            embedding_batch_size: 3,
            embedding_workers: 2,
            max_concurrent_documents: 2,
        }
    }

    fn processor_with(embedder: Arc<dyn Embedder>) -> IngestionProcessor {
        let index = Arc::new(VectorIndex::new(MODEL, DIM, 4).unwrap());
        IngestionProcessor::new(embedder, index, settings()).unwrap()
    }

    fn processor() -> IngestionProcessor {
        processor_with(Arc::new(HashingEmbedder::new(MODEL, DIM, 1000).unwrap()))
    }

    fn document(company: u128, text: &str) -> Document {
        Document::new(Uuid::from_u128(company), "memo.txt", DocumentType::Report, text)
    }

    /// Fails on any batch containing the marker text
    struct FlakyEmbedder {
        inner: HashingEmbedder,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        async fn embed(&self, text: &str) -> AppResult<Embedding> {
            self.inner.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Embedding>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if texts.iter().any(|t| t.contains("POISON")) {
                return Err(AppError::embedding("backend unavailable"));
            }
            self.inner.embed_batch(texts).await
        }

        fn model_id(&self) -> &str {
            self.inner.model_id()
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn max_input_chars(&self) -> usize {
            self.inner.max_input_chars()
        }
    }

    #[tokio::test]
    async fn test_ingest_indexes_every_chunk() {
        let processor = processor();
        let doc = document(1, &"Quarterly revenue increased sharply. ".repeat(30));
        let report = processor.ingest(&doc).await.unwrap();

        assert!(report.chunks > 1);
        assert_eq!(processor.index().len(), report.chunks);
        let first = processor.index().get(&Chunk::derive_id(doc.id, 0)).unwrap();
        assert_eq!(first.metadata.document_id, Some(doc.id));
        processor.index().validate().unwrap();
    }

    #[tokio::test]
    async fn test_reingesting_identical_content_is_idempotent() {
        let processor = processor();
        let doc = document(1, &"Long original text body. ".repeat(40));
        let first = processor.ingest(&doc).await.unwrap();
        let second = processor.ingest(&doc).await.unwrap();

        assert_eq!(second.chunks, first.chunks);
        assert_eq!(second.pruned, 0);
        assert_eq!(processor.index().len(), first.chunks);
    }

    #[tokio::test]
    async fn test_reusing_an_id_for_new_content_conflicts() {
        let processor = processor();
        let mut doc = document(1, &"Long original text body. ".repeat(40));
        let first = processor.ingest(&doc).await.unwrap();

        doc.text = "Now much shorter.".to_string();
        assert!(matches!(
            processor.ingest(&doc).await,
            Err(IngestionError::Core(AppError::DocumentConflict { .. }))
        ));
        assert_eq!(processor.index().len(), first.chunks);

        processor.delete_document(&doc.id).unwrap();
        let replacement = processor.ingest(&doc).await.unwrap();
        assert_eq!(replacement.chunks, 1);
        assert_eq!(processor.index().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_versions_of_one_id_never_mix() {
        let processor = processor();
        let a = document(1, &"Version A describes the grid business. ".repeat(20));
        let mut b = a.clone();
        b.text = "Version B is short.".to_string();
        let (_tx, rx) = cancellation();

        let report = processor.ingest_batch(vec![a.clone(), b], rx).await;
        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(!report.failed[0].retryable);

        // The first document claims the id before the second is polled
        let winner = &report.succeeded[0];
        assert!(winner.chunks > 1);
        assert_eq!(processor.index().len(), winner.chunks);
        for i in 0..winner.chunks as u32 {
            let entry = processor.index().get(&Chunk::derive_id(a.id, i)).unwrap();
            assert!(!entry.metadata.text.contains("Version B"));
        }
    }

    /// Returns a non-finite component in the last vector of every batch
    struct NanTailEmbedder {
        inner: HashingEmbedder,
    }

    #[async_trait]
    impl Embedder for NanTailEmbedder {
        async fn embed(&self, text: &str) -> AppResult<Embedding> {
            self.inner.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Embedding>> {
            let mut embeddings = self.inner.embed_batch(texts).await?;
            if let Some(last) = embeddings.last_mut() {
                last.vector[0] = f32::NAN;
            }
            Ok(embeddings)
        }

        fn model_id(&self) -> &str {
            self.inner.model_id()
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn max_input_chars(&self) -> usize {
            self.inner.max_input_chars()
        }
    }

    #[tokio::test]
    async fn test_rejected_embedding_leaves_no_chunks() {
        let processor = processor_with(Arc::new(NanTailEmbedder {
            inner: HashingEmbedder::new(MODEL, DIM, 1000).unwrap(),
        }));
        let doc = document(1, &"Quarterly revenue increased sharply. ".repeat(30));

        assert!(processor.ingest(&doc).await.is_err());
        assert!(processor.index().is_empty());
        assert!(!processor.ledger.is_bound(&doc.id));
    }

    #[tokio::test]
    async fn test_empty_document_indexes_nothing() {
        let processor = processor();
        let report = processor.ingest(&document(1, "")).await.unwrap();
        assert_eq!(report.chunks, 0);
        assert!(processor.index().is_empty());
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let embedder = Arc::new(FlakyEmbedder {
            inner: HashingEmbedder::new(MODEL, DIM, 1000).unwrap(),
            calls: AtomicUsize::new(0),
        });
        let processor = processor_with(embedder);

        let good_a = document(1, "Healthy pipeline of enterprise customers.");
        let bad = document(2, "This text is POISON for the backend.");
        let good_b = document(3, "Strong recurring revenue base.");
        let (_tx, rx) = cancellation();

        let report = processor
            .ingest_batch(vec![good_a.clone(), bad.clone(), good_b.clone()], rx)
            .await;

        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].document_id, bad.id);
        assert!(report.failed[0].retryable);

        let filter = EntryFilter::for_company(Uuid::from_u128(2));
        let query = HashingEmbedder::new(MODEL, DIM, 1000).unwrap().embed_sync("poison").unwrap();
        assert!(processor.index().search(&query, 5, Some(&filter)).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_batch_starts_nothing_new() {
        let processor = processor();
        let docs: Vec<Document> = (0..4).map(|i| document(i, "Some filing text.")).collect();
        let (tx, rx) = cancellation();
        tx.send(true).unwrap();

        let report = processor.ingest_batch(docs, rx).await;
        assert_eq!(report.cancelled.len(), 4);
        assert!(report.succeeded.is_empty());
        assert!(processor.index().is_empty());
    }

    #[tokio::test]
    async fn test_company_profile_is_upserted() {
        let processor = processor();
        let mut record = CompanyRecord::new(Uuid::from_u128(9), "Gridworks");
        record.revenue_millions = Some(42.0);

        let a = processor.index_company_profile(&record).await.unwrap();
        let b = processor.index_company_profile(&record).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(processor.index().len(), 1);
        let entry = processor.index().get(&a).unwrap();
        assert!(entry.metadata.text.contains("Gridworks"));
    }

    #[tokio::test]
    async fn test_delete_document() {
        let processor = processor();
        let doc = document(1, &"Body text. ".repeat(40));
        processor.ingest(&doc).await.unwrap();
        assert!(processor.delete_document(&doc.id).unwrap() > 0);
        assert!(processor.index().is_empty());
        assert!(matches!(
            processor.delete_document(&doc.id),
            Err(AppError::DocumentNotFound { .. })
        ));
    }

    #[test]
    fn test_chunk_length_must_fit_embedder() {
        let embedder = Arc::new(HashingEmbedder::new(MODEL, DIM, 50).unwrap());
        let index = Arc::new(VectorIndex::new(MODEL, DIM, 4).unwrap());
        assert!(IngestionProcessor::new(embedder, index, settings()).is_err());
    }

    #[test]
    fn test_model_must_match_index() {
        let embedder = Arc::new(HashingEmbedder::new("other", DIM, 1000).unwrap());
        let index = Arc::new(VectorIndex::new(MODEL, DIM, 4).unwrap());
        assert!(matches!(
            IngestionProcessor::new(embedder, index, settings()),
            Err(IngestionError::Core(AppError::ModelMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn test_ingest_path() {
        let dir = std::env::temp_dir().join(format!("dealflow-ingest-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("acme_10-K.txt"), "Annual report.\n\nRevenue grew.").unwrap();
        std::fs::write(dir.join("ignored.xlsx"), "binary").unwrap();

        let processor = processor();
        let (_tx, rx) = cancellation();
        let report = processor
            .ingest_directory(&dir, Uuid::from_u128(5), Some("energy".into()), rx)
            .await
            .unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(report.succeeded.len(), 1);
        assert!(report.failed.is_empty());
        let stats = processor.index().stats();
        assert_eq!(stats.companies, 1);
    }
}
