use crate::completion::{CompletionRequest, SamplingParams, DEFAULT_MODEL};
use crate::extractor::PdfExtractor;
use crate::ingest::{document_from_file, is_pdf_name, UploadDir};
use crate::knowledge::KnowledgeBase;
use crate::prompt::{build_context, document_prompt, retrieval_prompt, truncate_chars, Prompt};
use crate::traits::CompletionClient;
use crate::{ChatAnswer, DocumentStore, QueryError, SearchError, UploadOutcome};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct AnswerSettings {
    pub model: String,
    pub sampling: SamplingParams,
    pub top_k: usize,
    pub document_char_budget: usize,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            sampling: SamplingParams::default(),
            top_k: 5,
            document_char_budget: 10_000,
        }
    }
}

/// Ties the document store, the knowledge base and the completion service together.
///
/// Two answering strategies are exposed side by side: [`chat`](Self::chat)
/// retrieves chunks across every indexed document, while
/// [`ask_document`](Self::ask_document) sends one whole document to the model.
pub struct AnswerCoordinator<C> {
    completion: C,
    documents: DocumentStore,
    knowledge: Arc<KnowledgeBase>,
    extractor: Arc<dyn PdfExtractor>,
    uploads: UploadDir,
    settings: AnswerSettings,
}

impl<C> AnswerCoordinator<C>
where
    C: CompletionClient,
{
    pub fn new(
        completion: C,
        documents: DocumentStore,
        knowledge: Arc<KnowledgeBase>,
        extractor: Arc<dyn PdfExtractor>,
        uploads: UploadDir,
        settings: AnswerSettings,
    ) -> Self {
        Self {
            completion,
            documents,
            knowledge,
            extractor,
            uploads,
            settings,
        }
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn settings(&self) -> &AnswerSettings {
        &self.settings
    }

    /// Retrieval-augmented answer over the whole knowledge base.
    pub async fn chat(&self, message: &str) -> Result<ChatAnswer, QueryError> {
        let question = message.trim();
        if question.is_empty() {
            return Err(QueryError::Validation("message must not be empty".to_string()));
        }

        let hits = self
            .knowledge
            .search(question, self.settings.top_k)
            .await?
            .ok_or(QueryError::NotReady)?;

        let context = build_context(&hits);
        let response = self.complete(retrieval_prompt(&context, question)).await?;

        let mut seen = HashSet::new();
        let context_sources = hits
            .into_iter()
            .map(|hit| hit.chunk.source_name)
            .filter(|name| seen.insert(name.clone()))
            .collect::<Vec<_>>();

        info!(sources = ?context_sources, "chat answered");
        Ok(ChatAnswer {
            response,
            context_sources,
        })
    }

    /// Answers from a single stored document, truncated to the configured character budget.
    pub async fn ask_document(&self, document_id: &str, question: &str) -> Result<String, QueryError> {
        let content = self.documents.get(document_id);
        if content.is_empty() {
            return Err(QueryError::NotFound(document_id.to_string()));
        }

        let excerpt = truncate_chars(&content, self.settings.document_char_budget);
        self.complete(document_prompt(excerpt, question)).await
    }

    /// Stores one uploaded PDF and makes it available to both answering modes.
    ///
    /// A file without extractable text is removed again and reported as skipped.
    /// If the vector index cannot be updated the file is removed as well and the
    /// error is returned; the document store is left untouched.
    pub async fn ingest_upload(
        &self,
        original_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadOutcome, QueryError> {
        if !is_pdf_name(original_name) {
            return Err(QueryError::Validation(format!(
                "only PDF files are allowed: {original_name}"
            )));
        }

        let uploads = self.uploads.clone();
        let extractor = Arc::clone(&self.extractor);
        let name = original_name.to_string();
        let extracted = tokio::task::spawn_blocking(move || {
            let path = uploads.save(&name, &bytes)?;
            match document_from_file(extractor.as_ref(), &path) {
                Ok(Some(document)) => Ok(Some(document)),
                Ok(None) => {
                    uploads.discard(&path);
                    Ok(None)
                }
                Err(error) => {
                    uploads.discard(&path);
                    Err(error)
                }
            }
        })
        .await
        .map_err(|error| SearchError::Task(error.to_string()))??;

        let Some(document) = extracted else {
            return Ok(UploadOutcome::Skipped {
                name: original_name.to_string(),
                reason: "no extractable text".to_string(),
            });
        };

        let summary = document.summary();
        let stored_path = PathBuf::from(&document.source_path);

        // Only documents that made it into the index become visible.
        let knowledge = Arc::clone(&self.knowledge);
        let indexed = {
            let document = document.clone();
            tokio::task::spawn_blocking(move || knowledge.index_document(&document))
                .await
                .map_err(|error| SearchError::Task(error.to_string()))
                .and_then(|result| result)
        };
        if let Err(error) = indexed {
            error!(document = %summary.id, %error, "failed to index upload, discarding it");
            self.uploads.discard(&stored_path);
            return Err(QueryError::Search(error));
        }

        self.documents.insert(document);
        Ok(UploadOutcome::Stored(summary))
    }

    async fn complete(&self, prompt: Prompt) -> Result<String, QueryError> {
        let request = CompletionRequest {
            system: prompt.system,
            user: prompt.user,
            model: self.settings.model.clone(),
            sampling: self.settings.sampling,
        };
        Ok(self.completion.complete(&request).await?)
    }
}
