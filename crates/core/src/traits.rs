use crate::completion::CompletionRequest;
use crate::{CompletionError, SearchError, SearchHit};
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex {
    async fn search_vector(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, SearchError>;
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

#[async_trait]
impl<T> CompletionClient for Box<T>
where
    T: CompletionClient + ?Sized,
{
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        (**self).complete(request).await
    }
}
