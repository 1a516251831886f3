use crate::types::ImageInput;
use async_trait::async_trait;
use visearch_common::Result;

/// Common trait for image embedding providers
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for an image given by URL or raw bytes
    async fn embed_image(&self, input: &ImageInput) -> Result<Vec<f32>>;

    /// Model name used for embeddings
    fn model(&self) -> &str;

    /// Embedding dimension this provider is configured to return
    fn dimension(&self) -> usize;
}
