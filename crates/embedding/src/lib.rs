//! Visual Search Embedding Integration
//!
//! Image embedding provider trait and the Jina CLIP HTTP client

mod client;
mod provider;
mod types;

pub use client::JinaClient;
pub use provider::EmbeddingProvider;
pub use types::{EmbedInput, EmbedRequest, EmbedResponse, ImageInput};
