use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// Query image, by reference or by content
#[derive(Debug, Clone, PartialEq)]
pub enum ImageInput {
    /// Publicly reachable image URL
    Url(String),

    /// Raw image bytes with their content type (e.g. "image/jpeg")
    Bytes { data: Vec<u8>, mime_type: String },
}

impl ImageInput {
    /// Value placed in the `image` field of the embedding request
    pub fn to_request_value(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Bytes { data, mime_type } => {
                format!("data:{};base64,{}", mime_type, STANDARD.encode(data))
            }
        }
    }

    /// Short description for logs and search responses
    pub fn describe(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Bytes { data, mime_type } => format!("{} ({} bytes)", mime_type, data.len()),
        }
    }
}

/// Embedding API request
#[derive(Debug, Clone, Serialize)]
pub struct EmbedRequest {
    /// Model name (e.g., "jina-clip-v2")
    pub model: String,

    /// Requested output dimension
    pub dimensions: usize,

    /// Inputs to embed
    pub input: Vec<EmbedInput>,
}

/// Single image input
#[derive(Debug, Clone, Serialize)]
pub struct EmbedInput {
    pub image: String,
}

impl EmbedRequest {
    pub fn for_image(model: impl Into<String>, dimensions: usize, image: &ImageInput) -> Self {
        Self {
            model: model.into(),
            dimensions,
            input: vec![EmbedInput {
                image: image.to_request_value(),
            }],
        }
    }
}

/// Embedding API response
#[derive(Debug, Clone, Deserialize)]
pub struct EmbedResponse {
    #[serde(default)]
    pub data: Vec<EmbeddingData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingData {
    #[serde(default)]
    pub index: usize,

    #[serde(default)]
    pub embedding: Vec<f32>,
}

impl EmbedResponse {
    /// Embedding of the first input, if the provider returned one
    pub fn into_first_embedding(self) -> Option<Vec<f32>> {
        self.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|e| !e.is_empty())
    }
}
