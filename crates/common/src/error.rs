/// Visual search error types
#[derive(Debug, thiserror::Error)]
pub enum VisearchError {
    /// Catalog store could not be read and no usable snapshot exists
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// Query vector length does not match the catalog dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding provider failure (network, HTTP status, malformed body)
    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network/HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Request body over the configured size limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// General error (anyhow integration)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VisearchError {
    /// Create catalog unavailable error
    pub fn catalog_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::CatalogUnavailable(msg.into())
    }

    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Create embedding provider error
    pub fn embedding_provider<S: Into<String>>(msg: S) -> Self {
        Self::EmbeddingProvider(msg.into())
    }

    /// Create config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create payload too large error
    pub fn payload_too_large<S: Into<String>>(msg: S) -> Self {
        Self::PayloadTooLarge(msg.into())
    }

    /// Create not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

// HTTP response conversion
impl VisearchError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::NotFound(_) => 404,
            Self::PayloadTooLarge(_) => 413,
            Self::DimensionMismatch { .. } => 422,
            Self::EmbeddingProvider(_) => 502,
            Self::CatalogUnavailable(_) => 503,
            Self::Network(_) => 503,
            Self::Config(_) => 500,
            Self::Internal(_) => 500,
            Self::Io(_) => 500,
            Self::Json(_) => 400,
            Self::Other(_) => 500,
        }
    }

    /// Short machine-readable kind, used in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CatalogUnavailable(_) => "catalog_unavailable",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::EmbeddingProvider(_) => "embedding_provider_error",
            Self::Config(_) => "config_error",
            Self::Network(_) => "network_error",
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::Json(_) => "invalid_json",
            Self::Internal(_) | Self::Io(_) | Self::Other(_) => "internal_error",
        }
    }
}
