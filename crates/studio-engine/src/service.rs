use async_trait::async_trait;
use studio_contracts::generation::{GenerationRequest, GenerationResult};
use thiserror::Error;

/// Failure reported by a generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The backend answered with a non-success status.
    #[error("{message}")]
    Http { status: u16, message: String },
    /// No usable response was obtained.
    #[error("{0}")]
    Network(String),
}

impl ServiceError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Http { status, .. } => Some(*status),
            ServiceError::Network(_) => None,
        }
    }
}

/// Something that turns a [`GenerationRequest`] into a [`GenerationResult`].
///
/// Implementations need not watch for cancellation: callers race the returned
/// future against their own token and drop it when cancelled.
#[async_trait]
pub trait GenerationService: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, ServiceError>;
}
