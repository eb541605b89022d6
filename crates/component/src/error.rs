pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error returned by a consumer in the pipeline.
///
/// Permanent errors signal that resubmitting the same payload can never
/// succeed; callers must not retry them.
#[derive(Debug, thiserror::Error)]
pub enum ConsumeError {
    #[error("{0}")]
    Permanent(BoxError),
    #[error(transparent)]
    Other(BoxError),
}

impl ConsumeError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self::Other(source.into())
    }

    pub fn permanent(source: impl Into<BoxError>) -> Self {
        Self::Permanent(source.into())
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }
}
