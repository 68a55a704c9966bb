/// A failure reported by the caller-supplied chunk provider.
///
/// Provider failures terminate a progressive load early; the session still
/// yields whatever was accumulated before the failure (partial success), and
/// the error surfaces through a [`crate::EngineEvent::DataError`]
/// notification rather than a panic.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("chunk provider failed at offset {offset}: {message}")]
pub struct ProviderError {
    pub offset: usize,
    pub message: String,
}

impl ProviderError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// Errors surfaced by the engine itself.
///
/// Missing/empty datasets are not errors: those paths return empty results
/// (see [`crate::virtualize`]). Absent host capabilities degrade gracefully
/// and are logged, so `EnvironmentUnavailable` only appears when a caller
/// explicitly asks for a capability that was never installed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("host capability unavailable: {0}")]
    EnvironmentUnavailable(&'static str),
}
