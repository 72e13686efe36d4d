use thiserror::Error;

/// Error kinds produced by the binder, dispatcher, transformer, and runtime
/// stages of a [`crate::kernel::Kernel`].
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("unsupported dtype or schema: {0}")]
    UnsupportedSchema(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("internal assertion failed: {0}")]
    InternalAssertion(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("invalid loop level {0}, expected 2 or 3")]
    InvalidLoopLevel(i64),

    #[error("symbolic rank missing for value: {0}")]
    MissingSymbolicRank(String),

    #[error("random and broadcast lowerings cannot be mixed in one compile")]
    RandomBroadcastConflict,

    #[error("fallback path failed: {0}")]
    FallbackFailed(String),

    #[error("backend execution error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, KernelError>;
