use thiserror::Error;

/// Failures reported by the engine runtime and the compress/decompress paths.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine runtime is not initialized")]
    NotInitialized,

    #[error("engine runtime has been destroyed")]
    Destroyed,

    /// The positional parameter block pushed by the configuration layer could
    /// not be decoded. The message names the offending position, because a
    /// single reordered field corrupts every field after it.
    #[error("bad parameter block: {0}")]
    BadParameterBlock(String),

    #[error("unsupported image geometry: {0}")]
    Unsupported(String),

    #[error("destination capacity {capacity} too small for a {needed} byte stream")]
    CapacityExceeded { needed: usize, capacity: usize },

    #[error("malformed codestream: {0}")]
    Malformed(String),

    #[error("rate allocation failed: {0}")]
    RateAllocation(String),

    #[error("entropy stage failed: {0}")]
    Entropy(String),
}
