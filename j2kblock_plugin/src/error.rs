use j2kblock_engine::EngineError;
use thiserror::Error;

/// Failure sentinels of the host's per-block codec protocol. The host calls
/// the registered entry points expecting an integer status: a value >= 0 is
/// bytes written, anything below zero is one of these.
pub const SENTINEL_CAPACITY_EXCEEDED: i32 = -1;
pub const SENTINEL_ENGINE_FAILURE: i32 = -2;
pub const SENTINEL_LIFECYCLE: i32 = -3;
pub const SENTINEL_BAD_SHAPE: i32 = -4;

/// Error taxonomy of the plugin core.
#[derive(Debug, Error)]
pub enum PluginError {
    /// One or more configuration keys are not in the schema. Every offending
    /// key is listed; the caller never has to fix them one at a time.
    #[error("unsupported options: {}", .0.join(", "))]
    UnsupportedOption(Vec<String>),

    #[error("invalid value for option '{option}': {reason}")]
    InvalidOptionValue { option: String, reason: String },

    /// Options that are valid individually but jointly unsupported.
    #[error("incompatible options: {0}")]
    IncompatibleOptions(String),

    /// The encoded stream cannot fit the destination buffer. Recoverable:
    /// the host falls back to storing the block uncompressed.
    #[error("destination capacity {capacity} too small for a {needed} byte stream")]
    CapacityExceeded { needed: usize, capacity: usize },

    #[error("block shape mismatch: {0}")]
    BadBlockShape(String),

    #[error("codec id {id} is already registered with a different entry-point pair")]
    CodecIdConflict { id: u16 },

    #[error("codec id {id} collides with host built-ins (ids through {reserved} are reserved)")]
    ReservedCodecId { id: u16, reserved: u16 },

    #[error("lifecycle: {0}")]
    Lifecycle(String),

    /// The external engine reported an internal error.
    #[error("codec engine failure: {0}")]
    CodecEngineFailure(#[source] EngineError),
}

impl PluginError {
    /// Map this error onto the host's integer failure convention.
    pub fn sentinel(&self) -> i32 {
        match self {
            Self::CapacityExceeded { .. } => SENTINEL_CAPACITY_EXCEEDED,
            Self::Lifecycle(_) => SENTINEL_LIFECYCLE,
            Self::BadBlockShape(_) => SENTINEL_BAD_SHAPE,
            _ => SENTINEL_ENGINE_FAILURE,
        }
    }

    pub(crate) fn from_engine(err: EngineError) -> Self {
        match err {
            EngineError::CapacityExceeded { needed, capacity } => {
                Self::CapacityExceeded { needed, capacity }
            }
            EngineError::NotInitialized => {
                Self::Lifecycle("engine called before initialization".into())
            }
            EngineError::Destroyed => Self::Lifecycle("engine called after destroy".into()),
            EngineError::Unsupported(msg) => Self::BadBlockShape(msg),
            other => Self::CodecEngineFailure(other),
        }
    }
}
