//! JPEG2000 block-codec plugin for a chunked-array storage engine.
//!
//! The host stores arrays as independent blocks and dispatches per-block
//! compression to codecs registered under stable numeric ids. This crate
//! provides the JPEG2000 codec for that protocol:
//!
//! - [`schema`]: the closed, versioned option catalogue;
//! - [`store`]: one-shot configuration, marshalled into the engine's
//!   positional parameter block;
//! - [`registry`]: codec id registration and lookup;
//! - [`adapter`]: the slice-in/slice-out block entry points, with every
//!   failure mapped onto the host's negative-integer sentinels;
//! - [`lifecycle`]: explicit engine init/destroy with an RAII guard.
//!
//! Configuration is out-of-band shared state. [`store::configure`] replaces
//! the engine's process-wide defaults wholesale, and the next encode call
//! observes them; making the configure call happen-before that encode is the
//! caller's obligation.

pub mod adapter;
pub mod lifecycle;
pub mod registry;
pub mod schema;
pub mod store;
pub mod wire;

mod error;

pub use adapter::{decode_block, encode_block, BlockShape};
pub use error::{
    PluginError, SENTINEL_BAD_SHAPE, SENTINEL_CAPACITY_EXCEEDED, SENTINEL_ENGINE_FAILURE,
    SENTINEL_LIFECYCLE,
};
pub use lifecycle::EngineGuard;
pub use registry::{register_jpeg2000, JPEG2000_CODEC_ID, RESERVED_MAX_ID};
pub use schema::{OptionKind, OptionValue, SCHEMA, SCHEMA_VERSION};
pub use store::configure;
