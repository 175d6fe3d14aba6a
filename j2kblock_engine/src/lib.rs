//! A JPEG2000-style block compression engine.
//!
//! The engine mirrors the calling contract of the native image-codec
//! libraries it stands in for:
//!
//! - a process-wide runtime brought up with [`initialize`] and torn down with
//!   [`shutdown`];
//! - one configuration entry point, [`set_default_params`], taking a
//!   versioned *positional* parameter block and replacing the process-wide
//!   effective defaults wholesale;
//! - blocking [`compress`] / [`decompress`] calls that operate on one block
//!   at a time, where compression observes whatever defaults were configured
//!   last and decompression is driven entirely by the stream's own header.
//!
//! Because configuration is out-of-band shared state, a configure call must
//! happen-before the encode that should observe it; the runtime only
//! guarantees that each call sees one internally consistent snapshot.

pub mod codestream;
pub mod params;

mod codec;
mod error;
mod rate;
mod runtime;
mod transform;

pub use codec::{compress, decompress, inspect, ImageShape, StreamInfo};
pub use codestream::Container;
pub use error::EngineError;
pub use params::{
    EncoderDefaults, FileFormat, ProgressionOrder, QualityMode, RateControl, WireValue,
    CBLK_STYLE_HT, PARAMS_ABI_VERSION, PARAMS_FIELD_COUNT,
};
pub use runtime::{effective_defaults, initialize, set_default_params, shutdown};
