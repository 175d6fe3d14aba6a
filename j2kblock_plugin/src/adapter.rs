//! The block codec adapter: bridges the host's slice-in/slice-out block
//! calls onto the engine, and maps every failure onto the host's integer
//! sentinel convention at the registered entry points.

use j2kblock_engine::ImageShape;
use log::error;

use crate::error::PluginError;
use crate::lifecycle;

/// Shape of one uncompressed block as the host describes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockShape {
    pub num_components: u32,
    pub height: u32,
    pub width: u32,
    pub typesize: u8,
}

impl BlockShape {
    /// Saturates on overflow: a host passing dimensions no buffer can hold
    /// gets a shape error from the length check, not an arithmetic panic.
    pub fn raw_len(&self) -> usize {
        (self.num_components as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(self.width as usize)
            .saturating_mul(self.typesize as usize)
    }

    fn to_image_shape(self) -> Result<ImageShape, PluginError> {
        let num_components = u16::try_from(self.num_components).map_err(|_| {
            PluginError::BadBlockShape(format!(
                "{} components exceed the supported maximum of {}",
                self.num_components,
                u16::MAX
            ))
        })?;
        Ok(ImageShape {
            num_components,
            height: self.height,
            width: self.width,
            typesize: self.typesize,
        })
    }
}

/// Encode one block. Returns the size of the stream written to `dst`.
pub fn encode_block(src: &[u8], dst: &mut [u8], shape: &BlockShape) -> Result<usize, PluginError> {
    lifecycle::ensure_ready()?;
    let image = shape.to_image_shape()?;
    j2kblock_engine::compress(src, &image, dst).map_err(PluginError::from_engine)
}

/// Decode one stream. Returns the number of raw bytes written to `dst`; the
/// sample layout comes entirely from the stream itself.
pub fn decode_block(src: &[u8], dst: &mut [u8]) -> Result<usize, PluginError> {
    lifecycle::ensure_ready()?;
    j2kblock_engine::decompress(src, dst).map_err(PluginError::from_engine)
}

fn to_status(result: Result<usize, PluginError>, what: &str) -> i32 {
    match result {
        Ok(n) => match i32::try_from(n) {
            Ok(n) => n,
            Err(_) => {
                error!("{what}: {n} bytes written overflows the status integer");
                crate::error::SENTINEL_ENGINE_FAILURE
            }
        },
        Err(e) => {
            error!("{what}: {e}");
            e.sentinel()
        }
    }
}

/// Registry entry point for encoding. Never panics across the host boundary;
/// every failure becomes a negative sentinel.
pub fn encode_entry(src: &[u8], dst: &mut [u8], shape: &BlockShape) -> i32 {
    to_status(encode_block(src, dst, shape), "block encode")
}

/// Registry entry point for decoding.
pub fn decode_entry(src: &[u8], dst: &mut [u8]) -> i32 {
    to_status(decode_block(src, dst), "block decode")
}
