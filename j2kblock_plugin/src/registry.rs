//! The codec registry: numeric codec ids mapped to encode/decode entry
//! points.
//!
//! The host engine dispatches per-block codec calls by a stable numeric id
//! persisted in stored data, so an id must always resolve to the same pair
//! of entry points. Re-registering an id with the identical pair is a no-op;
//! re-registering it with a different pair is an error, never a silent
//! replacement.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use log::info;

use crate::adapter::{self, BlockShape};
use crate::error::PluginError;

/// Highest codec id reserved for the host's built-in codecs.
pub const RESERVED_MAX_ID: u16 = 159;

/// Registered id of the JPEG2000 block codec.
pub const JPEG2000_CODEC_ID: u16 = 160;

/// Block encode entry point. Returns bytes written, or a negative sentinel.
pub type EncodeFn = fn(src: &[u8], dst: &mut [u8], shape: &BlockShape) -> i32;

/// Block decode entry point. Returns bytes written, or a negative sentinel.
pub type DecodeFn = fn(src: &[u8], dst: &mut [u8]) -> i32;

#[derive(Debug, Clone, Copy)]
pub struct CodecEntry {
    pub id: u16,
    pub name: &'static str,
    pub encode: EncodeFn,
    pub decode: DecodeFn,
}

fn table() -> &'static RwLock<HashMap<u16, CodecEntry>> {
    static TABLE: OnceLock<RwLock<HashMap<u16, CodecEntry>>> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register a codec under `id`.
///
/// Ids through [`RESERVED_MAX_ID`] belong to the host's built-ins and are
/// rejected. Registration is idempotent for an identical entry-point pair.
pub fn register(entry: CodecEntry) -> Result<(), PluginError> {
    if entry.id <= RESERVED_MAX_ID {
        return Err(PluginError::ReservedCodecId {
            id: entry.id,
            reserved: RESERVED_MAX_ID,
        });
    }
    let mut map = table().write().unwrap_or_else(|p| p.into_inner());
    if let Some(existing) = map.get(&entry.id) {
        let same = std::ptr::fn_addr_eq(existing.encode, entry.encode)
            && std::ptr::fn_addr_eq(existing.decode, entry.decode);
        if same {
            return Ok(());
        }
        return Err(PluginError::CodecIdConflict { id: entry.id });
    }
    info!("registered codec '{}' under id {}", entry.name, entry.id);
    map.insert(entry.id, entry);
    Ok(())
}

pub fn lookup(id: u16) -> Option<CodecEntry> {
    let map = table().read().unwrap_or_else(|p| p.into_inner());
    map.get(&id).copied()
}

/// Register the JPEG2000 block codec under [`JPEG2000_CODEC_ID`].
pub fn register_jpeg2000() -> Result<(), PluginError> {
    register(CodecEntry {
        id: JPEG2000_CODEC_ID,
        name: "jpeg2000",
        encode: adapter::encode_entry,
        decode: adapter::decode_entry,
    })
}
