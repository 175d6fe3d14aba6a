//! Stream framing: the raw codestream layout and the boxed JP2 container.
//!
//! Every stream is self-describing — width, height, component count and
//! sample precision travel in the main header, so a decoder can reconstruct
//! the original block layout without any out-of-band metadata.

use crate::error::EngineError;

/// Start-of-codestream marker.
pub const SOC: [u8; 2] = [0xFF, 0x4F];
/// Start-of-data marker, terminating the main header.
pub const SOD: [u8; 2] = [0xFF, 0x93];
/// End-of-codestream marker.
pub const EOC: [u8; 2] = [0xFF, 0xD9];

pub const STREAM_VERSION: u8 = 1;

/// Fixed size of the main header, SOC through SOD inclusive:
///   SOC[2] + version:u8 + flags:u8 + width:u32 + height:u32
///   + num_components:u16 + precision:u8 + shift:u8 + num_layers:u16
///   + progression:u8 + num_resolutions:u8 + num_guard_bits:u8
///   + codeblock_w:u16 + codeblock_h:u16 + profile:u16
///   + roi_component:i16 + roi_shift:u8 + payload_len:u32 + checksum:u64
///   + reserved[4] + SOD[2]
///   = 2+1+1+4+4+2+1+1+2+1+1+1+2+2+2+2+1+4+8+4+2 = 48
pub const MAIN_HEADER_SIZE: usize = 48;

/// Bytes a raw codestream adds around the entropy payload (header + EOC).
pub const CODESTREAM_OVERHEAD: usize = MAIN_HEADER_SIZE + 2;

// ── Coding flags ───────────────────────────────────────────────────────────

/// Irreversible (quantized) encode; reconstruction is approximate.
pub const FLAG_IRREVERSIBLE: u8 = 1 << 0;
/// Multi-component decorrelation transform was applied.
pub const FLAG_MCT: u8 = 1 << 1;
/// High-throughput coding path (fast entropy stage, no rate control).
pub const FLAG_HT: u8 = 1 << 2;
/// Payload samples are stored widened to i32 (set on the MCT path, where
/// transformed chroma samples are signed).
pub const FLAG_WIDE_SAMPLES: u8 = 1 << 3;

/// Decoded representation of the main header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    pub flags: u8,
    pub width: u32,
    pub height: u32,
    pub num_components: u16,
    /// Bits per original sample (8, 16 or 32).
    pub precision: u8,
    /// Quantization shift applied at encode time (0 = lossless).
    pub shift: u8,
    pub num_layers: u16,
    pub progression: u8,
    pub num_resolutions: u8,
    pub num_guard_bits: u8,
    pub codeblock: [u16; 2],
    pub profile: u16,
    /// Component with preferential bit allocation, -1 when no ROI.
    pub roi_component: i16,
    pub roi_shift: u8,
    pub payload_len: u32,
    /// xxh3-64 of the entropy payload.
    pub checksum: u64,
}

impl StreamHeader {
    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    /// Size in bytes of the original uncompressed block this stream encodes.
    ///
    /// The header fields are attacker-controlled on the decode path, so the
    /// product is checked; `None` marks dimensions no real block can have.
    pub fn raw_len(&self) -> Option<usize> {
        (self.num_components as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.width as usize)?
            .checked_mul(self.precision as usize / 8)
    }

    /// Serialize to exactly `MAIN_HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; MAIN_HEADER_SIZE] {
        let mut buf = [0u8; MAIN_HEADER_SIZE];
        buf[0..2].copy_from_slice(&SOC);
        buf[2] = STREAM_VERSION;
        buf[3] = self.flags;
        buf[4..8].copy_from_slice(&self.width.to_le_bytes());
        buf[8..12].copy_from_slice(&self.height.to_le_bytes());
        buf[12..14].copy_from_slice(&self.num_components.to_le_bytes());
        buf[14] = self.precision;
        buf[15] = self.shift;
        buf[16..18].copy_from_slice(&self.num_layers.to_le_bytes());
        buf[18] = self.progression;
        buf[19] = self.num_resolutions;
        buf[20] = self.num_guard_bits;
        buf[21..23].copy_from_slice(&self.codeblock[0].to_le_bytes());
        buf[23..25].copy_from_slice(&self.codeblock[1].to_le_bytes());
        buf[25..27].copy_from_slice(&self.profile.to_le_bytes());
        buf[27..29].copy_from_slice(&self.roi_component.to_le_bytes());
        buf[29] = self.roi_shift;
        buf[30..34].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[34..42].copy_from_slice(&self.checksum.to_le_bytes());
        // reserved[4] stays zero
        buf[46..48].copy_from_slice(&SOD);
        buf
    }

    /// Parse the main header from the start of a raw codestream.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, EngineError> {
        if buf.len() < MAIN_HEADER_SIZE {
            return Err(EngineError::Malformed(format!(
                "stream of {} bytes is shorter than the {MAIN_HEADER_SIZE} byte header",
                buf.len()
            )));
        }
        if buf[0..2] != SOC {
            return Err(EngineError::Malformed("missing SOC marker".into()));
        }
        if buf[2] != STREAM_VERSION {
            return Err(EngineError::Malformed(format!(
                "stream version {} not supported (expected {STREAM_VERSION})",
                buf[2]
            )));
        }
        if buf[46..48] != SOD {
            return Err(EngineError::Malformed("missing SOD marker".into()));
        }
        let le_u16 = |at: usize| u16::from_le_bytes([buf[at], buf[at + 1]]);
        let le_u32 = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
        let le_u64 = |at: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&buf[at..at + 8]);
            u64::from_le_bytes(b)
        };
        Ok(Self {
            flags: buf[3],
            width: le_u32(4),
            height: le_u32(8),
            num_components: le_u16(12),
            precision: buf[14],
            shift: buf[15],
            num_layers: le_u16(16),
            progression: buf[18],
            num_resolutions: buf[19],
            num_guard_bits: buf[20],
            codeblock: [le_u16(21), le_u16(23)],
            profile: le_u16(25),
            roi_component: le_u16(27) as i16,
            roi_shift: buf[29],
            payload_len: le_u32(30),
            checksum: le_u64(34),
        })
    }
}

/// Assemble a raw codestream: header, entropy payload, EOC trailer.
pub fn assemble(header: &StreamHeader, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAIN_HEADER_SIZE + payload.len() + EOC.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&EOC);
    out
}

/// Split a raw codestream into its header and entropy payload, verifying the
/// EOC trailer and the declared payload length.
pub fn split(stream: &[u8]) -> Result<(StreamHeader, &[u8]), EngineError> {
    let header = StreamHeader::from_bytes(stream)?;
    let payload_end = MAIN_HEADER_SIZE + header.payload_len as usize;
    if stream.len() < payload_end + EOC.len() {
        return Err(EngineError::Malformed(format!(
            "stream truncated: {} bytes, header declares a {} byte payload",
            stream.len(),
            header.payload_len
        )));
    }
    if stream[payload_end..payload_end + 2] != EOC {
        return Err(EngineError::Malformed("missing EOC marker".into()));
    }
    Ok((header, &stream[MAIN_HEADER_SIZE..payload_end]))
}

// ── JP2 container ──────────────────────────────────────────────────────────
//
// Box framing follows ISO base media: u32 big-endian length (including the
// 8-byte box header), 4-byte type, content. A zero length means the box runs
// to end of file.

/// JP2 signature box, fixed 12 bytes.
pub const JP2_SIGNATURE: [u8; 12] = [
    0x00, 0x00, 0x00, 0x0C, b'j', b'P', b' ', b' ', 0x0D, 0x0A, 0x87, 0x0A,
];

const FTYP_BOX: [u8; 20] = [
    0x00, 0x00, 0x00, 0x14, b'f', b't', b'y', b'p', b'j', b'p', b'2', b' ', 0x00, 0x00, 0x00,
    0x00, b'j', b'p', b'2', b' ',
];

/// Bytes the boxed container adds around a raw codestream.
pub const JP2_OVERHEAD: usize = JP2_SIGNATURE.len() + FTYP_BOX.len() + 8;

/// Wrap a raw codestream in signature, ftyp and jp2c boxes.
pub fn wrap_jp2(codestream: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(JP2_OVERHEAD + codestream.len());
    out.extend_from_slice(&JP2_SIGNATURE);
    out.extend_from_slice(&FTYP_BOX);
    let box_len = (8 + codestream.len()) as u32;
    out.extend_from_slice(&box_len.to_be_bytes());
    out.extend_from_slice(b"jp2c");
    out.extend_from_slice(codestream);
    out
}

/// Container detected on a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Raw,
    Jp2,
}

/// Locate the raw codestream inside `stream`, which may be bare or boxed.
pub fn unwrap(stream: &[u8]) -> Result<(Container, &[u8]), EngineError> {
    if stream.len() >= 2 && stream[0..2] == SOC {
        return Ok((Container::Raw, stream));
    }
    if stream.len() >= JP2_SIGNATURE.len() && stream[..JP2_SIGNATURE.len()] == JP2_SIGNATURE {
        let mut pos = JP2_SIGNATURE.len();
        while pos + 8 <= stream.len() {
            let declared = u32::from_be_bytes([
                stream[pos],
                stream[pos + 1],
                stream[pos + 2],
                stream[pos + 3],
            ]) as usize;
            let box_type = &stream[pos + 4..pos + 8];
            let end = if declared == 0 {
                stream.len()
            } else {
                pos + declared
            };
            if declared != 0 && (declared < 8 || end > stream.len()) {
                return Err(EngineError::Malformed(format!(
                    "box {:?} declares {declared} bytes at offset {pos}, stream has {}",
                    String::from_utf8_lossy(box_type),
                    stream.len()
                )));
            }
            if box_type == b"jp2c" {
                return Ok((Container::Jp2, &stream[pos + 8..end]));
            }
            pos = end;
        }
        return Err(EngineError::Malformed("no jp2c box in container".into()));
    }
    Err(EngineError::Malformed(
        "neither a codestream (SOC) nor a boxed container (signature box)".into(),
    ))
}
