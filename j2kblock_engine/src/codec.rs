//! The compress/decompress pipeline.
//!
//! Both calls are synchronous and blocking. Compression runs against the
//! runtime's effective defaults (configured out-of-band, see
//! [`crate::set_default_params`]); decompression needs no configuration at
//! all — the stream header carries the full sample layout.

use log::{debug, info, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::codestream::{
    self, Container, StreamHeader, CODESTREAM_OVERHEAD, FLAG_HT, FLAG_IRREVERSIBLE, FLAG_MCT,
    FLAG_WIDE_SAMPLES, JP2_OVERHEAD,
};
use crate::error::EngineError;
use crate::params::{EncoderDefaults, FileFormat, QualityMode};
use crate::rate::{self, ShiftPlan};
use crate::runtime;
use crate::transform;

const ZSTD_LEVEL: i32 = 3;

/// Layout of one uncompressed block: `num_components` contiguous planes of
/// `height * width` unsigned little-endian samples of `typesize` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageShape {
    pub num_components: u16,
    pub height: u32,
    pub width: u32,
    pub typesize: u8,
}

impl ImageShape {
    /// Saturates on overflow; a saturated value can never match a real
    /// source buffer, so oversized shapes fail the length check instead of
    /// overflowing.
    pub fn raw_len(&self) -> usize {
        (self.num_components as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(self.width as usize)
            .saturating_mul(self.typesize as usize)
    }

    /// Bits per sample.
    pub fn precision(&self) -> u8 {
        self.typesize * 8
    }
}

/// Parsed view of a stream, for inspection tools.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub container: Container,
    pub header: StreamHeader,
}

/// Parse a stream's container and main header without decoding the payload.
pub fn inspect(stream: &[u8]) -> Result<StreamInfo, EngineError> {
    let (container, cs) = codestream::unwrap(stream)?;
    let header = StreamHeader::from_bytes(cs)?;
    Ok(StreamInfo { container, header })
}

/// Quantization shift for component `c`: the ROI component keeps
/// `roi_shift` more bits of precision than the rest of the image.
fn effective_shift(shift: u8, roi_component: i32, roi_shift: u8, c: usize) -> u8 {
    if roi_component >= 0 && c == roi_component as usize {
        shift.saturating_sub(roi_shift)
    } else {
        shift
    }
}

fn entropy_encode(pre: &[u8], high_throughput: bool) -> Result<Vec<u8>, EngineError> {
    if high_throughput {
        Ok(lz4_flex::compress_prepend_size(pre))
    } else {
        zstd::bulk::compress(pre, ZSTD_LEVEL).map_err(|e| EngineError::Entropy(e.to_string()))
    }
}

fn entropy_decode(
    payload: &[u8],
    high_throughput: bool,
    expected_len: usize,
) -> Result<Vec<u8>, EngineError> {
    let pre = if high_throughput {
        lz4_flex::decompress_size_prepended(payload)
            .map_err(|e| EngineError::Malformed(format!("lz4 payload: {e}")))?
    } else {
        zstd::bulk::decompress(payload, expected_len)
            .map_err(|e| EngineError::Malformed(format!("zstd payload: {e}")))?
    };
    if pre.len() != expected_len {
        return Err(EngineError::Malformed(format!(
            "payload decoded to {} bytes, header implies {expected_len}",
            pre.len()
        )));
    }
    Ok(pre)
}

/// Quantize the (possibly transformed) planes at `shift` and run the entropy
/// stage. This is the per-truncation-point step of rate allocation.
fn encode_payload(
    planes: &[Vec<i64>],
    cfg: &EncoderDefaults,
    shape: &ImageShape,
    shift: u8,
    wide: bool,
) -> Result<Vec<u8>, EngineError> {
    let ts = shape.typesize as usize;
    let mut pre = Vec::with_capacity(planes.len() * planes[0].len() * if wide { 4 } else { ts });
    for (c, plane) in planes.iter().enumerate() {
        let mut q = plane.clone();
        transform::quantize(
            &mut q,
            effective_shift(shift, cfg.roi_component, cfg.roi_shift, c),
        );
        if wide {
            transform::wide_to_bytes(&q, &mut pre);
        } else {
            let off = pre.len();
            pre.resize(off + q.len() * ts, 0);
            transform::samples_to_bytes(&q, shape.typesize, &mut pre[off..]);
        }
    }
    entropy_encode(&pre, cfg.high_throughput())
}

/// Compress one block against the current effective defaults.
///
/// Writes the finished stream into `dst` and returns its size. Never writes
/// past `dst.len()`: a stream that cannot fit fails with
/// [`EngineError::CapacityExceeded`] instead.
pub fn compress(src: &[u8], shape: &ImageShape, dst: &mut [u8]) -> Result<usize, EngineError> {
    let cfg = runtime::snapshot()?;

    if !matches!(shape.typesize, 1 | 2 | 4) {
        return Err(EngineError::Unsupported(format!(
            "typesize {} (supported: 1, 2, 4)",
            shape.typesize
        )));
    }
    if shape.num_components == 0 || shape.height == 0 || shape.width == 0 {
        return Err(EngineError::Unsupported(format!("degenerate shape {shape:?}")));
    }
    if src.len() != shape.raw_len() {
        return Err(EngineError::Unsupported(format!(
            "block of {} bytes does not match shape {shape:?} ({} bytes)",
            src.len(),
            shape.raw_len()
        )));
    }

    let n = shape.height as usize * shape.width as usize;
    let ts = shape.typesize as usize;
    let mut planes = Vec::with_capacity(shape.num_components as usize);
    for c in 0..shape.num_components as usize {
        planes.push(transform::samples_from_bytes(
            &src[c * n * ts..(c + 1) * n * ts],
            shape.typesize,
        )?);
    }

    let use_mct = cfg.mct != 0 && shape.num_components == 3 && shape.precision() <= 16;
    if cfg.mct != 0 && !use_mct {
        debug!(
            "mct requested but not applicable ({} components, {} bit)",
            shape.num_components,
            shape.precision()
        );
    }
    if use_mct {
        let (head, tail) = planes.split_at_mut(1);
        let (mid, last) = tail.split_at_mut(1);
        transform::rct_forward(&mut head[0], &mut mid[0], &mut last[0]);
    }
    if cfg.max_component_size > 0 {
        debug!("max_component_size is advisory; the entropy stage does not enforce it");
    }

    let container_overhead = CODESTREAM_OVERHEAD
        + if cfg.cod_format == FileFormat::Jp2 {
            JP2_OVERHEAD
        } else {
            0
        };
    let capacity_budget = dst.len().saturating_sub(container_overhead);
    let cap_budget = if cfg.max_codestream_size > 0 {
        capacity_budget.min((cfg.max_codestream_size as usize).saturating_sub(container_overhead))
    } else {
        capacity_budget
    };

    let base_shift = u8::from(cfg.irreversible);
    let max_shift = shape.precision() - 1;
    let encode = |shift: u8| encode_payload(&planes, &cfg, shape, shift, use_mct);

    let plan = match cfg.quality_mode {
        None => {
            let payload = encode(base_shift)?;
            if cfg.max_codestream_size > 0 && payload.len() > cap_budget {
                // Without a quality specification there is no knob left to
                // shrink the stream; honoring the cap would break losslessness.
                return Err(EngineError::RateAllocation(format!(
                    "stream of {} bytes exceeds max_codestream_size {} and no quality mode is set",
                    payload.len() + container_overhead,
                    cfg.max_codestream_size
                )));
            }
            ShiftPlan {
                shift: base_shift,
                payload,
                within_budget: true,
            }
        }
        Some(QualityMode::Rates) => {
            let ratio = rate::binding_ratio(&cfg.quality_layers);
            // The requested ratio is over the finished stream, so the payload
            // budget must leave room for the container bytes.
            let target = ((src.len() as f64 / ratio).floor() as usize)
                .saturating_sub(container_overhead);
            rate::find_shift(
                base_shift,
                max_shift,
                target.min(cap_budget),
                cfg.rate_control,
                encode,
            )?
        }
        Some(QualityMode::Psnr) => {
            let db = rate::binding_psnr(&cfg.quality_layers);
            let start = base_shift.max(rate::psnr_to_shift(db, shape.precision()));
            rate::find_shift(start, max_shift, cap_budget, cfg.rate_control, encode)?
        }
    };
    if !plan.within_budget {
        warn!(
            "rate target unreachable, best effort at shift {} ({} bytes)",
            plan.shift,
            plan.payload.len()
        );
    }

    let mut flags = 0u8;
    if cfg.irreversible || plan.shift > 0 {
        flags |= FLAG_IRREVERSIBLE;
    }
    if use_mct {
        flags |= FLAG_MCT | FLAG_WIDE_SAMPLES;
    }
    if cfg.high_throughput() {
        flags |= FLAG_HT;
    }

    let header = StreamHeader {
        flags,
        width: shape.width,
        height: shape.height,
        num_components: shape.num_components,
        precision: shape.precision(),
        shift: plan.shift,
        num_layers: cfg.num_layers,
        progression: cfg.progression.code(),
        num_resolutions: cfg.num_resolutions,
        num_guard_bits: cfg.num_guard_bits,
        codeblock: [cfg.codeblock_size[0] as u16, cfg.codeblock_size[1] as u16],
        profile: cfg.profile,
        roi_component: cfg.roi_component.clamp(i16::MIN as i32, i16::MAX as i32) as i16,
        roi_shift: cfg.roi_shift,
        payload_len: plan.payload.len() as u32,
        checksum: xxh3_64(&plan.payload),
    };

    let cs = codestream::assemble(&header, &plan.payload);
    let stream = if cfg.cod_format == FileFormat::Jp2 {
        codestream::wrap_jp2(&cs)
    } else {
        cs
    };
    if stream.len() > dst.len() {
        return Err(EngineError::CapacityExceeded {
            needed: stream.len(),
            capacity: dst.len(),
        });
    }
    dst[..stream.len()].copy_from_slice(&stream);

    if cfg.verbose {
        info!(
            "compressed {} -> {} bytes (shift {}, {:.2}x)",
            src.len(),
            stream.len(),
            plan.shift,
            src.len() as f64 / stream.len() as f64
        );
    } else {
        debug!("compressed {} -> {} bytes", src.len(), stream.len());
    }
    Ok(stream.len())
}

/// Decompress one stream into `dst`, reconstructing the exact sample layout
/// recorded in the stream header. Returns the number of raw bytes written.
pub fn decompress(src: &[u8], dst: &mut [u8]) -> Result<usize, EngineError> {
    runtime::check_ready()?;

    let (_, cs) = codestream::unwrap(src)?;
    let (header, payload) = codestream::split(cs)?;

    if header.checksum != xxh3_64(payload) {
        return Err(EngineError::Malformed(format!(
            "payload checksum mismatch (expected {:016x})",
            header.checksum
        )));
    }
    if !matches!(header.precision, 8 | 16 | 32) {
        return Err(EngineError::Malformed(format!(
            "precision {} bits not supported",
            header.precision
        )));
    }

    let raw_len = header.raw_len().ok_or_else(|| {
        EngineError::Malformed(format!(
            "implausible dimensions {}x{}x{} at {} bit",
            header.num_components, header.height, header.width, header.precision
        ))
    })?;
    if dst.len() < raw_len {
        return Err(EngineError::CapacityExceeded {
            needed: raw_len,
            capacity: dst.len(),
        });
    }

    let comps = header.num_components as usize;
    let n = header.height as usize * header.width as usize;
    let ts = header.precision as usize / 8;
    let wide = header.has_flag(FLAG_WIDE_SAMPLES);
    let expected = comps * n * if wide { 4 } else { ts };

    let pre = entropy_decode(payload, header.has_flag(FLAG_HT), expected)?;

    let per_plane = if wide { n * 4 } else { n * ts };
    let mut planes: Vec<Vec<i64>> = Vec::with_capacity(comps);
    for c in 0..comps {
        let chunk = &pre[c * per_plane..(c + 1) * per_plane];
        let mut plane = if wide {
            transform::wide_from_bytes(chunk)?
        } else {
            transform::samples_from_bytes(chunk, ts as u8)?
        };
        if header.shift > 0 {
            transform::dequantize(
                &mut plane,
                effective_shift(
                    header.shift,
                    header.roi_component as i32,
                    header.roi_shift,
                    c,
                ),
            );
        }
        planes.push(plane);
    }

    if header.has_flag(FLAG_MCT) {
        if comps != 3 {
            return Err(EngineError::Malformed(format!(
                "MCT flag on a {comps} component stream"
            )));
        }
        let (head, tail) = planes.split_at_mut(1);
        let (mid, last) = tail.split_at_mut(1);
        transform::rct_inverse(&mut head[0], &mut mid[0], &mut last[0]);
    }

    for (c, plane) in planes.iter().enumerate() {
        transform::samples_to_bytes(plane, ts as u8, &mut dst[c * n * ts..(c + 1) * n * ts]);
    }
    debug!("decompressed {} -> {} bytes", src.len(), raw_len);
    Ok(raw_len)
}
