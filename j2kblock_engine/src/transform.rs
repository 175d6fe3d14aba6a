//! Sample transforms: component (de)interleaving, the reversible
//! multi-component transform, and quantization by bit shift.

use crate::error::EngineError;

/// Read one component plane of `count` unsigned little-endian samples.
pub fn samples_from_bytes(src: &[u8], typesize: u8) -> Result<Vec<i64>, EngineError> {
    let ts = typesize as usize;
    if src.len() % ts != 0 {
        return Err(EngineError::Unsupported(format!(
            "{} bytes is not a multiple of typesize {ts}",
            src.len()
        )));
    }
    let mut out = Vec::with_capacity(src.len() / ts);
    match typesize {
        1 => out.extend(src.iter().map(|&b| b as i64)),
        2 => out.extend(
            src.chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]) as i64),
        ),
        4 => out.extend(
            src.chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as i64),
        ),
        other => {
            return Err(EngineError::Unsupported(format!(
                "typesize {other} (supported: 1, 2, 4)"
            )))
        }
    }
    Ok(out)
}

/// Write samples back as unsigned little-endian values of `typesize` bytes,
/// clamping into the representable range.
pub fn samples_to_bytes(samples: &[i64], typesize: u8, dst: &mut [u8]) {
    let max = if typesize == 4 {
        u32::MAX as i64
    } else {
        (1i64 << (typesize as u32 * 8)) - 1
    };
    match typesize {
        1 => {
            for (d, &s) in dst.iter_mut().zip(samples) {
                *d = s.clamp(0, max) as u8;
            }
        }
        2 => {
            for (d, &s) in dst.chunks_exact_mut(2).zip(samples) {
                d.copy_from_slice(&(s.clamp(0, max) as u16).to_le_bytes());
            }
        }
        _ => {
            for (d, &s) in dst.chunks_exact_mut(4).zip(samples) {
                d.copy_from_slice(&(s.clamp(0, max) as u32).to_le_bytes());
            }
        }
    }
}

/// Serialize samples widened to i32, used when a transform may have produced
/// signed values.
pub fn wide_to_bytes(samples: &[i64], dst: &mut Vec<u8>) {
    for &s in samples {
        dst.extend_from_slice(&(s as i32).to_le_bytes());
    }
}

/// Inverse of [`wide_to_bytes`].
pub fn wide_from_bytes(src: &[u8]) -> Result<Vec<i64>, EngineError> {
    if src.len() % 4 != 0 {
        return Err(EngineError::Malformed(format!(
            "wide sample payload of {} bytes is not a multiple of 4",
            src.len()
        )));
    }
    Ok(src
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as i64)
        .collect())
}

// ── Reversible multi-component transform ──────────────────────────────────
//
// The RCT of ITU-T T.800 Annex G: exact integer inverse, so the lossless
// path stays bit-exact through color decorrelation.

/// Forward RCT in place over three equally sized component planes.
pub fn rct_forward(c0: &mut [i64], c1: &mut [i64], c2: &mut [i64]) {
    for i in 0..c0.len() {
        let (r, g, b) = (c0[i], c1[i], c2[i]);
        let y = (r + 2 * g + b) >> 2;
        let u = b - g;
        let v = r - g;
        c0[i] = y;
        c1[i] = u;
        c2[i] = v;
    }
}

/// Inverse RCT in place.
pub fn rct_inverse(c0: &mut [i64], c1: &mut [i64], c2: &mut [i64]) {
    for i in 0..c0.len() {
        let (y, u, v) = (c0[i], c1[i], c2[i]);
        let g = y - ((u + v) >> 2);
        c0[i] = v + g;
        c1[i] = g;
        c2[i] = u + g;
    }
}

// ── Quantization ───────────────────────────────────────────────────────────

/// Drop the `shift` least significant bits of every sample.
pub fn quantize(samples: &mut [i64], shift: u8) {
    if shift == 0 {
        return;
    }
    for s in samples.iter_mut() {
        *s >>= shift;
    }
}

/// Reconstruct quantized samples at the midpoint of the dropped interval.
pub fn dequantize(samples: &mut [i64], shift: u8) {
    if shift == 0 {
        return;
    }
    let bias = 1i64 << (shift - 1);
    for s in samples.iter_mut() {
        *s = (*s << shift) + bias;
    }
}
