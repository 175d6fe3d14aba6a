//! Rate allocation.
//!
//! The engine has a single distortion knob, the quantization shift, so the
//! feasible truncation points are the shifts `base..=max`. Compressed size is
//! monotonically non-increasing in the shift, which makes both search
//! strategies equivalent in outcome and lets bisection skip encode attempts.

use crate::error::EngineError;
use crate::params::RateControl;

/// Result of a shift search.
pub struct ShiftPlan {
    pub shift: u8,
    pub payload: Vec<u8>,
    /// False when even the deepest shift missed the budget (best effort).
    pub within_budget: bool,
}

/// Map a PSNR target to a quantization shift: each discarded bit plane costs
/// roughly 6 dB, with 60 dB treated as transparent quality.
pub fn psnr_to_shift(db: f64, precision: u8) -> u8 {
    let planes = ((60.0 - db) / 6.0).round();
    planes.clamp(0.0, precision.saturating_sub(1) as f64) as u8
}

/// The layer value that bounds the final stream size. For ratio targets the
/// largest requested ratio wins; layers below it are truncation points inside
/// the stream, not size constraints.
pub fn binding_ratio(layers: &[f64]) -> f64 {
    layers.iter().copied().fold(1.0_f64, f64::max)
}

/// For PSNR targets the highest dB value governs the full reconstruction.
pub fn binding_psnr(layers: &[f64]) -> f64 {
    layers.iter().copied().fold(0.0_f64, f64::max)
}

/// Find the smallest shift in `base..=max` whose payload fits `budget`.
///
/// `encode` produces the entropy payload for a candidate shift; it is invoked
/// once per probed truncation point.
pub fn find_shift(
    base: u8,
    max: u8,
    budget: usize,
    strategy: RateControl,
    mut encode: impl FnMut(u8) -> Result<Vec<u8>, EngineError>,
) -> Result<ShiftPlan, EngineError> {
    debug_assert!(base <= max);
    match strategy {
        RateControl::PcrdOpt => {
            let mut last = None;
            for shift in base..=max {
                let payload = encode(shift)?;
                if payload.len() <= budget {
                    return Ok(ShiftPlan {
                        shift,
                        payload,
                        within_budget: true,
                    });
                }
                last = Some((shift, payload));
            }
            let (shift, payload) = last.ok_or_else(|| {
                EngineError::RateAllocation("no truncation point probed".into())
            })?;
            Ok(ShiftPlan {
                shift,
                payload,
                within_budget: false,
            })
        }
        RateControl::Bisect => {
            // Invariant: everything below `lo` misses the budget; `best`
            // holds the smallest fitting shift seen so far.
            let mut lo = base;
            let mut hi = max;
            let mut best: Option<(u8, Vec<u8>)> = None;
            let mut deepest: Option<(u8, Vec<u8>)> = None;
            while lo <= hi {
                let mid = lo + (hi - lo) / 2;
                let payload = encode(mid)?;
                if payload.len() <= budget {
                    best = Some((mid, payload));
                    if mid == base {
                        break;
                    }
                    hi = mid - 1;
                } else {
                    deepest = Some((mid, payload));
                    if mid == max {
                        break;
                    }
                    lo = mid + 1;
                }
            }
            if let Some((shift, payload)) = best {
                return Ok(ShiftPlan {
                    shift,
                    payload,
                    within_budget: true,
                });
            }
            // Nothing fit; re-probe max if bisection never landed there.
            let (shift, payload) = match deepest {
                Some((s, p)) if s == max => (s, p),
                _ => (max, encode(max)?),
            };
            Ok(ShiftPlan {
                shift,
                payload,
                within_budget: false,
            })
        }
    }
}
