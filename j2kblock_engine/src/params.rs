//! Engine-side view of the positional configuration ABI.
//!
//! The configuration entry point ([`crate::set_default_params`]) consumes a
//! flat, ordered list of [`WireValue`]s. The field order below is a fixed
//! contract with the calling side: reordering, inserting, or omitting a field
//! corrupts every field after it, so the decoder reports errors by position
//! and field name, and the layout carries an explicit version number.
//!
//! ABI v1 layout (30 fields):
//!
//! | # | field | wire kind |
//! |---|-------|-----------|
//! | 0 | tile_size | IntArray[2] |
//! | 1 | tile_offset | IntArray[2] |
//! | 2 | num_layers | Int (derived by the caller) |
//! | 3 | quality_mode | Str (None = lossless) |
//! | 4 | quality_layers | FloatArray |
//! | 5 | num_guard_bits | Int |
//! | 6 | progression | Int (code) |
//! | 7 | num_resolutions | Int |
//! | 8 | codeblock_size | IntArray[2] |
//! | 9 | codeblock_style | Int (bit flags) |
//! | 10 | irreversible | Bool |
//! | 11 | roi_component | Int (-1 = none) |
//! | 12 | roi_shift | Int |
//! | 13 | precinct_size | IntArray[2] |
//! | 14 | image_offset | IntArray[2] |
//! | 15 | decod_format | Int (code) |
//! | 16 | cod_format | Int (code) |
//! | 17 | tile_parts | Bool |
//! | 18 | mct | Int |
//! | 19 | max_codestream_size | Int |
//! | 20 | max_component_size | Int |
//! | 21 | profile | Int (code) |
//! | 22 | framerate | Int |
//! | 23 | apply_icc | Bool |
//! | 24 | rate_control | Int (code) |
//! | 25 | num_threads | Int |
//! | 26 | device_id | Int |
//! | 27 | duration | Int |
//! | 28 | repeats | Int |
//! | 29 | verbose | Bool |

use crate::error::EngineError;

/// Version of the positional layout decoded by [`EncoderDefaults::from_positional`].
pub const PARAMS_ABI_VERSION: u32 = 1;

/// Exact number of fields in ABI v1.
pub const PARAMS_FIELD_COUNT: usize = 30;

/// Bit in `codeblock_style` selecting the high-throughput coding path.
pub const CBLK_STYLE_HT: u32 = 0x40;

/// One positional argument of the configuration call.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Int(i64),
    Bool(bool),
    /// Optional string field; `None` is the null marker.
    Str(Option<String>),
    /// Fixed-length tuple flattened in row-major order.
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
}

/// Codestream progression order (interleaving of layer / resolution /
/// component / precinct contributions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressionOrder {
    Lrcp = 0,
    Rlcp = 1,
    Rpcl = 2,
    Pcrl = 3,
    Cprl = 4,
}

impl ProgressionOrder {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Lrcp),
            1 => Some(Self::Rlcp),
            2 => Some(Self::Rpcl),
            3 => Some(Self::Pcrl),
            4 => Some(Self::Cprl),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Container format of a produced or consumed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Unknown = 0,
    /// Raw codestream, no container boxes.
    J2k = 1,
    /// Boxed file format (signature + ftyp + jp2c).
    Jp2 = 2,
}

impl FileFormat {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::J2k),
            2 => Some(Self::Jp2),
            _ => None,
        }
    }
}

/// Rate-control search strategy over feasible truncation points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateControl {
    /// Bisect over all truncation points.
    Bisect = 0,
    /// Walk only feasible truncation points in order.
    PcrdOpt = 1,
}

impl RateControl {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Bisect),
            1 => Some(Self::PcrdOpt),
            _ => None,
        }
    }
}

/// Interpretation of the per-layer quality targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityMode {
    /// Targets are compression ratios.
    Rates,
    /// Targets are PSNR values in dB.
    Psnr,
}

impl QualityMode {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "rates" => Some(Self::Rates),
            "dB" => Some(Self::Psnr),
            _ => None,
        }
    }
}

/// The engine's effective encoding defaults.
///
/// There is exactly one live instance, owned by the runtime; every call to
/// [`crate::set_default_params`] replaces it wholesale, and every compress
/// call snapshots it. Fields the caller leaves at their schema defaults still
/// arrive through the positional block, so a configure call resets *all*
/// fields, never a subset.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderDefaults {
    pub tile_size: [i64; 2],
    pub tile_offset: [i64; 2],
    pub num_layers: u16,
    pub quality_mode: Option<QualityMode>,
    pub quality_layers: Vec<f64>,
    pub num_guard_bits: u8,
    pub progression: ProgressionOrder,
    pub num_resolutions: u8,
    pub codeblock_size: [i64; 2],
    pub codeblock_style: u32,
    pub irreversible: bool,
    pub roi_component: i32,
    pub roi_shift: u8,
    pub precinct_size: [i64; 2],
    pub image_offset: [i64; 2],
    pub decod_format: FileFormat,
    pub cod_format: FileFormat,
    pub tile_parts: bool,
    pub mct: u32,
    pub max_codestream_size: u64,
    pub max_component_size: u64,
    pub profile: u16,
    pub framerate: u32,
    pub apply_icc: bool,
    pub rate_control: RateControl,
    pub num_threads: u32,
    pub device_id: i32,
    pub duration: u32,
    pub repeats: u32,
    pub verbose: bool,
}

impl EncoderDefaults {
    /// The engine's built-in baseline, in effect before the first configure
    /// call. Deliberately independent from any caller-side schema: the
    /// positional block always carries the full record, so these only matter
    /// for encodes issued before any configuration.
    pub fn baseline() -> Self {
        Self {
            tile_size: [0, 0],
            tile_offset: [0, 0],
            num_layers: 0,
            quality_mode: None,
            quality_layers: Vec::new(),
            num_guard_bits: 2,
            progression: ProgressionOrder::Lrcp,
            num_resolutions: 6,
            codeblock_size: [64, 64],
            codeblock_style: 0,
            irreversible: false,
            roi_component: -1,
            roi_shift: 0,
            precinct_size: [0, 0],
            image_offset: [0, 0],
            decod_format: FileFormat::Unknown,
            cod_format: FileFormat::J2k,
            tile_parts: false,
            mct: 0,
            max_codestream_size: 0,
            max_component_size: 0,
            profile: 0,
            framerate: 0,
            apply_icc: false,
            rate_control: RateControl::PcrdOpt,
            num_threads: 0,
            device_id: 0,
            duration: 0,
            repeats: 0,
            verbose: false,
        }
    }

    /// Whether the high-throughput coding path is selected.
    pub fn high_throughput(&self) -> bool {
        self.codeblock_style & CBLK_STYLE_HT != 0
    }

    /// Decode a versioned positional parameter block.
    ///
    /// The whole block is decoded into a fresh record before anything is
    /// applied, so a malformed block never leaves the runtime half-updated.
    pub fn from_positional(version: u32, fields: &[WireValue]) -> Result<Self, EngineError> {
        if version != PARAMS_ABI_VERSION {
            return Err(EngineError::BadParameterBlock(format!(
                "layout version {version} not supported (expected {PARAMS_ABI_VERSION})"
            )));
        }
        if fields.len() != PARAMS_FIELD_COUNT {
            return Err(EngineError::BadParameterBlock(format!(
                "expected {PARAMS_FIELD_COUNT} fields, got {}",
                fields.len()
            )));
        }

        let mut cur = FieldCursor { fields, pos: 0 };

        let tile_size = cur.int_pair("tile_size")?;
        let tile_offset = cur.int_pair("tile_offset")?;
        let num_layers = cur.int_in("num_layers", 0, u16::MAX as i64)? as u16;
        let quality_mode = match cur.opt_str("quality_mode")? {
            None => None,
            Some(s) => Some(QualityMode::from_wire(&s).ok_or_else(|| {
                EngineError::BadParameterBlock(format!("unknown quality mode {s:?}"))
            })?),
        };
        let quality_layers = cur.floats("quality_layers")?;
        let num_guard_bits = cur.int_in("num_guard_bits", 0, 7)? as u8;
        let progression = {
            let code = cur.int("progression")?;
            ProgressionOrder::from_code(code).ok_or_else(|| {
                EngineError::BadParameterBlock(format!("progression code {code} out of range"))
            })?
        };
        let num_resolutions = cur.int_in("num_resolutions", 1, 32)? as u8;
        let codeblock_size = cur.int_pair("codeblock_size")?;
        let codeblock_style = cur.int_in("codeblock_style", 0, 0xFF)? as u32;
        let irreversible = cur.boolean("irreversible")?;
        let roi_component = cur.int_in("roi_component", -1, 16383)? as i32;
        let roi_shift = cur.int_in("roi_shift", 0, 37)? as u8;
        let precinct_size = cur.int_pair("precinct_size")?;
        let image_offset = cur.int_pair("image_offset")?;
        let decod_format = {
            let code = cur.int("decod_format")?;
            FileFormat::from_code(code).ok_or_else(|| {
                EngineError::BadParameterBlock(format!("decod_format code {code} out of range"))
            })?
        };
        let cod_format = {
            let code = cur.int("cod_format")?;
            FileFormat::from_code(code).ok_or_else(|| {
                EngineError::BadParameterBlock(format!("cod_format code {code} out of range"))
            })?
        };
        let tile_parts = cur.boolean("tile_parts")?;
        let mct = cur.int_in("mct", 0, 2)? as u32;
        let max_codestream_size = cur.int_in("max_codestream_size", 0, i64::MAX)? as u64;
        let max_component_size = cur.int_in("max_component_size", 0, i64::MAX)? as u64;
        let profile = cur.int_in("profile", 0, u16::MAX as i64)? as u16;
        let framerate = cur.int_in("framerate", 0, u32::MAX as i64)? as u32;
        let apply_icc = cur.boolean("apply_icc")?;
        let rate_control = {
            let code = cur.int("rate_control")?;
            RateControl::from_code(code).ok_or_else(|| {
                EngineError::BadParameterBlock(format!("rate_control code {code} out of range"))
            })?
        };
        let num_threads = cur.int_in("num_threads", 0, u32::MAX as i64)? as u32;
        let device_id = cur.int_in("device_id", i32::MIN as i64, i32::MAX as i64)? as i32;
        let duration = cur.int_in("duration", 0, u32::MAX as i64)? as u32;
        let repeats = cur.int_in("repeats", 0, u32::MAX as i64)? as u32;
        let verbose = cur.boolean("verbose")?;

        if quality_mode.is_some() && quality_layers.is_empty() {
            return Err(EngineError::BadParameterBlock(
                "quality mode set but the quality layer array is empty".into(),
            ));
        }
        if quality_mode.is_some() && num_layers as usize != quality_layers.len() {
            return Err(EngineError::BadParameterBlock(format!(
                "num_layers is {} but {} quality layers were supplied",
                num_layers,
                quality_layers.len()
            )));
        }

        Ok(Self {
            tile_size,
            tile_offset,
            num_layers,
            quality_mode,
            quality_layers,
            num_guard_bits,
            progression,
            num_resolutions,
            codeblock_size,
            codeblock_style,
            irreversible,
            roi_component,
            roi_shift,
            precinct_size,
            image_offset,
            decod_format,
            cod_format,
            tile_parts,
            mct,
            max_codestream_size,
            max_component_size,
            profile,
            framerate,
            apply_icc,
            rate_control,
            num_threads,
            device_id,
            duration,
            repeats,
            verbose,
        })
    }
}

/// Walks the positional block, reporting the position and field name on any
/// kind mismatch.
struct FieldCursor<'a> {
    fields: &'a [WireValue],
    pos: usize,
}

impl<'a> FieldCursor<'a> {
    fn next(&mut self, name: &'static str) -> Result<&'a WireValue, EngineError> {
        let v = self.fields.get(self.pos).ok_or_else(|| {
            EngineError::BadParameterBlock(format!("missing field {} ({name})", self.pos))
        })?;
        self.pos += 1;
        Ok(v)
    }

    fn mismatch(&self, name: &'static str, got: &WireValue) -> EngineError {
        EngineError::BadParameterBlock(format!(
            "field {} ({name}) has wrong wire kind: {got:?}",
            self.pos - 1
        ))
    }

    fn int(&mut self, name: &'static str) -> Result<i64, EngineError> {
        match self.next(name)? {
            WireValue::Int(v) => Ok(*v),
            other => Err(self.mismatch(name, other)),
        }
    }

    fn int_in(&mut self, name: &'static str, lo: i64, hi: i64) -> Result<i64, EngineError> {
        let v = self.int(name)?;
        if v < lo || v > hi {
            return Err(EngineError::BadParameterBlock(format!(
                "field {} ({name}) value {v} outside {lo}..={hi}",
                self.pos - 1
            )));
        }
        Ok(v)
    }

    fn boolean(&mut self, name: &'static str) -> Result<bool, EngineError> {
        match self.next(name)? {
            WireValue::Bool(v) => Ok(*v),
            other => Err(self.mismatch(name, other)),
        }
    }

    fn opt_str(&mut self, name: &'static str) -> Result<Option<String>, EngineError> {
        match self.next(name)? {
            WireValue::Str(v) => Ok(v.clone()),
            other => Err(self.mismatch(name, other)),
        }
    }

    fn int_pair(&mut self, name: &'static str) -> Result<[i64; 2], EngineError> {
        match self.next(name)? {
            WireValue::IntArray(v) if v.len() == 2 => Ok([v[0], v[1]]),
            WireValue::IntArray(v) => Err(EngineError::BadParameterBlock(format!(
                "field {} ({name}) expects 2 integers, got {}",
                self.pos - 1,
                v.len()
            ))),
            other => Err(self.mismatch(name, other)),
        }
    }

    fn floats(&mut self, name: &'static str) -> Result<Vec<f64>, EngineError> {
        match self.next(name)? {
            WireValue::FloatArray(v) => Ok(v.clone()),
            other => Err(self.mismatch(name, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A positional block matching the baseline record.
    fn baseline_fields() -> Vec<WireValue> {
        vec![
            WireValue::IntArray(vec![0, 0]),   // tile_size
            WireValue::IntArray(vec![0, 0]),   // tile_offset
            WireValue::Int(0),                 // num_layers
            WireValue::Str(None),              // quality_mode
            WireValue::FloatArray(vec![]),     // quality_layers
            WireValue::Int(2),                 // num_guard_bits
            WireValue::Int(0),                 // progression
            WireValue::Int(6),                 // num_resolutions
            WireValue::IntArray(vec![64, 64]), // codeblock_size
            WireValue::Int(0),                 // codeblock_style
            WireValue::Bool(false),            // irreversible
            WireValue::Int(-1),                // roi_component
            WireValue::Int(0),                 // roi_shift
            WireValue::IntArray(vec![0, 0]),   // precinct_size
            WireValue::IntArray(vec![0, 0]),   // image_offset
            WireValue::Int(0),                 // decod_format
            WireValue::Int(1),                 // cod_format
            WireValue::Bool(false),            // tile_parts
            WireValue::Int(0),                 // mct
            WireValue::Int(0),                 // max_codestream_size
            WireValue::Int(0),                 // max_component_size
            WireValue::Int(0),                 // profile
            WireValue::Int(0),                 // framerate
            WireValue::Bool(false),            // apply_icc
            WireValue::Int(1),                 // rate_control
            WireValue::Int(0),                 // num_threads
            WireValue::Int(0),                 // device_id
            WireValue::Int(0),                 // duration
            WireValue::Int(0),                 // repeats
            WireValue::Bool(false),            // verbose
        ]
    }

    #[test]
    fn baseline_block_decodes_to_baseline_record() {
        let decoded =
            EncoderDefaults::from_positional(PARAMS_ABI_VERSION, &baseline_fields()).unwrap();
        assert_eq!(decoded, EncoderDefaults::baseline());
    }

    #[test]
    fn field_count_is_enforced() {
        let mut fields = baseline_fields();
        fields.pop();
        let err = EncoderDefaults::from_positional(PARAMS_ABI_VERSION, &fields).unwrap_err();
        assert!(matches!(err, EngineError::BadParameterBlock(_)));
    }

    #[test]
    fn version_is_enforced() {
        let err = EncoderDefaults::from_positional(99, &baseline_fields()).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn swapped_fields_are_rejected_not_misread() {
        // Swapping quality_mode (Str) into the num_layers (Int) slot must fail
        // on the wire kind, not be silently reinterpreted.
        let mut fields = baseline_fields();
        fields.swap(2, 3);
        let err = EncoderDefaults::from_positional(PARAMS_ABI_VERSION, &fields).unwrap_err();
        assert!(err.to_string().contains("num_layers"));
    }

    #[test]
    fn quality_mode_requires_layers() {
        let mut fields = baseline_fields();
        fields[3] = WireValue::Str(Some("rates".into()));
        let err = EncoderDefaults::from_positional(PARAMS_ABI_VERSION, &fields).unwrap_err();
        assert!(err.to_string().contains("quality"));
    }

    #[test]
    fn layer_count_must_match_layer_array() {
        let mut fields = baseline_fields();
        fields[2] = WireValue::Int(2);
        fields[3] = WireValue::Str(Some("rates".into()));
        fields[4] = WireValue::FloatArray(vec![5.0]);
        let err = EncoderDefaults::from_positional(PARAMS_ABI_VERSION, &fields).unwrap_err();
        assert!(err.to_string().contains("num_layers"));
    }

    #[test]
    fn high_throughput_flag_reads_codeblock_style() {
        let mut d = EncoderDefaults::baseline();
        assert!(!d.high_throughput());
        d.codeblock_style |= CBLK_STYLE_HT;
        assert!(d.high_throughput());
    }
}
