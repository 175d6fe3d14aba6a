//! The option schema: single source of truth for every recognized
//! configuration key, its type, default, and valid domain.
//!
//! The schema is closed and versioned. Unknown keys are rejected by name —
//! all of them at once — and nothing is ever silently dropped or coerced.
//! Schema order is the resolved-record order the configuration store
//! marshals from.

use std::collections::BTreeMap;

use crate::error::PluginError;
use crate::wire::{Profile, Progression, QualityMode, RateControlAlg, StreamFormat};

pub const SCHEMA_VERSION: u32 = 1;

/// Bit in `codeblock_style` selecting the high-throughput coding path.
pub const CBLK_STYLE_HT: i64 = 0x40;

/// Wire type of an option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Int,
    Bool,
    Str,
    /// Fixed 2-tuple of integers (row-major when flattened).
    IntPair,
    /// Variable-length array of floating-point targets.
    FloatList,
}

/// A caller-supplied option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Int(i64),
    Bool(bool),
    Str(String),
    IntPair(i64, i64),
    FloatList(Vec<f64>),
}

impl OptionValue {
    pub fn kind(&self) -> OptionKind {
        match self {
            Self::Int(_) => OptionKind::Int,
            Self::Bool(_) => OptionKind::Bool,
            Self::Str(_) => OptionKind::Str,
            Self::IntPair(..) => OptionKind::IntPair,
            Self::FloatList(_) => OptionKind::FloatList,
        }
    }
}

/// Valid domain of an option.
#[derive(Debug, Clone, Copy)]
pub enum Domain {
    Any,
    IntRange(i64, i64),
    /// Both tuple members >= 0.
    NonNegativePair,
    /// Both tuple members zero (engine default) or a power of two within
    /// `min..=max`; when both are nonzero their product must not exceed
    /// `max_area` (0 = no area limit).
    Pow2Pair { min: i64, max: i64, max_area: i64 },
    /// Enumerated string option.
    OneOf(&'static [&'static str]),
    /// Every element finite and > 0.
    PositiveFloats,
}

/// Const-friendly default value (materialized via [`OptionSpec::default_value`]).
#[derive(Debug, Clone, Copy)]
enum DefaultValue {
    Int(i64),
    Bool(bool),
    Str(&'static str),
    IntPair(i64, i64),
    EmptyFloats,
}

/// One schema entry.
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    pub name: &'static str,
    pub kind: OptionKind,
    default: DefaultValue,
    pub domain: Domain,
}

impl OptionSpec {
    pub fn default_value(&self) -> OptionValue {
        match self.default {
            DefaultValue::Int(v) => OptionValue::Int(v),
            DefaultValue::Bool(v) => OptionValue::Bool(v),
            DefaultValue::Str(v) => OptionValue::Str(v.to_string()),
            DefaultValue::IntPair(a, b) => OptionValue::IntPair(a, b),
            DefaultValue::EmptyFloats => OptionValue::FloatList(Vec::new()),
        }
    }
}

const PROGRESSIONS: &[&str] = &["LRCP", "RLCP", "RPCL", "PCRL", "CPRL"];
const QUALITY_MODES: &[&str] = &["", "rates", "dB"];
const DECODE_FORMATS: &[&str] = &["unknown", "j2k", "jp2"];
const CODE_FORMATS: &[&str] = &["j2k", "jp2"];
const PROFILES: &[&str] = &["none", "cinema2k", "cinema4k", "broadcast", "imf"];
const RATE_CONTROLS: &[&str] = &["bisect", "pcrd_opt"];

/// The closed option catalogue, in resolved-record order.
pub const SCHEMA: &[OptionSpec] = &[
    OptionSpec {
        name: "tile_size",
        kind: OptionKind::IntPair,
        default: DefaultValue::IntPair(0, 0),
        domain: Domain::NonNegativePair,
    },
    OptionSpec {
        name: "tile_offset",
        kind: OptionKind::IntPair,
        default: DefaultValue::IntPair(0, 0),
        domain: Domain::NonNegativePair,
    },
    OptionSpec {
        name: "quality_mode",
        kind: OptionKind::Str,
        default: DefaultValue::Str(""),
        domain: Domain::OneOf(QUALITY_MODES),
    },
    OptionSpec {
        name: "quality_layers",
        kind: OptionKind::FloatList,
        default: DefaultValue::EmptyFloats,
        domain: Domain::PositiveFloats,
    },
    OptionSpec {
        name: "num_guard_bits",
        kind: OptionKind::Int,
        default: DefaultValue::Int(2),
        domain: Domain::IntRange(0, 7),
    },
    OptionSpec {
        name: "progression",
        kind: OptionKind::Str,
        default: DefaultValue::Str("LRCP"),
        domain: Domain::OneOf(PROGRESSIONS),
    },
    OptionSpec {
        name: "num_resolutions",
        kind: OptionKind::Int,
        default: DefaultValue::Int(6),
        domain: Domain::IntRange(1, 32),
    },
    OptionSpec {
        name: "codeblock_size",
        kind: OptionKind::IntPair,
        default: DefaultValue::IntPair(64, 64),
        // T.800 code-block constraints: power-of-two dims, area cap 4096.
        domain: Domain::Pow2Pair { min: 4, max: 1024, max_area: 4096 },
    },
    OptionSpec {
        name: "codeblock_style",
        kind: OptionKind::Int,
        default: DefaultValue::Int(0),
        domain: Domain::IntRange(0, 0xFF),
    },
    OptionSpec {
        name: "irreversible",
        kind: OptionKind::Bool,
        default: DefaultValue::Bool(false),
        domain: Domain::Any,
    },
    OptionSpec {
        name: "roi_component",
        kind: OptionKind::Int,
        default: DefaultValue::Int(-1),
        domain: Domain::IntRange(-1, 16383),
    },
    OptionSpec {
        name: "roi_shift",
        kind: OptionKind::Int,
        default: DefaultValue::Int(0),
        domain: Domain::IntRange(0, 37),
    },
    OptionSpec {
        name: "precinct_size",
        kind: OptionKind::IntPair,
        default: DefaultValue::IntPair(0, 0),
        domain: Domain::Pow2Pair { min: 4, max: 32768, max_area: 0 },
    },
    OptionSpec {
        name: "image_offset",
        kind: OptionKind::IntPair,
        default: DefaultValue::IntPair(0, 0),
        domain: Domain::NonNegativePair,
    },
    OptionSpec {
        name: "decod_format",
        kind: OptionKind::Str,
        default: DefaultValue::Str("unknown"),
        domain: Domain::OneOf(DECODE_FORMATS),
    },
    OptionSpec {
        name: "cod_format",
        kind: OptionKind::Str,
        default: DefaultValue::Str("jp2"),
        domain: Domain::OneOf(CODE_FORMATS),
    },
    OptionSpec {
        name: "tile_parts",
        kind: OptionKind::Bool,
        default: DefaultValue::Bool(false),
        domain: Domain::Any,
    },
    OptionSpec {
        name: "mct",
        kind: OptionKind::Int,
        default: DefaultValue::Int(0),
        domain: Domain::IntRange(0, 2),
    },
    OptionSpec {
        name: "max_codestream_size",
        kind: OptionKind::Int,
        default: DefaultValue::Int(0),
        domain: Domain::IntRange(0, i64::MAX),
    },
    OptionSpec {
        name: "max_component_size",
        kind: OptionKind::Int,
        default: DefaultValue::Int(0),
        domain: Domain::IntRange(0, i64::MAX),
    },
    OptionSpec {
        name: "profile",
        kind: OptionKind::Str,
        default: DefaultValue::Str("none"),
        domain: Domain::OneOf(PROFILES),
    },
    OptionSpec {
        name: "framerate",
        kind: OptionKind::Int,
        default: DefaultValue::Int(0),
        domain: Domain::IntRange(0, 10_000),
    },
    OptionSpec {
        name: "apply_icc",
        kind: OptionKind::Bool,
        default: DefaultValue::Bool(false),
        domain: Domain::Any,
    },
    OptionSpec {
        name: "rate_control",
        kind: OptionKind::Str,
        default: DefaultValue::Str("pcrd_opt"),
        domain: Domain::OneOf(RATE_CONTROLS),
    },
    OptionSpec {
        name: "num_threads",
        kind: OptionKind::Int,
        default: DefaultValue::Int(0),
        domain: Domain::IntRange(0, 256),
    },
    OptionSpec {
        name: "device_id",
        kind: OptionKind::Int,
        default: DefaultValue::Int(0),
        domain: Domain::IntRange(0, i64::MAX),
    },
    OptionSpec {
        name: "duration",
        kind: OptionKind::Int,
        default: DefaultValue::Int(0),
        domain: Domain::IntRange(0, i64::MAX),
    },
    OptionSpec {
        name: "repeats",
        kind: OptionKind::Int,
        default: DefaultValue::Int(0),
        domain: Domain::IntRange(0, i64::MAX),
    },
    OptionSpec {
        name: "verbose",
        kind: OptionKind::Bool,
        default: DefaultValue::Bool(false),
        domain: Domain::Any,
    },
];

pub fn spec_of(name: &str) -> Option<&'static OptionSpec> {
    SCHEMA.iter().find(|s| s.name == name)
}

fn is_pow2(v: i64) -> bool {
    v > 0 && v & (v - 1) == 0
}

fn check_domain(spec: &OptionSpec, value: &OptionValue) -> Result<(), PluginError> {
    let fail = |reason: String| {
        Err(PluginError::InvalidOptionValue {
            option: spec.name.to_string(),
            reason,
        })
    };
    match (spec.domain, value) {
        (Domain::Any, _) => Ok(()),
        (Domain::IntRange(lo, hi), OptionValue::Int(v)) => {
            if *v < lo || *v > hi {
                return fail(format!("{v} outside {lo}..={hi}"));
            }
            Ok(())
        }
        (Domain::NonNegativePair, OptionValue::IntPair(a, b)) => {
            if *a < 0 || *b < 0 {
                return fail(format!("({a}, {b}) has a negative member"));
            }
            Ok(())
        }
        (Domain::Pow2Pair { min, max, max_area }, OptionValue::IntPair(a, b)) => {
            for v in [*a, *b] {
                if v != 0 && (!is_pow2(v) || v < min || v > max) {
                    return fail(format!("{v} is not 0 or a power of two in {min}..={max}"));
                }
            }
            if max_area > 0 && *a > 0 && *b > 0 && a * b > max_area {
                return fail(format!("area {} exceeds {max_area}", a * b));
            }
            Ok(())
        }
        (Domain::OneOf(choices), OptionValue::Str(s)) => {
            if !choices.contains(&s.as_str()) {
                return fail(format!("{s:?} is not one of {choices:?}"));
            }
            Ok(())
        }
        (Domain::PositiveFloats, OptionValue::FloatList(vs)) => {
            for v in vs {
                if !v.is_finite() || *v <= 0.0 {
                    return fail(format!("{v} is not a finite positive value"));
                }
            }
            Ok(())
        }
        // Kind is checked before the domain, so this arm is unreachable in
        // practice; keep it an error rather than a panic.
        (_, got) => fail(format!("value kind {:?} does not fit the domain", got.kind())),
    }
}

/// Reject every unknown key (all of them, in one failure), then check the
/// kind and domain of every supplied value.
pub fn validate(options: &BTreeMap<String, OptionValue>) -> Result<(), PluginError> {
    let unknown: Vec<String> = options
        .keys()
        .filter(|k| spec_of(k).is_none())
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(PluginError::UnsupportedOption(unknown));
    }
    for (name, value) in options {
        // spec_of cannot fail here; unknown keys were rejected above.
        let Some(spec) = spec_of(name) else { continue };
        if value.kind() != spec.kind {
            return Err(PluginError::InvalidOptionValue {
                option: name.clone(),
                reason: format!("expected {:?}, got {:?}", spec.kind, value.kind()),
            });
        }
        check_domain(spec, value)?;
    }
    Ok(())
}

/// A complete configuration record: schema defaults overlaid with the
/// caller's options, with every enumerated option parsed. Field order
/// mirrors the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub tile_size: (i64, i64),
    pub tile_offset: (i64, i64),
    pub quality_mode: Option<QualityMode>,
    pub quality_layers: Vec<f64>,
    pub num_guard_bits: i64,
    pub progression: Progression,
    pub num_resolutions: i64,
    pub codeblock_size: (i64, i64),
    pub codeblock_style: i64,
    pub irreversible: bool,
    pub roi_component: i64,
    pub roi_shift: i64,
    pub precinct_size: (i64, i64),
    pub image_offset: (i64, i64),
    pub decod_format: StreamFormat,
    pub cod_format: StreamFormat,
    pub tile_parts: bool,
    pub mct: i64,
    pub max_codestream_size: i64,
    pub max_component_size: i64,
    pub profile: Profile,
    pub framerate: i64,
    pub apply_icc: bool,
    pub rate_control: RateControlAlg,
    pub num_threads: i64,
    pub device_id: i64,
    pub duration: i64,
    pub repeats: i64,
    pub verbose: bool,
}

/// Validate `options` and overlay them onto the schema defaults.
///
/// The record is rebuilt from scratch on every call — resolution never sees
/// the result of a previous resolve, which is what makes successive
/// configure calls schema-relative instead of incremental.
pub fn resolve(options: &BTreeMap<String, OptionValue>) -> Result<ResolvedConfig, PluginError> {
    validate(options)?;

    let get = |name: &str| -> OptionValue {
        options
            .get(name)
            .cloned()
            .or_else(|| spec_of(name).map(|s| s.default_value()))
            .unwrap_or(OptionValue::Int(0))
    };
    let int = |name: &str| -> i64 {
        match get(name) {
            OptionValue::Int(v) => v,
            _ => 0,
        }
    };
    let boolean = |name: &str| -> bool {
        matches!(get(name), OptionValue::Bool(true))
    };
    let pair = |name: &str| -> (i64, i64) {
        match get(name) {
            OptionValue::IntPair(a, b) => (a, b),
            _ => (0, 0),
        }
    };
    let string = |name: &str| -> String {
        match get(name) {
            OptionValue::Str(s) => s,
            _ => String::new(),
        }
    };
    let bad = |name: &str, s: &str| PluginError::InvalidOptionValue {
        option: name.to_string(),
        reason: format!("unrecognized value {s:?}"),
    };

    let quality_mode = {
        let s = string("quality_mode");
        QualityMode::parse(&s).ok_or_else(|| bad("quality_mode", &s))?
    };
    let progression = {
        let s = string("progression");
        Progression::parse(&s).ok_or_else(|| bad("progression", &s))?
    };
    let decod_format = {
        let s = string("decod_format");
        StreamFormat::parse(&s).ok_or_else(|| bad("decod_format", &s))?
    };
    let cod_format = {
        let s = string("cod_format");
        StreamFormat::parse(&s).ok_or_else(|| bad("cod_format", &s))?
    };
    let profile = {
        let s = string("profile");
        Profile::parse(&s).ok_or_else(|| bad("profile", &s))?
    };
    let rate_control = {
        let s = string("rate_control");
        RateControlAlg::parse(&s).ok_or_else(|| bad("rate_control", &s))?
    };
    let quality_layers = match get("quality_layers") {
        OptionValue::FloatList(v) => v,
        _ => Vec::new(),
    };

    Ok(ResolvedConfig {
        tile_size: pair("tile_size"),
        tile_offset: pair("tile_offset"),
        quality_mode,
        quality_layers,
        num_guard_bits: int("num_guard_bits"),
        progression,
        num_resolutions: int("num_resolutions"),
        codeblock_size: pair("codeblock_size"),
        codeblock_style: int("codeblock_style"),
        irreversible: boolean("irreversible"),
        roi_component: int("roi_component"),
        roi_shift: int("roi_shift"),
        precinct_size: pair("precinct_size"),
        image_offset: pair("image_offset"),
        decod_format,
        cod_format,
        tile_parts: boolean("tile_parts"),
        mct: int("mct"),
        max_codestream_size: int("max_codestream_size"),
        max_component_size: int("max_component_size"),
        profile,
        framerate: int("framerate"),
        apply_icc: boolean("apply_icc"),
        rate_control,
        num_threads: int("num_threads"),
        device_id: int("device_id"),
        duration: int("duration"),
        repeats: int("repeats"),
        verbose: boolean("verbose"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(entries: &[(&str, OptionValue)]) -> BTreeMap<String, OptionValue> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn empty_options_resolve_to_defaults() {
        let cfg = resolve(&BTreeMap::new()).unwrap();
        assert_eq!(cfg.tile_size, (0, 0));
        assert_eq!(cfg.quality_mode, None);
        assert!(cfg.quality_layers.is_empty());
        assert_eq!(cfg.num_guard_bits, 2);
        assert_eq!(cfg.progression, Progression::Lrcp);
        assert_eq!(cfg.num_resolutions, 6);
        assert_eq!(cfg.codeblock_size, (64, 64));
        assert_eq!(cfg.roi_component, -1);
        assert_eq!(cfg.cod_format, StreamFormat::Jp2);
        assert_eq!(cfg.profile, Profile::None);
        assert_eq!(cfg.rate_control, RateControlAlg::PcrdOpt);
        assert!(!cfg.verbose);
    }

    #[test]
    fn every_unknown_key_is_named_in_one_failure() {
        let o = opts(&[
            ("quality_mod", OptionValue::Str("rates".into())), // typo
            ("tile_size", OptionValue::IntPair(64, 64)),       // valid
            ("zz_bogus", OptionValue::Int(1)),
        ]);
        let err = validate(&o).unwrap_err();
        match err {
            PluginError::UnsupportedOption(keys) => {
                assert_eq!(keys, vec!["quality_mod".to_string(), "zz_bogus".to_string()]);
            }
            other => panic!("expected UnsupportedOption, got {other:?}"),
        }
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let o = opts(&[("tile_size", OptionValue::Int(64))]);
        let err = validate(&o).unwrap_err();
        assert!(matches!(err, PluginError::InvalidOptionValue { .. }));
    }

    #[test]
    fn codeblock_domain_is_enforced() {
        // Not a power of two.
        let o = opts(&[("codeblock_size", OptionValue::IntPair(48, 64))]);
        assert!(validate(&o).is_err());
        // Area above 4096.
        let o = opts(&[("codeblock_size", OptionValue::IntPair(128, 64))]);
        assert!(validate(&o).is_err());
        // 64x64 is fine.
        let o = opts(&[("codeblock_size", OptionValue::IntPair(64, 64))]);
        assert!(validate(&o).is_ok());
    }

    #[test]
    fn enumerated_strings_are_closed() {
        let o = opts(&[("progression", OptionValue::Str("LRPC".into()))]);
        assert!(validate(&o).is_err());
        let o = opts(&[("quality_mode", OptionValue::Str("db".into()))]);
        assert!(validate(&o).is_err());
    }

    #[test]
    fn quality_layers_must_be_positive_and_finite() {
        let o = opts(&[("quality_layers", OptionValue::FloatList(vec![5.0, -1.0]))]);
        assert!(validate(&o).is_err());
        let o = opts(&[("quality_layers", OptionValue::FloatList(vec![f64::NAN]))]);
        assert!(validate(&o).is_err());
    }

    #[test]
    fn overlay_keeps_unrelated_defaults() {
        let o = opts(&[
            ("progression", OptionValue::Str("RPCL".into())),
            ("quality_mode", OptionValue::Str("rates".into())),
            ("quality_layers", OptionValue::FloatList(vec![5.0])),
        ]);
        let cfg = resolve(&o).unwrap();
        assert_eq!(cfg.progression, Progression::Rpcl);
        assert_eq!(cfg.quality_mode, Some(QualityMode::Rates));
        assert_eq!(cfg.quality_layers, vec![5.0]);
        // Untouched fields stay at schema defaults.
        assert_eq!(cfg.codeblock_size, (64, 64));
        assert_eq!(cfg.num_resolutions, 6);
    }

    #[test]
    fn schema_has_no_duplicate_names() {
        for (i, a) in SCHEMA.iter().enumerate() {
            for b in &SCHEMA[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }
}
