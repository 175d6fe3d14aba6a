//! The configuration store: turns a validated option map into the engine's
//! positional parameter block and ships it in one call.
//!
//! Each configure call is schema-relative. The positional block always
//! carries all fields, so the engine's effective defaults are replaced
//! wholesale and nothing accumulates from previous calls.

use std::collections::BTreeMap;

use j2kblock_engine::{WireValue, PARAMS_ABI_VERSION, PARAMS_FIELD_COUNT};
use log::debug;

use crate::error::PluginError;
use crate::schema::{self, OptionValue, ResolvedConfig, CBLK_STYLE_HT};
use crate::wire;

/// Validate, resolve and apply a configuration in one shot.
///
/// On any failure the engine's defaults are left exactly as they were; the
/// whole option map is validated and marshalled before the engine sees a
/// single field.
pub fn configure(options: &BTreeMap<String, OptionValue>) -> Result<(), PluginError> {
    let cfg = schema::resolve(options)?;
    check_cross_options(&cfg)?;
    let fields = marshal(&cfg);
    debug!(
        "configuring engine defaults ({} positional fields, layout v{})",
        fields.len(),
        PARAMS_ABI_VERSION
    );
    j2kblock_engine::set_default_params(PARAMS_ABI_VERSION, &fields)
        .map_err(PluginError::from_engine)
}

/// Constraints that span more than one option.
fn check_cross_options(cfg: &ResolvedConfig) -> Result<(), PluginError> {
    if cfg.quality_mode.is_some() && cfg.quality_layers.is_empty() {
        return Err(PluginError::IncompatibleOptions(
            "quality_mode is set but quality_layers is empty".into(),
        ));
    }
    if cfg.codeblock_style & CBLK_STYLE_HT != 0 && cfg.quality_mode.is_some() {
        return Err(PluginError::IncompatibleOptions(
            "high-throughput code-blocks (codeblock_style bit 0x40) do not support \
             quality-driven rate control"
                .into(),
        ));
    }
    Ok(())
}

/// Flatten a resolved record into the engine's positional layout.
///
/// The order here is ABI v1 and must never change without bumping the layout
/// version; `positional_order_is_stable` below pins it field by field.
fn marshal(cfg: &ResolvedConfig) -> Vec<WireValue> {
    // The layer count is derived, never caller-supplied: it is the length of
    // the quality layer array when a quality mode is in effect.
    let num_layers = match cfg.quality_mode {
        Some(_) => cfg.quality_layers.len() as i64,
        None => 0,
    };
    let quality_mode = cfg.quality_mode.map(|m| m.wire_str().to_string());
    let quality_layers = match cfg.quality_mode {
        Some(_) => cfg.quality_layers.clone(),
        None => Vec::new(),
    };

    let fields = vec![
        WireValue::IntArray(wire::pair(cfg.tile_size)),
        WireValue::IntArray(wire::pair(cfg.tile_offset)),
        WireValue::Int(num_layers),
        WireValue::Str(quality_mode),
        WireValue::FloatArray(quality_layers),
        WireValue::Int(cfg.num_guard_bits),
        WireValue::Int(cfg.progression.wire_code()),
        WireValue::Int(cfg.num_resolutions),
        WireValue::IntArray(wire::pair(cfg.codeblock_size)),
        WireValue::Int(cfg.codeblock_style),
        WireValue::Bool(cfg.irreversible),
        WireValue::Int(cfg.roi_component),
        WireValue::Int(cfg.roi_shift),
        WireValue::IntArray(wire::pair(cfg.precinct_size)),
        WireValue::IntArray(wire::pair(cfg.image_offset)),
        WireValue::Int(cfg.decod_format.wire_code()),
        WireValue::Int(cfg.cod_format.wire_code()),
        WireValue::Bool(cfg.tile_parts),
        WireValue::Int(cfg.mct),
        WireValue::Int(cfg.max_codestream_size),
        WireValue::Int(cfg.max_component_size),
        WireValue::Int(cfg.profile.wire_code()),
        WireValue::Int(cfg.framerate),
        WireValue::Bool(cfg.apply_icc),
        WireValue::Int(cfg.rate_control.wire_code()),
        WireValue::Int(cfg.num_threads),
        WireValue::Int(cfg.device_id),
        WireValue::Int(cfg.duration),
        WireValue::Int(cfg.repeats),
        WireValue::Bool(cfg.verbose),
    ];
    debug_assert_eq!(fields.len(), PARAMS_FIELD_COUNT);
    fields
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

    /// Pins the positional layout field by field. If this test moves, the
    /// ABI version must move with it.
    #[test]
    fn positional_order_is_stable() {
        let o = opts(&[
            ("tile_size", OptionValue::IntPair(256, 128)),
            ("quality_mode", OptionValue::Str("rates".into())),
            ("quality_layers", OptionValue::FloatList(vec![10.0, 5.0])),
            ("progression", OptionValue::Str("CPRL".into())),
            ("cod_format", OptionValue::Str("j2k".into())),
            ("profile", OptionValue::Str("broadcast".into())),
            ("irreversible", OptionValue::Bool(true)),
            ("mct", OptionValue::Int(1)),
        ]);
        let cfg = schema::resolve(&o).unwrap();
        let fields = marshal(&cfg);

        assert_eq!(fields.len(), PARAMS_FIELD_COUNT);
        assert_eq!(fields[0], WireValue::IntArray(vec![256, 128]));
        assert_eq!(fields[1], WireValue::IntArray(vec![0, 0]));
        assert_eq!(fields[2], WireValue::Int(2)); // derived layer count
        assert_eq!(fields[3], WireValue::Str(Some("rates".into())));
        assert_eq!(fields[4], WireValue::FloatArray(vec![10.0, 5.0]));
        assert_eq!(fields[5], WireValue::Int(2)); // num_guard_bits default
        assert_eq!(fields[6], WireValue::Int(4)); // CPRL
        assert_eq!(fields[7], WireValue::Int(6)); // num_resolutions default
        assert_eq!(fields[8], WireValue::IntArray(vec![64, 64]));
        assert_eq!(fields[9], WireValue::Int(0));
        assert_eq!(fields[10], WireValue::Bool(true));
        assert_eq!(fields[11], WireValue::Int(-1));
        assert_eq!(fields[12], WireValue::Int(0));
        assert_eq!(fields[13], WireValue::IntArray(vec![0, 0]));
        assert_eq!(fields[14], WireValue::IntArray(vec![0, 0]));
        assert_eq!(fields[15], WireValue::Int(0)); // decod_format unknown
        assert_eq!(fields[16], WireValue::Int(1)); // cod_format j2k
        assert_eq!(fields[17], WireValue::Bool(false));
        assert_eq!(fields[18], WireValue::Int(1)); // mct
        assert_eq!(fields[19], WireValue::Int(0));
        assert_eq!(fields[20], WireValue::Int(0));
        assert_eq!(fields[21], WireValue::Int(0x0100)); // broadcast
        assert_eq!(fields[22], WireValue::Int(0));
        assert_eq!(fields[23], WireValue::Bool(false));
        assert_eq!(fields[24], WireValue::Int(1)); // pcrd_opt
        assert_eq!(fields[25], WireValue::Int(0));
        assert_eq!(fields[26], WireValue::Int(0));
        assert_eq!(fields[27], WireValue::Int(0));
        assert_eq!(fields[28], WireValue::Int(0));
        assert_eq!(fields[29], WireValue::Bool(false));
    }

    #[test]
    fn layer_count_is_zero_without_quality_mode() {
        // A layer array without a mode is ignored, not forwarded.
        let o = opts(&[("quality_layers", OptionValue::FloatList(vec![5.0]))]);
        let cfg = schema::resolve(&o).unwrap();
        let fields = marshal(&cfg);
        assert_eq!(fields[2], WireValue::Int(0));
        assert_eq!(fields[3], WireValue::Str(None));
        assert_eq!(fields[4], WireValue::FloatArray(vec![]));
    }

    #[test]
    fn quality_mode_without_layers_is_incompatible() {
        let o = opts(&[("quality_mode", OptionValue::Str("dB".into()))]);
        let cfg = schema::resolve(&o).unwrap();
        let err = check_cross_options(&cfg).unwrap_err();
        assert!(matches!(err, PluginError::IncompatibleOptions(_)));
    }

    #[test]
    fn high_throughput_excludes_quality_modes() {
        let o = opts(&[
            ("codeblock_style", OptionValue::Int(0x40)),
            ("quality_mode", OptionValue::Str("rates".into())),
            ("quality_layers", OptionValue::FloatList(vec![10.0])),
        ]);
        let cfg = schema::resolve(&o).unwrap();
        let err = check_cross_options(&cfg).unwrap_err();
        assert!(matches!(err, PluginError::IncompatibleOptions(_)));
        // Without a quality mode the style bit alone is fine.
        let o = opts(&[("codeblock_style", OptionValue::Int(0x40))]);
        let cfg = schema::resolve(&o).unwrap();
        assert!(check_cross_options(&cfg).is_ok());
    }
}
