use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::debug;

use j2kblock_plugin::{
    registry, schema, BlockShape, EngineGuard, OptionKind, OptionValue,
};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "j2kblock",
    about = "JPEG2000 block codec — compress, decompress, and inspect block streams",
    version
)]
struct Cli {
    /// Worker thread hint for the engine (0 = let the engine pick)
    #[arg(long, default_value_t = 0, global = true)]
    threads: u32,
    /// Verbose engine logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress one raw sample block into a JPEG2000 stream
    Compress {
        /// Raw sample file (planar, little-endian)
        input: PathBuf,
        /// Destination stream file
        output: PathBuf,
        /// Block width in samples
        #[arg(long)]
        width: u32,
        /// Block height in samples
        #[arg(long)]
        height: u32,
        /// Number of component planes
        #[arg(long, default_value_t = 1)]
        components: u32,
        /// Bytes per sample: 1, 2, or 4
        #[arg(long, default_value_t = 1)]
        typesize: u8,
        /// Codec options as a JSON object, inline or @file
        #[arg(long)]
        params: Option<String>,
        /// Set a single codec option (repeatable): key=value
        #[arg(long = "set", value_name = "KEY=VALUE")]
        sets: Vec<String>,
    },
    /// Decompress a JPEG2000 stream back to raw samples
    Decompress {
        /// Source stream file
        input: PathBuf,
        /// Destination raw sample file
        output: PathBuf,
    },
    /// Print a stream's container and main header
    Info {
        /// Stream file to inspect
        file: PathBuf,
    },
}

// ── Option parsing ─────────────────────────────────────────────────────────

/// Coerce one JSON value into the option's declared kind. Unknown keys are
/// converted by JSON shape so the schema can reject them by name.
fn option_from_json(key: &str, v: &serde_json::Value) -> anyhow::Result<OptionValue> {
    use serde_json::Value;

    let kind = schema::spec_of(key).map(|s| s.kind);
    let fail = || anyhow::anyhow!("option '{}' cannot take the JSON value {}", key, v);

    match kind {
        Some(OptionKind::Int) => v.as_i64().map(OptionValue::Int).ok_or_else(fail),
        Some(OptionKind::Bool) => v.as_bool().map(OptionValue::Bool).ok_or_else(fail),
        Some(OptionKind::Str) => v
            .as_str()
            .map(|s| OptionValue::Str(s.to_string()))
            .ok_or_else(fail),
        Some(OptionKind::IntPair) => match v.as_array().map(Vec::as_slice) {
            Some([a, b]) => match (a.as_i64(), b.as_i64()) {
                (Some(a), Some(b)) => Ok(OptionValue::IntPair(a, b)),
                _ => Err(fail()),
            },
            _ => Err(fail()),
        },
        Some(OptionKind::FloatList) => {
            let arr = v.as_array().ok_or_else(fail)?;
            let mut out = Vec::with_capacity(arr.len());
            for x in arr {
                out.push(x.as_f64().ok_or_else(fail)?);
            }
            Ok(OptionValue::FloatList(out))
        }
        None => match v {
            Value::Bool(b) => Ok(OptionValue::Bool(*b)),
            Value::Number(n) => n.as_i64().map(OptionValue::Int).ok_or_else(fail),
            Value::String(s) => Ok(OptionValue::Str(s.clone())),
            _ => Err(fail()),
        },
    }
}

/// Parse a `key=value` assignment against the option's declared kind.
fn option_from_assignment(arg: &str) -> anyhow::Result<(String, OptionValue)> {
    let (key, raw) = arg
        .split_once('=')
        .with_context(|| format!("--set expects key=value, got '{}'", arg))?;
    let fail = || anyhow::anyhow!("option '{}' cannot take the value '{}'", key, raw);

    let kind = schema::spec_of(key).map(|s| s.kind);
    let value = match kind {
        Some(OptionKind::Int) => OptionValue::Int(raw.parse().map_err(|_| fail())?),
        Some(OptionKind::Bool) => OptionValue::Bool(raw.parse().map_err(|_| fail())?),
        Some(OptionKind::IntPair) => {
            let (a, b) = raw.split_once(',').ok_or_else(fail)?;
            OptionValue::IntPair(
                a.trim().parse().map_err(|_| fail())?,
                b.trim().parse().map_err(|_| fail())?,
            )
        }
        Some(OptionKind::FloatList) => {
            let mut out = Vec::new();
            for part in raw.split(',') {
                out.push(part.trim().parse().map_err(|_| fail())?);
            }
            OptionValue::FloatList(out)
        }
        // Unknown keys pass through as strings so the schema rejects them
        // by name instead of the CLI guessing.
        Some(OptionKind::Str) | None => OptionValue::Str(raw.to_string()),
    };
    Ok((key.to_string(), value))
}

fn collect_options(
    params: Option<&str>,
    sets: &[String],
) -> anyhow::Result<BTreeMap<String, OptionValue>> {
    let mut options = BTreeMap::new();

    if let Some(spec) = params {
        let text = match spec.strip_prefix('@') {
            Some(path) => {
                fs::read_to_string(path).with_context(|| format!("reading params file {path}"))?
            }
            None => spec.to_string(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&text).context("parsing --params as JSON")?;
        let obj = json
            .as_object()
            .context("--params must be a JSON object")?;
        for (key, value) in obj {
            options.insert(key.clone(), option_from_json(key, value)?);
        }
    }
    for arg in sets {
        let (key, value) = option_from_assignment(arg)?;
        options.insert(key, value);
    }
    Ok(options)
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

/// Resolve the codec through the registry, the same dispatch path a host
/// engine takes.
fn codec_entry() -> anyhow::Result<registry::CodecEntry> {
    j2kblock_plugin::register_jpeg2000()?;
    registry::lookup(registry::JPEG2000_CODEC_ID)
        .context("jpeg2000 codec missing from the registry")
}

fn check_status(status: i32, what: &str) -> anyhow::Result<usize> {
    if status < 0 {
        anyhow::bail!("{} failed with codec status {}", what, status);
    }
    Ok(status as usize)
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(
    input: PathBuf,
    output: PathBuf,
    shape: BlockShape,
    params: Option<String>,
    sets: Vec<String>,
) -> anyhow::Result<()> {
    let options = collect_options(params.as_deref(), &sets)?;
    debug!("configuring {} option(s)", options.len());
    j2kblock_plugin::configure(&options)?;

    let src = fs::read(&input).with_context(|| format!("reading input file {:?}", input))?;
    if src.len() != shape.raw_len() {
        anyhow::bail!(
            "input is {} bytes but the given shape needs {} ({}x{}x{} @ {} byte/sample)",
            src.len(),
            shape.raw_len(),
            shape.num_components,
            shape.height,
            shape.width,
            shape.typesize
        );
    }

    let entry = codec_entry()?;
    let mut dst = vec![0u8; src.len() + 4096];
    let t0 = Instant::now();
    let n = check_status((entry.encode)(&src, &mut dst, &shape), "encode")?;
    let elapsed = t0.elapsed();
    fs::write(&output, &dst[..n]).with_context(|| format!("writing output file {:?}", output))?;

    eprintln!("  shape       : {}x{}x{} @ {} byte/sample",
        shape.num_components, shape.height, shape.width, shape.typesize);
    eprintln!("  raw size    : {}", human_bytes(src.len() as u64));
    eprintln!("  compressed  : {}", human_bytes(n as u64));
    eprintln!("  ratio       : {:.2}x", src.len() as f64 / n as f64);
    eprintln!("  elapsed     : {:.3}ms", elapsed.as_secs_f64() * 1000.0);
    Ok(())
}

fn run_decompress(input: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let src = fs::read(&input).with_context(|| format!("reading input file {:?}", input))?;
    let info = j2kblock_engine::inspect(&src)?;

    let raw_len = info
        .header
        .raw_len()
        .context("stream header declares implausible dimensions")?;
    let entry = codec_entry()?;
    let mut dst = vec![0u8; raw_len];
    let t0 = Instant::now();
    let n = check_status((entry.decode)(&src, &mut dst), "decode")?;
    let elapsed = t0.elapsed();
    fs::write(&output, &dst[..n]).with_context(|| format!("writing output file {:?}", output))?;

    eprintln!("  raw size    : {}", human_bytes(n as u64));
    eprintln!("  elapsed     : {:.3}ms", elapsed.as_secs_f64() * 1000.0);
    Ok(())
}

fn run_info(file: PathBuf) -> anyhow::Result<()> {
    let src = fs::read(&file).with_context(|| format!("reading stream file {:?}", file))?;
    let info = j2kblock_engine::inspect(&src)?;
    let h = &info.header;

    println!("=== JPEG2000 stream: {:?} ===", file);
    println!();
    println!("  container      : {:?}", info.container);
    println!("  size           : {}", human_bytes(src.len() as u64));
    println!("  image          : {}x{}, {} component(s), {} bit",
        h.width, h.height, h.num_components, h.precision);
    match h.raw_len() {
        Some(n) => println!("  raw size       : {}", human_bytes(n as u64)),
        None => println!("  raw size       : implausible (dimensions overflow)"),
    }
    println!("  quantization   : shift {}", h.shift);
    println!("  layers         : {}", h.num_layers);
    println!("  progression    : {}", h.progression);
    println!("  resolutions    : {}", h.num_resolutions);
    println!("  guard bits     : {}", h.num_guard_bits);
    println!("  code-block     : {}x{}", h.codeblock[0], h.codeblock[1]);
    println!("  profile        : 0x{:04x}", h.profile);
    if h.roi_component >= 0 {
        println!("  roi            : component {} (shift {})", h.roi_component, h.roi_shift);
    }
    println!("  payload        : {}", human_bytes(h.payload_len as u64));
    println!("  checksum       : {:016x}", h.checksum);
    println!("  flags          : 0x{:02x}", h.flags);
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let _engine = EngineGuard::init(cli.threads, cli.verbose);

    match cli.command {
        Commands::Compress {
            input,
            output,
            width,
            height,
            components,
            typesize,
            params,
            sets,
        } => {
            let shape = BlockShape {
                num_components: components,
                height,
                width,
                typesize,
            };
            run_compress(input, output, shape, params, sets)
        }
        Commands::Decompress { input, output } => run_decompress(input, output),
        Commands::Info { file } => run_info(file),
    }
}
