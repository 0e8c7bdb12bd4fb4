// Command-line front end for stitchopt.
//
// Explicit subcommands with long-form options; every subcommand maps onto a
// library entry point in `io` or `dst` and reports through the same
// serializable structs.

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::dst;
use crate::engine::{OptimizeOptions, Status};
use crate::io::{self, OptimizeReport, PreviewOptions, PreviewReport};
use crate::pattern::StitchKind;
use crate::reduce::config::{self, DEFAULT_TOLERANCE, MAX_LEVEL};
use crate::render::{DEFAULT_PREVIEW_SIZE, MAX_PREVIEW_SIZE};

const DEFAULT_LEVEL: u32 = 1;

// ---------------------------------------------------------------------------
// Value parsing
// ---------------------------------------------------------------------------

fn parse_distance(s: &str) -> Result<f64, String> {
    let v: f64 = s
        .trim()
        .parse()
        .map_err(|e| format!("invalid distance '{s}': {e}"))?;
    if !v.is_finite() || v < 0.0 {
        return Err(format!("distance must be a finite non-negative number: '{s}'"));
    }
    Ok(v)
}

fn parse_preview_size(s: &str) -> Result<u32, String> {
    let v: u32 = s
        .trim()
        .parse()
        .map_err(|e| format!("invalid preview size '{s}': {e}"))?;
    if v == 0 || v > MAX_PREVIEW_SIZE {
        return Err(format!("preview size must be 1..={MAX_PREVIEW_SIZE}: '{s}'"));
    }
    Ok(v)
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Embroidery stitch-count optimizer for Tajima DST files.
#[derive(Parser, Debug)]
#[command(
    name = "stitchopt",
    version,
    about = "Reduce redundant stitches in DST embroidery files",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Print reports as JSON.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Reduce stitches and write an optimized copy with a PNG preview.
    Optimize(OptimizeArgs),
    /// Render a PNG preview of a DST file.
    Preview(PreviewArgs),
    /// Print the header and color blocks of a DST file.
    Info(InfoArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct ReductionArgs {
    /// Reduction level (0 exact, 1 default, 2 smooth, 3 aggressive).
    #[arg(long, short = 'l', value_parser = clap::value_parser!(u32).range(0..=MAX_LEVEL as i64), default_value_t = DEFAULT_LEVEL)]
    level: u32,

    /// Collinearity tolerance in machine units (0.1 mm); overrides the level.
    #[arg(long, short = 't', value_parser = parse_distance)]
    tolerance: Option<f64>,

    /// Drop stitches shorter than this many machine units; overrides the level.
    #[arg(long = "min-stitch-length", value_parser = parse_distance)]
    min_stitch_length: Option<f64>,
}

#[derive(Args, Debug)]
struct OptimizeArgs {
    /// DST files to optimize.
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Output file name (single input only; default: <stem>_optimized.dst).
    #[arg(long, short = 'o')]
    output: Option<String>,

    /// Directory for output files (default: next to each input).
    #[arg(long = "output-dir", value_hint = ValueHint::DirPath)]
    output_dir: Option<PathBuf>,

    /// Preview edge length in pixels.
    #[arg(long = "preview-size", default_value_t = DEFAULT_PREVIEW_SIZE, value_parser = parse_preview_size)]
    preview_size: u32,

    /// Do not write a PNG preview.
    #[arg(long = "no-preview")]
    no_preview: bool,

    #[command(flatten)]
    reduction: ReductionArgs,
}

#[derive(Args, Debug)]
struct PreviewArgs {
    /// DST input file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Directory for the PNG (default: next to the input).
    #[arg(long = "output-dir", value_hint = ValueHint::DirPath)]
    output_dir: Option<PathBuf>,

    /// Preview edge length in pixels.
    #[arg(long = "preview-size", default_value_t = DEFAULT_PREVIEW_SIZE, value_parser = parse_preview_size)]
    preview_size: u32,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// DST input file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Optimize,
    Preview,
    Info,
    Config,
}

struct Options {
    command: Command,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    inputs: Vec<PathBuf>,
    output_name: Option<String>,
    optimize: OptimizeOptions,
    preview: PreviewOptions,
}

fn resolve_options(cli: Cli) -> Options {
    let quiet = cli.quiet;
    let verbose = cli.verbose.min(2);
    let json_output = cli.json_output;
    let force = cli.force;
    let base = |command: Command, inputs: Vec<PathBuf>| Options {
        command,
        quiet,
        verbose,
        json_output,
        inputs,
        output_name: None,
        optimize: OptimizeOptions {
            overwrite: force,
            ..Default::default()
        },
        preview: PreviewOptions::default(),
    };

    match cli.command {
        Cmd::Optimize(args) => {
            let mut reduction = config::config_for_level(args.reduction.level);
            if let Some(t) = args.reduction.tolerance {
                reduction = reduction.with_tolerance(t);
            }
            if args.reduction.min_stitch_length.is_some() {
                reduction = reduction.with_min_stitch_length(args.reduction.min_stitch_length);
            }
            let mut opts = base(Command::Optimize, args.inputs);
            opts.output_name = args.output;
            opts.optimize.reduction = reduction;
            opts.optimize.preview = !args.no_preview;
            opts.optimize.preview_size = args.preview_size;
            opts.optimize.output_dir = args.output_dir;
            opts
        }
        Cmd::Preview(args) => {
            let mut opts = base(Command::Preview, vec![args.input]);
            opts.preview = PreviewOptions {
                size: args.preview_size,
                output_dir: args.output_dir,
            };
            opts
        }
        Cmd::Info(args) => base(Command::Info, vec![args.input]),
        Cmd::Config => base(Command::Config, Vec::new()),
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("stitchopt".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn print_json<T: serde::Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(s) => {
            println!("{s}");
            0
        }
        Err(e) => {
            eprintln!("stitchopt: JSON serialization failed: {e}");
            1
        }
    }
}

fn percent_removed(original: usize, new: usize) -> f64 {
    if original == 0 {
        0.0
    } else {
        (original - new) as f64 * 100.0 / original as f64
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("stitchopt version {version}");

    let file_io = cfg!(feature = "file-io") as u8;
    let parallel = cfg!(feature = "parallel") as u8;
    let default = config::config_for_level(DEFAULT_LEVEL);

    eprintln!("FILE_IO={file_io}");
    eprintln!("PARALLEL={parallel}");
    eprintln!("DEFAULT_LEVEL={DEFAULT_LEVEL}");
    eprintln!("MAX_LEVEL={MAX_LEVEL}");
    eprintln!("DEFAULT_TOLERANCE={DEFAULT_TOLERANCE}");
    eprintln!("DEFAULT_PROFILE={}", default.name);
    eprintln!("DEFAULT_PREVIEW_SIZE={DEFAULT_PREVIEW_SIZE}");
    eprintln!("MAX_PREVIEW_SIZE={MAX_PREVIEW_SIZE}");
    eprintln!("MAX_RECORD_OFFSET={}", crate::pattern::MAX_RECORD_OFFSET);

    0
}

// ---------------------------------------------------------------------------
// Optimize command
// ---------------------------------------------------------------------------

fn cmd_optimize(opts: &Options) -> i32 {
    if opts.output_name.is_some() && opts.inputs.len() > 1 {
        eprintln!("stitchopt: --output takes a single input file");
        return 1;
    }

    let reports: Vec<OptimizeReport> = match &opts.output_name {
        Some(name) => vec![io::optimize_pattern(&opts.inputs[0], name, &opts.optimize)],
        None => io::optimize_many(&opts.inputs, &opts.optimize, io::default_output_name),
    };

    let failed = reports.iter().filter(|r| r.status == Status::Error).count();
    if opts.json_output {
        let code = if reports.len() == 1 {
            print_json(&reports[0])
        } else {
            print_json(&reports)
        };
        if code != 0 {
            return code;
        }
    } else {
        for (input, report) in opts.inputs.iter().zip(&reports) {
            print_optimize_report(input, report, opts);
        }
    }

    i32::from(failed > 0)
}

fn print_optimize_report(input: &Path, report: &OptimizeReport, opts: &Options) {
    if report.status == Status::Error {
        eprintln!("stitchopt: {}: {}", input.display(), report.message);
        return;
    }
    if opts.quiet {
        return;
    }
    let out = report
        .output_path
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    eprintln!(
        "stitchopt: {} -> {out}: {} -> {} stitches ({:.1}% fewer)",
        input.display(),
        report.original_count,
        report.new_count,
        percent_removed(report.original_count, report.new_count)
    );
    if opts.verbose > 0 {
        if let Some(png) = &report.png_path {
            eprintln!("stitchopt: preview: {}", png.display());
        }
        if let Some(sha) = &report.output_sha256 {
            eprintln!("stitchopt: sha256: {sha}");
        }
    }
}

// ---------------------------------------------------------------------------
// Preview command
// ---------------------------------------------------------------------------

fn cmd_preview(opts: &Options) -> i32 {
    let report: PreviewReport = io::preview_dst(&opts.inputs[0], &opts.preview);
    if opts.json_output {
        let code = print_json(&report);
        if code != 0 {
            return code;
        }
    } else if report.status == Status::Error {
        eprintln!(
            "stitchopt: {}: {}",
            report.file_path.display(),
            report.message
        );
    } else if !opts.quiet {
        let png = report
            .png_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        eprintln!(
            "stitchopt: {}: {} stitches, {}, {} bytes -> {png}",
            report.file_path.display(),
            report.stitch_count,
            report.bounds,
            report.file_size
        );
    }
    i32::from(report.status == Status::Error)
}

// ---------------------------------------------------------------------------
// Info command
// ---------------------------------------------------------------------------

fn cmd_info(opts: &Options) -> i32 {
    let path = &opts.inputs[0];
    let data = match std::fs::read(path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("stitchopt: {}: {e}", path.display());
            return 1;
        }
    };
    let decoded = match dst::decode_with_report(&data) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("stitchopt: {}: {e}", path.display());
            return 1;
        }
    };
    let pattern = &decoded.pattern;
    let header = &decoded.header;

    if opts.json_output {
        let blocks: Vec<_> = pattern
            .blocks()
            .iter()
            .map(|b| {
                serde_json::json!({
                    "index": b.index,
                    "color": b.color.to_string(),
                    "stitches": b.stitches.len(),
                })
            })
            .collect();
        let json = serde_json::json!({
            "command": "info",
            "label": header.label,
            "declared_records": header.stitch_count,
            "declared_color_changes": header.color_changes,
            "records": decoded.records,
            "stitches": pattern.len(),
            "normal": pattern.count_of(StitchKind::Normal),
            "jumps": pattern.count_of(StitchKind::Jump),
            "trims": pattern.count_of(StitchKind::Trim),
            "color_changes": pattern.color_changes(),
            "bounds": io::format_bounds(pattern),
            "warnings": decoded.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
            "blocks": blocks,
        });
        return print_json(&json);
    }

    println!("label:          {}", header.label);
    println!(
        "header:         ST={} CO={} +X={} -X={} +Y={} -Y={}",
        header.stitch_count,
        header.color_changes,
        header.plus_x.unwrap_or(0),
        header.minus_x.unwrap_or(0),
        header.plus_y.unwrap_or(0),
        header.minus_y.unwrap_or(0)
    );
    println!("records:        {}", decoded.records);
    println!("stitches:       {}", pattern.len());
    for kind in [
        StitchKind::Normal,
        StitchKind::Jump,
        StitchKind::Trim,
        StitchKind::ColorChange,
    ] {
        println!("  {:<13} {}", kind.name(), pattern.count_of(kind));
    }
    println!("size:           {}", io::format_bounds(pattern));
    for block in pattern.blocks() {
        println!(
            "block {:<3}      {} ({} stitches)",
            block.index,
            block.color,
            block.stitches.len()
        );
    }
    if opts.verbose > 0 {
        for w in &decoded.warnings {
            eprintln!("stitchopt: warning: {w}");
        }
    }
    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn init_logging(opts: &Options) {
    let default_filter = match (opts.quiet, opts.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);
    init_logging(&opts);

    let exit_code = match opts.command {
        Command::Optimize => cmd_optimize(&opts),
        Command::Preview => cmd_preview(&opts),
        Command::Info => cmd_info(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
