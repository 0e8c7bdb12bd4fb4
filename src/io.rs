// File-level entry points.
//
// `optimize_pattern()` and `preview_dst()` wrap the in-memory pipeline with
// path handling, buffered writes and a serializable report. Neither returns
// an error: every failure becomes a report with `status = error`. Optionally
// records the SHA-256 of the written output (feature-gated behind `file-io`).

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::dst::{self, DecodeError, EncodeError};
use crate::engine::{self, FailureKind, OptimizeOptions, Outcome, Status};
use crate::pattern::Pattern;
use crate::render::{self, DEFAULT_PREVIEW_SIZE};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Result of `optimize_pattern()`.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizeReport {
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    pub original_count: usize,
    pub new_count: usize,
    pub output_path: Option<PathBuf>,
    pub png_path: Option<PathBuf>,
    /// Hex SHA-256 of the written output (if `file-io` feature is enabled).
    pub output_sha256: Option<String>,
}

/// Result of `preview_dst()`.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewReport {
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Stitches in the decoded pattern, end stitch included.
    pub stitch_count: usize,
    pub file_size: u64,
    pub file_path: PathBuf,
    /// Design size as `W.Wmm x H.Hmm`, or `No stitches`.
    pub bounds: String,
    pub png_path: Option<PathBuf>,
}

impl OptimizeReport {
    fn failed(err: &IoError) -> Self {
        Self {
            status: Status::Error,
            message: err.report_message(),
            failure: Some(err.failure_kind()),
            original_count: 0,
            new_count: 0,
            output_path: None,
            png_path: None,
            output_sha256: None,
        }
    }
}

impl PreviewReport {
    fn failed(input_path: &Path, err: &IoError) -> Self {
        Self {
            status: Status::Error,
            message: err.report_message(),
            failure: Some(err.failure_kind()),
            stitch_count: 0,
            file_size: 0,
            file_path: input_path.to_path_buf(),
            bounds: NO_STITCHES.to_string(),
            png_path: None,
        }
    }
}

/// Options for `preview_dst()`.
#[derive(Debug, Clone)]
pub struct PreviewOptions {
    /// Canvas edge in pixels.
    pub size: u32,
    /// Directory for the PNG. `None` writes next to the input.
    pub output_dir: Option<PathBuf>,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            size: DEFAULT_PREVIEW_SIZE,
            output_dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file operations.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("input file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("cannot read {}: {source}", path.display())]
    Unreadable { path: PathBuf, source: io::Error },
    #[error("cannot write {}: {source}", path.display())]
    Unwritable { path: PathBuf, source: io::Error },
    #[error("{} is empty", .0.display())]
    Empty(PathBuf),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("output name '{0}' must be a plain file name")]
    InvalidOutputName(String),
    #[error("output {} would replace the input file", .0.display())]
    WouldReplaceInput(PathBuf),
    /// The in-memory pipeline already produced a user-facing message.
    #[error("{message}")]
    Pipeline {
        kind: FailureKind,
        message: String,
    },
}

impl IoError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::NotFound(_) | Self::Unreadable { .. } | Self::Empty(_) | Self::Decode(_) => {
                FailureKind::Input
            }
            Self::Unwritable { .. } | Self::InvalidOutputName(_) | Self::WouldReplaceInput(_) => {
                FailureKind::Output
            }
            Self::Encode(_) => FailureKind::Internal,
            Self::Pipeline { kind, .. } => *kind,
        }
    }

    fn report_message(&self) -> String {
        match (self, self.failure_kind()) {
            (Self::Pipeline { message, .. }, _) => message.clone(),
            (_, FailureKind::Input) => format!("could not read input: {self}"),
            (_, FailureKind::Output) => format!("could not write output: {self}"),
            (_, FailureKind::Internal) => format!("internal processing error: {self}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

const NO_STITCHES: &str = "No stitches";

// ---------------------------------------------------------------------------
// optimize_pattern
// ---------------------------------------------------------------------------

/// Optimize the DST file at `input_path`, writing `output_filename` and a
/// PNG preview beside it.
///
/// Output lands in `options.output_dir`, or the input's directory when that
/// is `None`. The preview path is the output path with its extension
/// replaced by `.png`.
pub fn optimize_pattern(
    input_path: &Path,
    output_filename: &str,
    options: &OptimizeOptions,
) -> OptimizeReport {
    match try_optimize(input_path, output_filename, options) {
        Ok(report) => report,
        Err(e) => {
            log::debug!("optimize {}: {e}", input_path.display());
            OptimizeReport::failed(&e)
        }
    }
}

fn try_optimize(
    input_path: &Path,
    output_filename: &str,
    options: &OptimizeOptions,
) -> Result<OptimizeReport, IoError> {
    check_output_name(output_filename)?;
    let input = read_input(input_path)?;
    let outcome = engine::optimize(&input, options);
    let Outcome {
        status: Status::Success,
        output: Some(output),
        ..
    } = &outcome
    else {
        return Err(IoError::Pipeline {
            kind: outcome.failure.unwrap_or(FailureKind::Internal),
            message: outcome.message.clone(),
        });
    };

    let dir = output_dir_for(input_path, options.output_dir.as_deref());
    let output_path = dir.join(output_filename);
    if same_file(input_path, &output_path) {
        return Err(IoError::WouldReplaceInput(output_path));
    }
    if !options.overwrite && output_path.exists() {
        return Err(IoError::Unwritable {
            path: output_path,
            source: io::Error::new(io::ErrorKind::AlreadyExists, "file exists"),
        });
    }
    write_bytes(&output_path, output)?;

    let png_path = png_path_for(&output_path);
    let png_path = match &outcome.preview {
        Some(img) => match render::write_png(img, &png_path) {
            Ok(()) => Some(png_path),
            Err(e) => {
                log::warn!("preview not written to {}: {e}", png_path.display());
                None
            }
        },
        None => None,
    };

    log::info!(
        "{} -> {} ({} -> {} stitches)",
        input_path.display(),
        output_path.display(),
        outcome.original_count,
        outcome.new_count
    );
    Ok(OptimizeReport {
        status: Status::Success,
        message: outcome.message.clone(),
        failure: None,
        original_count: outcome.original_count,
        new_count: outcome.new_count,
        output_sha256: sha256_hex(output),
        output_path: Some(output_path),
        png_path,
    })
}

/// Optimize several files, each to `output_name(input)` beside it.
pub fn optimize_many<F>(
    inputs: &[PathBuf],
    options: &OptimizeOptions,
    output_name: F,
) -> Vec<OptimizeReport>
where
    F: Fn(&Path) -> String + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        inputs
            .par_iter()
            .map(|p| optimize_pattern(p, &output_name(p), options))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        inputs
            .iter()
            .map(|p| optimize_pattern(p, &output_name(p), options))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// preview_dst
// ---------------------------------------------------------------------------

/// Decode the DST file at `input_path` and write `preview_<stem>.png`.
pub fn preview_dst(input_path: &Path, options: &PreviewOptions) -> PreviewReport {
    match try_preview(input_path, options) {
        Ok(report) => report,
        Err(e) => {
            log::debug!("preview {}: {e}", input_path.display());
            PreviewReport::failed(input_path, &e)
        }
    }
}

fn try_preview(input_path: &Path, options: &PreviewOptions) -> Result<PreviewReport, IoError> {
    let input = read_input(input_path)?;
    let pattern = dst::decode(&input)?;

    let stem = input_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pattern".to_string());
    let dir = output_dir_for(input_path, options.output_dir.as_deref());
    let png_path = dir.join(format!("preview_{stem}.png"));
    let png_path = match engine::render_preview(&pattern, options.size) {
        Some(image) => match render::write_png(&image, &png_path) {
            Ok(()) => Some(png_path),
            Err(e) => {
                log::warn!("preview not written to {}: {e}", png_path.display());
                None
            }
        },
        None => None,
    };

    let message = if png_path.is_some() {
        "Preview generated successfully"
    } else {
        "Pattern read, preview image unavailable"
    };
    Ok(PreviewReport {
        status: Status::Success,
        message: message.to_string(),
        failure: None,
        stitch_count: pattern.len(),
        file_size: input.len() as u64,
        file_path: input_path.to_path_buf(),
        bounds: format_bounds(&pattern),
        png_path,
    })
}

/// Design size in millimetres, `W.Wmm x H.Hmm`.
pub fn format_bounds(pattern: &Pattern) -> String {
    match pattern.bounds() {
        Some(b) => format!(
            "{:.1}mm x {:.1}mm",
            f64::from(b.width()) / 10.0,
            f64::from(b.height()) / 10.0
        ),
        None => NO_STITCHES.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_input(path: &Path) -> Result<Vec<u8>, IoError> {
    if !path.is_file() {
        return Err(IoError::NotFound(path.to_path_buf()));
    }
    if !dst::is_dst_path(path) {
        log::warn!(
            "{} has no .dst extension, trying to read it as DST",
            path.display()
        );
    }
    let data = std::fs::read(path).map_err(|source| IoError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    if data.is_empty() {
        return Err(IoError::Empty(path.to_path_buf()));
    }
    Ok(data)
}

fn write_bytes(path: &Path, data: &[u8]) -> Result<(), IoError> {
    let unwritable = |source| IoError::Unwritable {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(unwritable)?;
    let mut out = BufWriter::with_capacity(BUF_SIZE, file);
    out.write_all(data).map_err(unwritable)?;
    out.flush().map_err(unwritable)?;
    drop(out);

    let written = std::fs::metadata(path).map_err(unwritable)?.len();
    if written == 0 {
        return Err(IoError::Empty(path.to_path_buf()));
    }
    Ok(())
}

/// Output names are single file names: no directories, no `..`.
fn check_output_name(name: &str) -> Result<(), IoError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(IoError::InvalidOutputName(name.to_string())),
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn output_dir_for(input_path: &Path, output_dir: Option<&Path>) -> PathBuf {
    match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => input_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    }
}

/// `rose.DST` -> `rose.png`.
pub fn png_path_for(output_path: &Path) -> PathBuf {
    output_path.with_extension("png")
}

/// Output name used when none is given: `<stem>_optimized.dst`.
pub fn default_output_name(input_path: &Path) -> String {
    let stem = input_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pattern".to_string());
    format!("{stem}_optimized.{}", dst::EXTENSION)
}

#[cfg(feature = "file-io")]
fn sha256_hex(data: &[u8]) -> Option<String> {
    let digest = sha2::Sha256::digest(data);
    Some(digest.iter().map(|b| format!("{b:02x}")).collect())
}

#[cfg(not(feature = "file-io"))]
fn sha256_hex(_data: &[u8]) -> Option<String> {
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternBuilder;

    fn write_line(dir: &Path, name: &str) -> PathBuf {
        let p = PatternBuilder::new("line")
            .stitch(0, 0)
            .stitch(10, 0)
            .stitch(20, 0)
            .stitch(20, 40)
            .build();
        let path = dir.join(name);
        std::fs::write(&path, dst::encode(&p).unwrap()).unwrap();
        path
    }

    #[test]
    fn optimize_writes_output_and_preview() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_line(dir.path(), "line.dst");
        let report = optimize_pattern(&input, "line_opt.DST", &OptimizeOptions::default());

        assert_eq!(report.status, Status::Success, "{}", report.message);
        assert_eq!(report.original_count, 5);
        assert_eq!(report.new_count, 4);
        let out = report.output_path.unwrap();
        assert_eq!(out, dir.path().join("line_opt.DST"));
        assert!(dst::decode(&std::fs::read(&out).unwrap()).is_ok());
        assert_eq!(report.png_path, Some(dir.path().join("line_opt.png")));
        assert!(dir.path().join("line_opt.png").is_file());
    }

    #[test]
    fn output_dir_is_respected() {
        let src = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let input = write_line(src.path(), "a.dst");
        let opts = OptimizeOptions {
            output_dir: Some(dst_dir.path().to_path_buf()),
            preview: false,
            ..Default::default()
        };
        let report = optimize_pattern(&input, "b.dst", &opts);
        assert_eq!(report.output_path, Some(dst_dir.path().join("b.dst")));
        assert_eq!(report.png_path, None);
        assert!(!src.path().join("b.dst").exists());
    }

    #[test]
    fn missing_input_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let report = optimize_pattern(
            &dir.path().join("nope.dst"),
            "out.dst",
            &OptimizeOptions::default(),
        );
        assert_eq!(report.status, Status::Error);
        assert_eq!(report.failure, Some(FailureKind::Input));
        assert!(report.message.contains("not found"));
    }

    #[test]
    fn empty_input_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("empty.dst");
        std::fs::write(&input, b"").unwrap();
        let report = optimize_pattern(&input, "out.dst", &OptimizeOptions::default());
        assert_eq!(report.failure, Some(FailureKind::Input));
        assert!(report.message.contains("is empty"));
    }

    #[test]
    fn corrupt_input_is_an_input_failure() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.dst");
        std::fs::write(&input, b"LA:nothing useful").unwrap();
        let report = optimize_pattern(&input, "out.dst", &OptimizeOptions::default());
        assert_eq!(report.failure, Some(FailureKind::Input));
        assert!(report.message.starts_with("could not read input"));
        assert!(!dir.path().join("out.dst").exists());
    }

    #[test]
    fn existing_output_is_kept_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_line(dir.path(), "in.dst");
        std::fs::write(dir.path().join("out.dst"), b"keep").unwrap();
        let opts = OptimizeOptions {
            overwrite: false,
            ..Default::default()
        };
        let report = optimize_pattern(&input, "out.dst", &opts);
        assert_eq!(report.failure, Some(FailureKind::Output));
        assert_eq!(std::fs::read(dir.path().join("out.dst")).unwrap(), b"keep");
    }

    #[cfg(feature = "file-io")]
    #[test]
    fn sha256_matches_written_bytes() {
        use sha2::Digest;
        let dir = tempfile::tempdir().unwrap();
        let input = write_line(dir.path(), "h.dst");
        let report = optimize_pattern(&input, "h_out.dst", &OptimizeOptions::default());
        let bytes = std::fs::read(dir.path().join("h_out.dst")).unwrap();
        let expected: String = sha2::Sha256::digest(&bytes)
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        assert_eq!(report.output_sha256, Some(expected));
    }

    #[test]
    fn preview_writes_prefixed_png() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_line(dir.path(), "rose.dst");
        let report = preview_dst(&input, &PreviewOptions::default());
        assert_eq!(report.status, Status::Success, "{}", report.message);
        assert_eq!(report.stitch_count, 5);
        assert_eq!(report.bounds, "2.0mm x 4.0mm");
        assert_eq!(
            report.file_size,
            std::fs::metadata(&input).unwrap().len()
        );
        assert_eq!(report.png_path, Some(dir.path().join("preview_rose.png")));
        assert!(dir.path().join("preview_rose.png").is_file());
    }

    #[test]
    fn preview_of_empty_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("blank.dst");
        std::fs::write(&input, dst::encode(&Pattern::new("blank")).unwrap()).unwrap();
        let report = preview_dst(&input, &PreviewOptions::default());
        assert_eq!(report.status, Status::Success);
        assert_eq!(report.bounds, "No stitches");
    }

    #[test]
    fn preview_survives_unwritable_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_line(dir.path(), "rose.dst");
        let opts = PreviewOptions {
            output_dir: Some(dir.path().join("missing")),
            ..Default::default()
        };
        let report = preview_dst(&input, &opts);
        assert_eq!(report.status, Status::Success, "{}", report.message);
        assert_eq!(report.png_path, None);
        assert_eq!(report.stitch_count, 5);
        assert_eq!(report.bounds, "2.0mm x 4.0mm");
    }

    #[test]
    fn preview_survives_oversized_canvas() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_line(dir.path(), "big.dst");
        let opts = PreviewOptions {
            size: u32::MAX,
            ..Default::default()
        };
        let report = preview_dst(&input, &opts);
        assert_eq!(report.status, Status::Success);
        assert_eq!(report.png_path, None);
        assert!(!dir.path().join("preview_big.png").exists());
    }

    #[test]
    fn output_name_must_be_a_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_line(dir.path(), "in.dst");
        for name in ["../out.dst", "sub/out.dst", "/tmp/out.dst", "..", ""] {
            let report = optimize_pattern(&input, name, &OptimizeOptions::default());
            assert_eq!(report.status, Status::Error, "{name}");
            assert_eq!(report.failure, Some(FailureKind::Output), "{name}");
            assert!(report.message.starts_with("could not write output"));
        }
    }

    #[test]
    fn input_is_never_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_line(dir.path(), "same.dst");
        let before = std::fs::read(&input).unwrap();
        let report = optimize_pattern(&input, "same.dst", &OptimizeOptions::default());
        assert_eq!(report.failure, Some(FailureKind::Output));
        assert!(report.message.contains("would replace the input"));
        assert_eq!(std::fs::read(&input).unwrap(), before);
    }

    #[test]
    fn preview_of_missing_file_fails() {
        let report = preview_dst(
            Path::new("/definitely/not/here.dst"),
            &PreviewOptions::default(),
        );
        assert_eq!(report.status, Status::Error);
        assert_eq!(report.failure, Some(FailureKind::Input));
    }

    #[test]
    fn report_serializes_status_as_string() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_line(dir.path(), "j.dst");
        let report = optimize_pattern(&input, "j_out.dst", &OptimizeOptions::default());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["new_count"], 4);
    }

    #[test]
    fn naming_helpers() {
        assert_eq!(
            png_path_for(Path::new("d/rose.DST")),
            PathBuf::from("d/rose.png")
        );
        assert_eq!(
            default_output_name(Path::new("d/rose.dst")),
            "rose_optimized.dst"
        );
    }
}
