// Optimization pipeline: ties the DST codec, the reducer and the renderer.
//
// Provides one in-memory entry point that:
//   - decodes the input bytes
//   - reduces the stitch list
//   - re-encodes the reduced pattern
//   - renders a preview of the result (best effort)
//
// Every failure, panics included, comes back as an `Outcome` with
// `Status::Error`; nothing escapes to the caller.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use image::RgbImage;
use serde::Serialize;

use crate::dst;
use crate::pattern::Pattern;
use crate::reduce::{self, ReductionConfig, ReductionStats};
use crate::render::{self, DEFAULT_PREVIEW_SIZE};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for an optimize run.
#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    pub reduction: ReductionConfig,
    /// Render a preview of the reduced pattern.
    pub preview: bool,
    /// Preview canvas edge in pixels.
    pub preview_size: u32,
    /// Directory for written files. `None` writes next to the input.
    pub output_dir: Option<PathBuf>,
    /// Replace an existing output file.
    pub overwrite: bool,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            reduction: ReductionConfig::default(),
            preview: true,
            preview_size: DEFAULT_PREVIEW_SIZE,
            output_dir: None,
            overwrite: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Where a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The input could not be read or parsed; picking another file may help.
    Input,
    /// An output file could not be written.
    Output,
    /// A fault in the pipeline itself.
    Internal,
}

/// Result of `optimize`.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub status: Status,
    pub original_count: usize,
    pub new_count: usize,
    /// Encoded reduced pattern.
    pub output: Option<Vec<u8>>,
    /// Preview of the reduced pattern, if rendering succeeded.
    pub preview: Option<RgbImage>,
    pub message: String,
    pub failure: Option<FailureKind>,
    pub stats: ReductionStats,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    fn failed(kind: FailureKind, message: String) -> Self {
        Self {
            status: Status::Error,
            original_count: 0,
            new_count: 0,
            output: None,
            preview: None,
            message,
            failure: Some(kind),
            stats: ReductionStats::default(),
        }
    }

    fn input_error(detail: impl std::fmt::Display) -> Self {
        Self::failed(FailureKind::Input, format!("could not read input: {detail}"))
    }

    fn internal_error(detail: impl std::fmt::Display) -> Self {
        Self::failed(
            FailureKind::Internal,
            format!("internal processing error: {detail}"),
        )
    }
}

// ---------------------------------------------------------------------------
// Optimize
// ---------------------------------------------------------------------------

/// Decode, reduce, re-encode and preview a DST buffer.
pub fn optimize(input: &[u8], options: &OptimizeOptions) -> Outcome {
    match panic::catch_unwind(AssertUnwindSafe(|| run(input, options))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let detail = panic_detail(&*payload);
            log::error!("optimize panicked: {detail}");
            Outcome::internal_error(detail)
        }
    }
}

/// Reduce and re-encode an already decoded pattern.
pub fn optimize_pattern(pattern: &Pattern, options: &OptimizeOptions) -> Outcome {
    let (reduced, stats) = reduce::reduce(pattern, &options.reduction);
    let output = match dst::encode(&reduced) {
        Ok(bytes) => bytes,
        Err(e) => return Outcome::internal_error(e),
    };
    let preview = if options.preview {
        render_preview(&reduced, options.preview_size)
    } else {
        None
    };

    log::info!(
        "optimized '{}': {} -> {} stitches",
        pattern.label,
        stats.original_count,
        stats.new_count
    );
    Outcome {
        status: Status::Success,
        original_count: stats.original_count,
        new_count: stats.new_count,
        output: Some(output),
        preview,
        message: format!("Reduced by: {} stitches", stats.removed()),
        failure: None,
        stats,
    }
}

fn run(input: &[u8], options: &OptimizeOptions) -> Outcome {
    match dst::decode(input) {
        Ok(pattern) => optimize_pattern(&pattern, options),
        Err(e) => Outcome::input_error(e),
    }
}

/// Render, logging and discarding any failure, panics included.
pub(crate) fn render_preview(pattern: &Pattern, size: u32) -> Option<RgbImage> {
    match panic::catch_unwind(AssertUnwindSafe(|| render::render(pattern, size))) {
        Ok(Ok(img)) => Some(img),
        Ok(Err(e)) => {
            log::warn!("preview unavailable: {e}");
            None
        }
        Err(payload) => {
            log::warn!("preview unavailable: renderer panicked: {}", panic_detail(&*payload));
            None
        }
    }
}

fn panic_detail(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unexpected panic".to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{PatternBuilder, StitchKind, ThreadColor};

    fn line_file() -> Vec<u8> {
        let p = PatternBuilder::new("line")
            .stitch(0, 0)
            .stitch(10, 0)
            .stitch(20, 0)
            .build();
        dst::encode(&p).unwrap()
    }

    #[test]
    fn optimize_reduces_and_reencodes() {
        let out = optimize(&line_file(), &OptimizeOptions::default());
        assert!(out.is_success(), "{}", out.message);
        assert_eq!(out.original_count, 4);
        assert_eq!(out.new_count, 3);
        assert_eq!(out.message, "Reduced by: 1 stitches");
        assert!(out.failure.is_none());
        assert!(out.preview.is_some());

        let q = dst::decode(out.output.as_deref().unwrap()).unwrap();
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn garbage_input_is_an_input_failure() {
        let out = optimize(b"not a dst file", &OptimizeOptions::default());
        assert_eq!(out.status, Status::Error);
        assert_eq!(out.failure, Some(FailureKind::Input));
        assert!(out.message.starts_with("could not read input"));
        assert!(out.output.is_none());
    }

    #[test]
    fn truncated_input_is_an_input_failure() {
        let mut bytes = line_file();
        bytes.truncate(bytes.len() - 3);
        let out = optimize(&bytes, &OptimizeOptions::default());
        assert_eq!(out.failure, Some(FailureKind::Input));
    }

    #[test]
    fn invalid_pattern_is_an_internal_failure() {
        let mut p = PatternBuilder::new("bad").stitch(1, 1).build();
        p.colors.push(ThreadColor::unnamed(1));
        let out = optimize_pattern(&p, &OptimizeOptions::default());
        assert_eq!(out.failure, Some(FailureKind::Internal));
        assert!(out.message.starts_with("internal processing error"));
    }

    #[test]
    fn preview_failure_does_not_fail_optimize() {
        let opts = OptimizeOptions {
            preview_size: 0,
            ..Default::default()
        };
        let out = optimize(&line_file(), &opts);
        assert!(out.is_success());
        assert!(out.preview.is_none());
        assert!(out.output.is_some());
    }

    #[test]
    fn oversized_preview_does_not_fail_optimize() {
        let opts = OptimizeOptions {
            preview_size: u32::MAX,
            ..Default::default()
        };
        let out = optimize(&line_file(), &opts);
        assert_eq!(out.status, Status::Success, "{}", out.message);
        assert!(out.preview.is_none());
        assert_eq!(out.new_count, 3);
    }

    #[test]
    fn preview_can_be_disabled() {
        let opts = OptimizeOptions {
            preview: false,
            ..Default::default()
        };
        assert!(optimize(&line_file(), &opts).preview.is_none());
    }

    #[test]
    fn empty_pattern_succeeds_with_blank_preview() {
        let bytes = dst::encode(&Pattern::new("empty")).unwrap();
        let out = optimize(&bytes, &OptimizeOptions::default());
        assert!(out.is_success());
        assert_eq!(out.original_count, 1);
        assert_eq!(out.new_count, 1);
        let img = out.preview.unwrap();
        assert!(img.pixels().all(|p| p.0 == [255, 255, 255]));
    }

    #[test]
    fn color_stops_survive() {
        let p = PatternBuilder::new("two")
            .stitch(0, 0)
            .stitch(10, 0)
            .stitch(20, 0)
            .color_change(ThreadColor::Rgb(0, 128, 0))
            .stitch(20, 10)
            .stitch(20, 20)
            .stitch(20, 30)
            .build();
        let out = optimize(&dst::encode(&p).unwrap(), &OptimizeOptions::default());
        let q = dst::decode(out.output.as_deref().unwrap()).unwrap();
        assert_eq!(q.count_of(StitchKind::ColorChange), 1);
        assert!(out.new_count < out.original_count);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Status::Success).unwrap(),
            "\"success\""
        );
        assert_eq!(
            serde_json::to_string(&FailureKind::Internal).unwrap(),
            "\"internal\""
        );
    }
}
