// Preview rendering: draw a pattern's sewn thread onto a square RGB canvas.
//
// Only `Normal`-to-`Normal` moves are drawn. Jumps, trims and color changes
// lift the pen. The scale is computed once from the pattern bounds so the
// design keeps its aspect ratio and sits centered inside a fixed margin.

use std::io::{BufWriter, Write};
use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use thiserror::Error;

use crate::pattern::{Pattern, StitchKind};

/// Default canvas edge in pixels.
pub const DEFAULT_PREVIEW_SIZE: u32 = 512;

/// Largest canvas edge accepted by `render` (about 200 MB of RGB).
pub const MAX_PREVIEW_SIZE: u32 = 8192;

/// Blank border as a fraction of the canvas edge.
const MARGIN_RATIO: f64 = 0.05;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Colors for blocks whose thread identifier does not map to RGB.
pub const DEFAULT_PALETTE: [[u8; 3]; 8] = [
    [0, 0, 0],
    [220, 20, 60],
    [30, 144, 255],
    [34, 139, 34],
    [255, 140, 0],
    [148, 0, 211],
    [0, 139, 139],
    [139, 69, 19],
];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("preview size must be greater than zero")]
    ZeroDimension,
    #[error("preview size {size} exceeds the {MAX_PREVIEW_SIZE} pixel limit")]
    TooLarge { size: u32 },
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Render
// ---------------------------------------------------------------------------

/// Maps machine coordinates onto canvas pixels.
struct Viewport {
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Viewport {
    fn fit(pattern: &Pattern, size: u32) -> Option<Self> {
        let b = pattern.bounds()?;
        let size = f64::from(size);
        let margin = (size * MARGIN_RATIO).floor();
        let usable = (size - 2.0 * margin).max(1.0);
        let extent = f64::from(b.width().max(b.height()).max(1));
        let scale = usable / extent;
        // Center the shorter axis.
        let offset_x = margin + (usable - f64::from(b.width()) * scale) / 2.0
            - f64::from(b.min_x) * scale;
        let offset_y = margin + (usable - f64::from(b.height()) * scale) / 2.0
            - f64::from(b.min_y) * scale;
        Some(Self {
            scale,
            offset_x,
            offset_y,
        })
    }

    fn project(&self, (x, y): (i32, i32)) -> (f32, f32) {
        (
            (f64::from(x) * self.scale + self.offset_x) as f32,
            (f64::from(y) * self.scale + self.offset_y) as f32,
        )
    }
}

/// Color used for block `index` of `pattern`.
pub fn block_color(pattern: &Pattern, index: usize) -> [u8; 3] {
    pattern
        .colors
        .get(index)
        .and_then(|c| c.to_rgb())
        .unwrap_or(DEFAULT_PALETTE[index % DEFAULT_PALETTE.len()])
}

/// Render `pattern` onto a `max_dimension` x `max_dimension` canvas.
///
/// An empty pattern yields a blank canvas.
pub fn render(pattern: &Pattern, max_dimension: u32) -> Result<RgbImage, RenderError> {
    if max_dimension == 0 {
        return Err(RenderError::ZeroDimension);
    }
    if max_dimension > MAX_PREVIEW_SIZE {
        return Err(RenderError::TooLarge {
            size: max_dimension,
        });
    }
    let mut canvas = RgbImage::from_pixel(max_dimension, max_dimension, BACKGROUND);
    let Some(view) = Viewport::fit(pattern, max_dimension) else {
        return Ok(canvas);
    };

    let mut segments = 0usize;
    for block in pattern.blocks() {
        let color = Rgb(block_color(pattern, block.index));
        let mut pen: Option<(f32, f32)> = None;
        for s in block.stitches {
            if s.kind != StitchKind::Normal {
                pen = None;
                continue;
            }
            let here = view.project(s.position());
            if let Some(from) = pen {
                draw_line_segment_mut(&mut canvas, from, here, color);
                segments += 1;
            }
            pen = Some(here);
        }
    }
    log::debug!("render: {segments} segments on {max_dimension}px canvas");
    Ok(canvas)
}

/// Write `image` to `path` as PNG.
pub fn write_png(image: &RgbImage, path: &Path) -> Result<(), RenderError> {
    let file = std::fs::File::create(path)?;
    let mut out = BufWriter::new(file);
    image.write_to(&mut out, ImageFormat::Png)?;
    out.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
