// In-memory stitch pattern model.
//
// A `Pattern` is an ordered list of absolute-position stitches plus a color
// table with one entry per color block. Relative offsets are derived on
// demand; the codec converts between them and the 3-byte DST records.

use std::ops::Range;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Largest per-axis offset one DST record can carry (81 + 27 + 9 + 3 + 1).
pub const MAX_RECORD_OFFSET: i32 = 121;

/// Does `(dx, dy)` fit in a single record?
#[inline]
pub fn offset_in_range(dx: i32, dy: i32) -> bool {
    dx.abs() <= MAX_RECORD_OFFSET && dy.abs() <= MAX_RECORD_OFFSET
}

// ---------------------------------------------------------------------------
// Stitch
// ---------------------------------------------------------------------------

/// Machine command carried by a stitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StitchKind {
    /// Needle penetration; draws thread from the previous position.
    Normal,
    /// Reposition without stitching.
    Jump,
    /// Stop and switch to the next thread in the color table.
    ColorChange,
    /// Cut the thread at the current position.
    Trim,
    /// End of sequence. Exactly one, always last.
    End,
}

impl StitchKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Normal => "stitch",
            Self::Jump => "jump",
            Self::ColorChange => "color-change",
            Self::Trim => "trim",
            Self::End => "end",
        }
    }
}

/// A single machine command at an absolute position (machine units, 0.1 mm,
/// y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stitch {
    pub x: i32,
    pub y: i32,
    pub kind: StitchKind,
}

impl Stitch {
    #[inline]
    pub const fn new(x: i32, y: i32, kind: StitchKind) -> Self {
        Self { x, y, kind }
    }

    #[inline]
    pub const fn normal(x: i32, y: i32) -> Self {
        Self::new(x, y, StitchKind::Normal)
    }

    #[inline]
    pub const fn jump(x: i32, y: i32) -> Self {
        Self::new(x, y, StitchKind::Jump)
    }

    #[inline]
    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    #[inline]
    pub fn is_normal(&self) -> bool {
        self.kind == StitchKind::Normal
    }
}

// ---------------------------------------------------------------------------
// Thread colors
// ---------------------------------------------------------------------------

/// Color identifier for one color block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ThreadColor {
    Rgb(u8, u8, u8),
    /// Free-form identifier. `#rrggbb` names map to RGB.
    Named(String),
}

impl ThreadColor {
    /// Placeholder identifier for the `index`th thread of a file that carries
    /// no color information.
    pub fn unnamed(index: usize) -> Self {
        Self::Named(format!("thread-{}", index + 1))
    }

    /// RGB value, when the identifier maps to one directly.
    pub fn to_rgb(&self) -> Option<[u8; 3]> {
        match self {
            Self::Rgb(r, g, b) => Some([*r, *g, *b]),
            Self::Named(name) => parse_hex_rgb(name),
        }
    }
}

impl std::fmt::Display for ThreadColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rgb(r, g, b) => write!(f, "#{r:02x}{g:02x}{b:02x}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

fn parse_hex_rgb(s: &str) -> Option<[u8; 3]> {
    let hex = s.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

/// Axis-aligned box in machine units (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl Bounds {
    fn point(x: i32, y: i32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn include(&mut self, x: i32, y: i32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> i32 {
        self.max_y - self.min_y
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Structural invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("{color_changes} color changes need {expected} colors, table has {colors}")]
    ColorCountMismatch {
        color_changes: usize,
        colors: usize,
        expected: usize,
    },
    #[error("pattern does not terminate with an end stitch")]
    MissingEnd,
    #[error("end stitch at index {index} is not the last stitch")]
    MisplacedEnd { index: usize },
    /// Trims and the end stitch sit where the previous stitch left the needle.
    #[error("{kind:?} stitch at index {index} moves the needle by ({dx}, {dy})")]
    DisplacedCommand {
        index: usize,
        kind: StitchKind,
        dx: i32,
        dy: i32,
    },
}

// ---------------------------------------------------------------------------
// Color blocks
// ---------------------------------------------------------------------------

/// Contiguous run of stitches sewn with one thread.
///
/// The range includes the terminating `ColorChange` stitch, if any, and never
/// includes the final `End`.
#[derive(Debug, Clone)]
pub struct ColorBlock<'a> {
    pub index: usize,
    pub range: Range<usize>,
    pub color: &'a ThreadColor,
    pub stitches: &'a [Stitch],
}

// ---------------------------------------------------------------------------
// Pattern
// ---------------------------------------------------------------------------

/// An ordered stitch sequence with its color table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// Design label (`LA:` header field in DST).
    pub label: String,
    pub stitches: Vec<Stitch>,
    /// One entry per color block.
    pub colors: Vec<ThreadColor>,
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new("")
    }
}

impl Pattern {
    /// An empty pattern: a single thread and a lone end stitch.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            stitches: vec![Stitch::new(0, 0, StitchKind::End)],
            colors: vec![ThreadColor::unnamed(0)],
        }
    }

    /// Number of stitches, including the end stitch.
    #[inline]
    pub fn len(&self) -> usize {
        self.stitches.len()
    }

    /// True when the pattern holds nothing but its end stitch.
    pub fn is_empty(&self) -> bool {
        self.stitches
            .iter()
            .all(|s| s.kind == StitchKind::End)
    }

    pub fn count_of(&self, kind: StitchKind) -> usize {
        self.stitches.iter().filter(|s| s.kind == kind).count()
    }

    pub fn color_changes(&self) -> usize {
        self.count_of(StitchKind::ColorChange)
    }

    /// Check the structural invariants.
    pub fn validate(&self) -> Result<(), PatternError> {
        match self.stitches.last() {
            Some(s) if s.kind == StitchKind::End => {}
            _ => return Err(PatternError::MissingEnd),
        }
        if let Some(index) = self.stitches[..self.stitches.len() - 1]
            .iter()
            .position(|s| s.kind == StitchKind::End)
        {
            return Err(PatternError::MisplacedEnd { index });
        }
        let displaced = self.offsets().enumerate().find(|&(_, (dx, dy, kind))| {
            matches!(kind, StitchKind::Trim | StitchKind::End) && (dx, dy) != (0, 0)
        });
        if let Some((index, (dx, dy, kind))) = displaced {
            return Err(PatternError::DisplacedCommand {
                index,
                kind,
                dx,
                dy,
            });
        }
        let color_changes = self.color_changes();
        if self.colors.len() != color_changes + 1 {
            return Err(PatternError::ColorCountMismatch {
                color_changes,
                colors: self.colors.len(),
                expected: color_changes + 1,
            });
        }
        Ok(())
    }

    /// Relative offsets, one per stitch, starting from the origin.
    pub fn offsets(&self) -> impl Iterator<Item = (i32, i32, StitchKind)> + '_ {
        let mut prev = (0, 0);
        self.stitches.iter().map(move |s| {
            let d = (s.x - prev.0, s.y - prev.1);
            prev = (s.x, s.y);
            (d.0, d.1, s.kind)
        })
    }

    /// True when every stitch offset fits in one record.
    pub fn offsets_in_range(&self) -> bool {
        self.offsets().all(|(dx, dy, _)| offset_in_range(dx, dy))
    }

    /// Bounding box of `Normal` stitch positions.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut it = self.stitches.iter().filter(|s| s.is_normal());
        let first = it.next()?;
        let mut b = Bounds::point(first.x, first.y);
        for s in it {
            b.include(s.x, s.y);
        }
        Some(b)
    }

    /// Box covering the origin and every stitch position (travel extents).
    pub fn extents(&self) -> Bounds {
        let mut b = Bounds::point(0, 0);
        for s in &self.stitches {
            b.include(s.x, s.y);
        }
        b
    }

    /// Final needle position.
    pub fn end_position(&self) -> (i32, i32) {
        self.stitches.last().map_or((0, 0), Stitch::position)
    }

    /// Iterate the color blocks in order.
    ///
    /// Yields `colors.len()` blocks for a valid pattern. Missing color-table
    /// entries fall back to the last available color.
    pub fn blocks(&self) -> Vec<ColorBlock<'_>> {
        let body_end = match self.stitches.last() {
            Some(s) if s.kind == StitchKind::End => self.stitches.len() - 1,
            _ => self.stitches.len(),
        };
        let mut blocks = Vec::with_capacity(self.colors.len());
        let mut start = 0usize;
        for (i, s) in self.stitches[..body_end].iter().enumerate() {
            if s.kind == StitchKind::ColorChange {
                blocks.push(self.block(blocks.len(), start..i + 1));
                start = i + 1;
            }
        }
        blocks.push(self.block(blocks.len(), start..body_end));
        blocks
    }

    fn block(&self, index: usize, range: Range<usize>) -> ColorBlock<'_> {
        let color = self
            .colors
            .get(index)
            .or_else(|| self.colors.last())
            .unwrap_or(&FALLBACK_COLOR);
        ColorBlock {
            index,
            stitches: &self.stitches[range.clone()],
            range,
            color,
        }
    }
}

static FALLBACK_COLOR: ThreadColor = ThreadColor::Rgb(0, 0, 0);

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Incremental construction with absolute or relative coordinates.
///
/// ```
/// use stitchopt::pattern::{PatternBuilder, ThreadColor};
///
/// let pattern = PatternBuilder::new("demo")
///     .stitch(0, 0)
///     .stitch(10, 0)
///     .color_change(ThreadColor::Rgb(200, 0, 0))
///     .stitch(10, 10)
///     .build();
/// assert_eq!(pattern.colors.len(), 2);
/// assert!(pattern.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct PatternBuilder {
    pattern: Pattern,
    pos: (i32, i32),
}

impl PatternBuilder {
    pub fn new(label: impl Into<String>) -> Self {
        let mut pattern = Pattern::new(label);
        pattern.stitches.clear();
        Self {
            pattern,
            pos: (0, 0),
        }
    }

    /// Replace the first block's color.
    pub fn first_color(mut self, color: ThreadColor) -> Self {
        self.pattern.colors[0] = color;
        self
    }

    fn push(mut self, x: i32, y: i32, kind: StitchKind) -> Self {
        self.pos = (x, y);
        self.pattern.stitches.push(Stitch::new(x, y, kind));
        self
    }

    pub fn stitch(self, x: i32, y: i32) -> Self {
        self.push(x, y, StitchKind::Normal)
    }

    pub fn jump(self, x: i32, y: i32) -> Self {
        self.push(x, y, StitchKind::Jump)
    }

    pub fn stitch_rel(self, dx: i32, dy: i32) -> Self {
        let (x, y) = self.pos;
        self.push(x + dx, y + dy, StitchKind::Normal)
    }

    pub fn jump_rel(self, dx: i32, dy: i32) -> Self {
        let (x, y) = self.pos;
        self.push(x + dx, y + dy, StitchKind::Jump)
    }

    pub fn trim(self) -> Self {
        let (x, y) = self.pos;
        self.push(x, y, StitchKind::Trim)
    }

    /// End the current block; following stitches use `color`.
    pub fn color_change(mut self, color: ThreadColor) -> Self {
        self.pattern.colors.push(color);
        let (x, y) = self.pos;
        self.push(x, y, StitchKind::ColorChange)
    }

    pub fn build(self) -> Pattern {
        let (x, y) = self.pos;
        self.push(x, y, StitchKind::End).pattern
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
