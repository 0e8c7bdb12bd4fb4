// Stitch reduction: drop stitches that add no visible thread.
//
// One left-to-right pass per color block, never looking across a block
// boundary:
//   - zero-length repeats of a `Normal` stitch are dropped
//   - a `Normal` stitch lying within tolerance of the segment joining its
//     neighbours is dropped, provided every point already folded into that
//     segment stays within tolerance too
//   - a jump replaces the earlier jumps of its run when it can be reached
//     in one record from where that run started
//   - optionally, short stitches are dropped (off by default)
// Color changes, trims and the end stitch always pass through in order.

pub mod config;
mod geometry;

use crate::pattern::{Pattern, Stitch, StitchKind, offset_in_range};

pub use config::{ReductionConfig, config_for_level};
pub use geometry::segment_distance;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counts returned by `reduce`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReductionStats {
    /// Stitches in the input, end stitch included.
    pub original_count: usize,
    /// Stitches in the output, end stitch included.
    pub new_count: usize,
    pub duplicates_removed: usize,
    pub collinear_removed: usize,
    pub jumps_merged: usize,
    pub short_removed: usize,
}

impl ReductionStats {
    fn unchanged(count: usize) -> Self {
        Self {
            original_count: count,
            new_count: count,
            ..Default::default()
        }
    }

    pub fn removed(&self) -> usize {
        self.original_count - self.new_count
    }
}

// ---------------------------------------------------------------------------
// Reduce
// ---------------------------------------------------------------------------

/// Reduce `pattern`, returning the reduced copy and its stats.
///
/// Deterministic. Returns the input unchanged for an empty pattern and for a
/// single-block pattern with fewer than three stitches.
pub fn reduce(pattern: &Pattern, config: &ReductionConfig) -> (Pattern, ReductionStats) {
    let body = pattern
        .stitches
        .iter()
        .filter(|s| s.kind != StitchKind::End)
        .count();
    if pattern.is_empty() || (pattern.color_changes() == 0 && body < 3) {
        return (pattern.clone(), ReductionStats::unchanged(pattern.len()));
    }

    let mut pass = Pass::new(config, pattern.len());
    for block in pattern.blocks() {
        pass.begin_block();
        for (i, stitch) in block.stitches.iter().enumerate() {
            pass.feed(*stitch, block.stitches.get(i + 1));
        }
    }
    let end = pattern.stitches.last().copied().unwrap_or_else(|| {
        let (x, y) = pass.position();
        Stitch::new(x, y, StitchKind::End)
    });
    pass.out.push(end);

    let mut stats = pass.stats;
    stats.original_count = pattern.len();
    stats.new_count = pass.out.len();
    log::debug!(
        "reduce[{}]: {} -> {} (dup {}, collinear {}, jumps {}, short {})",
        config.name,
        stats.original_count,
        stats.new_count,
        stats.duplicates_removed,
        stats.collinear_removed,
        stats.jumps_merged,
        stats.short_removed
    );

    let reduced = Pattern {
        label: pattern.label.clone(),
        stitches: pass.out,
        colors: pattern.colors.clone(),
    };
    (reduced, stats)
}

// ---------------------------------------------------------------------------
// Single pass state
// ---------------------------------------------------------------------------

/// Jumps at the head of a run that a later jump of the run may replace.
const JUMP_MERGE_WINDOW: usize = 32;

struct Pass<'c> {
    config: &'c ReductionConfig,
    out: Vec<Stitch>,
    /// Index in `out` where the current block starts.
    block_start: usize,
    /// Points folded into the segment ending at the last kept stitch.
    covered: Vec<(i32, i32)>,
    /// Index in `out` of the first jump of the trailing jump run.
    jump_run: usize,
    stats: ReductionStats,
}

impl<'c> Pass<'c> {
    fn new(config: &'c ReductionConfig, capacity: usize) -> Self {
        Self {
            config,
            out: Vec::with_capacity(capacity),
            block_start: 0,
            covered: Vec::new(),
            jump_run: 0,
            stats: ReductionStats::default(),
        }
    }

    fn begin_block(&mut self) {
        self.block_start = self.out.len();
        self.covered.clear();
    }

    fn position(&self) -> (i32, i32) {
        self.out.last().map_or((0, 0), Stitch::position)
    }

    /// The `n`th most recent output stitch of the current block (0 = last).
    fn recent(&self, n: usize) -> Option<&Stitch> {
        let len = self.out.len();
        if len >= self.block_start + n + 1 {
            self.out.get(len - 1 - n)
        } else {
            None
        }
    }

    /// Needle position before `out[index]` (any block, origin first).
    fn position_before(&self, index: usize) -> (i32, i32) {
        index
            .checked_sub(1)
            .and_then(|i| self.out.get(i))
            .map_or((0, 0), Stitch::position)
    }

    fn feed(&mut self, stitch: Stitch, next: Option<&Stitch>) {
        match stitch.kind {
            StitchKind::Normal => self.feed_normal(stitch, next),
            StitchKind::Jump => self.feed_jump(stitch),
            StitchKind::ColorChange | StitchKind::Trim | StitchKind::End => {
                self.covered.clear();
                self.out.push(stitch);
            }
        }
    }

    fn feed_normal(&mut self, c: Stitch, next: Option<&Stitch>) {
        let last = self.recent(0).copied();

        if let Some(b) = last.filter(Stitch::is_normal) {
            if b.position() == c.position() {
                self.stats.duplicates_removed += 1;
                return;
            }
            if self.is_short(b, c, next) {
                self.stats.short_removed += 1;
                return;
            }
        }

        if let (Some(a), Some(b)) = (self.recent(1).copied(), last) {
            if a.is_normal() && b.is_normal() && self.can_fold(a, b, c) {
                self.out.pop();
                self.covered.push(b.position());
                self.stats.collinear_removed += 1;
                self.out.push(c);
                return;
            }
        }

        self.covered.clear();
        self.out.push(c);
    }

    /// Drop `c` (short) only if a following stitch of the same run takes
    /// over and can still reach from `b` in one record.
    fn is_short(&self, b: Stitch, c: Stitch, next: Option<&Stitch>) -> bool {
        let Some(min) = self.config.min_stitch_length else {
            return false;
        };
        let Some(next) = next.filter(|n| n.is_normal()) else {
            return false;
        };
        geometry::distance(b.position(), c.position()) < min
            && offset_in_range(next.x - b.x, next.y - b.y)
    }

    /// Can `b` be removed so that `a` connects straight to `c`?
    fn can_fold(&self, a: Stitch, b: Stitch, c: Stitch) -> bool {
        let tol = self.config.tolerance;
        let (pa, pc) = (a.position(), c.position());
        offset_in_range(c.x - a.x, c.y - a.y)
            && segment_distance(b.position(), pa, pc) <= tol
            && self
                .covered
                .iter()
                .all(|&p| segment_distance(p, pa, pc) <= tol)
    }

    /// Replace the earliest jump of the current run (and everything after
    /// it) that `j` can reach in one record from. Each kept jump is out of
    /// reach from the start of every earlier candidate, so a second pass
    /// keeps the run as is.
    fn feed_jump(&mut self, j: Stitch) {
        self.covered.clear();
        let len = self.out.len();
        if !self.recent(0).is_some_and(|s| s.kind == StitchKind::Jump) {
            self.jump_run = len;
        }
        let mut candidates = self.jump_run..len.min(self.jump_run + JUMP_MERGE_WINDOW);
        let target = candidates.find(|&m| {
            let (ox, oy) = self.position_before(m);
            offset_in_range(j.x - ox, j.y - oy)
        });
        if let Some(m) = target {
            self.stats.jumps_merged += len - m;
            self.out.truncate(m);
        }
        self.out.push(j);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
