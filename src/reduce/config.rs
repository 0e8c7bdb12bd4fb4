// Reduction profiles.
//
// Distances are absolute machine units (0.1 mm). Levels mirror the CLI's
// `--level` flag; explicit `--tolerance` / `--min-stitch-length` override
// the profile.

/// Default collinearity tolerance: one machine unit (0.1 mm), the finest
/// step a DST record can express.
pub const DEFAULT_TOLERANCE: f64 = 1.0;

/// Minimum stitch length of the short-stitch filter at level 3 (1.5 mm).
pub const LEGACY_MIN_STITCH_LENGTH: f64 = 15.0;

/// Highest accepted level.
pub const MAX_LEVEL: u32 = 3;

/// Tuning for `reduce`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReductionConfig {
    /// Name for display purposes.
    pub name: &'static str,
    /// Maximum perpendicular distance a dropped point may sit from the
    /// segment that replaces it.
    pub tolerance: f64,
    /// Drop stitches shorter than this (last stitch of a run excepted).
    /// `None` disables the filter.
    pub min_stitch_length: Option<f64>,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        DEFAULT
    }
}

impl ReductionConfig {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance.max(0.0);
        self
    }

    pub fn with_min_stitch_length(mut self, min: Option<f64>) -> Self {
        self.min_stitch_length = min.filter(|m| *m > 0.0);
        self
    }
}

/// Profile for a reduction level.
///
/// - Level 0: exact (only points lying on the replacement segment)
/// - Level 1: default
/// - Level 2: smooth
/// - Level 3: aggressive, adds the legacy short-stitch filter
pub fn config_for_level(level: u32) -> ReductionConfig {
    match level {
        0 => EXACT,
        1 => DEFAULT,
        2 => SMOOTH,
        _ => AGGRESSIVE,
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

pub const EXACT: ReductionConfig = ReductionConfig {
    name: "exact",
    tolerance: 0.0,
    min_stitch_length: None,
};

pub const DEFAULT: ReductionConfig = ReductionConfig {
    name: "default",
    tolerance: DEFAULT_TOLERANCE,
    min_stitch_length: None,
};

pub const SMOOTH: ReductionConfig = ReductionConfig {
    name: "smooth",
    tolerance: 2.0,
    min_stitch_length: None,
};

pub const AGGRESSIVE: ReductionConfig = ReductionConfig {
    name: "aggressive",
    tolerance: 3.0,
    min_stitch_length: Some(LEGACY_MIN_STITCH_LENGTH),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_to_profiles() {
        assert_eq!(config_for_level(0).name, "exact");
        assert_eq!(config_for_level(1), ReductionConfig::default());
        assert_eq!(config_for_level(2).name, "smooth");
        assert_eq!(config_for_level(9).name, "aggressive");
    }

    #[test]
    fn overrides_are_sanitized() {
        let c = ReductionConfig::default()
            .with_tolerance(-4.0)
            .with_min_stitch_length(Some(0.0));
        assert_eq!(c.tolerance, 0.0);
        assert_eq!(c.min_stitch_length, None);
    }
}
