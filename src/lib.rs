//! Stitchopt: stitch-count reduction for Tajima DST embroidery files.
//!
//! The crate provides:
//! - A pure-Rust DST codec (`dst`) over an in-memory model (`pattern`)
//! - Geometric stitch reduction (`reduce`)
//! - PNG previews (`render`)
//! - An in-memory pipeline (`engine`) and file-oriented entry points (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use stitchopt::dst;
//! use stitchopt::pattern::PatternBuilder;
//! use stitchopt::reduce::{self, ReductionConfig};
//!
//! let pattern = PatternBuilder::new("line")
//!     .stitch(0, 0)
//!     .stitch(10, 0)
//!     .stitch(20, 0)
//!     .build();
//!
//! let (reduced, stats) = reduce::reduce(&pattern, &ReductionConfig::default());
//! assert_eq!(stats.new_count, stats.original_count - 1);
//!
//! let bytes = dst::encode(&reduced).unwrap();
//! assert_eq!(dst::decode(&bytes).unwrap(), reduced);
//! ```

pub mod dst;
pub mod engine;
pub mod io;
pub mod pattern;
pub mod reduce;
pub mod render;

#[cfg(feature = "cli")]
pub mod cli;
