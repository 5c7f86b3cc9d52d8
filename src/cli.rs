//! Command-line interface definitions.
//!
//! ```bash
//! # Remove stale transforms and masks of a project
//! mipcache sweep project.json
//!
//! # Only masks, with 4 workers, report as JSON
//! mipcache sweep project.json --kind masks --workers 4 --json
//!
//! # Mipmap pyramid of a 4096x3072 tile viewed at 30%
//! mipcache levels --width 4096 --height 3072 --magnification 0.3
//!
//! # Effective configuration
//! mipcache config
//! ```

use std::path::PathBuf;

use bytesize::ByteSize;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::stale::KindSelector;

/// Image tile cache planning and stale derived file cleanup.
#[derive(Debug, Parser)]
#[command(name = "mipcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (default: platform config dir)
    #[arg(long, global = true, value_name = "PATH", env = "MIPCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Delete derived files no live patch references
    Sweep(SweepArgs),
    /// Show the mipmap pyramid of an image and its cache footprint
    Levels(LevelsArgs),
    /// Print the effective configuration as TOML
    Config,
}

/// Arguments for the sweep subcommand.
#[derive(Debug, Args)]
pub struct SweepArgs {
    /// Project manifest (JSON) listing live patches and cache folders
    #[arg(value_name = "MANIFEST")]
    pub manifest: PathBuf,

    /// Which derived files to sweep
    #[arg(short, long, value_enum, default_value = "all")]
    pub kind: KindArg,

    /// Number of removal workers (default: available parallelism, at least 2)
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Seconds to wait for pending removals
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub drain_timeout: Option<u64>,

    /// Print the sweep reports as JSON
    #[arg(long)]
    pub json: bool,
}

/// Kinds of derived files selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Coordinate transforms (.ct)
    Transforms,
    /// Alpha masks (.zip)
    Masks,
    /// Both
    All,
}

impl KindArg {
    #[must_use]
    pub fn selectors(self) -> &'static [KindSelector] {
        match self {
            Self::Transforms => &[KindSelector::CoordinateTransforms],
            Self::Masks => &[KindSelector::AlphaMasks],
            Self::All => &[KindSelector::CoordinateTransforms, KindSelector::AlphaMasks],
        }
    }
}

/// Arguments for the levels subcommand.
#[derive(Debug, Args)]
pub struct LevelsArgs {
    /// Image width in pixels
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,

    /// Image height in pixels
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,

    /// Display magnification used to pick a level
    #[arg(short, long, default_value = "1.0")]
    pub magnification: f64,

    /// Cache budget (e.g. 512MiB, 2GB); overrides cache.max_bytes
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_bytes: Option<u64>,
}

/// Parse a human-readable size such as `1.5GiB` into bytes.
///
/// # Errors
///
/// Returns a message if the size isn't understood.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }
    s.parse::<ByteSize>()
        .map(|b| b.as_u64())
        .map_err(|e| format!("Invalid size '{s}': {e}"))
}
