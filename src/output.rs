//! Rendering of sweep reports and pyramid plans.
//!
//! # JSON schema of a sweep
//!
//! ```json
//! {
//!   "reports": [
//!     { "kind": "coordinate-transform", "root": "/data/p/trakem2.ct",
//!       "keepers": 120, "kept": 118, "scheduled": 7, "deleted": 7, "failed": 0,
//!       "walk_errors": 0, "bytes_freed": 40960, "drained": true,
//!       "started_at": "...", "finished_at": "..." }
//!   ],
//!   "summary": {
//!     "deleted": 7, "failed": 0, "bytes_freed": 40960,
//!     "exit_code": 0, "exit_code_name": "MC000"
//!   }
//! }
//! ```

use std::io::{self, Write};

use bytesize::ByteSize;
use serde::Serialize;

use crate::cache::{level_size_bytes, max_level};
use crate::error::ExitCode;
use crate::stale::SweepReport;

/// Totals over all sweeps of a run.
#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub deleted: usize,
    pub failed: usize,
    pub bytes_freed: u64,
    pub exit_code: i32,
    pub exit_code_name: String,
}

/// Complete JSON output of a `sweep` run.
#[derive(Debug, Clone, Serialize)]
pub struct SweepOutput<'a> {
    pub reports: &'a [SweepReport],
    pub summary: SweepSummary,
}

impl<'a> SweepOutput<'a> {
    #[must_use]
    pub fn new(reports: &'a [SweepReport]) -> Self {
        let exit_code = exit_code_for(reports);
        Self {
            reports,
            summary: SweepSummary {
                deleted: reports.iter().map(|r| r.deleted).sum(),
                failed: reports.iter().map(|r| r.failed).sum(),
                bytes_freed: reports.iter().map(|r| r.bytes_freed).sum(),
                exit_code: exit_code.as_i32(),
                exit_code_name: exit_code.code_prefix().to_string(),
            },
        }
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the JSON document followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *writer, self)?;
        writeln!(writer)
    }
}

/// Exit code for a set of sweeps: interrupted if any sweep was cut short,
/// otherwise partial success if any removal failed.
#[must_use]
pub fn exit_code_for(reports: &[SweepReport]) -> ExitCode {
    if reports.iter().any(|r| r.interrupted) {
        ExitCode::Interrupted
    } else if reports.iter().all(SweepReport::succeeded) {
        ExitCode::Success
    } else {
        ExitCode::PartialSuccess
    }
}

/// One line per sweep.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_sweep_text<W: Write>(reports: &[SweepReport], writer: &mut W) -> io::Result<()> {
    for report in reports {
        match &report.root {
            Some(root) => writeln!(writer, "{} ({})", report.summary(), root.display())?,
            None => writeln!(writer, "{}: no folder configured", report.kind)?,
        }
    }
    Ok(())
}

/// One level of a mipmap pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelPlan {
    pub level: u32,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
}

/// Every level of the pyramid of a `width` x `height` RGBA image.
#[must_use]
pub fn pyramid_plan(width: u32, height: u32) -> Vec<LevelPlan> {
    let top = max_level(f64::from(width.max(height)));
    (0..=top)
        .map(|level| LevelPlan {
            level,
            width: (width >> level).max(1),
            height: (height >> level).max(1),
            bytes: level_size_bytes(width, height, level),
        })
        .collect()
}

/// Table of pyramid levels, marking `selected`, and how many full
/// pyramids fit in `budget`.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_levels_text<W: Write>(
    plan: &[LevelPlan],
    selected: Option<u32>,
    budget: u64,
    writer: &mut W,
) -> io::Result<()> {
    writeln!(writer, "level  {:>11}  {:>10}", "size", "bytes")?;
    for entry in plan {
        let marker = if Some(entry.level) == selected { '*' } else { ' ' };
        writeln!(
            writer,
            "{}{:>4}  {:>11}  {:>10}",
            marker,
            entry.level,
            format!("{}x{}", entry.width, entry.height),
            ByteSize(entry.bytes).to_string()
        )?;
    }

    let pyramid: u64 = plan.iter().map(|e| e.bytes).sum();
    writeln!(
        writer,
        "pyramid {} / budget {}: {} fit",
        ByteSize(pyramid),
        ByteSize(budget),
        budget.checked_div(pyramid).unwrap_or(0)
    )
}
