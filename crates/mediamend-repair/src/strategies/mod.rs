//! Repair strategy executors, one module per strategy tier.
//!
//! Strategies are a closed enum dispatched by `match`; the engine tries them
//! in planner order and the first candidate that verifies wins.

mod extract;
mod fallback;
mod gop;
mod quick;
mod rebuild;
mod segments;

use crate::{RepairOptions, RepairWorkspace, Result, ToolPaths};
use mediamend_analysis::{FileAnalysis, MediaFile, StrategyKind};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

/// Everything a strategy needs to produce a candidate file.
pub struct StrategyContext<'a> {
    /// The damaged input file.
    pub media: &'a MediaFile,
    /// Analysis findings for the input.
    pub analysis: &'a FileAnalysis,
    /// Scratch space; all candidates are written here.
    pub workspace: &'a RepairWorkspace,
    /// Resolved external tool paths.
    pub tools: &'a ToolPaths,
    /// Repair tunables.
    pub options: &'a RepairOptions,
}

/// Execute one strategy, returning the candidate path it produced.
///
/// # Errors
///
/// [`crate::Error::StrategyFailed`] when the strategy cannot apply to this
/// input or produced nothing; tool errors pass through. Either way the
/// engine records a failed attempt and moves on.
pub async fn execute(kind: StrategyKind, ctx: &StrategyContext<'_>) -> Result<PathBuf> {
    match kind {
        StrategyKind::QuickRemux => quick::run(ctx).await,
        StrategyKind::RebuildContainer => rebuild::run(ctx).await,
        StrategyKind::ExtractStreams => extract::run(ctx).await,
        StrategyKind::RebuildGop => gop::run(ctx).await,
        StrategyKind::SegmentSalvage => segments::run(ctx).await,
        StrategyKind::FallbackChain => fallback::run(ctx).await,
    }
}

/// Copy `len` bytes at `offset` from `src` into `dst`.
pub(crate) fn copy_range<W: Write>(
    src: &mut File,
    dst: &mut W,
    offset: u64,
    len: u64,
) -> std::io::Result<u64> {
    src.seek(SeekFrom::Start(offset))?;
    let mut taken = src.take(len);
    std::io::copy(&mut taken, dst)
}

/// Read `len` bytes at `offset`, or `None` when the range runs past EOF.
pub(crate) fn read_range(src: &mut File, offset: u64, len: u64) -> Option<Vec<u8>> {
    src.seek(SeekFrom::Start(offset)).ok()?;
    let mut buf = vec![0u8; len as usize];
    src.read_exact(&mut buf).ok()?;
    Some(buf)
}
