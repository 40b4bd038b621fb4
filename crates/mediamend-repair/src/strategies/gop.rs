//! GOP-aware stream reconstruction.
//!
//! Units are grouped into GOPs anchored on keyframes. A group is only
//! emitted when it has a valid anchor; a partial group without one is
//! dropped wholesale, since missing frames beat undecodable output.
//! Parameter sets always pass through, independent of group membership.

use super::{read_range, StrategyContext};
use crate::{Error, Result, ToolCommand};
use mediamend_analysis::{StreamCodec, StreamUnit};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// One keyframe-anchored group, as indices into the unit list.
#[derive(Debug)]
pub(crate) struct Gop {
    pub members: Vec<usize>,
}

pub async fn run(ctx: &StrategyContext<'_>) -> Result<PathBuf> {
    let codec = ctx
        .analysis
        .stream_codec
        .ok_or_else(|| Error::StrategyFailed("no elementary-stream codec detected".into()))?;
    let units = &ctx.analysis.units;

    let (param_sets, gops) = group_units(units, codec);
    if gops.is_empty() {
        return Err(Error::StrategyFailed(
            "no keyframe-anchored groups to rebuild from".into(),
        ));
    }

    tracing::debug!(
        gops = gops.len(),
        param_sets = param_sets.len(),
        "rebuilding stream from anchored groups"
    );

    let raw = ctx
        .workspace
        .candidate(&format!("gop.{}", codec.raw_extension()));
    let mut src = ctx.media.reader().map_err(Error::Analysis)?;
    let mut out = BufWriter::new(std::fs::File::create(&raw)?);

    let emit = |indices: &[usize],
                src: &mut std::fs::File,
                out: &mut BufWriter<std::fs::File>|
     -> Result<usize> {
        let mut written = 0;
        for &i in indices {
            let unit = &units[i];
            if let Some(bytes) = read_range(src, unit.offset, unit.size) {
                out.write_all(&bytes)?;
                written += 1;
            }
        }
        Ok(written)
    };

    let mut written = emit(&param_sets, &mut src, &mut out)?;
    for gop in &gops {
        written += emit(&gop.members, &mut src, &mut out)?;
    }
    out.flush()?;

    if written == 0 {
        return Err(Error::StrategyFailed("no units survived the rebuild".into()));
    }

    let out_path = ctx.workspace.candidate("gop.mp4");
    let args = super::extract::remux_args(&raw, None, &out_path);
    ToolCommand::new(&ctx.tools.ffmpeg)
        .args(args)
        .timeout(ctx.options.tool_timeout())
        .execute()
        .await?;

    Ok(out_path)
}

/// Split the unit list into parameter sets and keyframe-anchored groups.
///
/// Units before the first keyframe (other than parameter sets) belong to no
/// anchored group and are discarded.
pub(crate) fn group_units(units: &[StreamUnit], codec: StreamCodec) -> (Vec<usize>, Vec<Gop>) {
    let mut param_sets = Vec::new();
    let mut gops: Vec<Gop> = Vec::new();
    let mut current: Option<Gop> = None;

    for (i, unit) in units.iter().enumerate() {
        if unit.is_parameter_set(codec) {
            param_sets.push(i);
            continue;
        }
        if unit.is_keyframe(codec) {
            if let Some(done) = current.take() {
                gops.push(done);
            }
            current = Some(Gop { members: vec![i] });
            continue;
        }
        if let Some(gop) = current.as_mut() {
            gop.members.push(i);
        }
        // No open group: unit precedes the first anchor, drop it.
    }
    if let Some(done) = current.take() {
        gops.push(done);
    }

    (param_sets, gops)
}
