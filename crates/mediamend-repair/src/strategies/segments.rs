//! Deep recovery: cut the valid byte ranges into independent segments and
//! concatenate whichever ones the external tool can still demux.

use super::{copy_range, StrategyContext};
use crate::{probe, Error, Result, ToolCommand};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub async fn run(ctx: &StrategyContext<'_>) -> Result<PathBuf> {
    let regions = &ctx.analysis.valid_regions;
    if regions.is_empty() {
        return Err(Error::StrategyFailed("no valid byte ranges to salvage".into()));
    }

    let mut survivors: Vec<PathBuf> = Vec::new();
    let mut src = ctx.media.reader().map_err(Error::Analysis)?;

    for (i, region) in regions.iter().enumerate() {
        let raw = ctx.workspace.candidate(&format!("part{i:03}.bin"));
        {
            let mut out = BufWriter::new(std::fs::File::create(&raw)?);
            copy_range(&mut src, &mut out, region.start, region.size())?;
            out.flush()?;
        }

        // A salvaged range only survives if it demuxes on its own.
        let part = ctx.workspace.candidate(&format!("part{i:03}.mp4"));
        match rescue_segment(ctx, &raw, &part).await {
            Ok(()) => survivors.push(part),
            Err(e) => {
                tracing::debug!(segment = i, "segment rejected: {e}");
                ctx.workspace.discard(&part);
            }
        }
        ctx.workspace.discard(&raw);
    }

    if survivors.is_empty() {
        return Err(Error::StrategyFailed("no salvaged segment was demuxable".into()));
    }

    tracing::debug!(
        segments = survivors.len(),
        total = regions.len(),
        "concatenating surviving segments"
    );

    let out = ctx.workspace.candidate("salvaged.mp4");
    concat_segments(ctx, &survivors, &out).await?;
    Ok(out)
}

async fn rescue_segment(ctx: &StrategyContext<'_>, raw: &Path, part: &Path) -> Result<()> {
    ToolCommand::new(&ctx.tools.ffmpeg)
        .args(segment_remux_args(raw, part))
        .timeout(ctx.options.tool_timeout())
        .execute()
        .await?;

    // The remux may "succeed" on garbage; demand a nonzero duration.
    let report = probe::probe_file(&ctx.tools.ffprobe, part, ctx.options.probe_timeout()).await?;
    if report.duration_secs() <= 0.0 {
        return Err(Error::StrategyFailed("segment has no duration".into()));
    }
    Ok(())
}

pub(crate) fn segment_remux_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-err_detect".into(),
        "ignore_err".into(),
        "-fflags".into(),
        "+genpts".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-c".into(),
        "copy".into(),
        output.to_string_lossy().into_owned(),
    ]
}

async fn concat_segments(
    ctx: &StrategyContext<'_>,
    segments: &[PathBuf],
    output: &Path,
) -> Result<()> {
    let list = ctx.workspace.candidate("concat.txt");
    let mut file = std::fs::File::create(&list)?;
    write!(file, "{}", concat_list(segments))?;

    ToolCommand::new(&ctx.tools.ffmpeg)
        .args(concat_args(&list, output))
        .timeout(ctx.options.tool_timeout())
        .execute()
        .await?;
    Ok(())
}

/// Build an ffconcat list; single quotes inside paths are escaped the way
/// the concat demuxer expects.
pub(crate) fn concat_list(segments: &[PathBuf]) -> String {
    let mut out = String::new();
    for path in segments {
        let escaped = path.to_string_lossy().replace('\'', "'\\''");
        out.push_str(&format!("file '{escaped}'\n"));
    }
    out
}

pub(crate) fn concat_args(list: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        list.to_string_lossy().into_owned(),
        "-c".into(),
        "copy".into(),
        output.to_string_lossy().into_owned(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_list_has_one_entry_per_segment() {
        let list = concat_list(&[PathBuf::from("/tmp/a.mp4"), PathBuf::from("/tmp/b.mp4")]);
        assert_eq!(list, "file '/tmp/a.mp4'\nfile '/tmp/b.mp4'\n");
    }

    #[test]
    fn concat_list_escapes_quotes() {
        let list = concat_list(&[PathBuf::from("/tmp/it's.mp4")]);
        assert!(list.contains("it'\\''s.mp4"));
    }

    #[test]
    fn concat_args_use_concat_demuxer_without_reencode() {
        let args = concat_args(Path::new("list.txt"), Path::new("out.mp4"));
        assert!(args.windows(2).any(|w| w == ["-f", "concat"]));
        assert!(args.windows(2).any(|w| w == ["-safe", "0"]));
        assert!(args.windows(2).any(|w| w == ["-c", "copy"]));
    }
}
