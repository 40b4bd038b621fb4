//! Stream extraction: pull raw elementary streams out of the wreckage and
//! remux them into a fresh container.
//!
//! Decoders need parameter sets before any coded picture, so the first SPS
//! and PPS are emitted ahead of everything else regardless of where they sat
//! in the file. Units that fail to read (truncated at EOF) are skipped, not
//! fatal.

use super::{read_range, StrategyContext};
use crate::{Error, Result, ToolCommand};
use mediamend_analysis::{AudioCodec, StreamCodec, StreamUnit};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub async fn run(ctx: &StrategyContext<'_>) -> Result<PathBuf> {
    let codec = ctx
        .analysis
        .stream_codec
        .ok_or_else(|| Error::StrategyFailed("no elementary-stream codec detected".into()))?;

    let video = extract_video(ctx, codec)?;
    let audio = extract_audio(ctx);

    let out = ctx.workspace.candidate("extracted.mp4");
    let mut args = remux_args(&video, audio.as_deref(), &out);
    match remux(ctx, args).await {
        Ok(()) => return Ok(out),
        Err(e) if audio.is_some() => {
            // A broken audio stream should not sink the video; retry without.
            tracing::debug!("remux with audio failed, retrying video only: {e}");
            ctx.workspace.discard(&out);
            args = remux_args(&video, None, &out);
            remux(ctx, args).await?;
            Ok(out)
        }
        Err(e) => Err(e),
    }
}

/// Write the raw video bitstream: first SPS, first PPS, then every other
/// readable unit in original offset order.
fn extract_video(ctx: &StrategyContext<'_>, codec: StreamCodec) -> Result<PathBuf> {
    let units = &ctx.analysis.units;
    let plan = plan_video_units(units, codec);
    if plan.is_empty() {
        return Err(Error::StrategyFailed("no stream units to extract".into()));
    }

    let path = ctx
        .workspace
        .candidate(&format!("video.{}", codec.raw_extension()));
    let mut src = ctx.media.reader().map_err(Error::Analysis)?;
    let mut out = BufWriter::new(std::fs::File::create(&path)?);

    let mut written = 0usize;
    for idx in plan {
        let unit = &units[idx];
        match read_range(&mut src, unit.offset, unit.size) {
            Some(bytes) => {
                out.write_all(&bytes)?;
                written += 1;
            }
            None => {
                tracing::debug!(offset = unit.offset, "skipping unreadable unit");
            }
        }
    }
    out.flush()?;

    if written == 0 {
        return Err(Error::StrategyFailed("every stream unit failed to read".into()));
    }
    tracing::debug!(units = written, "raw video stream extracted");
    Ok(path)
}

/// Emission order: first SPS, first PPS, then all remaining units as found.
pub(crate) fn plan_video_units(units: &[StreamUnit], codec: StreamCodec) -> Vec<usize> {
    let first_sps = units.iter().position(|u| u.is_sps(codec));
    let first_pps = units.iter().position(|u| u.is_pps(codec));

    let mut plan = Vec::with_capacity(units.len());
    plan.extend(first_sps);
    plan.extend(first_pps);
    for (i, _) in units.iter().enumerate() {
        if Some(i) != first_sps && Some(i) != first_pps {
            plan.push(i);
        }
    }
    plan
}

/// Copy the raw audio bitstream from its first sync word to end of file.
/// Best-effort: any failure just means the remux goes video-only.
fn extract_audio(ctx: &StrategyContext<'_>) -> Option<PathBuf> {
    let codec = ctx.analysis.scan.audio_codec?;
    let offset = ctx.analysis.scan.first_audio_offset()?;
    let ext = match codec {
        AudioCodec::Aac => "aac",
        AudioCodec::Mp3 => "mp3",
    };

    let path = ctx.workspace.candidate(&format!("audio.{ext}"));
    let mut src = ctx.media.reader().ok()?;
    let mut out = BufWriter::new(std::fs::File::create(&path).ok()?);
    super::copy_range(&mut src, &mut out, offset, ctx.media.len - offset).ok()?;
    out.flush().ok()?;
    Some(path)
}

async fn remux(ctx: &StrategyContext<'_>, args: Vec<String>) -> Result<()> {
    ToolCommand::new(&ctx.tools.ffmpeg)
        .args(args)
        .timeout(ctx.options.tool_timeout())
        .execute()
        .await?;
    Ok(())
}

pub(crate) fn remux_args(video: &Path, audio: Option<&Path>, output: &Path) -> Vec<String> {
    let mut args = vec![
        "-y".into(),
        "-fflags".into(),
        "+genpts".into(),
        "-i".into(),
        video.to_string_lossy().into_owned(),
    ];
    if let Some(audio) = audio {
        args.push("-i".into());
        args.push(audio.to_string_lossy().into_owned());
    }
    args.extend(["-c".into(), "copy".into()]);
    args.push(output.to_string_lossy().into_owned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(offset: u64, unit_type: u8) -> StreamUnit {
        StreamUnit {
            offset,
            start_code_len: 4,
            unit_type,
            size: 16,
        }
    }

    #[test]
    fn parameter_sets_are_emitted_first() {
        // IDR before the parameter sets, as a damaged capture might order it.
        let units = vec![unit(0, 5), unit(16, 1), unit(32, 7), unit(48, 8), unit(64, 1)];
        let plan = plan_video_units(&units, StreamCodec::H264);
        assert_eq!(plan, vec![2, 3, 0, 1, 4]);
    }

    #[test]
    fn plan_without_parameter_sets_keeps_file_order() {
        let units = vec![unit(0, 5), unit(16, 1), unit(32, 1)];
        let plan = plan_video_units(&units, StreamCodec::H264);
        assert_eq!(plan, vec![0, 1, 2]);
    }

    #[test]
    fn remux_args_include_audio_only_when_present() {
        let with = remux_args(
            Path::new("v.h264"),
            Some(Path::new("a.aac")),
            Path::new("out.mp4"),
        );
        assert_eq!(with.iter().filter(|a| *a == "-i").count(), 2);

        let without = remux_args(Path::new("v.h264"), None, Path::new("out.mp4"));
        assert_eq!(without.iter().filter(|a| *a == "-i").count(), 1);
        assert!(without.windows(2).any(|w| w == ["-c", "copy"]));
    }
}
