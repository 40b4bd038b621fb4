//! Aggressive fallback chain: three escalating external-tool passes, each
//! accepted as soon as one produces an output with a nonzero duration.
//!
//! 1. Error-tolerant remux (corrupt packets discarded)
//! 2. Fixed-interval segmentation, then concatenation of what came out
//! 3. Conservative full re-encode

use super::StrategyContext;
use crate::strategies::segments::{concat_args, concat_list};
use crate::{probe, Error, Result, ToolCommand};
use std::io::Write;
use std::path::{Path, PathBuf};

pub async fn run(ctx: &StrategyContext<'_>) -> Result<PathBuf> {
    let lenient = ctx.workspace.candidate("fallback-remux.mp4");
    if attempt(ctx, lenient_remux_args(&ctx.media.path, &lenient), &lenient).await {
        return Ok(lenient);
    }
    ctx.workspace.discard(&lenient);

    if let Some(out) = segmented_attempt(ctx).await {
        return Ok(out);
    }

    let reencoded = ctx.workspace.candidate("fallback-reencode.mp4");
    let args = reencode_args(
        &ctx.media.path,
        &reencoded,
        ctx.options.reencode_crf,
        &ctx.options.reencode_preset,
    );
    if attempt(ctx, args, &reencoded).await {
        return Ok(reencoded);
    }
    ctx.workspace.discard(&reencoded);

    Err(Error::StrategyFailed("all fallback attempts failed".into()))
}

/// Run one invocation and accept its output only with a nonzero duration.
async fn attempt(ctx: &StrategyContext<'_>, args: Vec<String>, output: &Path) -> bool {
    let run = ToolCommand::new(&ctx.tools.ffmpeg)
        .args(args)
        .timeout(ctx.options.tool_timeout())
        .execute()
        .await;
    if let Err(e) = run {
        tracing::debug!("fallback attempt failed: {e}");
        return false;
    }
    duration_is_positive(ctx, output).await
}

async fn duration_is_positive(ctx: &StrategyContext<'_>, path: &Path) -> bool {
    match probe::probe_file(&ctx.tools.ffprobe, path, ctx.options.probe_timeout()).await {
        Ok(report) => report.duration_secs() > 0.0,
        Err(e) => {
            tracing::debug!("fallback probe failed: {e}");
            false
        }
    }
}

/// Second rung: split into fixed-interval segments, then stitch together
/// whatever segments materialized.
async fn segmented_attempt(ctx: &StrategyContext<'_>) -> Option<PathBuf> {
    let pattern = ctx.workspace.candidate("chunk%03d.mp4");
    let run = ToolCommand::new(&ctx.tools.ffmpeg)
        .args(segment_args(
            &ctx.media.path,
            &pattern,
            ctx.options.segment_seconds,
        ))
        .timeout(ctx.options.tool_timeout())
        .execute()
        .await;
    if let Err(e) = run {
        tracing::debug!("fallback segmentation failed: {e}");
        return None;
    }

    let mut chunks: Vec<PathBuf> = std::fs::read_dir(ctx.workspace.dir())
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().contains(".chunk"))
                .unwrap_or(false)
        })
        .collect();
    chunks.sort();
    if chunks.is_empty() {
        return None;
    }

    let list = ctx.workspace.candidate("fallback-concat.txt");
    let mut file = std::fs::File::create(&list).ok()?;
    file.write_all(concat_list(&chunks).as_bytes()).ok()?;

    let out = ctx.workspace.candidate("fallback-segmented.mp4");
    let run = ToolCommand::new(&ctx.tools.ffmpeg)
        .args(concat_args(&list, &out))
        .timeout(ctx.options.tool_timeout())
        .execute()
        .await;
    if run.is_err() || !duration_is_positive(ctx, &out).await {
        ctx.workspace.discard(&out);
        return None;
    }
    Some(out)
}

pub(crate) fn lenient_remux_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-err_detect".into(),
        "ignore_err".into(),
        "-fflags".into(),
        "+genpts+discardcorrupt".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-c".into(),
        "copy".into(),
        output.to_string_lossy().into_owned(),
    ]
}

pub(crate) fn segment_args(input: &Path, pattern: &Path, seconds: u32) -> Vec<String> {
    vec![
        "-y".into(),
        "-err_detect".into(),
        "ignore_err".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-c".into(),
        "copy".into(),
        "-f".into(),
        "segment".into(),
        "-segment_time".into(),
        seconds.to_string(),
        "-reset_timestamps".into(),
        "1".into(),
        pattern.to_string_lossy().into_owned(),
    ]
}

pub(crate) fn reencode_args(input: &Path, output: &Path, crf: u32, preset: &str) -> Vec<String> {
    vec![
        "-y".into(),
        "-err_detect".into(),
        "ignore_err".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        preset.into(),
        "-crf".into(),
        crf.to_string(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "128k".into(),
        "-movflags".into(),
        "+faststart".into(),
        output.to_string_lossy().into_owned(),
    ]
}
