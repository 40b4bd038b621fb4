//! Quick fix: stream-copy remux into a fresh container.
//!
//! Cheapest strategy: let the external tool rewrite the index while copying
//! streams untouched. Tried plain first, then with permissive demux flags
//! for inputs the strict demuxer rejects.

use super::StrategyContext;
use crate::{Result, ToolCommand};
use std::path::{Path, PathBuf};

pub async fn run(ctx: &StrategyContext<'_>) -> Result<PathBuf> {
    let plain = ctx.workspace.candidate("remux.mp4");
    match remux(ctx, plain_args(&ctx.media.path, &plain)).await {
        Ok(()) => return Ok(plain),
        Err(e) => {
            tracing::debug!("plain remux failed, retrying permissive: {e}");
            ctx.workspace.discard(&plain);
        }
    }

    let permissive = ctx.workspace.candidate("remux-permissive.mp4");
    remux(ctx, permissive_args(&ctx.media.path, &permissive)).await?;
    Ok(permissive)
}

async fn remux(ctx: &StrategyContext<'_>, args: Vec<String>) -> Result<()> {
    ToolCommand::new(&ctx.tools.ffmpeg)
        .args(args)
        .timeout(ctx.options.tool_timeout())
        .execute()
        .await?;
    Ok(())
}

pub(crate) fn plain_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-c".into(),
        "copy".into(),
        "-movflags".into(),
        "+faststart".into(),
        output.to_string_lossy().into_owned(),
    ]
}

pub(crate) fn permissive_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-err_detect".into(),
        "ignore_err".into(),
        "-fflags".into(),
        "+genpts+igndts".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-c".into(),
        "copy".into(),
        output.to_string_lossy().into_owned(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_args_copy_streams_with_corrected_index() {
        let args = plain_args(Path::new("in.mp4"), Path::new("out.mp4"));
        assert_eq!(args[0], "-y");
        assert!(args.windows(2).any(|w| w == ["-c", "copy"]));
        assert!(args.windows(2).any(|w| w == ["-movflags", "+faststart"]));
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn permissive_args_relax_demuxing_before_input() {
        let args = permissive_args(Path::new("in.mp4"), Path::new("out.mp4"));
        let err_detect = args.iter().position(|a| a == "-err_detect").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(err_detect < input, "demux flags must precede -i");
        assert!(args.windows(2).any(|w| w == ["-fflags", "+genpts+igndts"]));
    }
}
