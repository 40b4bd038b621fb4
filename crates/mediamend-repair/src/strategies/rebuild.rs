//! Container reconstruction: rebuild the required top-level boxes.
//!
//! Reuses whatever valid structure survives. The `ftyp` is copied when
//! present, the file-level index (`moov`) is reused only if a nested walk
//! finds sound structure inside it, and the media data is copied verbatim or
//! synthesized by concatenating stream units of known valid size.

use super::{copy_range, StrategyContext};
use crate::mp4build::{self, AudioParams, IndexParams};
use crate::{Error, Result};
use mediamend_analysis::{container, AudioCodec, BoxType, VideoCodec};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Assumed frame rate when estimating a duration from the unit count alone.
const FALLBACK_FPS: u64 = 30;

pub async fn run(ctx: &StrategyContext<'_>) -> Result<PathBuf> {
    let map = ctx
        .analysis
        .container
        .as_ref()
        .ok_or_else(|| Error::StrategyFailed("no walkable container structure".into()))?;

    let out_path = ctx.workspace.candidate("rebuilt.mp4");
    let mut src = ctx.media.reader().map_err(Error::Analysis)?;
    let out = std::fs::File::create(&out_path)?;
    let mut out = BufWriter::new(out);

    // ftyp: reuse a valid one, else a minimal default.
    match map.first_valid(BoxType::FTYP) {
        Some(block) => {
            copy_range(&mut src, &mut out, block.offset, block.size)?;
        }
        None => out.write_all(&mp4build::build_ftyp())?,
    }

    // moov: reuse only when its internal structure checks out; otherwise
    // synthesize a minimal replacement sized from what is recoverable.
    let reusable_moov = match map.first_valid(BoxType::MOOV) {
        Some(block) if container::moov_checks_out(&mut src, block).map_err(Error::Analysis)? => {
            Some(block.clone())
        }
        _ => None,
    };
    match reusable_moov {
        Some(block) => {
            copy_range(&mut src, &mut out, block.offset, block.size)?;
        }
        None => {
            let params = synthesis_params(ctx);
            tracing::debug!(
                timescale = params.timescale,
                duration = params.duration,
                "synthesizing replacement index"
            );
            out.write_all(&mp4build::build_moov(&params))?;
        }
    }

    // mdat: reuse verbatim, else concatenate stream units of known size.
    match map.first_valid(BoxType::MDAT) {
        Some(block) => {
            copy_range(&mut src, &mut out, block.offset, block.size)?;
        }
        None => {
            let usable: Vec<_> = ctx
                .analysis
                .units
                .iter()
                .filter(|u| u.size > 0 && u.offset + u.size <= ctx.media.len)
                .collect();
            if usable.is_empty() {
                return Err(Error::StrategyFailed(
                    "no media data block and no stream units to rebuild one".into(),
                ));
            }
            let payload: u64 = usable.iter().map(|u| u.size).sum();
            out.write_all(&mp4build::mdat_header(payload))?;
            for unit in usable {
                copy_range(&mut src, &mut out, unit.offset, unit.size)?;
            }
        }
    }

    out.flush()?;
    Ok(out_path)
}

/// Derive index parameters from the little metadata the analysis recovered.
fn synthesis_params(ctx: &StrategyContext<'_>) -> IndexParams {
    let options = ctx.options;
    let timescale = options.default_timescale;

    // Estimate a duration from the coded-picture count at a fallback rate;
    // a zero duration would make the verifier reject the rebuild outright.
    let frames = ctx
        .analysis
        .stream_codec
        .map(|codec| {
            ctx.analysis
                .units
                .iter()
                .filter(|u| u.is_coded_picture(codec))
                .count() as u64
        })
        .unwrap_or(0)
        .max(1);
    let duration = frames * timescale as u64 / FALLBACK_FPS;

    let video_fourcc = match ctx.analysis.scan.video_codec {
        Some(VideoCodec::H265) => *b"hvc1",
        Some(VideoCodec::Mpeg4Part2) => *b"mp4v",
        _ => *b"avc1",
    };

    let audio = match ctx.analysis.scan.audio_codec {
        Some(AudioCodec::Aac | AudioCodec::Mp3) => Some(AudioParams {
            channels: 2,
            sample_rate: 48_000,
        }),
        None => None,
    };

    IndexParams {
        timescale,
        duration,
        width: options.default_width,
        height: options.default_height,
        video_fourcc,
        audio,
    }
}
