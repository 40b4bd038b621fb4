//! FFprobe-based candidate probing.

use crate::{Error, Result, ToolCommand};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Metadata about one stream in a probed file.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// "video", "audio", "subtitle", ...
    pub kind: String,
    /// Codec name as the tool reports it.
    pub codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// What ffprobe reported about a file.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    /// Container format name.
    pub format: String,
    /// Reported duration, if parsable.
    pub duration: Option<Duration>,
    /// All streams, in probe order.
    pub streams: Vec<StreamInfo>,
}

impl ProbeReport {
    /// Duration in seconds, zero when unknown.
    pub fn duration_secs(&self) -> f64 {
        self.duration.map(|d| d.as_secs_f64()).unwrap_or(0.0)
    }

    /// Whether any video stream is present.
    pub fn has_video(&self) -> bool {
        self.streams.iter().any(|s| s.kind == "video")
    }

    /// Whether any audio stream is present.
    pub fn has_audio(&self) -> bool {
        self.streams.iter().any(|s| s.kind == "audio")
    }
}

/// Probe a media file using ffprobe.
pub async fn probe_file(ffprobe: &Path, file: &Path, timeout: Duration) -> Result<ProbeReport> {
    let output = ToolCommand::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg_path(file)
        .timeout(timeout)
        .execute()
        .await?;

    parse_probe_json(&output.stdout)
}

/// Parse ffprobe's JSON into a [`ProbeReport`].
pub fn parse_probe_json(json: &str) -> Result<ProbeReport> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::parse_error("ffprobe", e.to_string()))?;

    let (format, duration) = match output.format {
        Some(f) => {
            let duration = f
                .duration
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|d| d.is_finite() && *d >= 0.0)
                .map(Duration::from_secs_f64);
            (f.format_name.unwrap_or_default(), duration)
        }
        None => (String::new(), None),
    };

    let streams = output
        .streams
        .into_iter()
        .map(|s| StreamInfo {
            kind: s.codec_type.unwrap_or_default(),
            codec: s.codec_name,
            width: s.width,
            height: s.height,
        })
        .collect();

    Ok(ProbeReport {
        format,
        duration,
        streams,
    })
}
