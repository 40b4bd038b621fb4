//! # mediamend-repair
//!
//! Repair strategy executors and external-tool orchestration for damaged
//! video files.
//!
//! This crate consumes the analysis produced by `mediamend-analysis` and
//! drives the actual recovery:
//! - Resolving and invoking the external media tool (ffmpeg/ffprobe) through
//!   a timeout-bounded subprocess builder
//! - A per-file temporary workspace; candidates are promoted to their final
//!   path only after verification passes
//! - The strategy executors, from quick remux to the aggressive fallback
//!   chain, tried strictly sequentially in planner order
//! - Candidate verification (positive duration plus decodable lead)
//!
//! Processing is single-file-sequential by design; the strategies invoke
//! external processes whose resource usage is already heavy.

mod command;
mod engine;
mod error;
mod mp4build;
mod strategies;
mod verify;

pub mod probe;
pub mod tools;
pub mod workspace;

pub use command::{ToolCommand, ToolOutput};
pub use engine::{AttemptRecord, RepairEngine, RepairOutcome, RepairReport};
pub use error::{Error, Result};
pub use probe::{ProbeReport, StreamInfo};
pub use tools::{check_tools, require_tool, ToolInfo, ToolPaths};
pub use verify::{Verification, Verifier};
pub use workspace::RepairWorkspace;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Repair tunables, constructed once at startup and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairOptions {
    /// Time budget per external invocation, seconds.
    pub tool_timeout_secs: u64,
    /// Time budget for metadata probes, seconds.
    pub probe_timeout_secs: u64,
    /// Leading seconds the verifier decodes.
    pub verify_lead_secs: u32,
    /// Segment interval for the fallback segmentation pass, seconds.
    pub segment_seconds: u32,
    /// CRF for the conservative re-encode.
    pub reencode_crf: u32,
    /// x264 preset for the conservative re-encode.
    pub reencode_preset: String,
    /// Declared dimensions when synthesizing an index with nothing better.
    pub default_width: u32,
    pub default_height: u32,
    /// Movie timescale for synthesized indexes.
    pub default_timescale: u32,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 300,
            probe_timeout_secs: 30,
            verify_lead_secs: 5,
            segment_seconds: 10,
            reencode_crf: 23,
            reencode_preset: "fast".to_string(),
            default_width: 1920,
            default_height: 1080,
            default_timescale: 90_000,
        }
    }
}

impl RepairOptions {
    /// Per-invocation timeout as a [`Duration`].
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs.max(1))
    }

    /// Probe timeout as a [`Duration`].
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_sane() {
        let opts = RepairOptions::default();
        assert!(opts.tool_timeout() >= Duration::from_secs(1));
        assert!(opts.verify_lead_secs > 0);
        assert_eq!(opts.reencode_preset, "fast");
    }

    #[test]
    fn zero_timeout_is_clamped() {
        let opts = RepairOptions {
            tool_timeout_secs: 0,
            ..RepairOptions::default()
        };
        assert_eq!(opts.tool_timeout(), Duration::from_secs(1));
    }
}
