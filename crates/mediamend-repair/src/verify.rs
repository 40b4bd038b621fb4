//! Candidate verification via the external tool.
//!
//! A candidate passes when the probe exits cleanly with a duration greater
//! than zero and the leading seconds decode to the null muxer. Any tool
//! failure counts as a failed verification, not an error: the engine simply
//! moves on to the next strategy.

use crate::{probe, Result, ToolCommand, ToolPaths};
use std::path::Path;
use std::time::Duration;

/// Outcome of verifying one candidate.
#[derive(Debug, Clone)]
pub struct Verification {
    /// Duration the probe reported, seconds.
    pub duration_secs: f64,
    /// Whether the leading portion decoded cleanly.
    pub lead_decoded: bool,
}

impl Verification {
    /// Whether the candidate is acceptable.
    pub fn passed(&self) -> bool {
        self.duration_secs > 0.0 && self.lead_decoded
    }

    fn failed() -> Self {
        Self {
            duration_secs: 0.0,
            lead_decoded: false,
        }
    }
}

/// Verifier for repair candidates.
pub struct Verifier<'a> {
    tools: &'a ToolPaths,
    probe_timeout: Duration,
    decode_timeout: Duration,
    lead_secs: u32,
}

impl<'a> Verifier<'a> {
    pub fn new(
        tools: &'a ToolPaths,
        probe_timeout: Duration,
        decode_timeout: Duration,
        lead_secs: u32,
    ) -> Self {
        Self {
            tools,
            probe_timeout,
            decode_timeout,
            lead_secs,
        }
    }

    /// Probe and decode-check a candidate.
    pub async fn verify(&self, candidate: &Path) -> Result<Verification> {
        let report = match probe::probe_file(&self.tools.ffprobe, candidate, self.probe_timeout)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                tracing::debug!("candidate probe failed: {e}");
                return Ok(Verification::failed());
            }
        };

        let duration_secs = report.duration_secs();
        if duration_secs <= 0.0 {
            return Ok(Verification {
                duration_secs,
                lead_decoded: false,
            });
        }

        let decode = ToolCommand::new(&self.tools.ffmpeg)
            .args(decode_check_args(candidate, self.lead_secs))
            .timeout(self.decode_timeout)
            .execute()
            .await;

        let lead_decoded = match decode {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("candidate decode check failed: {e}");
                false
            }
        };

        Ok(Verification {
            duration_secs,
            lead_decoded,
        })
    }
}

/// Decode the first `lead_secs` seconds to the null muxer.
pub(crate) fn decode_check_args(candidate: &Path, lead_secs: u32) -> Vec<String> {
    vec![
        "-v".into(),
        "error".into(),
        "-i".into(),
        candidate.to_string_lossy().into_owned(),
        "-t".into(),
        lead_secs.to_string(),
        "-f".into(),
        "null".into(),
        "-".into(),
    ]
}
