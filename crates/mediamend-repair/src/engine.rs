//! Per-file repair session: analyze, plan, attempt strategies in order,
//! verify, promote.

use crate::strategies::{self, StrategyContext};
use crate::verify::Verifier;
use crate::{RepairOptions, RepairWorkspace, Result, ToolPaths};
use mediamend_analysis::{
    analyze_file, AnalysisConfig, AnalysisSummary, MediaFile, StrategyKind,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Final state of a repair session.
#[derive(Debug, Clone, Serialize)]
pub enum RepairOutcome {
    /// A strategy produced a verified output, now at the destination.
    Repaired {
        strategy: StrategyKind,
        duration_secs: f64,
    },
    /// Every planned strategy failed; the destination was not written.
    Failed,
}

/// One strategy attempt, for the report.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub strategy: StrategyKind,
    pub priority: u8,
    pub succeeded: bool,
    pub detail: String,
}

/// Everything that happened while repairing one file.
#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub analysis: AnalysisSummary,
    pub attempts: Vec<AttemptRecord>,
    pub outcome: RepairOutcome,
}

impl RepairReport {
    pub fn repaired(&self) -> bool {
        matches!(self.outcome, RepairOutcome::Repaired { .. })
    }
}

/// The repair engine: owns resolved tool paths and configuration, processes
/// one file at a time.
pub struct RepairEngine {
    tools: ToolPaths,
    analysis: AnalysisConfig,
    options: RepairOptions,
}

impl RepairEngine {
    pub fn new(tools: ToolPaths, analysis: AnalysisConfig, options: RepairOptions) -> Self {
        Self {
            tools,
            analysis,
            options,
        }
    }

    /// Analyze and repair one file, writing the result to `output` only
    /// after a candidate verifies.
    ///
    /// # Errors
    ///
    /// Only unreadable input (missing, empty, permission denied) and
    /// workspace setup problems error out; strategy and tool failures are
    /// recorded as failed attempts in the report.
    pub async fn repair_file(
        &self,
        input: &Path,
        output: &Path,
        temp_root: Option<&Path>,
    ) -> Result<RepairReport> {
        let media = MediaFile::open(input)?;
        let analysis = analyze_file(&media, &self.analysis)?;

        tracing::info!(
            input = %input.display(),
            severity = analysis.assessment.severity.as_str(),
            strategies = analysis.assessment.strategies.len(),
            "starting repair"
        );

        let workspace = RepairWorkspace::new(input, temp_root)?;
        let verifier = Verifier::new(
            &self.tools,
            self.options.probe_timeout(),
            self.options.tool_timeout(),
            self.options.verify_lead_secs,
        );
        let ctx = StrategyContext {
            media: &media,
            analysis: &analysis,
            workspace: &workspace,
            tools: &self.tools,
            options: &self.options,
        };

        let mut attempts = Vec::new();
        let mut outcome = RepairOutcome::Failed;

        for planned in &analysis.assessment.strategies {
            let strategy = planned.kind;
            tracing::info!(strategy = %strategy, priority = planned.priority, "attempting strategy");

            let candidate = match strategies::execute(strategy, &ctx).await {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(strategy = %strategy, "strategy failed: {e}");
                    attempts.push(AttemptRecord {
                        strategy,
                        priority: planned.priority,
                        succeeded: false,
                        detail: e.to_string(),
                    });
                    if e.is_attempt_failure() {
                        continue;
                    }
                    return Err(e);
                }
            };

            let verification = verifier.verify(&candidate).await?;
            if verification.passed() {
                workspace.promote(&candidate, output)?;
                tracing::info!(
                    strategy = %strategy,
                    duration_secs = verification.duration_secs,
                    output = %output.display(),
                    "repair verified"
                );
                attempts.push(AttemptRecord {
                    strategy,
                    priority: planned.priority,
                    succeeded: true,
                    detail: format!("verified, duration {:.2}s", verification.duration_secs),
                });
                outcome = RepairOutcome::Repaired {
                    strategy,
                    duration_secs: verification.duration_secs,
                };
                break;
            }

            tracing::warn!(strategy = %strategy, "candidate failed verification");
            workspace.discard(&candidate);
            attempts.push(AttemptRecord {
                strategy,
                priority: planned.priority,
                succeeded: false,
                detail: "candidate failed verification".to_string(),
            });
        }

        if matches!(outcome, RepairOutcome::Failed) {
            tracing::error!(input = %input.display(), "all repair strategies exhausted");
        }

        Ok(RepairReport {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            analysis: analysis.summary(),
            attempts,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_to_json() {
        let report = RepairReport {
            input: PathBuf::from("in.mp4"),
            output: PathBuf::from("out.mp4"),
            analysis: sample_summary(),
            attempts: vec![AttemptRecord {
                strategy: StrategyKind::QuickRemux,
                priority: 1,
                succeeded: true,
                detail: "verified, duration 12.00s".into(),
            }],
            outcome: RepairOutcome::Repaired {
                strategy: StrategyKind::QuickRemux,
                duration_secs: 12.0,
            },
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("QuickRemux"));
        assert!(report.repaired());
    }

    fn sample_summary() -> AnalysisSummary {
        use mediamend_analysis::Severity;
        AnalysisSummary {
            container: Some("mp4"),
            video_codec: Some("h264"),
            audio_codec: None,
            blocks: 3,
            valid_blocks: 3,
            missing_required: Vec::new(),
            stream_units: 42,
            corrupted_regions: 0,
            corrupted_bytes: 0,
            corruption_ratio: 0.0,
            severity: Severity::None,
            tags: Vec::new(),
            strategies: Vec::new(),
        }
    }
}
