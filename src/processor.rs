use crate::config::Config;
use chrono::{DateTime, Utc};
use mediamend_repair::{RepairEngine, RepairOutcome, RepairReport, ToolPaths};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// How one file ended up.
#[derive(Debug, Clone, Serialize)]
pub enum FileOutcome {
    /// Output already existed; nothing was re-derived or overwritten.
    Skipped,
    /// A strategy verified; the report carries the details.
    Repaired(Box<RepairReport>),
    /// The file could not be repaired (or not even read).
    Failed { reason: String },
}

/// Per-batch counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub repaired: usize,
    pub skipped: usize,
    pub failed: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Drives the repair engine over one file or an ordered batch.
pub struct Processor {
    engine: RepairEngine,
    temp_root: Option<PathBuf>,
    overwrite: bool,
}

impl Processor {
    /// Build a processor from loaded configuration, resolving tools once.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let tools = ToolPaths::resolve(
            config.tools.ffmpeg.as_deref(),
            config.tools.ffprobe.as_deref(),
        )?;
        tracing::debug!(?tools, "external tools resolved");

        Ok(Self {
            engine: RepairEngine::new(tools, config.analysis.clone(), config.repair.clone()),
            temp_root: config.output.temp_dir.clone(),
            overwrite: config.output.overwrite,
        })
    }

    /// Repair a single file. Tool and strategy failures never escape; they
    /// come back as [`FileOutcome::Failed`].
    pub async fn process_one(&self, input: &Path, output: &Path) -> FileOutcome {
        if !self.overwrite && output.exists() {
            tracing::info!(output = %output.display(), "already processed, skipping");
            return FileOutcome::Skipped;
        }

        match self
            .engine
            .repair_file(input, output, self.temp_root.as_deref())
            .await
        {
            Ok(report) if report.repaired() => FileOutcome::Repaired(Box::new(report)),
            Ok(report) => {
                let attempts = report.attempts.len();
                FileOutcome::Failed {
                    reason: format!("all {attempts} repair strategies exhausted"),
                }
            }
            Err(e) => {
                tracing::error!(input = %input.display(), "repair aborted: {e}");
                FileOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Process an ordered batch of (input, output) pairs. A failure on one
    /// file never stops the rest.
    pub async fn process_batch(&self, pairs: &[(PathBuf, PathBuf)]) -> BatchSummary {
        let mut summary = BatchSummary {
            started_at: Some(Utc::now()),
            ..BatchSummary::default()
        };

        for (input, output) in pairs {
            summary.processed += 1;
            match self.process_one(input, output).await {
                FileOutcome::Skipped => summary.skipped += 1,
                FileOutcome::Repaired(report) => {
                    summary.repaired += 1;
                    if let RepairOutcome::Repaired { strategy, .. } = report.outcome {
                        tracing::info!(
                            input = %input.display(),
                            strategy = %strategy,
                            "repaired"
                        );
                    }
                }
                FileOutcome::Failed { reason } => {
                    summary.failed += 1;
                    tracing::error!(input = %input.display(), "failed: {reason}");
                }
            }
        }

        summary.finished_at = Some(Utc::now());
        summary
    }
}

/// Parse a batch list: one `input<TAB>output` pair per line, `#` comments
/// and blank lines ignored. Output paths must be unique.
pub fn parse_batch_list(content: &str) -> anyhow::Result<Vec<(PathBuf, PathBuf)>> {
    let mut pairs = Vec::new();
    let mut seen_outputs = std::collections::HashSet::new();

    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (input, output) = line.split_once('\t').ok_or_else(|| {
            anyhow::anyhow!(
                "line {}: expected `input<TAB>output`, got {:?}",
                lineno + 1,
                line
            )
        })?;
        let output = PathBuf::from(output.trim());
        if !seen_outputs.insert(output.clone()) {
            anyhow::bail!("line {}: duplicate output path {:?}", lineno + 1, output);
        }
        pairs.push((PathBuf::from(input.trim()), output));
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_list_parses_pairs_and_skips_comments() {
        let content = "# damaged card dump\n/in/a.mp4\t/out/a.mp4\n\n/in/b.mp4\t/out/b.mp4\n";
        let pairs = parse_batch_list(content).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, PathBuf::from("/in/a.mp4"));
        assert_eq!(pairs[1].1, PathBuf::from("/out/b.mp4"));
    }

    #[test]
    fn batch_list_rejects_duplicate_outputs() {
        let content = "/in/a.mp4\t/out/same.mp4\n/in/b.mp4\t/out/same.mp4\n";
        assert!(parse_batch_list(content).is_err());
    }

    #[test]
    fn batch_list_rejects_missing_separator() {
        assert!(parse_batch_list("/in/a.mp4 /out/a.mp4\n").is_err());
    }

    #[tokio::test]
    async fn existing_output_is_skipped_without_rederiving() {
        // Idempotence: the second run over the same pair must be a no-op,
        // even with no external tools present.
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp4");
        let output = dir.path().join("out.mp4");
        std::fs::write(&input, b"not really a video").unwrap();
        std::fs::write(&output, b"previous result").unwrap();

        let processor = Processor {
            engine: RepairEngine::new(
                ToolPaths {
                    ffmpeg: PathBuf::from("ffmpeg"),
                    ffprobe: PathBuf::from("ffprobe"),
                },
                Default::default(),
                Default::default(),
            ),
            temp_root: None,
            overwrite: false,
        };

        let outcome = processor.process_one(&input, &output).await;
        assert!(matches!(outcome, FileOutcome::Skipped));
        assert_eq!(std::fs::read(&output).unwrap(), b"previous result");
    }
}
