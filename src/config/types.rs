use mediamend_analysis::AnalysisConfig;
use mediamend_repair::RepairOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub repair: RepairOptions,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Paths to the external media tools; unset entries are looked up on PATH.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Working directory for per-file temp workspaces; system temp when
    /// unset. Needs free space for about twice the largest input.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Rewrite an existing output instead of skipping the file.
    #[serde(default)]
    pub overwrite: bool,
}
