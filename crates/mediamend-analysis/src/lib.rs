//! # mediamend-analysis
//!
//! Byte-level damage analysis for video files.
//!
//! This crate provides the read-only half of the repair pipeline:
//! - Signature scanning over bounded windows (container, video codec, audio)
//! - Top-level container structure walking for ISO-BMFF/MP4
//! - Start-code scanning for H.264/H.265 elementary-stream units
//! - Corruption detection (zero runs, implausible length fields) with
//!   region merge and valid-region complement
//! - Recovery planning: severity tier plus an ordered strategy list
//!
//! Nothing here spawns a subprocess or writes a file; the repair crate
//! consumes the [`FileAnalysis`] this crate produces.

mod config;
mod error;
mod media;

pub mod assess;
pub mod container;
pub mod corruption;
pub mod nal;
pub mod signature;

pub use assess::{
    CorruptionTag, PlannedStrategy, RecoveryAssessment, Severity, StrategyKind,
};
pub use config::AnalysisConfig;
pub use container::{Block, BoxType, ContainerMap};
pub use corruption::{CorruptedRegion, CorruptionScan, RegionKind, ValidRegion};
pub use error::{Error, Result};
pub use media::MediaFile;
pub use nal::{StreamCodec, StreamUnit};
pub use signature::{
    AudioCodec, ContainerKind, ScanReport, SignatureKind, SignatureMatch, VideoCodec,
};

use serde::Serialize;

/// Everything the analysis pass learned about one file.
#[derive(Debug)]
pub struct FileAnalysis {
    /// Signature matches and elected container/codecs.
    pub scan: ScanReport,
    /// Top-level container structure; `None` when the container is not a
    /// walkable family.
    pub container: Option<ContainerMap>,
    /// Elementary-stream codec the unit scan ran for, if any.
    pub stream_codec: Option<StreamCodec>,
    /// Stream units in offset order.
    pub units: Vec<StreamUnit>,
    /// Merged corruption map.
    pub corruption: CorruptionScan,
    /// Valid byte ranges (complement of corruption, small fragments dropped).
    pub valid_regions: Vec<ValidRegion>,
    /// The planner's verdict.
    pub assessment: RecoveryAssessment,
}

impl FileAnalysis {
    /// Compact, serializable view for reports and the CLI.
    pub fn summary(&self) -> AnalysisSummary {
        AnalysisSummary {
            container: self.scan.container.map(|c| c.as_str()),
            video_codec: self.scan.video_codec.map(|c| c.as_str()),
            audio_codec: self.scan.audio_codec.map(|c| c.as_str()),
            blocks: self.container.as_ref().map_or(0, |m| m.blocks.len()),
            valid_blocks: self.container.as_ref().map_or(0, |m| m.valid_count()),
            missing_required: self
                .container
                .as_ref()
                .map(|m| {
                    m.missing_required()
                        .iter()
                        .map(|b| b.as_str().to_string())
                        .collect()
                })
                .unwrap_or_default(),
            stream_units: self.units.len(),
            corrupted_regions: self.corruption.regions.len(),
            corrupted_bytes: self.corruption.corrupted_bytes(),
            corruption_ratio: self.corruption.ratio(),
            severity: self.assessment.severity,
            tags: self.assessment.tags.clone(),
            strategies: self.assessment.strategies.clone(),
        }
    }
}

/// Serializable per-file analysis summary.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub container: Option<&'static str>,
    pub video_codec: Option<&'static str>,
    pub audio_codec: Option<&'static str>,
    pub blocks: usize,
    pub valid_blocks: usize,
    pub missing_required: Vec<String>,
    pub stream_units: usize,
    pub corrupted_regions: usize,
    pub corrupted_bytes: u64,
    pub corruption_ratio: f64,
    pub severity: Severity,
    pub tags: Vec<CorruptionTag>,
    pub strategies: Vec<PlannedStrategy>,
}

/// Run the full analysis pass over one file.
///
/// Scanner, walker, unit scanner, and corruption detector each read the file
/// through their own bounded pass; the planner folds their findings into a
/// [`RecoveryAssessment`].
pub fn analyze_file(file: &MediaFile, cfg: &AnalysisConfig) -> Result<FileAnalysis> {
    let scan = signature::scan_signatures(file, cfg)?;

    let container = match scan.container {
        Some(ContainerKind::Mp4) => {
            let mut reader = file.reader()?;
            Some(container::walk_boxes(&mut reader)?)
        }
        // Other container families degrade to unknown structure.
        _ => None,
    };

    let stream_codec = scan.video_codec.and_then(StreamCodec::from_video);
    let units = match stream_codec {
        Some(codec) => nal::scan_units(file.reader()?, file.len, codec, cfg)?,
        None => Vec::new(),
    };

    let corruption = corruption::scan_regions(
        file.reader()?,
        file.len,
        scan.container == Some(ContainerKind::Mp4),
        cfg,
    )?;
    let valid_regions = corruption.valid_regions(cfg.min_valid_region);

    let assessment = assess::assess(
        &scan,
        container.as_ref(),
        stream_codec,
        &units,
        &corruption,
    );

    tracing::info!(
        path = %file.path.display(),
        severity = assessment.severity.as_str(),
        units = units.len(),
        regions = corruption.regions.len(),
        "analysis complete"
    );

    Ok(FileAnalysis {
        scan,
        container,
        stream_codec,
        units,
        corruption,
        valid_regions,
        assessment,
    })
}
