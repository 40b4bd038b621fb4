//! Recovery planning: map analysis findings to a severity tier and an
//! ordered list of repair strategies.

use crate::container::ContainerMap;
use crate::corruption::CorruptionScan;
use crate::nal::{StreamCodec, StreamUnit};
use crate::signature::{ContainerKind, ScanReport};
use serde::Serialize;

/// Recovery difficulty tier, least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    None,
    Light,
    Standard,
    Heavy,
    Critical,
}

impl Severity {
    fn from_priority(priority: u8) -> Self {
        match priority {
            0 => Severity::None,
            1 => Severity::Light,
            2 => Severity::Standard,
            3 => Severity::Heavy,
            _ => Severity::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Light => "light",
            Severity::Standard => "standard",
            Severity::Heavy => "heavy",
            Severity::Critical => "critical",
        }
    }
}

/// Kinds of damage the planner reacts to. Tags accumulate; they are not
/// mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CorruptionTag {
    /// No recognizable container or codec signature at all.
    UnknownFormat,
    /// A required top-level box has no valid occurrence.
    MissingAtoms,
    /// A video codec signature matched but the unit scan found nothing.
    NoStreamUnits,
    /// More than half the file is damaged.
    SevereCorruption,
    /// Between 20% and 50% damaged.
    ModerateCorruption,
    /// Up to 20% damaged.
    MinorCorruption,
    /// The corruption scan hit its region cap and stopped early.
    ScanTruncated,
}

impl CorruptionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorruptionTag::UnknownFormat => "unknown-format",
            CorruptionTag::MissingAtoms => "missing-atoms",
            CorruptionTag::NoStreamUnits => "no-stream-units",
            CorruptionTag::SevereCorruption => "severe-corruption",
            CorruptionTag::ModerateCorruption => "moderate-corruption",
            CorruptionTag::MinorCorruption => "minor-corruption",
            CorruptionTag::ScanTruncated => "scan-truncated",
        }
    }
}

/// The closed set of repair strategies, dispatched by `match` rather than by
/// name lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StrategyKind {
    /// Stream-copy remux into a fresh container, plain then permissive.
    QuickRemux,
    /// Rebuild the required top-level boxes, synthesizing a replacement
    /// index when the original is unusable.
    RebuildContainer,
    /// Extract raw elementary streams and remux them.
    ExtractStreams,
    /// Re-emit the stream keeping only keyframe-anchored groups.
    RebuildGop,
    /// Cut valid byte ranges into segments and concatenate the survivors.
    SegmentSalvage,
    /// Escalating chain of lenient external-tool invocations.
    FallbackChain,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::QuickRemux => "quick-remux",
            StrategyKind::RebuildContainer => "rebuild-container",
            StrategyKind::ExtractStreams => "extract-streams",
            StrategyKind::RebuildGop => "rebuild-gop",
            StrategyKind::SegmentSalvage => "segment-salvage",
            StrategyKind::FallbackChain => "fallback-chain",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A strategy with its try-order priority (lower tries first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlannedStrategy {
    pub kind: StrategyKind,
    pub priority: u8,
}

/// The planner's verdict for one file.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryAssessment {
    /// Required recovery tier.
    pub severity: Severity,
    /// All damage tags that applied, in evaluation order.
    pub tags: Vec<CorruptionTag>,
    /// Strategies in try order (ascending priority, stable).
    pub strategies: Vec<PlannedStrategy>,
    /// Damaged fraction of the file.
    pub corruption_ratio: f64,
}

impl RecoveryAssessment {
    pub fn has_tag(&self, tag: CorruptionTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Build the assessment from the analysis findings.
///
/// Conditions are evaluated in a fixed order and accumulate; the required
/// tier is the highest priority floor any condition reached. The tier is
/// then expanded into the cheapest-first strategy ladder, a container
/// rebuild is appended for known MP4 input, and the list is sorted ascending
/// by priority. An undetermined format forces the fallback chain alone.
pub fn assess(
    scan: &ScanReport,
    container: Option<&ContainerMap>,
    stream_codec: Option<StreamCodec>,
    units: &[StreamUnit],
    corruption: &CorruptionScan,
) -> RecoveryAssessment {
    let mut tags = Vec::new();
    let mut candidates: Vec<PlannedStrategy> = Vec::new();
    let mut floor = 0u8;
    let ratio = corruption.ratio();

    let raise = |floor: &mut u8, value: u8| *floor = (*floor).max(value);

    if scan.container.is_none() && scan.video_codec.is_none() && scan.audio_codec.is_none() {
        tags.push(CorruptionTag::UnknownFormat);
    }

    if let Some(map) = container {
        if !map.missing_required().is_empty() {
            tags.push(CorruptionTag::MissingAtoms);
            candidates.push(PlannedStrategy {
                kind: StrategyKind::RebuildContainer,
                priority: 2,
            });
            raise(&mut floor, 2);
        }
    }

    if stream_codec.is_some() && units.is_empty() {
        tags.push(CorruptionTag::NoStreamUnits);
        candidates.push(PlannedStrategy {
            kind: StrategyKind::ExtractStreams,
            priority: 3,
        });
        raise(&mut floor, 3);
    }

    if ratio > 0.5 {
        tags.push(CorruptionTag::SevereCorruption);
        candidates.push(PlannedStrategy {
            kind: StrategyKind::SegmentSalvage,
            priority: 4,
        });
        raise(&mut floor, 4);
    } else if ratio > 0.2 {
        tags.push(CorruptionTag::ModerateCorruption);
        candidates.push(PlannedStrategy {
            kind: StrategyKind::RebuildGop,
            priority: 2,
        });
        raise(&mut floor, 2);
    } else if ratio > 0.0 {
        tags.push(CorruptionTag::MinorCorruption);
        candidates.push(PlannedStrategy {
            kind: StrategyKind::QuickRemux,
            priority: 1,
        });
        raise(&mut floor, 1);
    }

    if corruption.truncated {
        tags.push(CorruptionTag::ScanTruncated);
        raise(&mut floor, 4);
    }

    let severity = Severity::from_priority(floor);

    let strategies = if tags.contains(&CorruptionTag::UnknownFormat) {
        vec![PlannedStrategy {
            kind: StrategyKind::FallbackChain,
            priority: 5,
        }]
    } else {
        expand(floor, scan.container, candidates)
    };

    tracing::debug!(
        severity = severity.as_str(),
        ratio,
        strategies = strategies.len(),
        "recovery assessment built"
    );

    RecoveryAssessment {
        severity,
        tags,
        strategies,
        corruption_ratio: ratio,
    }
}

/// Expand the required tier into the cheapest-first strategy ladder.
fn expand(
    floor: u8,
    container: Option<ContainerKind>,
    mut candidates: Vec<PlannedStrategy>,
) -> Vec<PlannedStrategy> {
    candidates.insert(
        0,
        PlannedStrategy {
            kind: StrategyKind::QuickRemux,
            priority: 1,
        },
    );
    if floor >= 3 {
        candidates.push(PlannedStrategy {
            kind: StrategyKind::RebuildGop,
            priority: 3,
        });
    }
    if floor >= 4 {
        candidates.push(PlannedStrategy {
            kind: StrategyKind::SegmentSalvage,
            priority: 4,
        });
    }
    candidates.push(PlannedStrategy {
        kind: StrategyKind::FallbackChain,
        priority: 5,
    });
    if container == Some(ContainerKind::Mp4) {
        candidates.push(PlannedStrategy {
            kind: StrategyKind::RebuildContainer,
            priority: (floor + 1).min(5),
        });
    }

    // Keep the lowest priority per strategy, preserving first-seen order.
    let mut deduped: Vec<PlannedStrategy> = Vec::new();
    for c in candidates {
        match deduped.iter_mut().find(|d| d.kind == c.kind) {
            Some(existing) => existing.priority = existing.priority.min(c.priority),
            None => deduped.push(c),
        }
    }

    deduped.sort_by_key(|s| s.priority);
    deduped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Block, BoxType};
    use crate::corruption::{CorruptedRegion, RegionKind};

    fn empty_scan() -> ScanReport {
        ScanReport {
            matches: Vec::new(),
            container: None,
            video_codec: None,
            audio_codec: None,
        }
    }

    fn mp4_scan() -> ScanReport {
        ScanReport {
            matches: Vec::new(),
            container: Some(ContainerKind::Mp4),
            video_codec: Some(crate::signature::VideoCodec::H264),
            audio_codec: None,
        }
    }

    fn map_with(kinds: &[BoxType]) -> ContainerMap {
        let mut map = ContainerMap::default();
        let mut offset = 0;
        for &kind in kinds {
            map.blocks.push(Block {
                kind,
                offset,
                size: 16,
                header_size: 8,
                is_valid: true,
            });
            offset += 16;
        }
        map
    }

    fn clean_corruption(file_len: u64) -> CorruptionScan {
        CorruptionScan {
            regions: Vec::new(),
            truncated: false,
            file_len,
        }
    }

    fn corruption_with_ratio(file_len: u64, damaged: u64) -> CorruptionScan {
        CorruptionScan {
            regions: vec![CorruptedRegion {
                start: 0,
                end: damaged,
                kind: RegionKind::ZeroRun,
            }],
            truncated: false,
            file_len,
        }
    }

    fn unit(offset: u64, unit_type: u8) -> StreamUnit {
        StreamUnit {
            offset,
            start_code_len: 4,
            unit_type,
            size: 10,
        }
    }

    #[test]
    fn clean_mp4_assesses_as_none_with_quick_remux_first() {
        let map = map_with(&[BoxType::FTYP, BoxType::MOOV, BoxType::MDAT]);
        let units = vec![unit(0, 7), unit(10, 5)];
        let a = assess(
            &mp4_scan(),
            Some(&map),
            Some(StreamCodec::H264),
            &units,
            &clean_corruption(1_000_000),
        );
        assert_eq!(a.severity, Severity::None);
        assert!(a.tags.is_empty());
        assert_eq!(a.strategies[0].kind, StrategyKind::QuickRemux);
    }

    #[test]
    fn missing_moov_plans_container_rebuild() {
        let map = map_with(&[BoxType::FTYP, BoxType::MDAT]);
        let units = vec![unit(0, 7), unit(10, 5)];
        let a = assess(
            &mp4_scan(),
            Some(&map),
            Some(StreamCodec::H264),
            &units,
            &clean_corruption(1_000_000),
        );
        assert_eq!(a.severity, Severity::Standard);
        assert!(a.has_tag(CorruptionTag::MissingAtoms));
        let rebuild = a
            .strategies
            .iter()
            .find(|s| s.kind == StrategyKind::RebuildContainer)
            .unwrap();
        assert_eq!(rebuild.priority, 2);
        // Quick remux still tries first.
        assert_eq!(a.strategies[0].kind, StrategyKind::QuickRemux);
    }

    #[test]
    fn minor_corruption_is_light() {
        let map = map_with(&[BoxType::FTYP, BoxType::MOOV, BoxType::MDAT]);
        let units = vec![unit(0, 7), unit(10, 5)];
        let a = assess(
            &mp4_scan(),
            Some(&map),
            Some(StreamCodec::H264),
            &units,
            &corruption_with_ratio(1_000_000, 4_096),
        );
        assert_eq!(a.severity, Severity::Light);
        assert!(a.has_tag(CorruptionTag::MinorCorruption));
        assert_eq!(a.strategies[0].kind, StrategyKind::QuickRemux);
    }

    #[test]
    fn no_stream_units_plans_extraction() {
        let map = map_with(&[BoxType::FTYP, BoxType::MOOV, BoxType::MDAT]);
        let a = assess(
            &mp4_scan(),
            Some(&map),
            Some(StreamCodec::H264),
            &[],
            &clean_corruption(1_000_000),
        );
        assert_eq!(a.severity, Severity::Heavy);
        assert!(a.has_tag(CorruptionTag::NoStreamUnits));
        assert!(a
            .strategies
            .iter()
            .any(|s| s.kind == StrategyKind::ExtractStreams));
        assert!(a
            .strategies
            .iter()
            .any(|s| s.kind == StrategyKind::RebuildGop));
    }

    #[test]
    fn severe_corruption_is_critical_with_segment_salvage() {
        let map = map_with(&[BoxType::FTYP, BoxType::MOOV, BoxType::MDAT]);
        let units = vec![unit(0, 7), unit(10, 5)];
        let a = assess(
            &mp4_scan(),
            Some(&map),
            Some(StreamCodec::H264),
            &units,
            &corruption_with_ratio(1_000_000, 600_000),
        );
        assert_eq!(a.severity, Severity::Critical);
        assert!(a.has_tag(CorruptionTag::SevereCorruption));
        assert!(a
            .strategies
            .iter()
            .any(|s| s.kind == StrategyKind::SegmentSalvage));
    }

    #[test]
    fn unknown_format_gets_fallback_chain_only() {
        let a = assess(
            &empty_scan(),
            None,
            None,
            &[],
            &clean_corruption(1_000_000),
        );
        assert!(a.has_tag(CorruptionTag::UnknownFormat));
        assert_eq!(a.strategies.len(), 1);
        assert_eq!(a.strategies[0].kind, StrategyKind::FallbackChain);
    }

    #[test]
    fn truncated_scan_forces_critical() {
        let map = map_with(&[BoxType::FTYP, BoxType::MOOV, BoxType::MDAT]);
        let units = vec![unit(0, 7), unit(10, 5)];
        let mut corruption = corruption_with_ratio(1_000_000, 4_096);
        corruption.truncated = true;
        let a = assess(
            &mp4_scan(),
            Some(&map),
            Some(StreamCodec::H264),
            &units,
            &corruption,
        );
        assert_eq!(a.severity, Severity::Critical);
        assert!(a.has_tag(CorruptionTag::ScanTruncated));
    }

    #[test]
    fn strategies_are_sorted_by_priority() {
        let map = map_with(&[BoxType::FTYP]);
        let a = assess(
            &mp4_scan(),
            Some(&map),
            Some(StreamCodec::H264),
            &[],
            &corruption_with_ratio(1_000_000, 600_000),
        );
        for pair in a.strategies.windows(2) {
            assert!(pair[0].priority <= pair[1].priority);
        }
        // Each strategy appears at most once.
        let kinds: std::collections::HashSet<_> =
            a.strategies.iter().map(|s| s.kind).collect();
        assert_eq!(kinds.len(), a.strategies.len());
    }

    #[test]
    fn severity_ordering_matches_tier_ladder() {
        assert!(Severity::None < Severity::Light);
        assert!(Severity::Light < Severity::Standard);
        assert!(Severity::Standard < Severity::Heavy);
        assert!(Severity::Heavy < Severity::Critical);
    }
}
