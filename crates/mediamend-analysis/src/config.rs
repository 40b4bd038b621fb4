//! Analysis thresholds and scan limits.

use serde::{Deserialize, Serialize};

/// Immutable analysis configuration, constructed once at startup and passed
/// by reference into every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Window searched for container signatures.
    pub container_scan_window: u64,
    /// Window searched for codec and audio signatures.
    pub codec_scan_window: u64,
    /// Maximum recorded occurrences per signature pattern.
    pub max_matches_per_pattern: usize,
    /// Read buffer for the stream unit scan.
    pub unit_scan_buffer: usize,
    /// Read chunk for the corruption detector.
    pub detector_chunk: usize,
    /// Consecutive zero bytes before a run counts as corruption.
    pub zero_run_threshold: u64,
    /// Valid regions smaller than this are discarded as fragment noise.
    pub min_valid_region: u64,
    /// Cap on tracked corrupted regions; past it the file is assumed to
    /// need the most severe recovery tier.
    pub max_regions: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            container_scan_window: 1024 * 1024,
            codec_scan_window: 10 * 1024 * 1024,
            max_matches_per_pattern: 5,
            unit_scan_buffer: 8 * 1024,
            detector_chunk: 1024 * 1024,
            zero_run_threshold: 1024,
            min_valid_region: 1024,
            max_regions: 4096,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.container_scan_window, 1024 * 1024);
        assert_eq!(cfg.codec_scan_window, 10 * 1024 * 1024);
        assert_eq!(cfg.max_matches_per_pattern, 5);
        assert_eq!(cfg.zero_run_threshold, 1024);
        assert_eq!(cfg.min_valid_region, 1024);
    }
}
