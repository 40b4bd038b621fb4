//! Corruption signature scanning and region algebra.
//!
//! One sequential pass over the file tracks two independent signatures: long
//! runs of zero bytes, and (for MP4 input) 4-byte-aligned length fields whose
//! value is a nonsensical nonzero size smaller than any legal box header. Raw
//! findings are then sorted and merged into disjoint regions, and the valid
//! regions are derived as the complement.

use crate::config::AnalysisConfig;
use crate::Result;
use serde::Serialize;
use std::io::Read;

/// What flagged a corrupted region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RegionKind {
    /// A run of zero bytes at least the threshold long.
    ZeroRun,
    /// An aligned length field with an impossible value.
    InvalidSizeField,
    /// Result of merging regions of different kinds.
    Mixed,
}

/// A contiguous damaged byte range, `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CorruptedRegion {
    pub start: u64,
    pub end: u64,
    pub kind: RegionKind,
}

impl CorruptedRegion {
    pub fn size(&self) -> u64 {
        self.end - self.start
    }
}

/// A contiguous undamaged byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidRegion {
    pub start: u64,
    pub end: u64,
}

impl ValidRegion {
    pub fn size(&self) -> u64 {
        self.end - self.start
    }
}

/// Outcome of the corruption scan: merged regions plus the truncation flag
/// set when the tracked-region cap was hit.
#[derive(Debug, Clone)]
pub struct CorruptionScan {
    /// Disjoint corrupted regions, sorted by start.
    pub regions: Vec<CorruptedRegion>,
    /// The scan stopped early because the region cap was reached. The file
    /// is then treated as requiring the most severe recovery tier.
    pub truncated: bool,
    /// Total file length the scan covered.
    pub file_len: u64,
}

impl CorruptionScan {
    /// Total damaged bytes across all regions.
    pub fn corrupted_bytes(&self) -> u64 {
        self.regions.iter().map(|r| r.size()).sum()
    }

    /// Damaged fraction of the file, in [0, 1].
    pub fn ratio(&self) -> f64 {
        if self.file_len == 0 {
            0.0
        } else {
            self.corrupted_bytes() as f64 / self.file_len as f64
        }
    }

    /// Complement of the corrupted regions over `[0, file_len)`, dropping
    /// fragments smaller than `min_size`.
    pub fn valid_regions(&self, min_size: u64) -> Vec<ValidRegion> {
        complement(&self.regions, self.file_len)
            .into_iter()
            .filter(|r| r.size() >= min_size)
            .collect()
    }
}

/// Scan the stream for corruption signatures and merge the findings.
///
/// `container_is_mp4` enables the length-field check, which is only
/// meaningful inside an ISO-BMFF structure.
pub fn scan_regions<R: Read>(
    mut reader: R,
    file_len: u64,
    container_is_mp4: bool,
    cfg: &AnalysisConfig,
) -> Result<CorruptionScan> {
    let threshold = cfg.zero_run_threshold.max(1);
    let mut chunk = vec![0u8; cfg.detector_chunk.max(4096)];
    let mut raw: Vec<CorruptedRegion> = Vec::new();
    let mut truncated = false;

    let mut pos: u64 = 0;
    let mut zero_count: u64 = 0;
    // Start of the recorded region once the threshold was crossed.
    let mut open_run: Option<u64> = None;

    'scan: loop {
        let n = read_some(&mut reader, &mut chunk)?;
        if n == 0 {
            break;
        }

        for (i, &byte) in chunk[..n].iter().enumerate() {
            let abs = pos + i as u64;
            if byte == 0 {
                zero_count += 1;
                if zero_count == threshold {
                    // The run began `threshold` bytes back; the region backs
                    // up one further threshold to cover the tail of whatever
                    // structure the run clobbered.
                    let run_start = abs + 1 - threshold;
                    open_run = Some(run_start.saturating_sub(threshold));
                }
            } else {
                if let Some(start) = open_run.take() {
                    raw.push(CorruptedRegion {
                        start,
                        end: abs,
                        kind: RegionKind::ZeroRun,
                    });
                    if raw.len() >= cfg.max_regions {
                        truncated = true;
                        break 'scan;
                    }
                }
                zero_count = 0;
            }
        }

        if container_is_mp4 {
            // Every 4-byte-aligned window is a candidate big-endian length
            // field; a nonzero value below the minimum header size cannot be
            // a real box. Alignment is relative to the file, not the chunk.
            let mut w = ((4 - (pos % 4) as usize) % 4).min(n);
            while w + 4 <= n {
                let value = u32::from_be_bytes([
                    chunk[w],
                    chunk[w + 1],
                    chunk[w + 2],
                    chunk[w + 3],
                ]);
                if value > 0 && value < 8 {
                    let start = pos + w as u64;
                    raw.push(CorruptedRegion {
                        start,
                        end: (start + 8).min(file_len),
                        kind: RegionKind::InvalidSizeField,
                    });
                    if raw.len() >= cfg.max_regions {
                        truncated = true;
                        break 'scan;
                    }
                }
                w += 4;
            }
        }

        pos += n as u64;
    }

    // A run still open at end of file closes there.
    if let Some(start) = open_run {
        raw.push(CorruptedRegion {
            start,
            end: file_len,
            kind: RegionKind::ZeroRun,
        });
    }

    let regions = merge_regions(raw);

    tracing::debug!(
        regions = regions.len(),
        truncated,
        corrupted_bytes = regions.iter().map(|r| r.size()).sum::<u64>(),
        "corruption scan complete"
    );

    Ok(CorruptionScan {
        regions,
        truncated,
        file_len,
    })
}

fn read_some<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    loop {
        match reader.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Sort raw findings and merge overlapping or touching ones.
///
/// The merged set is sorted, pairwise disjoint, and its union equals the
/// union of the input. Merging regions of different kinds yields
/// [`RegionKind::Mixed`]; same-kind neighbours keep their kind.
pub fn merge_regions(mut raw: Vec<CorruptedRegion>) -> Vec<CorruptedRegion> {
    raw.sort_by_key(|r| (r.start, r.end));

    let mut merged: Vec<CorruptedRegion> = Vec::with_capacity(raw.len());
    for region in raw {
        match merged.last_mut() {
            Some(prev) if region.start <= prev.end => {
                prev.end = prev.end.max(region.end);
                if prev.kind != region.kind {
                    prev.kind = RegionKind::Mixed;
                }
            }
            _ => merged.push(region),
        }
    }
    merged
}

/// Complement of a sorted, disjoint region set over `[0, len)`.
fn complement(regions: &[CorruptedRegion], len: u64) -> Vec<ValidRegion> {
    let mut out = Vec::new();
    let mut cursor = 0u64;
    for r in regions {
        let start = r.start.min(len);
        if start > cursor {
            out.push(ValidRegion {
                start: cursor,
                end: start,
            });
        }
        cursor = cursor.max(r.end.min(len));
    }
    if cursor < len {
        out.push(ValidRegion {
            start: cursor,
            end: len,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn region(start: u64, end: u64, kind: RegionKind) -> CorruptedRegion {
        CorruptedRegion { start, end, kind }
    }

    #[test]
    fn merge_is_sorted_and_disjoint() {
        let raw = vec![
            region(100, 200, RegionKind::ZeroRun),
            region(50, 120, RegionKind::InvalidSizeField),
            region(300, 310, RegionKind::ZeroRun),
            region(305, 400, RegionKind::ZeroRun),
        ];
        let merged = merge_regions(raw);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].start, 50);
        assert_eq!(merged[0].end, 200);
        assert_eq!(merged[0].kind, RegionKind::Mixed);
        assert_eq!(merged[1].start, 300);
        assert_eq!(merged[1].end, 400);
        assert_eq!(merged[1].kind, RegionKind::ZeroRun);
        for pair in merged.windows(2) {
            assert!(pair[0].end < pair[1].start);
        }
    }

    #[test]
    fn merge_preserves_union() {
        let raw = vec![
            region(0, 10, RegionKind::ZeroRun),
            region(10, 20, RegionKind::ZeroRun),
            region(40, 50, RegionKind::InvalidSizeField),
            region(45, 60, RegionKind::ZeroRun),
            region(60, 61, RegionKind::ZeroRun),
        ];
        let covered: u64 = merge_regions(raw).iter().map(|r| r.size()).sum();
        // [0,20) plus [40,61)
        assert_eq!(covered, 20 + 21);
    }

    #[test]
    fn complement_covers_file_exactly_once() {
        let regions = vec![
            region(10, 20, RegionKind::ZeroRun),
            region(50, 60, RegionKind::Mixed),
        ];
        let scan = CorruptionScan {
            regions,
            truncated: false,
            file_len: 100,
        };
        let valid = scan.valid_regions(0);
        assert_eq!(
            valid,
            vec![
                ValidRegion { start: 0, end: 10 },
                ValidRegion { start: 20, end: 50 },
                ValidRegion { start: 60, end: 100 },
            ]
        );
        let total: u64 = valid.iter().map(|r| r.size()).sum::<u64>()
            + scan.regions.iter().map(|r| r.size()).sum::<u64>();
        assert_eq!(total, 100);
    }

    #[test]
    fn complement_drops_small_fragments() {
        let regions = vec![region(512, 100_000, RegionKind::ZeroRun)];
        let scan = CorruptionScan {
            regions,
            truncated: false,
            file_len: 200_000,
        };
        let valid = scan.valid_regions(1024);
        // The 512-byte head fragment is below the threshold.
        assert_eq!(valid, vec![ValidRegion { start: 100_000, end: 200_000 }]);
    }

    #[test]
    fn zero_run_region_backs_up_one_threshold() {
        // 4 KiB of zeros at offset 10_000 in a 1_000_000-byte file.
        let mut data = vec![0x55u8; 1_000_000];
        for b in &mut data[10_000..14_096] {
            *b = 0;
        }
        let cfg = AnalysisConfig::default();
        let scan = scan_regions(Cursor::new(&data), data.len() as u64, false, &cfg).unwrap();
        assert_eq!(scan.regions.len(), 1);
        let r = &scan.regions[0];
        assert_eq!(r.start, 10_000 - 1024);
        assert_eq!(r.end, 14_096);
        assert_eq!(r.kind, RegionKind::ZeroRun);
        assert!(scan.ratio() < 0.01);
    }

    #[test]
    fn short_zero_runs_are_ignored() {
        let mut data = vec![0x55u8; 8192];
        for b in &mut data[100..1100] {
            *b = 0; // 1000 zeros, below the 1024 threshold
        }
        let cfg = AnalysisConfig::default();
        let scan = scan_regions(Cursor::new(&data), data.len() as u64, false, &cfg).unwrap();
        assert!(scan.regions.is_empty());
    }

    #[test]
    fn run_open_at_eof_closes_at_file_end() {
        let mut data = vec![0x55u8; 8192];
        for b in &mut data[4096..] {
            *b = 0;
        }
        let cfg = AnalysisConfig::default();
        let scan = scan_regions(Cursor::new(&data), data.len() as u64, false, &cfg).unwrap();
        assert_eq!(scan.regions.len(), 1);
        assert_eq!(scan.regions[0].end, 8192);
    }

    #[test]
    fn invalid_size_fields_flagged_for_mp4_only() {
        let mut data = vec![0x55u8; 4096];
        // A 4-byte-aligned big-endian value of 3: impossible box length.
        data[64] = 0;
        data[65] = 0;
        data[66] = 0;
        data[67] = 3;
        let cfg = AnalysisConfig::default();

        let scan = scan_regions(Cursor::new(&data), data.len() as u64, true, &cfg).unwrap();
        assert!(scan
            .regions
            .iter()
            .any(|r| r.start == 64 && r.end == 72 && r.kind == RegionKind::InvalidSizeField));

        let scan = scan_regions(Cursor::new(&data), data.len() as u64, false, &cfg).unwrap();
        assert!(scan.regions.is_empty());
    }

    #[test]
    fn region_cap_truncates_scan() {
        // Alternating zero runs and separators produce many distinct regions.
        let threshold = 16;
        let cfg = AnalysisConfig {
            zero_run_threshold: threshold,
            max_regions: 4,
            ..AnalysisConfig::default()
        };
        let mut data = Vec::new();
        for _ in 0..10 {
            data.extend(std::iter::repeat(0u8).take(threshold as usize * 4));
            data.extend(std::iter::repeat(0x55u8).take(threshold as usize * 4));
        }
        let scan = scan_regions(Cursor::new(&data), data.len() as u64, false, &cfg).unwrap();
        assert!(scan.truncated);
        assert!(scan.regions.len() <= 4);
    }
}
