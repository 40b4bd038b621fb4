//! Byte-signature detection for containers and elementary-stream codecs.
//!
//! Scans bounded windows at the start of the file for known magic bytes and
//! elects the most plausible container and codec from the evidence. A file may
//! match several categories at once (an MP4 wrapping H.264 and AAC matches
//! three); the declared container is the one with the most distinct
//! sub-signatures found.

use crate::config::AnalysisConfig;
use crate::{MediaFile, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Read;

/// Known container families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ContainerKind {
    /// ISO Base Media File Format (MP4/MOV family).
    Mp4,
    /// Matroska / WebM (EBML).
    Matroska,
    /// RIFF/AVI.
    Avi,
}

impl ContainerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::Mp4 => "mp4",
            ContainerKind::Matroska => "matroska",
            ContainerKind::Avi => "avi",
        }
    }
}

/// Known elementary video codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VideoCodec {
    H264,
    H265,
    Mpeg2,
    Mpeg4Part2,
}

impl VideoCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "h264",
            VideoCodec::H265 => "h265",
            VideoCodec::Mpeg2 => "mpeg2",
            VideoCodec::Mpeg4Part2 => "mpeg4",
        }
    }
}

/// Known audio codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AudioCodec {
    Aac,
    Mp3,
}

impl AudioCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioCodec::Aac => "aac",
            AudioCodec::Mp3 => "mp3",
        }
    }
}

/// What a signature identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignatureKind {
    Container(ContainerKind),
    Video(VideoCodec),
    Audio(AudioCodec),
}

/// One matched signature occurrence.
#[derive(Debug, Clone, Serialize)]
pub struct SignatureMatch {
    /// What the pattern identifies.
    pub kind: SignatureKind,
    /// Short label of the sub-signature (e.g. "ftyp", "sps").
    pub label: &'static str,
    /// Byte offset of the match.
    pub offset: u64,
    /// The matched pattern bytes.
    pub pattern: &'static [u8],
}

struct Signature {
    kind: SignatureKind,
    label: &'static str,
    pattern: &'static [u8],
}

/// Container signatures. Each family has several distinct sub-signatures so
/// that a lone coincidental hit does not win the election.
const CONTAINER_SIGNATURES: &[Signature] = &[
    Signature {
        kind: SignatureKind::Container(ContainerKind::Mp4),
        label: "ftyp",
        pattern: b"ftyp",
    },
    Signature {
        kind: SignatureKind::Container(ContainerKind::Mp4),
        label: "moov",
        pattern: b"moov",
    },
    Signature {
        kind: SignatureKind::Container(ContainerKind::Mp4),
        label: "mdat",
        pattern: b"mdat",
    },
    Signature {
        kind: SignatureKind::Container(ContainerKind::Matroska),
        label: "ebml",
        pattern: &[0x1A, 0x45, 0xDF, 0xA3],
    },
    Signature {
        kind: SignatureKind::Container(ContainerKind::Matroska),
        label: "segment",
        pattern: &[0x18, 0x53, 0x80, 0x67],
    },
    Signature {
        kind: SignatureKind::Container(ContainerKind::Matroska),
        label: "doctype",
        pattern: b"matroska",
    },
    Signature {
        kind: SignatureKind::Container(ContainerKind::Avi),
        label: "riff",
        pattern: b"RIFF",
    },
    Signature {
        kind: SignatureKind::Container(ContainerKind::Avi),
        label: "avi",
        pattern: b"AVI ",
    },
    Signature {
        kind: SignatureKind::Container(ContainerKind::Avi),
        label: "list",
        pattern: b"LIST",
    },
];

/// Annex-B start codes followed by a codec-identifying header byte.
const VIDEO_SIGNATURES: &[Signature] = &[
    Signature {
        kind: SignatureKind::Video(VideoCodec::H264),
        label: "sps",
        pattern: &[0x00, 0x00, 0x00, 0x01, 0x67],
    },
    Signature {
        kind: SignatureKind::Video(VideoCodec::H264),
        label: "pps",
        pattern: &[0x00, 0x00, 0x00, 0x01, 0x68],
    },
    Signature {
        kind: SignatureKind::Video(VideoCodec::H264),
        label: "idr",
        pattern: &[0x00, 0x00, 0x00, 0x01, 0x65],
    },
    Signature {
        kind: SignatureKind::Video(VideoCodec::H265),
        label: "vps",
        pattern: &[0x00, 0x00, 0x00, 0x01, 0x40, 0x01],
    },
    Signature {
        kind: SignatureKind::Video(VideoCodec::H265),
        label: "sps",
        pattern: &[0x00, 0x00, 0x00, 0x01, 0x42, 0x01],
    },
    Signature {
        kind: SignatureKind::Video(VideoCodec::H265),
        label: "pps",
        pattern: &[0x00, 0x00, 0x00, 0x01, 0x44, 0x01],
    },
    Signature {
        kind: SignatureKind::Video(VideoCodec::Mpeg2),
        label: "seq-header",
        pattern: &[0x00, 0x00, 0x01, 0xB3],
    },
    Signature {
        kind: SignatureKind::Video(VideoCodec::Mpeg2),
        label: "gop-header",
        pattern: &[0x00, 0x00, 0x01, 0xB8],
    },
    Signature {
        kind: SignatureKind::Video(VideoCodec::Mpeg4Part2),
        label: "vos",
        pattern: &[0x00, 0x00, 0x01, 0xB0],
    },
    Signature {
        kind: SignatureKind::Video(VideoCodec::Mpeg4Part2),
        label: "vop",
        pattern: &[0x00, 0x00, 0x01, 0xB6],
    },
];

const AUDIO_SIGNATURES: &[Signature] = &[
    Signature {
        kind: SignatureKind::Audio(AudioCodec::Aac),
        label: "adts",
        pattern: &[0xFF, 0xF1],
    },
    Signature {
        kind: SignatureKind::Audio(AudioCodec::Aac),
        label: "adts-mpeg2",
        pattern: &[0xFF, 0xF9],
    },
    Signature {
        kind: SignatureKind::Audio(AudioCodec::Mp3),
        label: "id3",
        pattern: b"ID3",
    },
    Signature {
        kind: SignatureKind::Audio(AudioCodec::Mp3),
        label: "frame-sync",
        pattern: &[0xFF, 0xFB],
    },
];

/// Outcome of the signature scan.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// All recorded matches, in table order.
    pub matches: Vec<SignatureMatch>,
    /// Elected container, if any signature family matched.
    pub container: Option<ContainerKind>,
    /// Elected video codec, if any.
    pub video_codec: Option<VideoCodec>,
    /// Elected audio codec, if any.
    pub audio_codec: Option<AudioCodec>,
}

impl ScanReport {
    /// First match offset for a given audio codec, used by stream extraction
    /// to locate the start of the raw audio bitstream.
    pub fn first_audio_offset(&self) -> Option<u64> {
        let codec = self.audio_codec?;
        self.matches
            .iter()
            .filter(|m| m.kind == SignatureKind::Audio(codec))
            .map(|m| m.offset)
            .min()
    }
}

/// Scan the file's leading windows for known signatures.
///
/// Container signatures are searched within the first
/// [`AnalysisConfig::container_scan_window`] bytes, codec and audio
/// signatures within the first [`AnalysisConfig::codec_scan_window`] bytes.
/// At most [`AnalysisConfig::max_matches_per_pattern`] occurrences are
/// recorded per pattern.
pub fn scan_signatures(file: &MediaFile, cfg: &AnalysisConfig) -> Result<ScanReport> {
    let window_len = cfg.codec_scan_window.min(file.len) as usize;
    let mut window = vec![0u8; window_len];
    let mut reader = file.reader()?;
    read_fully(&mut reader, &mut window)?;

    let container_window = &window[..(cfg.container_scan_window.min(file.len) as usize)];

    let mut matches = Vec::new();
    collect_matches(
        container_window,
        CONTAINER_SIGNATURES,
        cfg.max_matches_per_pattern,
        &mut matches,
    );
    collect_matches(&window, VIDEO_SIGNATURES, cfg.max_matches_per_pattern, &mut matches);
    collect_matches(&window, AUDIO_SIGNATURES, cfg.max_matches_per_pattern, &mut matches);

    let container = elect(&matches, |k| match k {
        SignatureKind::Container(c) => Some(c),
        _ => None,
    });
    let video_codec = elect(&matches, |k| match k {
        SignatureKind::Video(v) => Some(v),
        _ => None,
    });
    let audio_codec = elect(&matches, |k| match k {
        SignatureKind::Audio(a) => Some(a),
        _ => None,
    });

    tracing::debug!(
        matches = matches.len(),
        container = container.map(|c| c.as_str()),
        video = video_codec.map(|c| c.as_str()),
        audio = audio_codec.map(|c| c.as_str()),
        "signature scan complete"
    );

    Ok(ScanReport {
        matches,
        container,
        video_codec,
        audio_codec,
    })
}

/// Read as many bytes as the source provides, tolerating short reads at EOF.
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(())
}

fn collect_matches(
    window: &[u8],
    table: &'static [Signature],
    max_per_pattern: usize,
    out: &mut Vec<SignatureMatch>,
) {
    for sig in table {
        let mut found = 0;
        let mut from = 0;
        while found < max_per_pattern && from + sig.pattern.len() <= window.len() {
            match find_pattern(&window[from..], sig.pattern) {
                Some(rel) => {
                    let offset = from + rel;
                    out.push(SignatureMatch {
                        kind: sig.kind,
                        label: sig.label,
                        offset: offset as u64,
                        pattern: sig.pattern,
                    });
                    found += 1;
                    from = offset + 1;
                }
                None => break,
            }
        }
    }
}

fn find_pattern(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Elect the kind with the most distinct matched sub-signatures; ties break
/// toward the earliest first match.
fn elect<K: Copy + Eq + std::hash::Hash>(
    matches: &[SignatureMatch],
    select: impl Fn(SignatureKind) -> Option<K>,
) -> Option<K> {
    let mut evidence: HashMap<K, (std::collections::HashSet<&'static str>, u64)> = HashMap::new();
    for m in matches {
        if let Some(key) = select(m.kind) {
            let entry = evidence
                .entry(key)
                .or_insert_with(|| (std::collections::HashSet::new(), u64::MAX));
            entry.0.insert(m.label);
            entry.1 = entry.1.min(m.offset);
        }
    }
    evidence
        .into_iter()
        .max_by(|(_, (a_labels, a_off)), (_, (b_labels, b_off))| {
            a_labels
                .len()
                .cmp(&b_labels.len())
                .then(b_off.cmp(a_off))
        })
        .map(|(k, _)| k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn scan_bytes(data: &[u8]) -> ScanReport {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        let media = MediaFile::open(file.path()).unwrap();
        scan_signatures(&media, &AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn detects_mp4_with_full_evidence() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0, 0, 0, 20]);
        data.extend_from_slice(b"ftypisom");
        data.extend_from_slice(&[0u8; 8]);
        data.extend_from_slice(&[0, 0, 0, 16]);
        data.extend_from_slice(b"moov");
        data.extend_from_slice(&[0u8; 8]);
        data.extend_from_slice(&[0, 0, 0, 16]);
        data.extend_from_slice(b"mdat");
        data.extend_from_slice(&[0u8; 8]);

        let report = scan_bytes(&data);
        assert_eq!(report.container, Some(ContainerKind::Mp4));
    }

    #[test]
    fn lone_ftyp_loses_to_matroska_with_more_evidence() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0x1A, 0x45, 0xDF, 0xA3]);
        data.extend_from_slice(b"matroska");
        data.extend_from_slice(&[0x18, 0x53, 0x80, 0x67]);
        data.extend_from_slice(b"ftyp");

        let report = scan_bytes(&data);
        assert_eq!(report.container, Some(ContainerKind::Matroska));
    }

    #[test]
    fn detects_h264_and_aac() {
        let mut data = vec![0x11u8; 32];
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x67, 0x64]);
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x68, 0xEE]);
        data.extend_from_slice(&[0xFF, 0xF1, 0x50, 0x80]);

        let report = scan_bytes(&data);
        assert_eq!(report.video_codec, Some(VideoCodec::H264));
        assert_eq!(report.audio_codec, Some(AudioCodec::Aac));
        assert_eq!(report.container, None);
    }

    #[test]
    fn no_signatures_leaves_everything_undetermined() {
        let report = scan_bytes(&[0x11u8; 256]);
        assert!(report.matches.is_empty());
        assert_eq!(report.container, None);
        assert_eq!(report.video_codec, None);
        assert_eq!(report.audio_codec, None);
    }

    #[test]
    fn match_count_is_capped_per_pattern() {
        let mut data = Vec::new();
        for _ in 0..20 {
            data.extend_from_slice(b"mdatXXXX");
        }
        let report = scan_bytes(&data);
        let mdat_matches = report
            .matches
            .iter()
            .filter(|m| m.label == "mdat")
            .count();
        assert_eq!(mdat_matches, AnalysisConfig::default().max_matches_per_pattern);
    }

    #[test]
    fn first_audio_offset_points_at_earliest_sync() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0x11; 100]);
        data.extend_from_slice(&[0xFF, 0xF1, 0x4C, 0x80]);
        data.extend_from_slice(&[0x11; 50]);
        data.extend_from_slice(&[0xFF, 0xF1, 0x4C, 0x80]);
        let report = scan_bytes(&data);
        assert_eq!(report.first_audio_offset(), Some(100));
    }
}
