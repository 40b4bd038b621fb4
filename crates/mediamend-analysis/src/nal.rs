//! Start-code-delimited stream unit scanning for H.264/H.265.
//!
//! The file is read in fixed-size chunks; consecutive chunks overlap by a few
//! bytes so a start code split across a read boundary is still seen whole,
//! together with its type byte. Unit sizes are derived afterwards from the
//! deltas between consecutive offsets.

use crate::config::AnalysisConfig;
use crate::signature::VideoCodec;
use crate::Result;
use std::io::Read;

/// Elementary-stream codecs the unit scanner understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum StreamCodec {
    H264,
    H265,
}

impl StreamCodec {
    /// Map a detected video codec to a scannable stream codec.
    pub fn from_video(codec: VideoCodec) -> Option<Self> {
        match codec {
            VideoCodec::H264 => Some(StreamCodec::H264),
            VideoCodec::H265 => Some(StreamCodec::H265),
            _ => None,
        }
    }

    /// Extract the unit-type field from the byte following the start code.
    pub fn unit_type(&self, header_byte: u8) -> u8 {
        match self {
            StreamCodec::H264 => header_byte & 0x1F,
            StreamCodec::H265 => (header_byte >> 1) & 0x3F,
        }
    }

    /// File extension for a raw elementary stream of this codec.
    pub fn raw_extension(&self) -> &'static str {
        match self {
            StreamCodec::H264 => "h264",
            StreamCodec::H265 => "h265",
        }
    }
}

// H.264 unit types.
const H264_IDR: u8 = 5;
const H264_SPS: u8 = 7;
const H264_PPS: u8 = 8;

// H.265 unit types.
const H265_IRAP_FIRST: u8 = 16;
const H265_IRAP_LAST: u8 = 21;
const H265_VPS: u8 = 32;
const H265_SPS: u8 = 33;
const H265_PPS: u8 = 34;

/// One start-code-delimited access unit.
#[derive(Debug, Clone)]
pub struct StreamUnit {
    /// File offset of the start code.
    pub offset: u64,
    /// Start code length (3 or 4 bytes).
    pub start_code_len: u8,
    /// Codec-specific unit type tag.
    pub unit_type: u8,
    /// Total size: delta to the next unit's offset, or to end of file for
    /// the last unit.
    pub size: u64,
}

impl StreamUnit {
    /// Whether this unit anchors a decodable group of pictures.
    pub fn is_keyframe(&self, codec: StreamCodec) -> bool {
        match codec {
            StreamCodec::H264 => self.unit_type == H264_IDR,
            StreamCodec::H265 => {
                (H265_IRAP_FIRST..=H265_IRAP_LAST).contains(&self.unit_type)
            }
        }
    }

    /// Whether this is a parameter-set unit decoders need up front.
    pub fn is_parameter_set(&self, codec: StreamCodec) -> bool {
        match codec {
            StreamCodec::H264 => matches!(self.unit_type, H264_SPS | H264_PPS),
            StreamCodec::H265 => matches!(self.unit_type, H265_VPS | H265_SPS | H265_PPS),
        }
    }

    /// Whether this unit carries coded picture data.
    pub fn is_coded_picture(&self, codec: StreamCodec) -> bool {
        match codec {
            StreamCodec::H264 => (1..=5).contains(&self.unit_type),
            StreamCodec::H265 => self.unit_type <= H265_IRAP_LAST,
        }
    }

    /// Sequence parameter set marker.
    pub fn is_sps(&self, codec: StreamCodec) -> bool {
        match codec {
            StreamCodec::H264 => self.unit_type == H264_SPS,
            StreamCodec::H265 => self.unit_type == H265_SPS,
        }
    }

    /// Picture parameter set marker.
    pub fn is_pps(&self, codec: StreamCodec) -> bool {
        match codec {
            StreamCodec::H264 => self.unit_type == H264_PPS,
            StreamCodec::H265 => self.unit_type == H265_PPS,
        }
    }
}

/// Bytes kept from the previous chunk: one more than the longest start code,
/// so a split code is rescanned with its leading zero and type byte in view.
const CHUNK_OVERLAP: usize = 4;

/// Scan the whole stream for start codes and classify each unit.
///
/// `file_len` is used to size the final unit. Offsets in the result are
/// strictly increasing and every size is the delta to the next offset.
pub fn scan_units<R: Read>(
    mut reader: R,
    file_len: u64,
    codec: StreamCodec,
    cfg: &AnalysisConfig,
) -> Result<Vec<StreamUnit>> {
    let chunk_size = cfg.unit_scan_buffer.max(CHUNK_OVERLAP * 2);
    let mut chunk = vec![0u8; chunk_size];
    let mut window: Vec<u8> = Vec::with_capacity(chunk_size + CHUNK_OVERLAP);
    let mut base: u64 = 0;
    let mut units: Vec<StreamUnit> = Vec::new();

    loop {
        let n = read_some(&mut reader, &mut chunk)?;
        if n == 0 {
            break;
        }
        window.extend_from_slice(&chunk[..n]);

        scan_window(&window, base, codec, &mut units);

        let keep = window.len().min(CHUNK_OVERLAP);
        let drop = window.len() - keep;
        window.drain(..drop);
        base += drop as u64;
    }

    // Sizes from consecutive offsets; the last unit runs to end of file.
    let count = units.len();
    for i in 0..count {
        let next_offset = if i + 1 < count {
            units[i + 1].offset
        } else {
            file_len
        };
        units[i].size = next_offset.saturating_sub(units[i].offset);
    }

    tracing::debug!(units = count, codec = ?codec, "stream unit scan complete");

    Ok(units)
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

fn scan_window(window: &[u8], base: u64, codec: StreamCodec, units: &mut Vec<StreamUnit>) {
    if window.len() < 4 {
        return;
    }
    // Stop early enough that the type byte at p + 3 is always in view; a
    // code at the very tail is rescanned via the carried overlap.
    for p in 0..window.len() - 3 {
        if window[p] != 0 || window[p + 1] != 0 || window[p + 2] != 1 {
            continue;
        }
        // A match flush with the window start sits entirely inside the
        // carried overlap and was fully scanned by the previous window.
        if p == 0 && base > 0 {
            continue;
        }
        let four_byte = p > 0 && window[p - 1] == 0;
        let start_code_len: u8 = if four_byte { 4 } else { 3 };
        let offset = base + p as u64 - if four_byte { 1 } else { 0 };

        // Overlapping windows rescan a few bytes; offsets are strictly
        // increasing, so anything at or before the last record is a repeat.
        if units.last().is_some_and(|u| offset <= u.offset) {
            continue;
        }

        units.push(StreamUnit {
            offset,
            start_code_len,
            unit_type: codec.unit_type(window[p + 3]),
            size: 0,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn h264_unit(start_code: &[u8], unit_type: u8, payload_len: usize) -> Vec<u8> {
        let mut out = start_code.to_vec();
        out.push(unit_type); // nal_ref_idc bits zero, type in the low five
        out.extend(std::iter::repeat(0xAA).take(payload_len));
        out
    }

    fn scan(data: &[u8], codec: StreamCodec, buffer: usize) -> Vec<StreamUnit> {
        let cfg = AnalysisConfig {
            unit_scan_buffer: buffer,
            ..AnalysisConfig::default()
        };
        scan_units(Cursor::new(data), data.len() as u64, codec, &cfg).unwrap()
    }

    #[test]
    fn finds_units_and_sizes_from_offset_deltas() {
        let mut data = Vec::new();
        data.extend(h264_unit(&[0, 0, 0, 1], 7, 10)); // SPS, 15 bytes total
        data.extend(h264_unit(&[0, 0, 0, 1], 8, 4)); // PPS, 9 bytes total
        data.extend(h264_unit(&[0, 0, 1], 5, 20)); // IDR, 24 bytes total

        let units = scan(&data, StreamCodec::H264, 8192);
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].unit_type, 7);
        assert_eq!(units[0].size, 15);
        assert_eq!(units[1].unit_type, 8);
        assert_eq!(units[1].size, 9);
        assert_eq!(units[2].unit_type, 5);
        assert_eq!(units[2].start_code_len, 3);
        assert_eq!(units[2].size, data.len() as u64 - units[2].offset);
    }

    #[test]
    fn offsets_strictly_increase() {
        let mut data = Vec::new();
        for t in [7u8, 8, 5, 1, 1, 5, 1] {
            data.extend(h264_unit(&[0, 0, 0, 1], t, 13));
        }
        let units = scan(&data, StreamCodec::H264, 8192);
        assert_eq!(units.len(), 7);
        for pair in units.windows(2) {
            assert!(pair[0].offset < pair[1].offset);
        }
    }

    #[test]
    fn start_code_straddling_buffer_boundary_is_found() {
        // Tiny buffer forces the start codes across many read boundaries.
        let mut data = Vec::new();
        data.extend(h264_unit(&[0, 0, 0, 1], 7, 29));
        data.extend(h264_unit(&[0, 0, 0, 1], 5, 61));
        data.extend(h264_unit(&[0, 0, 1], 1, 17));

        for buffer in [8, 9, 16, 31] {
            let units = scan(&data, StreamCodec::H264, buffer);
            let reference = scan(&data, StreamCodec::H264, 8192);
            assert_eq!(units.len(), reference.len(), "buffer={buffer}");
            for (a, b) in units.iter().zip(&reference) {
                assert_eq!(a.offset, b.offset, "buffer={buffer}");
                assert_eq!(a.unit_type, b.unit_type, "buffer={buffer}");
            }
        }
    }

    #[test]
    fn h265_unit_types_use_six_bit_field() {
        let mut data = Vec::new();
        // H.265 NAL header: type in bits 6..1 of the first byte.
        data.extend_from_slice(&[0, 0, 0, 1, 33 << 1, 0x01]); // SPS
        data.extend_from_slice(&[0xBB; 10]);
        data.extend_from_slice(&[0, 0, 0, 1, 19 << 1, 0x01]); // IDR_W_RADL
        data.extend_from_slice(&[0xBB; 10]);

        let units = scan(&data, StreamCodec::H265, 8192);
        assert_eq!(units.len(), 2);
        assert!(units[0].is_sps(StreamCodec::H265));
        assert!(units[1].is_keyframe(StreamCodec::H265));
    }

    #[test]
    fn no_start_codes_yields_no_units() {
        let data = vec![0xAAu8; 4096];
        let units = scan(&data, StreamCodec::H264, 8192);
        assert!(units.is_empty());
    }

    #[test]
    fn classification_helpers() {
        let sps = StreamUnit {
            offset: 0,
            start_code_len: 4,
            unit_type: 7,
            size: 10,
        };
        let idr = StreamUnit {
            offset: 10,
            start_code_len: 4,
            unit_type: 5,
            size: 10,
        };
        assert!(sps.is_parameter_set(StreamCodec::H264));
        assert!(!sps.is_keyframe(StreamCodec::H264));
        assert!(idr.is_keyframe(StreamCodec::H264));
        assert!(idr.is_coded_picture(StreamCodec::H264));
    }
}
