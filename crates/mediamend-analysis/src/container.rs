//! ISO-BMFF top-level structure walking.
//!
//! The walker records every top-level box with a validity flag instead of
//! bailing on the first bad length, so a damaged file still yields a usable
//! structural map. Other container families are not walked; they degrade to
//! "unknown structure" and the planner falls back to generic strategies.

use crate::Result;
use std::io::{Read, Seek, SeekFrom};

/// Four-character box type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoxType(pub [u8; 4]);

impl BoxType {
    pub const FTYP: Self = Self(*b"ftyp");
    pub const MOOV: Self = Self(*b"moov");
    pub const MDAT: Self = Self(*b"mdat");
    pub const MVHD: Self = Self(*b"mvhd");
    pub const TRAK: Self = Self(*b"trak");
    pub const FREE: Self = Self(*b"free");
    pub const SKIP: Self = Self(*b"skip");
    pub const WIDE: Self = Self(*b"wide");

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Get the 4-char code as a string.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }

    /// Padding boxes carry no payload that matters for repair.
    pub fn is_padding(&self) -> bool {
        matches!(*self, Self::FREE | Self::SKIP | Self::WIDE)
    }
}

impl std::fmt::Display for BoxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Minimum box size: 4-byte length plus 4-byte type.
pub const MIN_BOX_SIZE: u64 = 8;

/// Top-level boxes an MP4 needs to be playable.
pub const REQUIRED_TOP_LEVEL: [BoxType; 3] = [BoxType::FTYP, BoxType::MOOV, BoxType::MDAT];

/// One top-level box as found in the file.
#[derive(Debug, Clone)]
pub struct Block {
    /// Box type code.
    pub kind: BoxType,
    /// File offset of the box header.
    pub offset: u64,
    /// Declared total size including the header.
    pub size: u64,
    /// Header size (8, or 16 for the 64-bit extended form).
    pub header_size: u8,
    /// Whether the declared size fits the remaining file.
    pub is_valid: bool,
}

impl Block {
    /// Offset of the first payload byte.
    pub fn payload_offset(&self) -> u64 {
        self.offset + self.header_size as u64
    }

    /// Payload size (declared size minus header).
    pub fn payload_size(&self) -> u64 {
        self.size.saturating_sub(self.header_size as u64)
    }
}

/// Ordered top-level structure of a container.
#[derive(Debug, Clone, Default)]
pub struct ContainerMap {
    /// Blocks in file order (offsets non-decreasing).
    pub blocks: Vec<Block>,
}

impl ContainerMap {
    /// Number of valid blocks.
    pub fn valid_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_valid).count()
    }

    /// Number of invalid blocks.
    pub fn invalid_count(&self) -> usize {
        self.blocks.len() - self.valid_count()
    }

    /// First valid block of the given type.
    pub fn first_valid(&self, kind: BoxType) -> Option<&Block> {
        self.blocks.iter().find(|b| b.is_valid && b.kind == kind)
    }

    /// Whether a valid block of the given type exists.
    pub fn has_valid(&self, kind: BoxType) -> bool {
        self.first_valid(kind).is_some()
    }

    /// Required top-level boxes with no valid occurrence.
    pub fn missing_required(&self) -> Vec<BoxType> {
        REQUIRED_TOP_LEVEL
            .iter()
            .copied()
            .filter(|k| !self.has_valid(*k))
            .collect()
    }
}

/// Walk the top-level box structure.
///
/// At each position: read a 4-byte big-endian length and 4-byte type. A
/// length below [`MIN_BOX_SIZE`] or beyond the remaining file marks the block
/// invalid and the walk advances by [`MIN_BOX_SIZE`] to keep making forward
/// progress. The 64-bit extended form (`size == 1`) and the to-end-of-file
/// form (`size == 0`) are accepted as valid. Terminates once fewer than
/// [`MIN_BOX_SIZE`] bytes remain, after at most `len / 8 + 1` steps.
pub fn walk_boxes<R: Read + Seek>(reader: &mut R) -> Result<ContainerMap> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    let mut map = ContainerMap::default();
    let mut pos = 0u64;

    while pos + MIN_BOX_SIZE <= file_len {
        reader.seek(SeekFrom::Start(pos))?;
        let mut header = [0u8; 8];
        reader.read_exact(&mut header)?;

        let size32 = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let kind = BoxType::from_bytes([header[4], header[5], header[6], header[7]]);
        let remaining = file_len - pos;

        let (block, advance) = if size32 == 0 {
            // Box extends to end of file.
            (
                Block {
                    kind,
                    offset: pos,
                    size: remaining,
                    header_size: 8,
                    is_valid: true,
                },
                remaining,
            )
        } else if size32 == 1 {
            // 64-bit extended size.
            if remaining >= 16 {
                let mut ext = [0u8; 8];
                reader.read_exact(&mut ext)?;
                let size64 = u64::from_be_bytes(ext);
                if size64 >= 16 && size64 <= remaining {
                    (
                        Block {
                            kind,
                            offset: pos,
                            size: size64,
                            header_size: 16,
                            is_valid: true,
                        },
                        size64,
                    )
                } else {
                    (
                        Block {
                            kind,
                            offset: pos,
                            size: size64,
                            header_size: 16,
                            is_valid: false,
                        },
                        MIN_BOX_SIZE,
                    )
                }
            } else {
                (
                    Block {
                        kind,
                        offset: pos,
                        size: size32,
                        header_size: 8,
                        is_valid: false,
                    },
                    MIN_BOX_SIZE,
                )
            }
        } else if size32 < MIN_BOX_SIZE || size32 > remaining {
            (
                Block {
                    kind,
                    offset: pos,
                    size: size32,
                    header_size: 8,
                    is_valid: false,
                },
                MIN_BOX_SIZE,
            )
        } else {
            (
                Block {
                    kind,
                    offset: pos,
                    size: size32,
                    header_size: 8,
                    is_valid: true,
                },
                size32,
            )
        };

        map.blocks.push(block);
        pos += advance;
    }

    tracing::debug!(
        blocks = map.blocks.len(),
        valid = map.valid_count(),
        invalid = map.invalid_count(),
        "container walk complete"
    );

    Ok(map)
}

/// Check whether a recovered `moov` box is structurally sound enough to
/// reuse: a nested walk within its extent must find an `mvhd` and at least
/// one `trak` with sane sizes.
pub fn moov_checks_out<R: Read + Seek>(reader: &mut R, moov: &Block) -> Result<bool> {
    if !moov.is_valid || moov.kind != BoxType::MOOV {
        return Ok(false);
    }

    let end = moov.offset + moov.size;
    let mut pos = moov.payload_offset();
    let mut saw_mvhd = false;
    let mut saw_trak = false;

    while pos + MIN_BOX_SIZE <= end {
        reader.seek(SeekFrom::Start(pos))?;
        let mut header = [0u8; 8];
        reader.read_exact(&mut header)?;

        let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let kind = BoxType::from_bytes([header[4], header[5], header[6], header[7]]);

        if size < MIN_BOX_SIZE || pos + size > end {
            return Ok(false);
        }
        match kind {
            BoxType::MVHD => saw_mvhd = true,
            BoxType::TRAK => saw_trak = true,
            _ => {}
        }
        pos += size;
    }

    Ok(saw_mvhd && saw_trak)
}
