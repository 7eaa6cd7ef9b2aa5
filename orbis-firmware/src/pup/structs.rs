use core::fmt;
use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use enumflags2::{BitFlags, bitflags};

use super::errors::PupError;

/// PUP magic, stored little-endian (`4F 15 3D 1D` on disk).
pub const PUP_MAGIC: u32 = 0x1D3D_154F;
pub const PUP_VERSION: u8 = 0;
pub const PUP_MODE: u8 = 1;
pub const PUP_ENDIAN_LITTLE: u8 = 1;
pub const PUP_ATTR: u8 = 0x12;

pub const PUP_HEADER_SIZE: usize = 0x10;
pub const PUP_HEADER_EX_SIZE: usize = 0x10;
pub const PUP_SEGMENT_ENTRY_SIZE: usize = 0x20;
pub const PUP_SEGMENT_META_SIZE: usize = 0x20;
pub const PUP_DIGEST_SIZE: usize = 0x20;
pub const PUP_EXTENT_SIZE: usize = 0x08;

/// Feature flags carried in [`PupHeader::flags`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[bitflags]
#[repr(u16)]
pub enum PupHeaderFlag {
    Jig = 0x0001,
}

/// Bits of [`PupSegmentEntry::flags`] that describe how a segment is stored.
///
/// The id (bits 20..) and the block size exponent (bits 12..16) live in the
/// same word and are ignored by this type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[bitflags]
#[repr(u64)]
pub enum PupSegmentFlag {
    Info = 0x0000_0001,
    Encrypted = 0x0000_0002,
    Signed = 0x0000_0004,
    Compressed = 0x0000_0008,
    Blocked = 0x0000_0800,
    Digests = 0x0001_0000,
    Extents = 0x0002_0000,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PupHeader {
    pub magic: u32,
    pub version: u8,
    pub mode: u8,
    pub endian: u8,
    pub attr: u8,
    pub key_type: u16,
    pub flags: u16,
    /// Size of the header plus the encrypted extended header and entry table.
    pub hdr_size: u16,
    /// Size of the encrypted segment meta table.
    pub meta_size: u16,
}

impl PupHeader {
    pub fn load_from_reader<R: Read>(reader: &mut R) -> Result<Self, std::io::Error> {
        let magic = reader.read_u32::<LittleEndian>()?;
        let version = reader.read_u8()?;
        let mode = reader.read_u8()?;
        let endian = reader.read_u8()?;
        let attr = reader.read_u8()?;
        let key_type = reader.read_u16::<LittleEndian>()?;
        let flags = reader.read_u16::<LittleEndian>()?;
        let hdr_size = reader.read_u16::<LittleEndian>()?;
        let meta_size = reader.read_u16::<LittleEndian>()?;

        Ok(Self {
            magic,
            version,
            mode,
            endian,
            attr,
            key_type,
            flags,
            hdr_size,
            meta_size,
        })
    }

    #[must_use]
    pub fn flags_bits(&self) -> BitFlags<PupHeaderFlag> {
        BitFlags::from_bits_truncate(self.flags)
    }

    /// Check the fixed fields and reject feature flags we cannot handle.
    pub fn validate(&self) -> Result<(), PupError> {
        if self.magic != PUP_MAGIC {
            return Err(PupError::InvalidMagic);
        }

        let expected = [
            ("version", self.version, PUP_VERSION),
            ("mode", self.mode, PUP_MODE),
            ("endian", self.endian, PUP_ENDIAN_LITTLE),
            ("attr", self.attr, PUP_ATTR),
        ];
        for (field, actual, wanted) in expected {
            if actual != wanted {
                return Err(PupError::InvalidHeader(format!(
                    "{field} is {actual:#x}, expected {wanted:#x}"
                )));
            }
        }

        if self.flags_bits().contains(PupHeaderFlag::Jig) {
            return Err(PupError::UnsupportedFeature("JIG flag"));
        }

        if usize::from(self.hdr_size) < PUP_HEADER_SIZE {
            return Err(PupError::InvalidHeader(format!(
                "hdr_size {:#x} is smaller than the header itself",
                self.hdr_size
            )));
        }

        Ok(())
    }
}

impl fmt::Display for PupHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PupHeader(magic={:#010x}, version={}, mode={}, endian={}, attr={:#x}, flags={:#x}, hdr_size={:#x}, meta_size={:#x})",
            self.magic,
            self.version,
            self.mode,
            self.endian,
            self.attr,
            self.flags,
            self.hdr_size,
            self.meta_size
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PupHeaderEx {
    pub file_size: u64,
    pub segment_count: u16,
    pub unk1a: u16,
    pub unk1c: u32,
}

impl PupHeaderEx {
    pub fn load_from_bytes(data: &[u8]) -> Result<Self, PupError> {
        ensure_len("extended header", data, PUP_HEADER_EX_SIZE)?;

        let mut cursor = Cursor::new(data);
        let file_size = cursor.read_u64::<LittleEndian>()?;
        let segment_count = cursor.read_u16::<LittleEndian>()?;
        let unk1a = cursor.read_u16::<LittleEndian>()?;
        let unk1c = cursor.read_u32::<LittleEndian>()?;

        Ok(Self {
            file_size,
            segment_count,
            unk1a,
            unk1c,
        })
    }
}

/// Storage properties of a segment, spelled out as plain booleans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PupSegmentCaps {
    pub is_blocked: bool,
    pub is_info: bool,
    pub is_encrypted: bool,
    pub is_compressed: bool,
    pub is_signed: bool,
    pub has_digests: bool,
    pub has_extents: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PupSegmentEntry {
    pub flags: u64,
    pub offset: u64,
    pub file_size: u64,
    pub memory_size: u64,
}

impl PupSegmentEntry {
    pub fn load_from_bytes(data: &[u8]) -> Result<Self, PupError> {
        ensure_len("segment entry", data, PUP_SEGMENT_ENTRY_SIZE)?;

        let mut cursor = Cursor::new(data);
        let flags = cursor.read_u64::<LittleEndian>()?;
        let offset = cursor.read_u64::<LittleEndian>()?;
        let file_size = cursor.read_u64::<LittleEndian>()?;
        let memory_size = cursor.read_u64::<LittleEndian>()?;

        Ok(Self {
            flags,
            offset,
            file_size,
            memory_size,
        })
    }

    #[must_use]
    pub fn flags_bits(&self) -> BitFlags<PupSegmentFlag> {
        BitFlags::from_bits_truncate(self.flags)
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.flags >> 20
    }

    #[must_use]
    pub fn is_info(&self) -> bool {
        self.flags_bits().contains(PupSegmentFlag::Info)
    }

    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.flags_bits().contains(PupSegmentFlag::Encrypted)
    }

    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.flags_bits().contains(PupSegmentFlag::Signed)
    }

    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.flags_bits().contains(PupSegmentFlag::Compressed)
    }

    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.flags_bits().contains(PupSegmentFlag::Blocked)
    }

    #[must_use]
    pub fn has_digests(&self) -> bool {
        self.flags_bits().contains(PupSegmentFlag::Digests)
    }

    #[must_use]
    pub fn has_extents(&self) -> bool {
        self.flags_bits().contains(PupSegmentFlag::Extents)
    }

    #[must_use]
    pub fn caps(&self) -> PupSegmentCaps {
        PupSegmentCaps {
            is_blocked: self.is_blocked(),
            is_info: self.is_info(),
            is_encrypted: self.is_encrypted(),
            is_compressed: self.is_compressed(),
            is_signed: self.is_signed(),
            has_digests: self.has_digests(),
            has_extents: self.has_extents(),
        }
    }

    /// Plaintext size of one block: `1 << (12 + exponent)`, 4 KiB minimum.
    #[must_use]
    pub const fn block_size(&self) -> u64 {
        1 << (12 + ((self.flags >> 12) & 0xF))
    }

    #[must_use]
    pub const fn block_count(&self) -> u64 {
        self.file_size.div_ceil(self.block_size())
    }
}

impl fmt::Display for PupSegmentEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PupSegmentEntry(id={:#x}, flags={:#x}, offset={:#x}, file_size={:#x}, memory_size={:#x})",
            self.id(),
            self.flags,
            self.offset,
            self.file_size,
            self.memory_size
        )
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PupSegmentMeta {
    pub data_key: [u8; 16],
    pub data_iv: [u8; 16],
}

impl PupSegmentMeta {
    pub fn load_from_bytes(data: &[u8]) -> Result<Self, PupError> {
        ensure_len("segment meta", data, PUP_SEGMENT_META_SIZE)?;

        let mut data_key = [0u8; 16];
        let mut data_iv = [0u8; 16];
        data_key.copy_from_slice(&data[0..16]);
        data_iv.copy_from_slice(&data[16..32]);

        Ok(Self { data_key, data_iv })
    }
}

// Key material stays out of debug output.
impl fmt::Debug for PupSegmentMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PupSegmentMeta").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PupDigest(pub [u8; PUP_DIGEST_SIZE]);

impl PupDigest {
    pub fn load_from_reader<R: Read>(reader: &mut R) -> Result<Self, std::io::Error> {
        let mut digest = [0u8; PUP_DIGEST_SIZE];
        reader.read_exact(&mut digest)?;
        Ok(Self(digest))
    }
}

/// Location of one stored block, relative to the owning segment's offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PupExtent {
    pub offset: u32,
    pub size: u32,
}

impl PupExtent {
    pub fn load_from_reader<R: Read>(reader: &mut R) -> Result<Self, std::io::Error> {
        let offset = reader.read_u32::<LittleEndian>()?;
        let size = reader.read_u32::<LittleEndian>()?;
        Ok(Self { offset, size })
    }

    /// Length of the compressed stream inside this extent.
    ///
    /// The stored size is padded to the cipher block size and the low nibble
    /// carries the pad length, so the stream is `aligned - pad` bytes long.
    #[must_use]
    pub const fn compressed_size(&self) -> Option<u32> {
        (self.size & !0xF).checked_sub(self.size & 0xF)
    }
}

impl fmt::Display for PupExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PupExtent(offset={:#x}, size={:#x})", self.offset, self.size)
    }
}

/// Decoded contents of an information segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PupSegmentInfo {
    /// One per block. Never checked.
    pub digests: Vec<PupDigest>,
    pub extents: Vec<PupExtent>,
}

impl PupSegmentInfo {
    pub fn load_from_bytes(
        data: &[u8],
        block_count: u64,
        has_digests: bool,
        has_extents: bool,
    ) -> Result<Self, PupError> {
        let count = usize::try_from(block_count)
            .map_err(|_| PupError::InvalidHeader(format!("block count {block_count} too large")))?;

        let mut needed = 0usize;
        if has_digests {
            needed += count * PUP_DIGEST_SIZE;
        }
        if has_extents {
            needed += count * PUP_EXTENT_SIZE;
        }
        ensure_len("information segment", data, needed)?;

        let mut cursor = Cursor::new(data);
        let mut info = Self::default();

        if has_digests {
            info.digests.reserve(count);
            for _ in 0..count {
                info.digests.push(PupDigest::load_from_reader(&mut cursor)?);
            }
        }
        if has_extents {
            info.extents.reserve(count);
            for _ in 0..count {
                info.extents.push(PupExtent::load_from_reader(&mut cursor)?);
            }
        }

        Ok(info)
    }
}

fn ensure_len(what: &'static str, data: &[u8], needed: usize) -> Result<(), PupError> {
    if data.len() < needed {
        return Err(PupError::Truncated {
            what,
            needed,
            available: data.len(),
        });
    }
    Ok(())
}
