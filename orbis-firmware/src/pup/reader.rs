use std::io::{Read, Seek, SeekFrom};

use orbis_comp::zlib::{self, ZlibError};

use super::crypto;
use super::errors::PupError;
use super::keys::{KeyProvider, PUP_HDR_KEY, PUP_ROOT_KEY, PupKey};
use super::options::PupReaderOptions;
use super::structs::{
    PUP_HEADER_EX_SIZE, PUP_HEADER_SIZE, PUP_SEGMENT_ENTRY_SIZE, PUP_SEGMENT_META_SIZE, PupHeader,
    PupHeaderEx, PupSegmentEntry, PupSegmentInfo, PupSegmentMeta,
};

/// PUP reader.
///
/// The header, segment entry table and segment meta table are decrypted and
/// parsed once in [`Self::open`]. Segments are decoded on demand with
/// [`Self::get`] and are not cached.
///
/// Every read seeks the underlying stream, so all segment accessors borrow
/// `self` mutably. Use one reader per thread.
///
/// ```ignore
/// let keys = PupKeys { hdr, root };
/// let mut pup = PupReader::open(file, &keys, &PupReaderOptions::default())?;
///
/// for entry in pup.entries() {
///     println!("{entry}");
/// }
///
/// let data = pup.get(0x1)?;
/// ```
pub struct PupReader<R: Read + Seek> {
    inner: R,
    header: PupHeader,
    header_ex: PupHeaderEx,
    entries: Vec<PupSegmentEntry>,
    metas: Vec<PupSegmentMeta>,
    file_size: u64,
}

impl<R: Read + Seek> PupReader<R> {
    /// Open a PUP, validating the header and decrypting the segment tables.
    pub fn open<K: KeyProvider + ?Sized>(
        mut inner: R,
        keys: &K,
        options: &PupReaderOptions,
    ) -> Result<Self, PupError> {
        let file_size = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;

        if file_size < PUP_HEADER_SIZE as u64 {
            return Err(PupError::Truncated {
                what: "PUP header",
                needed: PUP_HEADER_SIZE,
                available: file_size as usize,
            });
        }

        let header = PupHeader::load_from_reader(&mut inner)?;
        header.validate()?;

        #[cfg(feature = "logging")]
        tracing::debug!("{header}");

        // ---- extended header + segment entries ----
        let hdr_key = resolve_key(keys, PUP_HDR_KEY)?;
        let mut table = vec![0u8; usize::from(header.hdr_size) - PUP_HEADER_SIZE];
        inner.read_exact(&mut table)?;
        crypto::aes128_cbc_decrypt(&hdr_key.key, &hdr_key.iv, &mut table)?;

        let header_ex = PupHeaderEx::load_from_bytes(&table)?;
        let count = usize::from(header_ex.segment_count);

        let needed = PUP_HEADER_EX_SIZE + count * PUP_SEGMENT_ENTRY_SIZE;
        if table.len() < needed {
            return Err(PupError::Truncated {
                what: "segment entry table",
                needed,
                available: table.len(),
            });
        }

        let entries = table[PUP_HEADER_EX_SIZE..needed]
            .chunks_exact(PUP_SEGMENT_ENTRY_SIZE)
            .map(PupSegmentEntry::load_from_bytes)
            .collect::<Result<Vec<_>, _>>()?;

        // ---- segment metas ----
        let root_key = resolve_key(keys, PUP_ROOT_KEY)?;
        let mut meta_table = vec![0u8; usize::from(header.meta_size)];
        inner.read_exact(&mut meta_table)?;
        crypto::aes128_cbc_decrypt(&root_key.key, &root_key.iv, &mut meta_table)?;

        let needed = count * PUP_SEGMENT_META_SIZE;
        if meta_table.len() < needed {
            return Err(PupError::Truncated {
                what: "segment meta table",
                needed,
                available: meta_table.len(),
            });
        }

        let metas = meta_table[..needed]
            .chunks_exact(PUP_SEGMENT_META_SIZE)
            .map(PupSegmentMeta::load_from_bytes)
            .collect::<Result<Vec<_>, _>>()?;

        #[cfg(feature = "logging")]
        tracing::debug!(
            segment_count = count,
            file_size = header_ex.file_size,
            "decoded PUP segment directory"
        );

        if options.verify {
            return Err(PupError::NotImplemented("PUP signature verification"));
        }

        Ok(Self {
            inner,
            header,
            header_ex,
            entries,
            metas,
            file_size,
        })
    }

    pub const fn header(&self) -> &PupHeader {
        &self.header
    }

    pub const fn header_ex(&self) -> &PupHeaderEx {
        &self.header_ex
    }

    pub fn entries(&self) -> &[PupSegmentEntry] {
        &self.entries
    }

    /// Per-segment data keys, in entry table order.
    pub fn metas(&self) -> &[PupSegmentMeta] {
        &self.metas
    }

    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub const fn segment_count(&self) -> u16 {
        self.header_ex.segment_count
    }

    /// Entry at `index` in table order.
    pub fn entry(&self, index: usize) -> Result<&PupSegmentEntry, PupError> {
        self.entries.get(index).ok_or(PupError::SegmentIndex(index))
    }

    /// Whether segment signatures and block digests were checked.
    ///
    /// Always `false`: signed segments and digests are parsed but never
    /// verified.
    pub const fn signatures_verified(&self) -> bool {
        false
    }

    /// Index of the first segment matching `predicate`, in table order.
    pub fn find<P>(&self, mut predicate: P) -> Result<usize, PupError>
    where
        P: FnMut(&PupSegmentEntry, &PupSegmentMeta) -> bool,
    {
        self.entries
            .iter()
            .zip(&self.metas)
            .position(|(entry, meta)| predicate(entry, meta))
            .ok_or(PupError::SegmentNotFound)
    }

    /// Index of the payload segment with the given id.
    pub fn find_payload(&self, id: u64) -> Result<usize, PupError> {
        self.find(|entry, _| entry.id() == id && !entry.is_info())
    }

    /// Index of the information segment belonging to the payload with the given id.
    pub fn find_info(&self, id: u64) -> Result<usize, PupError> {
        self.find(|entry, _| entry.id() == id && entry.is_info())
    }

    /// Decode the payload segment with the given id.
    pub fn get(&mut self, id: u64) -> Result<Vec<u8>, PupError> {
        let index = self.find_payload(id)?;
        if self.entries[index].is_blocked() {
            self.get_blocked(index)
        } else {
            Err(PupError::NotImplemented("non-blocked segment extraction"))
        }
    }

    /// Read and decode the information segment for the payload at `index`.
    pub fn read_info(&mut self, index: usize) -> Result<PupSegmentInfo, PupError> {
        let entry = *self.entry(index)?;
        let info_index = self.find_info(entry.id())?;
        let info_entry = self.entries[info_index];
        let info_meta = self.metas[info_index];

        let mut buffer = vec![0u8; self.checked_len(info_entry.offset, info_entry.file_size)?];
        self.read_exact_at(info_entry.offset, &mut buffer)?;

        if info_entry.is_encrypted() {
            crypto::decrypt_with_tail(&info_meta.data_key, &info_meta.data_iv, &mut buffer)?;
        }
        if info_entry.is_compressed() {
            return Err(PupError::UnsupportedFeature("compressed information segment"));
        }

        #[cfg(feature = "logging")]
        {
            if info_entry.is_signed() {
                tracing::trace!(id = entry.id(), "information segment signature not checked");
            }
        }

        PupSegmentInfo::load_from_bytes(
            &buffer,
            entry.block_count(),
            info_entry.has_digests(),
            info_entry.has_extents(),
        )
    }

    /// Decode a blocked payload segment block by block.
    pub fn get_blocked(&mut self, index: usize) -> Result<Vec<u8>, PupError> {
        let entry = *self.entry(index)?;
        let meta = self.metas[index];
        let block_size = entry.block_size();

        let info = self.read_info(index)?;

        #[cfg(feature = "logging")]
        {
            tracing::debug!(
                id = entry.id(),
                block_size,
                block_count = entry.block_count(),
                extents = info.extents.len(),
                "extracting blocked segment"
            );
            if info.extents.is_empty() {
                tracing::warn!(id = entry.id(), "information segment has no extents");
            }
            if entry.is_signed() {
                tracing::trace!(id = entry.id(), "block signatures not checked");
            }
        }

        let mut remaining = entry.file_size;
        let mut segment = Vec::new();
        let mut block = Vec::new();

        for extent in &info.extents {
            let offset = entry
                .offset
                .checked_add(u64::from(extent.offset))
                .ok_or(PupError::SegmentOutOfBounds)?;
            block.resize(self.checked_len(offset, u64::from(extent.size))?, 0);
            self.read_exact_at(offset, &mut block)?;

            // Bounded by the largest block size (128 MiB).
            let chunk_size = block_size.min(remaining) as usize;
            remaining -= chunk_size as u64;

            if entry.is_encrypted() {
                // Stored blocks are padded to the cipher block size; anything
                // past the last full block is passed through as stored.
                crypto::aes128_cbc_decrypt_prefix(&meta.data_key, &meta.data_iv, &mut block)?;
            }

            let start = segment.len();
            segment.resize(start + chunk_size, 0);
            let dest = &mut segment[start..];

            if entry.is_compressed() {
                let compressed_size = extent.compressed_size().ok_or_else(|| {
                    ZlibError::Malformed(format!(
                        "extent size {:#x} is smaller than its padding",
                        extent.size
                    ))
                })?;
                zlib::inflate_exact(&block[..compressed_size as usize], dest)?;
            } else {
                // The whole stored block is copied; bytes past this chunk are dropped.
                let n = block.len().min(dest.len());
                dest[..n].copy_from_slice(&block[..n]);

                #[cfg(feature = "logging")]
                {
                    if block.len() != chunk_size {
                        tracing::trace!(
                            stored = block.len(),
                            chunk_size,
                            "stored block size differs from chunk size"
                        );
                    }
                }
            }
        }

        Ok(segment)
    }

    /// Returns a limited reader over the stored (undecoded) bytes of a segment.
    ///
    /// This borrows `self` mutably because it seeks the underlying reader.
    pub fn segment_reader<'a>(&'a mut self, index: usize) -> Result<Box<dyn Read + 'a>, PupError> {
        let entry = *self.entry(index)?;
        self.checked_len(entry.offset, entry.file_size)?;

        self.inner.seek(SeekFrom::Start(entry.offset))?;
        Ok(Box::new((&mut self.inner).take(entry.file_size)))
    }

    /// Read the stored (undecoded) bytes of a segment into memory.
    pub fn read_raw(&mut self, index: usize) -> Result<Vec<u8>, PupError> {
        let mut r = self.segment_reader(index)?;
        let mut buf = Vec::new();
        r.read_to_end(&mut buf)?;
        Ok(buf)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn checked_len(&self, offset: u64, len: u64) -> Result<usize, PupError> {
        let end = offset.checked_add(len).ok_or(PupError::SegmentOutOfBounds)?;
        if end > self.file_size {
            return Err(PupError::SegmentOutOfBounds);
        }
        usize::try_from(len).map_err(|_| PupError::SegmentOutOfBounds)
    }

    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), PupError> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.inner.read_exact(buf)?;
        Ok(())
    }
}

fn resolve_key<K: KeyProvider + ?Sized>(keys: &K, name: &'static str) -> Result<PupKey, PupError> {
    keys.key(name).ok_or(PupError::MissingKey(name))
}
