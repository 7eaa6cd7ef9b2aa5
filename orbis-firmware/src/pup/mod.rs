//! PUP firmware update container reader.
//!
//! A PUP is a fixed header followed by two encrypted tables (segment entries
//! and per-segment key material) and the segment data itself. Large segments
//! are stored as independently encrypted and compressed blocks, located by a
//! companion information segment.
//!
//! NOTE: keys are not included. Callers provide them through [`KeyProvider`].
//! Segment signatures and block digests are not verified.

pub mod crypto;
pub mod errors;
pub mod keys;
pub mod options;
pub mod reader;
pub mod structs;


pub use errors::{PupError, PupErrorKind};
pub use keys::{KeyProvider, PUP_HDR_KEY, PUP_ROOT_KEY, PupKey, PupKeys};
pub use options::{PupReaderOptions, PupReaderOptionsBuilder};
pub use reader::PupReader;
pub use structs::{
    PUP_MAGIC, PupDigest, PupExtent, PupHeader, PupHeaderEx, PupHeaderFlag, PupSegmentCaps,
    PupSegmentEntry, PupSegmentFlag, PupSegmentInfo, PupSegmentMeta,
};
