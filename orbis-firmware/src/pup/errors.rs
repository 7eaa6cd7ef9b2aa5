use orbis_comp::zlib::ZlibError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PupError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid PUP magic")]
    InvalidMagic,

    #[error("invalid PUP header: {0}")]
    InvalidHeader(String),

    #[error("{what} truncated (needed {needed} bytes, have {available})")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),

    #[error("PUP segment not found")]
    SegmentNotFound,

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("decompression failed: {0}")]
    Decompression(#[from] ZlibError),

    #[error("key {0:?} not available")]
    MissingKey(&'static str),

    #[error("decryption failed: {0}")]
    Crypto(String),

    #[error("segment index {0} out of range")]
    SegmentIndex(usize),

    #[error("segment offsets out of bounds")]
    SegmentOutOfBounds,
}

/// Coarse classification of [`PupError`] for callers that only care about
/// what went wrong, not where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PupErrorKind {
    MalformedHeader,
    UnsupportedFeature,
    SegmentNotFound,
    NotImplemented,
    IoFailure,
    DecompressionFailure,
    MissingKey,
}

impl PupError {
    #[must_use]
    pub const fn kind(&self) -> PupErrorKind {
        match self {
            Self::Io(_) | Self::SegmentOutOfBounds => PupErrorKind::IoFailure,
            Self::InvalidMagic | Self::InvalidHeader(_) | Self::Truncated { .. } | Self::Crypto(_) => {
                PupErrorKind::MalformedHeader
            }
            Self::UnsupportedFeature(_) => PupErrorKind::UnsupportedFeature,
            Self::SegmentNotFound | Self::SegmentIndex(_) => PupErrorKind::SegmentNotFound,
            Self::NotImplemented(_) => PupErrorKind::NotImplemented,
            Self::Decompression(_) => PupErrorKind::DecompressionFailure,
            Self::MissingKey(_) => PupErrorKind::MissingKey,
        }
    }
}
