//! Options for opening a PUP.
//!
//! Keys are not part of the options; they are passed to
//! [`PupReader::open`](super::PupReader::open) through a
//! [`KeyProvider`](super::keys::KeyProvider).

use derive_builder::Builder;

/// Options for [`PupReader::open`](super::PupReader::open).
#[derive(Debug, Clone, Default, Builder)]
#[builder(setter(into), default)]
pub struct PupReaderOptions {
    /// Verify header and segment signatures while opening.
    ///
    /// Signature verification is not implemented, so opening with this set
    /// fails with [`PupError::NotImplemented`](super::PupError::NotImplemented).
    pub verify: bool,
}
