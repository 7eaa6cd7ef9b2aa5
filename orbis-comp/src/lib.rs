//! Compression helpers used by the Orbis firmware readers.

pub mod zlib;
