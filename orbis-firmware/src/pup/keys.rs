//! Key lookup for PUP decryption.
//!
//! No keys ship with this crate. Callers supply them through [`KeyProvider`],
//! either with the fixed [`PupKeys`] set or a keyring of their own.

use core::fmt;
use std::collections::HashMap;

/// Key for the extended header and segment entry table.
pub const PUP_HDR_KEY: &str = "pup.hdr";
/// Key for the segment meta table.
pub const PUP_ROOT_KEY: &str = "pup.root_key";

/// AES-128-CBC key material.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PupKey {
    pub key: [u8; 16],
    pub iv: [u8; 16],
}

impl PupKey {
    #[must_use]
    pub const fn new(key: [u8; 16], iv: [u8; 16]) -> Self {
        Self { key, iv }
    }
}

impl fmt::Debug for PupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PupKey").finish_non_exhaustive()
    }
}

/// Resolves a named key to its material.
pub trait KeyProvider {
    fn key(&self, name: &str) -> Option<PupKey>;
}

/// The two keys a PUP reader needs.
#[derive(Debug, Clone, Copy)]
pub struct PupKeys {
    pub hdr: PupKey,
    pub root: PupKey,
}

impl KeyProvider for PupKeys {
    fn key(&self, name: &str) -> Option<PupKey> {
        match name {
            PUP_HDR_KEY => Some(self.hdr),
            PUP_ROOT_KEY => Some(self.root),
            _ => None,
        }
    }
}

impl KeyProvider for HashMap<String, PupKey> {
    fn key(&self, name: &str) -> Option<PupKey> {
        self.get(name).copied()
    }
}

impl<K: KeyProvider + ?Sized> KeyProvider for &K {
    fn key(&self, name: &str) -> Option<PupKey> {
        (**self).key(name)
    }
}
