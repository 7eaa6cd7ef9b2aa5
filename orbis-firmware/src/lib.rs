//! Readers for Orbis firmware containers.

pub mod pup;
