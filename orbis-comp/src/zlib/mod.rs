use thiserror::Error;

pub mod reader;

pub use reader::inflate_exact;

#[derive(Debug, Error)]
pub enum ZlibError {
    #[error("zlib stream is malformed: {0}")]
    Malformed(String),

    #[error("zlib stream ended early (expected {expected} bytes, got {actual})")]
    Undersized { expected: usize, actual: usize },
}
