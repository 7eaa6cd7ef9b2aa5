use flate2::{Decompress, FlushDecompress, Status};

use super::ZlibError;

/// Inflate a zlib-wrapped stream into `output`, filling it completely.
///
/// Output the stream would produce past `output.len()` is dropped. A stream
/// that ends (or runs out of input) before `output` is full is an error.
pub fn inflate_exact(input: &[u8], output: &mut [u8]) -> Result<(), ZlibError> {
    if output.is_empty() {
        return Ok(());
    }

    let mut decompress = Decompress::new(true);

    loop {
        let in_pos = decompress.total_in() as usize;
        let out_pos = decompress.total_out() as usize;

        let status = decompress
            .decompress(
                &input[in_pos..],
                &mut output[out_pos..],
                FlushDecompress::Finish,
            )
            .map_err(|e| ZlibError::Malformed(e.to_string()))?;

        let produced = decompress.total_out() as usize;
        if produced == output.len() {
            return Ok(());
        }

        let stalled = decompress.total_in() as usize == in_pos && produced == out_pos;
        if matches!(status, Status::StreamEnd) || stalled {
            return Err(ZlibError::Undersized {
                expected: output.len(),
                actual: produced,
            });
        }
    }
}
