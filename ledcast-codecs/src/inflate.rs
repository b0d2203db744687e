/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

//! Decompression of the compressed packet envelope.
//!
//! The producer deflates whole standard packets with the zlib wrapper
//! (header and Adler-32 checksum) — the raw-deflate framing some older
//! senders used is incompatible on the wire and is not accepted.

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::{Result, WireError};

/// Inflate `src` into the caller's preallocated scratch buffer.
///
/// The whole stream is consumed in one call; anything other than a
/// cleanly terminated zlib stream that expands to exactly
/// `expected_len` bytes is an error. Returns the number of bytes
/// written (always `expected_len` on success). The scratch is never
/// grown: input that would expand past it fails instead of allocating.
pub fn inflate_into(src: &[u8], dst: &mut [u8], expected_len: usize) -> Result<usize> {
    let mut stream = Decompress::new(true);
    let status = stream
        .decompress(src, dst, FlushDecompress::Finish)
        .map_err(|e| WireError::Decompression(e.to_string()))?;

    if status != Status::StreamEnd {
        return Err(WireError::Decompression(
            "zlib stream did not terminate within the packet".into(),
        ));
    }

    let written = stream.total_out() as usize;
    if written != expected_len {
        return Err(WireError::ExpandedSizeMismatch {
            declared: expected_len as u32,
            got: written,
        });
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{DeflateEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    fn zlib_deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn round_trips_a_buffer() {
        let original: Vec<u8> = (0u16..500).map(|i| (i % 256) as u8).collect();
        let deflated = zlib_deflate(&original);

        let mut scratch = vec![0u8; 1024];
        let written = inflate_into(&deflated, &mut scratch, original.len()).unwrap();
        assert_eq!(written, original.len());
        assert_eq!(&scratch[..written], &original[..]);
    }

    #[test]
    fn declared_size_mismatch_is_rejected() {
        let original = vec![7u8; 100];
        let deflated = zlib_deflate(&original);

        let mut scratch = vec![0u8; 1024];
        assert_eq!(
            inflate_into(&deflated, &mut scratch, 99),
            Err(WireError::ExpandedSizeMismatch {
                declared: 99,
                got: 100
            })
        );
    }

    #[test]
    fn garbage_input_is_rejected() {
        let mut scratch = vec![0u8; 64];
        let result = inflate_into(&[0xDE, 0xAD, 0xBE, 0xEF], &mut scratch, 64);
        assert!(matches!(result, Err(WireError::Decompression(_))));
    }

    #[test]
    fn raw_deflate_framing_is_rejected() {
        // A stream without the zlib wrapper must not be accepted; the
        // two framings are incompatible and mixing them would corrupt
        // every frame.
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[1u8; 50]).unwrap();
        let raw = encoder.finish().unwrap();

        let mut scratch = vec![0u8; 128];
        assert!(inflate_into(&raw, &mut scratch, 50).is_err());
    }

    #[test]
    fn output_larger_than_scratch_fails_without_allocating() {
        let original = vec![0u8; 4096];
        let deflated = zlib_deflate(&original);

        let mut scratch = vec![0u8; 128];
        assert!(inflate_into(&deflated, &mut scratch, 4096).is_err());
    }
}
