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

use thiserror::Error;

/// Result type for wire decoding operations
pub type Result<T> = std::result::Result<T, WireError>;

/// Errors that can occur while decoding packets off the wire
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WireError {
    #[error("packet too short: got {got} bytes, need at least {need}")]
    HeaderTooShort { got: usize, need: usize },

    #[error("unknown command in packet: {0}")]
    UnknownCommand(u16),

    #[error("oversized packet of {size} bytes (limit {limit})")]
    OversizedPacket { size: usize, limit: usize },

    #[error("payload truncated: declared {declared} pixels, only {got} bytes follow the header")]
    TruncatedPayload { declared: u32, got: usize },

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("decompressed to {got} bytes but packet declared {declared}")]
    ExpandedSizeMismatch { declared: u32, got: usize },

    #[error("frame carries {got} pixels but the matrix has {matrix}")]
    PixelCountMismatch { got: usize, matrix: usize },
}
