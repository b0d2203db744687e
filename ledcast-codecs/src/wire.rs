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

//! The binary wire protocol spoken by the desktop producer.
//!
//! Every multi-byte integer is little-endian regardless of host order.
//! Two packet variants multiplex on the first four bytes: a compressed
//! envelope tagged with ASCII "DAVE", and the standard pixel-data packet
//! whose leading u16 is the command code. A compressed envelope inflates
//! into a complete standard packet, header included.

use crate::error::{Result, WireError};
use crate::frame::{Frame, Pixel};

/// TCP port the receiver listens on unless overridden.
pub const DEFAULT_PORT: u16 = 49152;

/// Size of the standard pixel-data header.
pub const STANDARD_HEADER_SIZE: usize = 24;

/// Size of the compressed-envelope header.
pub const COMPRESSED_HEADER_SIZE: usize = 16;

/// Tag identifying a compressed envelope: ASCII "DAVE" read as a
/// little-endian u32.
pub const COMPRESSED_TAG: u32 = 0x4556_4144;

/// Command code for pixel data with 64-bit wall-clock timestamps.
pub const CMD_PIXEL_DATA: u16 = 3;

/// Bytes per LED on the wire (one each of R, G, B).
pub const BYTES_PER_PIXEL: usize = 3;

/// The largest packet the receiver will accept for a matrix of the given
/// size: a standard header plus three bytes for every LED. Both scratch
/// buffers are allocated to exactly this size, once.
pub fn max_packet_size(matrix_pixels: usize) -> usize {
    STANDARD_HEADER_SIZE + BYTES_PER_PIXEL * matrix_pixels
}

fn u16_at(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn u32_at(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn u64_at(buf: &[u8], at: usize) -> u64 {
    u64::from_le_bytes([
        buf[at],
        buf[at + 1],
        buf[at + 2],
        buf[at + 3],
        buf[at + 4],
        buf[at + 5],
        buf[at + 6],
        buf[at + 7],
    ])
}

/// The first four bytes of a packet as a little-endian u32, used to pick
/// the framing variant. Callers must have read at least four bytes.
pub fn packet_tag(buf: &[u8]) -> u32 {
    u32_at(buf, 0)
}

/// Header of a compressed envelope. The trailing reserved word is
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedHeader {
    pub compressed_size: u32,
    pub expanded_size: u32,
}

impl CompressedHeader {
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < COMPRESSED_HEADER_SIZE {
            return Err(WireError::HeaderTooShort {
                got: buf.len(),
                need: COMPRESSED_HEADER_SIZE,
            });
        }
        Ok(Self {
            compressed_size: u32_at(buf, 4),
            expanded_size: u32_at(buf, 8),
        })
    }
}

/// Header of a standard pixel-data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelDataHeader {
    pub command: u16,
    pub channel: u16,
    pub pixel_count: u32,
    pub timestamp_seconds: u64,
    pub timestamp_micros: u64,
}

impl PixelDataHeader {
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < STANDARD_HEADER_SIZE {
            return Err(WireError::HeaderTooShort {
                got: buf.len(),
                need: STANDARD_HEADER_SIZE,
            });
        }
        Ok(Self {
            command: u16_at(buf, 0),
            channel: u16_at(buf, 2),
            pixel_count: u32_at(buf, 4),
            timestamp_seconds: u64_at(buf, 8),
            timestamp_micros: u64_at(buf, 16),
        })
    }

    /// Total on-wire packet length implied by this header.
    pub fn packet_len(&self) -> usize {
        STANDARD_HEADER_SIZE + self.pixel_count as usize * BYTES_PER_PIXEL
    }
}

/// Whether a packet on the given channel is addressed to this node: a
/// zero mask is broadcast, otherwise the low bit must be set.
pub fn channel_is_ours(channel: u16) -> bool {
    channel == 0 || channel & 0x01 != 0
}

/// Decode a complete standard packet into a [`Frame`].
///
/// Returns `Ok(None)` for a well-formed packet that is not addressed to
/// this node (channel filter); such packets are dropped without ending
/// the connection.
pub fn decode_frame(payload: &[u8]) -> Result<Option<Frame>> {
    let header = PixelDataHeader::parse(payload)?;
    if header.command != CMD_PIXEL_DATA {
        return Err(WireError::UnknownCommand(header.command));
    }
    if !channel_is_ours(header.channel) {
        log::debug!(
            "dropping pixel data for channel {:#06x}, not addressed to us",
            header.channel
        );
        return Ok(None);
    }

    let body = &payload[STANDARD_HEADER_SIZE..];
    let needed = header.pixel_count as usize * BYTES_PER_PIXEL;
    if body.len() < needed {
        return Err(WireError::TruncatedPayload {
            declared: header.pixel_count,
            got: body.len(),
        });
    }

    let pixels = body[..needed]
        .chunks_exact(BYTES_PER_PIXEL)
        .map(|rgb| Pixel {
            r: rgb[0],
            g: rgb[1],
            b: rgb[2],
        })
        .collect();

    Ok(Some(Frame::new(
        header.timestamp_seconds,
        header.timestamp_micros,
        pixels,
    )))
}

/// Status record written back to the producer after every processed
/// packet: 64 bytes, little-endian, doubles on 8-byte boundaries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusResponse {
    pub current_clock: f64,
    pub oldest_frame_age: f64,
    pub newest_frame_age: f64,
    pub brightness: f64,
    pub wifi_signal: f64,
    pub buffer_capacity: u32,
    pub buffer_size: u32,
    pub fps_drawing: u32,
    pub watts: u32,
}

impl StatusResponse {
    pub const WIRE_SIZE: usize = 64;

    /// Serialize to the fixed 64-byte wire layout.
    pub fn to_wire(&self) -> [u8; Self::WIRE_SIZE] {
        let mut out = [0u8; Self::WIRE_SIZE];
        out[0..4].copy_from_slice(&(Self::WIRE_SIZE as u32).to_le_bytes());
        // bytes 4..8: flash version, always zero
        out[8..16].copy_from_slice(&self.current_clock.to_le_bytes());
        out[16..24].copy_from_slice(&self.oldest_frame_age.to_le_bytes());
        out[24..32].copy_from_slice(&self.newest_frame_age.to_le_bytes());
        out[32..40].copy_from_slice(&self.brightness.to_le_bytes());
        out[40..48].copy_from_slice(&self.wifi_signal.to_le_bytes());
        out[48..52].copy_from_slice(&self.buffer_capacity.to_le_bytes());
        out[52..56].copy_from_slice(&self.buffer_size.to_le_bytes());
        out[56..60].copy_from_slice(&self.fps_drawing.to_le_bytes());
        out[60..64].copy_from_slice(&self.watts.to_le_bytes());
        out
    }
}
