//! The socket server: accepts one producer connection at a time, parses
//! the wire protocol, and feeds decoded frames into the playout buffer.

use std::io::{ErrorKind, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use ledcast_codecs::error::WireError;
use ledcast_codecs::{clock, inflate, wire, Frame, PlayoutBuffer};
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, warn};

/// Pending-connection backlog on the listening socket.
const LISTEN_BACKLOG: i32 = 6;

/// Receive timeout applied to both the listening socket (so `accept`
/// wakes up for the shutdown poll) and every accepted connection (so a
/// corrupt or stalled stream cannot hang the read loop).
const RECV_TIMEOUT: Duration = Duration::from_secs(3);

/// Pause between the end of one connection and the next accept.
const RECONNECT_PAUSE: Duration = Duration::from_millis(250);

/// Values reported in every status response. Brightness is fixed at
/// full; the wifi field is a placeholder for a wired node.
const REPORTED_BRIGHTNESS: f64 = 100.0;
const REPORTED_WIFI_SIGNAL: f64 = 99.0;

pub struct SocketServer {
    listener: TcpListener,
    /// Total LED count of the driven matrix; every accepted frame must
    /// carry exactly this many pixels.
    matrix_pixels: usize,
    max_packet: usize,
    /// Accumulation scratch for the read loop. Allocated once, sized to
    /// the largest legal packet; `received` counts the valid prefix.
    read_buf: Vec<u8>,
    received: usize,
    /// Decompression output scratch, same size, also allocated once.
    expand_buf: Vec<u8>,
    frames: Arc<PlayoutBuffer>,
    fps_drawing: Arc<AtomicU32>,
    shutdown: Arc<AtomicBool>,
}

impl SocketServer {
    /// Bind the listening socket. `SO_REUSEADDR` is set so the port can
    /// be rebound immediately after an unclean exit.
    pub fn bind(
        port: u16,
        matrix_pixels: usize,
        frames: Arc<PlayoutBuffer>,
        fps_drawing: Arc<AtomicU32>,
        shutdown: Arc<AtomicBool>,
    ) -> anyhow::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .context("create listening socket")?;
        socket
            .set_reuse_address(true)
            .context("set SO_REUSEADDR")?;
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        socket
            .bind(&addr.into())
            .with_context(|| format!("bind {addr}"))?;
        socket.listen(LISTEN_BACKLOG).context("listen")?;
        socket
            .set_read_timeout(Some(RECV_TIMEOUT))
            .context("set accept timeout")?;

        let max_packet = wire::max_packet_size(matrix_pixels);
        Ok(Self {
            listener: socket.into(),
            matrix_pixels,
            max_packet,
            read_buf: vec![0u8; max_packet],
            received: 0,
            expand_buf: vec![0u8; max_packet],
            frames,
            fps_drawing,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. One producer is serviced at a time; any fault drops
    /// the connection and returns here to wait for a reconnect.
    pub fn run(mut self) {
        match self.listener.local_addr() {
            Ok(addr) => info!("listening for frame data on {addr}"),
            Err(_) => info!("listening for frame data"),
        }

        while !self.shutdown.load(Ordering::Relaxed) {
            let (mut stream, peer) = match self.listener.accept() {
                Ok(pair) => pair,
                Err(e)
                    if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    warn!("accept failed: {e}");
                    thread::sleep(RECONNECT_PAUSE);
                    continue;
                }
            };

            info!("incoming connection from {peer}");
            if let Err(e) = stream.set_read_timeout(Some(RECV_TIMEOUT)) {
                warn!("unable to set read timeout on {peer}: {e}");
                self.reset_read_buffer();
                continue;
            }

            if let Err(e) = self.serve_connection(&mut stream) {
                info!("connection from {peer} ended: {e:#}");
            }
            self.reset_read_buffer();
            thread::sleep(RECONNECT_PAUSE);
        }
        info!("socket server shutting down");
    }

    /// Read loop for one connection. Returns on the first transport or
    /// protocol fault; the caller closes the socket and re-accepts.
    fn serve_connection(&mut self, stream: &mut TcpStream) -> anyhow::Result<()> {
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return Ok(());
            }

            self.read_until(stream, wire::STANDARD_HEADER_SIZE)?;

            let frame = if wire::packet_tag(&self.read_buf) == wire::COMPRESSED_TAG {
                self.read_compressed_packet(stream)?
            } else {
                self.read_standard_packet(stream)?
            };

            match frame {
                Some(frame) => {
                    if frame.pixel_count() != self.matrix_pixels {
                        return Err(WireError::PixelCountMismatch {
                            got: frame.pixel_count(),
                            matrix: self.matrix_pixels,
                        }
                        .into());
                    }
                    self.frames.push(frame);
                }
                // Well-formed but addressed to another channel; the
                // connection stays up.
                None => {}
            }

            self.reset_read_buffer();
            self.send_status(stream);
        }
    }

    /// Compressed envelope: 16-byte header already in the scratch (the
    /// initial 24-byte read covers it), followed by a zlib body that
    /// inflates into a complete standard packet.
    fn read_compressed_packet(&mut self, stream: &mut TcpStream) -> anyhow::Result<Option<Frame>> {
        let header = wire::CompressedHeader::parse(&self.read_buf[..self.received])?;
        let expanded = header.expanded_size as usize;
        if expanded > self.max_packet {
            return Err(WireError::OversizedPacket {
                size: expanded,
                limit: self.max_packet,
            }
            .into());
        }

        let total = wire::COMPRESSED_HEADER_SIZE + header.compressed_size as usize;
        self.read_until(stream, total)?;

        inflate::inflate_into(
            &self.read_buf[wire::COMPRESSED_HEADER_SIZE..total],
            &mut self.expand_buf,
            expanded,
        )?;
        debug!("inflated {} bytes into {expanded}", header.compressed_size);

        Ok(wire::decode_frame(&self.expand_buf[..expanded])?)
    }

    /// Standard pixel-data packet: header already in the scratch, pull
    /// in the pixel body and decode.
    fn read_standard_packet(&mut self, stream: &mut TcpStream) -> anyhow::Result<Option<Frame>> {
        let header = wire::PixelDataHeader::parse(&self.read_buf[..self.received])?;
        if header.command != wire::CMD_PIXEL_DATA {
            return Err(WireError::UnknownCommand(header.command).into());
        }

        let total = header.packet_len();
        if total > self.max_packet {
            return Err(WireError::OversizedPacket {
                size: total,
                limit: self.max_packet,
            }
            .into());
        }

        self.read_until(stream, total)?;
        Ok(wire::decode_frame(&self.read_buf[..total])?)
    }

    /// Accumulate into the scratch until it holds `needed` bytes.
    /// Interrupted reads are retried; a zero-length read (peer closed)
    /// or the receive timeout ends the connection.
    fn read_until(&mut self, stream: &mut TcpStream, needed: usize) -> anyhow::Result<()> {
        if needed <= self.received {
            return Ok(());
        }
        if needed > self.read_buf.len() {
            return Err(WireError::OversizedPacket {
                size: needed,
                limit: self.read_buf.len(),
            }
            .into());
        }

        while self.received < needed {
            match stream.read(&mut self.read_buf[self.received..needed]) {
                Ok(0) => anyhow::bail!("peer closed the connection"),
                Ok(n) => self.received += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("read from peer"),
            }
        }
        Ok(())
    }

    fn reset_read_buffer(&mut self) {
        self.received = 0;
    }

    /// Status record after every processed packet. A failed write is
    /// logged and ignored; it does not affect the read loop.
    fn send_status(&self, stream: &mut TcpStream) {
        let now = clock::now();
        let response = wire::StatusResponse {
            current_clock: now,
            oldest_frame_age: self.frames.age_of_oldest(now),
            newest_frame_age: self.frames.age_of_newest(now),
            brightness: REPORTED_BRIGHTNESS,
            wifi_signal: REPORTED_WIFI_SIGNAL,
            buffer_capacity: self.frames.capacity() as u32,
            buffer_size: self.frames.len() as u32,
            fps_drawing: self.fps_drawing.load(Ordering::Relaxed),
            watts: 0,
        };
        if let Err(e) = stream.write_all(&response.to_wire()) {
            warn!("unable to send status response: {e}");
        }
    }
}
