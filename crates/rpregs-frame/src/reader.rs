use std::io::{ErrorKind, Read};
use std::time::Duration;

use bytes::{Buf, BytesMut};
use rpregs_transport::DeviceStream;
use tracing::debug;

use crate::codec::{
    decode_request, decode_words, FrameConfig, Header, Request, HEADER_SIZE, WORD_SIZE,
};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads headers, word payloads and requests from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete units.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the raw 8 header bytes of the next message (blocking).
    ///
    /// The bytes are returned undecoded so a caller can compare them against
    /// the header it sent.
    pub fn read_header_bytes(&mut self) -> Result<[u8; HEADER_SIZE]> {
        self.fill(HEADER_SIZE)?;
        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&self.buf[..HEADER_SIZE]);
        self.buf.advance(HEADER_SIZE);
        Ok(raw)
    }

    /// Read and decode the next header.
    pub fn read_header(&mut self) -> Result<Header> {
        let raw = self.read_header_bytes()?;
        Header::from_bytes(&raw)
    }

    /// Read exactly `count` little-endian words.
    pub fn read_words(&mut self, count: usize) -> Result<Vec<u32>> {
        if count > self.config.max_words {
            return Err(FrameError::TooManyWords {
                count,
                max: self.config.max_words,
            });
        }
        let size = count * WORD_SIZE;
        self.fill(size)?;
        let payload = self.buf.split_to(size);
        Ok(decode_words(&payload))
    }

    /// Read the next complete request (device side).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_request(&mut self) -> Result<Request> {
        loop {
            if let Some(request) = decode_request(&mut self.buf)? {
                return Ok(request);
            }
            self.read_chunk()?;
        }
    }

    /// Discard any bytes already buffered. Returns how many were dropped.
    pub fn discard_buffered(&mut self) -> usize {
        let dropped = self.buf.len();
        self.buf.clear();
        dropped
    }

    /// Number of bytes received but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    fn fill(&mut self, needed: usize) -> Result<()> {
        while self.buf.len() < needed {
            self.read_chunk()?;
        }
        Ok(())
    }

    fn read_chunk(&mut self) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
            return Ok(read);
        }
    }
}

impl FrameReader<DeviceStream> {
    /// Create a frame reader for `DeviceStream` and apply read timeout from config.
    pub fn with_config_device(inner: DeviceStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }

    /// Read and discard incoming bytes until the line stays silent for `quiet`
    /// or `budget` bytes have been dropped.
    ///
    /// Returns the number of bytes discarded, including any already buffered.
    /// The configured read timeout is restored afterwards.
    pub fn drain(&mut self, budget: usize, quiet: Duration) -> Result<usize> {
        let mut dropped = self.discard_buffered();
        self.inner
            .set_read_timeout(Some(quiet))
            .map_err(transport_to_frame_error)?;

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let outcome = loop {
            if dropped >= budget {
                break Ok(());
            }
            match self.inner.read(&mut chunk) {
                Ok(0) => break Err(FrameError::ConnectionClosed),
                Ok(n) => dropped += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    break Ok(())
                }
                Err(err) => break Err(FrameError::Io(err)),
            }
        };

        self.inner
            .set_read_timeout(self.config.read_timeout)
            .map_err(transport_to_frame_error)?;
        debug!(dropped, budget, "drained stale bytes");
        outcome.map(|()| dropped)
    }
}

pub(crate) fn transport_to_frame_error(err: rpregs_transport::TransportError) -> FrameError {
    match err {
        rpregs_transport::TransportError::Io(io) | rpregs_transport::TransportError::Accept(io) => {
            FrameError::Io(io)
        }
        rpregs_transport::TransportError::Bind { source, .. }
        | rpregs_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
