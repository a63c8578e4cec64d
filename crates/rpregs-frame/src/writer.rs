use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use rpregs_transport::DeviceStream;

use crate::codec::{encode_request, encode_words, word_count, FrameConfig, Header, Request};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete requests and responses to any `Write` stream.
///
/// Every message is encoded into an internal buffer first and handed to the
/// stream in one go, then flushed.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send a request (client side).
    pub fn send_request(&mut self, request: &Request) -> Result<()> {
        if let Request::Write { words, .. } = request {
            self.check_words(words.len())?;
        }
        self.buf.clear();
        encode_request(request, &mut self.buf)?;
        self.write_buffered()
    }

    /// Send a bare header.
    pub fn send_header(&mut self, header: &Header) -> Result<()> {
        self.buf.clear();
        header.encode(&mut self.buf);
        self.write_buffered()
    }

    /// Answer a read request: echoed header followed by the words (device side).
    pub fn send_read_response(&mut self, addr: u32, words: &[u32]) -> Result<()> {
        self.check_words(words.len())?;
        let header = Header::read(addr, word_count(words.len())?);
        self.buf.clear();
        header.encode(&mut self.buf);
        encode_words(words, &mut self.buf);
        self.write_buffered()
    }

    /// Acknowledge a write request by echoing its header (device side).
    pub fn send_ack(&mut self, header: &Header) -> Result<()> {
        self.send_header(header)
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn check_words(&self, count: usize) -> Result<()> {
        if count > self.config.max_words {
            return Err(FrameError::TooManyWords {
                count,
                max: self.config.max_words,
            });
        }
        Ok(())
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }
}

impl FrameWriter<DeviceStream> {
    /// Create a frame writer for `DeviceStream` and apply write timeout from config.
    pub fn with_config_device(inner: DeviceStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}
