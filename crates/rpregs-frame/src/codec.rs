use bytes::{Buf, BufMut, BytesMut};

use crate::command::Command;
use crate::error::{FrameError, Result};

/// Frame header: command (1) + reserved (1) + length (2) + address (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Size of one payload word on the wire.
pub const WORD_SIZE: usize = 4;

/// Largest word count the 16-bit length field can express.
pub const MAX_WORDS: usize = u16::MAX as usize;

/// Protocol message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Request kind.
    pub command: Command,
    /// Number of 32-bit words to read or write.
    pub len: u16,
    /// Absolute start address in the device memory space.
    pub addr: u32,
}

impl Header {
    /// Header of a read request.
    pub fn read(addr: u32, len: u16) -> Self {
        Self {
            command: Command::Read,
            len,
            addr,
        }
    }

    /// Header of a write request.
    pub fn write(addr: u32, len: u16) -> Self {
        Self {
            command: Command::Write,
            len,
            addr,
        }
    }

    /// The close message: `'c'` followed by seven zero bytes.
    pub fn close() -> Self {
        Self {
            command: Command::Close,
            len: 0,
            addr: 0,
        }
    }

    /// Encode the header into its 8 wire bytes.
    ///
    /// Wire format:
    /// ```text
    /// ┌──────────┬──────────┬──────────┬──────────────┐
    /// │ Cmd (1B) │ 0x00     │ Len      │ Address      │
    /// │ r / w / c│ reserved │ (2B LE)  │ (4B LE)      │
    /// └──────────┴──────────┴──────────┴──────────────┘
    /// ```
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let len = self.len.to_le_bytes();
        let addr = self.addr.to_le_bytes();
        [
            self.command.as_byte(),
            0,
            len[0],
            len[1],
            addr[0],
            addr[1],
            addr[2],
            addr[3],
        ]
    }

    /// Append the header to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_slice(&self.to_bytes());
    }

    /// Parse 8 wire bytes. The reserved byte is not checked.
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        let command = Command::from_byte(bytes[0]).ok_or(FrameError::UnknownCommand(bytes[0]))?;
        let len = u16::from_le_bytes([bytes[2], bytes[3]]);
        let addr = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Ok(Self { command, len, addr })
    }

    /// Number of payload words following this header in a request.
    pub fn request_words(&self) -> usize {
        match self.command {
            Command::Write => usize::from(self.len),
            Command::Read | Command::Close => 0,
        }
    }

    /// Number of payload words following the echoed header in a response.
    pub fn response_words(&self) -> usize {
        match self.command {
            Command::Read => usize::from(self.len),
            Command::Write | Command::Close => 0,
        }
    }
}

/// A decoded request, as seen by the device side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Read `len` words from `addr`.
    Read { addr: u32, len: u16 },
    /// Write `words` starting at `addr`.
    Write { addr: u32, words: Vec<u32> },
    /// End of session.
    Close,
}

impl Request {
    /// The header this request is sent with (and that the response echoes).
    pub fn header(&self) -> Result<Header> {
        match self {
            Request::Read { addr, len } => Ok(Header::read(*addr, *len)),
            Request::Write { addr, words } => Ok(Header::write(*addr, word_count(words.len())?)),
            Request::Close => Ok(Header::close()),
        }
    }

    /// The total wire size of this request (header + payload).
    pub fn wire_size(&self) -> usize {
        match self {
            Request::Write { words, .. } => HEADER_SIZE + WORD_SIZE * words.len(),
            Request::Read { .. } | Request::Close => HEADER_SIZE,
        }
    }
}

/// Validate a word count against the 16-bit length field.
pub fn word_count(count: usize) -> Result<u16> {
    u16::try_from(count).map_err(|_| FrameError::TooManyWords {
        count,
        max: MAX_WORDS,
    })
}

/// Append `words` as little-endian `u32`s.
pub fn encode_words(words: &[u32], dst: &mut BytesMut) {
    dst.reserve(WORD_SIZE * words.len());
    for word in words {
        dst.put_u32_le(*word);
    }
}

/// Decode little-endian `u32` words. Trailing bytes that do not form a full
/// word are ignored.
pub fn decode_words(src: &[u8]) -> Vec<u32> {
    src.chunks_exact(WORD_SIZE)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Encode a request into the wire format.
pub fn encode_request(request: &Request, dst: &mut BytesMut) -> Result<()> {
    let header = request.header()?;
    dst.reserve(request.wire_size());
    header.encode(dst);
    if let Request::Write { words, .. } = request {
        encode_words(words, dst);
    }
    Ok(())
}

/// Decode a request from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete request yet.
/// On success, consumes the request bytes from the buffer.
pub fn decode_request(src: &mut BytesMut) -> Result<Option<Request>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let mut raw = [0u8; HEADER_SIZE];
    raw.copy_from_slice(&src[..HEADER_SIZE]);
    let header = Header::from_bytes(&raw)?;

    let total = HEADER_SIZE + WORD_SIZE * header.request_words();
    if src.len() < total {
        return Ok(None); // Need more data
    }

    src.advance(HEADER_SIZE);
    let request = match header.command {
        Command::Read => Request::Read {
            addr: header.addr,
            len: header.len,
        },
        Command::Write => {
            let payload = src.split_to(WORD_SIZE * header.request_words());
            Request::Write {
                addr: header.addr,
                words: decode_words(&payload),
            }
        }
        Command::Close => Request::Close,
    };

    Ok(Some(request))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest word count accepted per request. Default: 65535.
    pub max_words: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_words: MAX_WORDS,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_header_layout() {
        let header = Header::read(0x4030_0104, 4);
        assert_eq!(
            header.to_bytes(),
            [b'r', 0x00, 0x04, 0x00, 0x04, 0x01, 0x30, 0x40]
        );
    }

    #[test]
    fn test_close_header_layout() {
        assert_eq!(Header::close().to_bytes(), [b'c', 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_header_parse() {
        let bytes = [b'w', 0x00, 0xFF, 0xFF, 0x00, 0x01, 0x00, 0x00];
        let header = Header::from_bytes(&bytes).unwrap();
        assert_eq!(header, Header::write(0x100, 65535));
        assert_eq!(header.request_words(), 65535);
        assert_eq!(header.response_words(), 0);
    }

    #[test]
    fn test_header_unknown_command() {
        let bytes = [b'x', 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            Header::from_bytes(&bytes),
            Err(FrameError::UnknownCommand(b'x'))
        ));
    }

    #[test]
    fn test_write_request_encoding() {
        let mut buf = BytesMut::new();
        let request = Request::Write {
            addr: 0x100,
            words: vec![1, 0xDEAD_BEEF],
        };
        encode_request(&request, &mut buf).unwrap();

        assert_eq!(buf.len(), request.wire_size());
        assert_eq!(&buf[..8], &[b'w', 0, 2, 0, 0x00, 0x01, 0, 0]);
        assert_eq!(&buf[8..12], &[1, 0, 0, 0]);
        assert_eq!(&buf[12..16], &[0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[b'r', 0x00, 0x01][..]);
        let result = decode_request(&mut buf).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_request(
            &Request::Write {
                addr: 0,
                words: vec![1, 2, 3],
            },
            &mut buf,
        )
        .unwrap();
        buf.truncate(HEADER_SIZE + 5);

        let result = decode_request(&mut buf).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_unknown_command() {
        let mut buf = BytesMut::from(&[0xFF, 0, 0, 0, 0, 0, 0, 0][..]);
        let result = decode_request(&mut buf);
        assert!(matches!(result, Err(FrameError::UnknownCommand(0xFF))));
    }

    #[test]
    fn test_multiple_requests() {
        let mut buf = BytesMut::new();
        encode_request(&Request::Read { addr: 8, len: 2 }, &mut buf).unwrap();
        encode_request(
            &Request::Write {
                addr: 16,
                words: vec![7],
            },
            &mut buf,
        )
        .unwrap();
        encode_request(&Request::Close, &mut buf).unwrap();

        assert_eq!(
            decode_request(&mut buf).unwrap(),
            Some(Request::Read { addr: 8, len: 2 })
        );
        assert_eq!(
            decode_request(&mut buf).unwrap(),
            Some(Request::Write {
                addr: 16,
                words: vec![7]
            })
        );
        assert_eq!(decode_request(&mut buf).unwrap(), Some(Request::Close));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_too_many_words() {
        let request = Request::Write {
            addr: 0,
            words: vec![0; MAX_WORDS + 1],
        };
        let mut buf = BytesMut::new();
        assert!(matches!(
            encode_request(&request, &mut buf),
            Err(FrameError::TooManyWords { .. })
        ));
    }

    #[test]
    fn test_decode_words_ignores_partial_tail() {
        let words = decode_words(&[1, 0, 0, 0, 2, 0, 0, 0, 9]);
        assert_eq!(words, vec![1, 2]);
    }
}
