//! Binary request/response framing for remote memory access.
//!
//! Every message starts with the same 8-byte header:
//! - 1 byte command (`'r'`, `'w'` or `'c'`)
//! - 1 reserved zero byte
//! - 2-byte little-endian word count
//! - 4-byte little-endian start address
//!
//! Write requests and read responses carry `count` little-endian `u32`
//! words after the header. Responses echo the request header verbatim, which
//! is the only synchronization check the protocol offers.

pub mod codec;
pub mod command;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_request, decode_words, encode_request, encode_words, word_count, FrameConfig, Header,
    Request, HEADER_SIZE, MAX_WORDS, WORD_SIZE,
};
pub use command::Command;
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
