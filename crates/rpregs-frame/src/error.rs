/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header carries a command byte the protocol does not define.
    #[error("unknown command byte 0x{0:02x}")]
    UnknownCommand(u8),

    /// A request would carry more words than the 16-bit length field allows.
    #[error("too many words ({count}, max {max})")]
    TooManyWords { count: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True when the frame operation hit the socket deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FrameError::Io(err)
                if matches!(err.kind(), std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock)
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
