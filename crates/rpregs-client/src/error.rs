use std::time::Duration;

use rpregs_frame::HEADER_SIZE;

/// Errors that can occur in remote memory operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] rpregs_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] rpregs_frame::FrameError),

    /// No usable connection could be established. Never retried.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The device did not answer within the socket deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The response header does not echo the request header.
    #[error("protocol desync: expected header {expected:02x?}, received {received:02x?}")]
    ProtocolDesync {
        expected: [u8; HEADER_SIZE],
        received: [u8; HEADER_SIZE],
    },

    /// A bus returned fewer words than requested.
    #[error("short response: expected {expected} words, received {received}")]
    ShortResponse { expected: usize, received: usize },

    /// Every attempt of an operation failed.
    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ClientError>,
    },
}

impl ClientError {
    /// True for errors that end an operation immediately instead of
    /// consuming another attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Connection(_) | ClientError::RetriesExhausted { .. }
        )
    }

    /// True when the operation (or its last attempt) hit the socket deadline.
    pub fn is_timeout(&self) -> bool {
        match self {
            ClientError::Timeout(_) => true,
            ClientError::Transport(err) => err.is_timeout(),
            ClientError::Frame(err) => err.is_timeout(),
            ClientError::RetriesExhausted { last, .. } => last.is_timeout(),
            _ => false,
        }
    }

    /// The innermost error, looking through [`ClientError::RetriesExhausted`].
    pub fn root(&self) -> &ClientError {
        match self {
            ClientError::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_timeout_is_timeout() {
        let err = ClientError::RetriesExhausted {
            attempts: 5,
            last: Box::new(ClientError::Timeout(Duration::from_secs(1))),
        };
        assert!(err.is_timeout());
        assert!(err.is_fatal());
        assert!(matches!(err.root(), ClientError::Timeout(_)));
    }

    #[test]
    fn desync_message_shows_both_headers() {
        let err = ClientError::ProtocolDesync {
            expected: [b'r', 0, 1, 0, 0, 0, 0, 0],
            received: [0xff; 8],
        };
        let text = err.to_string();
        assert!(text.contains("72"));
        assert!(text.contains("ff"));
        assert!(!err.is_fatal());
    }
}
