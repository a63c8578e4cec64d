use std::fmt;
use std::io;

use rpregs_client::ClientError;
use rpregs_frame::FrameError;
use rpregs_registers::{CodecError, RegisterError};
use rpregs_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn io_code(err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => FAILURE,
        _ => INTERNAL,
    }
}

fn transport_code(err: &TransportError) -> i32 {
    match err {
        TransportError::Bind { source, .. } | TransportError::Accept(source) => {
            match io_code(source) {
                INTERNAL => FAILURE,
                code => code,
            }
        }
        TransportError::Connect { source, .. } | TransportError::Io(source) => io_code(source),
        TransportError::Resolve { .. } | TransportError::Shutdown => TRANSPORT_ERROR,
    }
}

fn frame_code(err: &FrameError) -> i32 {
    match err {
        FrameError::Io(source) => io_code(source),
        FrameError::UnknownCommand(_) => DATA_INVALID,
        FrameError::TooManyWords { .. } => USAGE,
        FrameError::ConnectionClosed => TRANSPORT_ERROR,
    }
}

fn client_code(err: &ClientError) -> i32 {
    if err.is_timeout() {
        return TIMEOUT;
    }
    match err.root() {
        ClientError::Transport(err) => transport_code(err),
        ClientError::Frame(err) => frame_code(err),
        ClientError::Connection(_) => TRANSPORT_ERROR,
        ClientError::Timeout(_) => TIMEOUT,
        ClientError::ProtocolDesync { .. } | ClientError::ShortResponse { .. } => DATA_INVALID,
        ClientError::RetriesExhausted { .. } => FAILURE,
    }
}

fn register_code(err: &RegisterError) -> i32 {
    match err {
        RegisterError::Codec(CodecError::UnknownOption { .. })
        | RegisterError::Codec(CodecError::TypeMismatch { .. })
        | RegisterError::UnknownRegister { .. }
        | RegisterError::UnknownModule(_) => USAGE,
        RegisterError::Codec(_) => DATA_INVALID,
        RegisterError::Client(err) => client_code(err),
        RegisterError::BusPoisoned => INTERNAL,
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    CliError::new(client_code(&err), format!("{context}: {err}"))
}

pub fn register_error(context: &str, err: RegisterError) -> CliError {
    CliError::new(register_code(&err), format!("{context}: {err}"))
}

pub fn codec_error(context: &str, err: CodecError) -> CliError {
    register_error(context, RegisterError::Codec(err))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn exhausted_timeouts_map_to_timeout() {
        let err = ClientError::RetriesExhausted {
            attempts: 5,
            last: Box::new(ClientError::Timeout(Duration::from_millis(200))),
        };
        assert_eq!(client_error("read failed", err).code, TIMEOUT);
    }

    #[test]
    fn exhausted_desync_maps_to_invalid_data() {
        let err = ClientError::RetriesExhausted {
            attempts: 5,
            last: Box::new(ClientError::ProtocolDesync {
                expected: [b'r', 0, 1, 0, 0, 0, 0, 0],
                received: [b'c', 0, 0, 0, 0, 0, 0, 0],
            }),
        };
        assert_eq!(client_error("read failed", err).code, DATA_INVALID);
    }

    #[test]
    fn connection_failure_is_transport_error() {
        let err = ClientError::Connection("no port".into());
        let cli = client_error("connect failed", err);
        assert_eq!(cli.code, TRANSPORT_ERROR);
        assert!(cli.message.starts_with("connect failed: "));
    }

    #[test]
    fn user_mistakes_are_usage_errors() {
        let unknown = RegisterError::UnknownRegister {
            module: "pid0".into(),
            name: "nope".into(),
        };
        assert_eq!(register_error("get failed", unknown).code, USAGE);

        let option = CodecError::UnknownOption {
            name: "in3".into(),
            valid: vec!["in1".into(), "in2".into()],
        };
        assert_eq!(codec_error("set failed", option).code, USAGE);
        assert_eq!(
            codec_error("get failed", CodecError::UnknownCode(9)).code,
            DATA_INVALID
        );
    }
}
