use rpregs_frame::{FrameConfig, FrameError, FrameReader, FrameWriter, Request};
use rpregs_transport::DeviceStream;
use tracing::debug;

use crate::client::RemoteMemoryClient;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::reconnect::{PortRequest, Reconnector};

/// Connect to a device's memory server with default configuration.
pub fn connect(host: &str, port: u16) -> Result<RemoteMemoryClient> {
    connect_with_config(host, PortRequest::Fixed(port), ClientConfig::default(), None)
}

/// Connect with explicit configuration and an optional reconnector.
///
/// `PortRequest::New` requires a reconnector.
pub fn connect_with_config(
    host: &str,
    port: PortRequest,
    config: ClientConfig,
    reconnector: Option<Box<dyn Reconnector>>,
) -> Result<RemoteMemoryClient> {
    RemoteMemoryClient::establish(host, port, config, reconnector)
}

/// One open socket, split into a framed reader and writer.
pub(crate) struct Session {
    reader: FrameReader<DeviceStream>,
    writer: FrameWriter<DeviceStream>,
    config: ClientConfig,
}

impl Session {
    pub(crate) fn open(host: &str, port: u16, config: &ClientConfig) -> Result<Self> {
        let stream = rpregs_transport::connect(host, port, config.timeout)?;
        stream.set_nodelay(true)?;
        let reader_stream = stream.try_clone()?;

        let frame_config = FrameConfig {
            read_timeout: Some(config.timeout),
            write_timeout: Some(config.timeout),
            ..FrameConfig::default()
        };

        let reader = FrameReader::with_config_device(reader_stream, frame_config.clone())?;
        let writer = FrameWriter::with_config_device(stream, frame_config)?;
        debug!(host, port, "session opened");

        Ok(Self {
            reader,
            writer,
            config: config.clone(),
        })
    }

    /// One read request and its response.
    pub(crate) fn read(&mut self, addr: u32, count: u16) -> Result<Vec<u32>> {
        let request = Request::Read { addr, len: count };
        self.exchange(&request)?;
        self.reader
            .read_words(usize::from(count))
            .map_err(|err| self.frame_error(err))
    }

    /// One write request and its acknowledgement.
    pub(crate) fn write(&mut self, addr: u32, words: &[u32]) -> Result<()> {
        let request = Request::Write {
            addr,
            words: words.to_vec(),
        };
        self.exchange(&request)
    }

    /// Send a request and check that the response echoes its header.
    fn exchange(&mut self, request: &Request) -> Result<()> {
        let expected = request.header()?.to_bytes();
        self.writer
            .send_request(request)
            .map_err(|err| self.frame_error(err))?;
        let received = self
            .reader
            .read_header_bytes()
            .map_err(|err| self.frame_error(err))?;
        if received != expected {
            return Err(ClientError::ProtocolDesync { expected, received });
        }
        Ok(())
    }

    /// Discard whatever is still in flight. See [`FrameReader::drain`].
    pub(crate) fn drain(&mut self, budget: usize, quiet: std::time::Duration) -> Result<usize> {
        Ok(self.reader.drain(budget, quiet)?)
    }

    /// Send the close message and shut the socket down. Errors are ignored.
    pub(crate) fn close(mut self) {
        let _ = self.writer.send_request(&Request::Close);
        self.writer.get_ref().shutdown();
    }

    fn frame_error(&self, err: FrameError) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout(self.config.timeout)
        } else {
            ClientError::Frame(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use rpregs_frame::Header;
    use rpregs_transport::DeviceListener;

    use super::*;

    #[test]
    fn session_detects_desync() {
        let listener = DeviceListener::bind("127.0.0.1:0").expect("listener should bind");
        let port = listener.port();

        let server = thread::spawn(move || {
            let stream = listener.accept().expect("listener should accept");
            let mut reader = FrameReader::new(stream.try_clone().expect("clone"));
            let mut writer = FrameWriter::new(stream);
            let _ = reader.read_request().expect("request");
            writer
                .send_ack(&Header::write(0xdead, 0))
                .expect("send bogus header");
        });

        let mut session = Session::open("127.0.0.1", port, &ClientConfig::default())
            .expect("session should open");
        let err = session.read(0x100, 1).unwrap_err();
        assert!(matches!(err, ClientError::ProtocolDesync { .. }));

        server.join().expect("server thread should finish");
    }

    #[test]
    fn session_times_out() {
        let listener = DeviceListener::bind("127.0.0.1:0").expect("listener should bind");
        let port = listener.port();
        let config = ClientConfig {
            timeout: Duration::from_millis(50),
            ..ClientConfig::default()
        };

        let mut session = Session::open("127.0.0.1", port, &config).expect("session should open");
        let _server_side = listener.accept().expect("listener should accept");

        let err = session.read(0, 1).unwrap_err();
        assert!(matches!(err, ClientError::Timeout(d) if d == Duration::from_millis(50)));
    }
}
