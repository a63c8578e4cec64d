use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::DeviceStream;

/// TCP listener for the device side of the protocol.
///
/// Used by the simulated device server; the real board runs its own
/// server process.
pub struct DeviceListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl DeviceListener {
    /// Bind and listen on the given address (`"127.0.0.1:0"` picks a free port).
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;

        info!(%local_addr, "listening for device clients");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<DeviceStream> {
        let (stream, addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%addr, "accepted connection");
        Ok(DeviceStream::from_tcp(stream))
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Port this listener is bound to.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

/// Connect to a device (blocking), trying every resolved address in turn.
///
/// `timeout` bounds each individual connection attempt.
pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<DeviceStream> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|_| TransportError::Resolve {
            host: host.to_string(),
            port,
        })?
        .collect();

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                debug!(%addr, "connected to device");
                return Ok(DeviceStream::from_tcp(stream));
            }
            Err(source) => last_err = Some(TransportError::Connect { addr, source }),
        }
    }

    Err(last_err.unwrap_or(TransportError::Resolve {
        host: host.to_string(),
        port,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_bind_accept_connect() {
        let listener = DeviceListener::bind("127.0.0.1:0").unwrap();
        let port = listener.port();
        assert_ne!(port, 0);

        let handle = std::thread::spawn(move || {
            let mut client = connect("127.0.0.1", port, Duration::from_secs(1)).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to obtain a port with nothing listening.
        let port = DeviceListener::bind("127.0.0.1:0").unwrap().port();
        let result = connect("127.0.0.1", port, Duration::from_millis(200));
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[test]
    fn test_bind_rejects_malformed_address() {
        let result = DeviceListener::bind("not-an-address");
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }

    #[test]
    fn test_read_timeout_applies() {
        let listener = DeviceListener::bind("127.0.0.1:0").unwrap();
        let port = listener.port();
        let client = connect("127.0.0.1", port, Duration::from_secs(1)).unwrap();
        let _server = listener.accept().unwrap();

        client
            .set_timeouts(Some(Duration::from_millis(20)))
            .unwrap();
        assert_eq!(
            client.read_timeout().unwrap(),
            Some(Duration::from_millis(20))
        );

        let mut client = client;
        let mut buf = [0u8; 1];
        let err = client.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ));
    }

    #[test]
    fn test_timeout_classification() {
        let err = TransportError::Io(std::io::Error::from(std::io::ErrorKind::TimedOut));
        assert!(err.is_timeout());
        let err = TransportError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(!err.is_timeout());
        assert!(!TransportError::Shutdown.is_timeout());
    }
}
