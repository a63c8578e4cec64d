use rpregs_frame::{word_count, MAX_WORDS, WORD_SIZE};
use tracing::{debug, error, info, warn};

use crate::config::{ClientConfig, DesyncRecovery};
use crate::connector::Session;
use crate::error::{ClientError, Result};
use crate::reconnect::{PortRequest, Reconnector};

/// A blocking session with a device's memory server.
///
/// Each call sends one request and waits for its response; there is never
/// more than one request in flight. Failed attempts are retried on a fresh
/// connection up to [`ClientConfig::max_attempts`] times. The client is not
/// thread-safe; share it through a [`SharedBus`](crate::SharedBus).
pub struct RemoteMemoryClient {
    host: String,
    port: u16,
    session: Option<Session>,
    config: ClientConfig,
    reconnector: Option<Box<dyn Reconnector>>,
    read_count: u64,
    write_count: u64,
}

impl RemoteMemoryClient {
    pub(crate) fn establish(
        host: &str,
        port: PortRequest,
        config: ClientConfig,
        reconnector: Option<Box<dyn Reconnector>>,
    ) -> Result<Self> {
        let mut client = Self {
            host: host.to_string(),
            port: 0,
            session: None,
            config,
            reconnector,
            read_count: 0,
            write_count: 0,
        };

        client.port = match port {
            PortRequest::Fixed(port) => port,
            PortRequest::New => client.request_port()?,
        };

        let attempts = client.config.connect_attempts.max(1);
        for attempt in 1..=attempts {
            match Session::open(&client.host, client.port, &client.config) {
                Ok(session) => {
                    info!(host = %client.host, port = client.port, "connected to device");
                    client.session = Some(session);
                    return Ok(client);
                }
                Err(err) => {
                    warn!(
                        host = %client.host,
                        port = client.port,
                        attempt,
                        attempts,
                        error = %err,
                        "connection attempt failed"
                    );
                    if attempt < attempts {
                        client.port = client.next_port()?;
                    }
                }
            }
        }

        Err(ClientError::Connection(format!(
            "could not connect to {}:{} after {attempts} attempts",
            client.host, client.port
        )))
    }

    /// Read `count` consecutive words starting at `addr`.
    pub fn read(&mut self, addr: u32, count: u16) -> Result<Vec<u32>> {
        let words = self.with_retries("read", addr, |session| session.read(addr, count))?;
        self.read_count += 1;
        Ok(words)
    }

    /// Write `words` to consecutive addresses starting at `addr`.
    pub fn write(&mut self, addr: u32, words: &[u32]) -> Result<()> {
        word_count(words.len())?;
        self.with_retries("write", addr, |session| session.write(addr, words))?;
        self.write_count += 1;
        Ok(())
    }

    /// Read any number of words, split into requests of at most 65535 words.
    pub fn read_block(&mut self, addr: u32, count: usize) -> Result<Vec<u32>> {
        let mut words = Vec::with_capacity(count);
        let mut chunk_addr = addr;
        while words.len() < count {
            let chunk = (count - words.len()).min(MAX_WORDS);
            words.extend(self.read(chunk_addr, word_count(chunk)?)?);
            chunk_addr = advance(chunk_addr, chunk);
        }
        Ok(words)
    }

    /// Write any number of words, split into requests of at most 65535 words.
    pub fn write_block(&mut self, addr: u32, words: &[u32]) -> Result<()> {
        let mut chunk_addr = addr;
        for chunk in words.chunks(MAX_WORDS) {
            self.write(chunk_addr, chunk)?;
            chunk_addr = advance(chunk_addr, chunk.len());
        }
        Ok(())
    }

    /// Send the close message and drop the connection. Never fails.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
            debug!(host = %self.host, port = self.port, "session closed");
        }
    }

    /// Whether a socket is currently open.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port of the current (or most recent) connection.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Completed read operations.
    pub fn read_count(&self) -> u64 {
        self.read_count
    }

    /// Completed write operations.
    pub fn write_count(&self) -> u64 {
        self.write_count
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn with_retries<T>(
        &mut self,
        op: &'static str,
        addr: u32,
        mut attempt_once: impl FnMut(&mut Session) -> Result<T>,
    ) -> Result<T> {
        let attempts = self.config.max_attempts.max(1);
        let mut last = None;

        for attempt in 1..=attempts {
            let outcome = match self.ensure_session() {
                Ok(session) => attempt_once(session),
                Err(err) => Err(err),
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            error!(
                op,
                addr = format_args!("{addr:#010x}"),
                attempt,
                attempts,
                error = %err,
                "remote memory operation failed"
            );

            if attempt < attempts {
                self.recover(&err)?;
            } else {
                // Leave no half-read stream behind for the next call.
                self.close();
            }
            last = Some(err);
        }

        Err(match last {
            Some(last) => ClientError::RetriesExhausted {
                attempts,
                last: Box::new(last),
            },
            None => ClientError::Connection("no attempt was made".to_string()),
        })
    }

    fn ensure_session(&mut self) -> Result<&mut Session> {
        if self.session.is_none() {
            self.session = Some(Session::open(&self.host, self.port, &self.config)?);
        }
        self.session
            .as_mut()
            .ok_or_else(|| ClientError::Connection("session unavailable".to_string()))
    }

    fn recover(&mut self, err: &ClientError) -> Result<()> {
        if let (ClientError::ProtocolDesync { .. }, DesyncRecovery::Drain { budget, quiet }) =
            (err, self.config.desync)
        {
            if let Some(session) = self.session.as_mut() {
                match session.drain(budget, quiet) {
                    Ok(dropped) => {
                        warn!(dropped, "resynchronized by draining the stream");
                        return Ok(());
                    }
                    Err(drain_err) => {
                        warn!(error = %drain_err, "drain failed, reconnecting");
                    }
                }
            }
        }
        self.reconnect()
    }

    fn reconnect(&mut self) -> Result<()> {
        self.close();
        self.port = self.next_port()?;
        match Session::open(&self.host, self.port, &self.config) {
            Ok(session) => {
                info!(host = %self.host, port = self.port, "reconnected to device");
                self.session = Some(session);
            }
            Err(err) => {
                // Not fatal: the next attempt opens this port again, and its
                // failure counts against the attempt budget.
                warn!(host = %self.host, port = self.port, error = %err, "reconnect failed");
            }
        }
        Ok(())
    }

    /// Port for the next connection: the reconnector's answer, or the
    /// current port when there is no reconnector.
    fn next_port(&mut self) -> Result<u16> {
        if self.reconnector.is_some() {
            self.request_port()
        } else {
            Ok(self.port)
        }
    }

    fn request_port(&mut self) -> Result<u16> {
        let reconnector = self.reconnector.as_mut().ok_or_else(|| {
            ClientError::Connection("a new port was requested but no reconnector is set".into())
        })?;
        reconnector.get_port().ok_or_else(|| {
            error!(host = %self.host, "reconnector could not provide a server port");
            ClientError::Connection("reconnector could not provide a server port".to_string())
        })
    }
}

impl Drop for RemoteMemoryClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for RemoteMemoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteMemoryClient")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("connected", &self.session.is_some())
            .field("read_count", &self.read_count)
            .field("write_count", &self.write_count)
            .finish()
    }
}

fn advance(addr: u32, words: usize) -> u32 {
    // Word counts here never exceed MAX_WORDS, so the byte offset fits in u32.
    addr.wrapping_add((words * WORD_SIZE) as u32)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use rpregs_frame::{FrameReader, FrameWriter, Header, Request};
    use rpregs_transport::DeviceListener;

    use super::*;
    use crate::bus::MemoryMap;
    use crate::connector::{connect, connect_with_config};
    use crate::reconnect::PortSequence;
    use crate::server::DeviceServer;

    fn quick() -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_millis(200),
            ..ClientConfig::default()
        }
    }

    fn spawn_device() -> (u16, Arc<Mutex<MemoryMap>>) {
        let server = DeviceServer::bind("127.0.0.1:0").expect("server should bind");
        let port = server.port();
        let memory = server.memory();
        thread::spawn(move || {
            let _ = server.serve_forever();
        });
        (port, memory)
    }

    /// Device that answers the first `bad` requests with a corrupted header
    /// and serves the rest correctly. Counts every request it sees.
    fn spawn_flaky_device(bad: usize) -> (u16, Arc<AtomicUsize>) {
        let listener = DeviceListener::bind("127.0.0.1:0").expect("listener should bind");
        let port = listener.port();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);

        thread::spawn(move || {
            while let Ok(stream) = listener.accept() {
                let mut reader = FrameReader::new(stream.try_clone().expect("clone"));
                let mut writer = FrameWriter::new(stream);
                while let Ok(request) = reader.read_request() {
                    if request == Request::Close {
                        break;
                    }
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    let result = match request {
                        _ if n < bad => writer.send_ack(&Header::close()),
                        Request::Read { addr, len } => {
                            let words: Vec<u32> = (0..u32::from(len)).map(|i| addr + i).collect();
                            writer.send_read_response(addr, &words)
                        }
                        Request::Write { addr, words } => {
                            writer.send_ack(&Header::write(addr, words.len() as u16))
                        }
                        Request::Close => break,
                    };
                    if result.is_err() {
                        break;
                    }
                }
            }
        });

        (port, seen)
    }

    #[test]
    fn write_then_read_roundtrip() {
        let (port, memory) = spawn_device();
        let mut client = connect("127.0.0.1", port).expect("client should connect");

        client.write(0x100, &[1, 2, 3, 4]).expect("write should succeed");
        let words = client.read(0x100, 4).expect("read should succeed");

        assert_eq!(words, vec![1, 2, 3, 4]);
        assert_eq!(client.read_count(), 1);
        assert_eq!(client.write_count(), 1);
        assert_eq!(memory.lock().expect("lock").get(0x10c), 4);
    }

    #[test]
    fn block_transfer_spans_multiple_requests() {
        let (port, _memory) = spawn_device();
        let mut client = connect("127.0.0.1", port).expect("client should connect");

        let words: Vec<u32> = (0..(MAX_WORDS as u32 + 10)).collect();
        client.write_block(0x1000, &words).expect("block write");
        assert_eq!(client.write_count(), 2);

        let back = client.read_block(0x1000, words.len()).expect("block read");
        assert_eq!(back, words);
        assert_eq!(client.read_count(), 2);
    }

    #[test]
    fn oversized_write_is_rejected_up_front() {
        let (port, _memory) = spawn_device();
        let mut client = connect("127.0.0.1", port).expect("client should connect");
        let err = client.write(0, &vec![0; MAX_WORDS + 1]).unwrap_err();
        assert!(matches!(err, ClientError::Frame(_)));
        assert_eq!(client.write_count(), 0);
    }

    #[test]
    fn desync_is_retried_on_fresh_connection() {
        let (port, seen) = spawn_flaky_device(1);
        let mut client = connect_with_config(
            "127.0.0.1",
            PortRequest::Fixed(port),
            quick(),
            Some(Box::new(PortSequence::repeat(port))),
        )
        .expect("client should connect");

        let words = client.read(0x40, 2).expect("second attempt should succeed");
        assert_eq!(words, vec![0x40, 0x41]);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn desync_reported_and_client_stays_usable() {
        let (port, _seen) = spawn_flaky_device(5);
        let mut client = connect_with_config("127.0.0.1", PortRequest::Fixed(port), quick(), None)
            .expect("client should connect");

        let err = client.read(0x10, 1).unwrap_err();
        assert!(matches!(
            err.root(),
            ClientError::ProtocolDesync { .. }
        ));

        assert_eq!(client.read(0x10, 1).expect("client recovers"), vec![0x10]);
    }

    #[test]
    fn retries_exhausted_after_exactly_five_attempts() {
        let (port, seen) = spawn_flaky_device(usize::MAX);
        let calls = Arc::new(AtomicUsize::new(0));
        let reconnects = Arc::clone(&calls);
        let reconnector = move || {
            reconnects.fetch_add(1, Ordering::SeqCst);
            Some(port)
        };

        let mut client = connect_with_config(
            "127.0.0.1",
            PortRequest::Fixed(port),
            quick(),
            Some(Box::new(reconnector)),
        )
        .expect("client should connect");

        let err = client.write(0x20, &[7]).unwrap_err();
        assert!(matches!(
            err,
            ClientError::RetriesExhausted { attempts: 5, .. }
        ));
        assert_eq!(seen.load(Ordering::SeqCst), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(client.write_count(), 0);
    }

    #[test]
    fn dead_reconnect_port_uses_up_attempts() {
        let (port, seen) = spawn_flaky_device(usize::MAX);
        let dead = DeviceListener::bind("127.0.0.1:0").expect("bind").port();
        let calls = Arc::new(AtomicUsize::new(0));
        let reconnects = Arc::clone(&calls);
        let reconnector = move || {
            reconnects.fetch_add(1, Ordering::SeqCst);
            Some(dead)
        };

        let mut client = connect_with_config(
            "127.0.0.1",
            PortRequest::Fixed(port),
            quick(),
            Some(Box::new(reconnector)),
        )
        .expect("client should connect");

        let err = client.read(0, 1).unwrap_err();
        assert!(matches!(
            err,
            ClientError::RetriesExhausted { attempts: 5, .. }
        ));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(client.port(), dead);
    }

    #[test]
    fn missing_port_is_fatal() {
        let (port, seen) = spawn_flaky_device(usize::MAX);
        let mut client = connect_with_config(
            "127.0.0.1",
            PortRequest::Fixed(port),
            quick(),
            Some(Box::new(PortSequence::new([]))),
        )
        .expect("client should connect");

        let err = client.read(0, 1).unwrap_err();
        assert!(matches!(err, ClientError::Connection(_)));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn new_port_is_requested_before_connecting() {
        let (port, _memory) = spawn_device();
        let client = connect_with_config(
            "127.0.0.1",
            PortRequest::New,
            quick(),
            Some(Box::new(PortSequence::new([port]))),
        )
        .expect("client should connect");
        assert_eq!(client.port(), port);
        assert!(client.is_connected());
    }

    #[test]
    fn new_port_without_reconnector_fails() {
        let err = connect_with_config("127.0.0.1", PortRequest::New, quick(), None).unwrap_err();
        assert!(matches!(err, ClientError::Connection(_)));
    }

    #[test]
    fn failed_connect_asks_for_another_port() {
        let dead = DeviceListener::bind("127.0.0.1:0").expect("bind").port();
        let (live, _memory) = spawn_device();

        let client = connect_with_config(
            "127.0.0.1",
            PortRequest::Fixed(dead),
            quick(),
            Some(Box::new(PortSequence::new([live]))),
        )
        .expect("second port should work");
        assert_eq!(client.port(), live);
    }

    #[test]
    fn connect_gives_up_after_configured_attempts() {
        let dead = DeviceListener::bind("127.0.0.1:0").expect("bind").port();
        let config = ClientConfig {
            connect_attempts: 2,
            ..quick()
        };
        let err = connect_with_config("127.0.0.1", PortRequest::Fixed(dead), config, None)
            .unwrap_err();
        assert!(matches!(err, ClientError::Connection(msg) if msg.contains("2 attempts")));
    }

    #[test]
    fn silent_device_times_out() {
        let listener = DeviceListener::bind("127.0.0.1:0").expect("listener should bind");
        let port = listener.port();
        let held = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&held);
        thread::spawn(move || {
            while let Ok(stream) = listener.accept() {
                sink.lock().expect("lock").push(stream);
            }
        });

        let config = ClientConfig {
            timeout: Duration::from_millis(30),
            max_attempts: 2,
            ..ClientConfig::default()
        };
        let mut client = connect_with_config("127.0.0.1", PortRequest::Fixed(port), config, None)
            .expect("client should connect");

        let err = client.read(0, 1).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn drain_policy_keeps_connection() {
        let listener = DeviceListener::bind("127.0.0.1:0").expect("listener should bind");
        let port = listener.port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);

        thread::spawn(move || {
            while let Ok(stream) = listener.accept() {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut reader = FrameReader::new(stream.try_clone().expect("clone"));
                let mut writer = FrameWriter::new(stream);
                let mut first = true;
                while let Ok(request) = reader.read_request() {
                    match request {
                        Request::Read { addr, len } if first => {
                            first = false;
                            // Stale bytes followed by a bogus header.
                            let _ = writer.send_read_response(addr ^ 1, &vec![0; usize::from(len) + 3]);
                        }
                        Request::Read { addr, len } => {
                            let _ = writer.send_read_response(addr, &vec![9; usize::from(len)]);
                        }
                        _ => break,
                    }
                }
            }
        });

        let config = ClientConfig {
            desync: DesyncRecovery::Drain {
                budget: 4096,
                quiet: Duration::from_millis(50),
            },
            ..quick()
        };
        let mut client = connect_with_config("127.0.0.1", PortRequest::Fixed(port), config, None)
            .expect("client should connect");

        assert_eq!(client.read(0x8, 2).expect("read after drain"), vec![9, 9]);
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn close_is_idempotent() {
        let (port, _memory) = spawn_device();
        let mut client = connect("127.0.0.1", port).expect("client should connect");
        client.close();
        assert!(!client.is_connected());
        client.close();

        // A closed client reopens on demand.
        client.write(0, &[1]).expect("write after close");
        assert!(client.is_connected());
    }
}
