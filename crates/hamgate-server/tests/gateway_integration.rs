//! Gateway integration tests
//!
//! Each test runs a real listener on a loopback port with an in-memory
//! identity and a recording executor, and talks to it over TCP.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use hamgate_core::config::{GatewayConfig, IdentityFile};
use hamgate_core::time::current_time_secs;
use hamgate_core::Callsign;
use hamgate_protocol::Command;
use hamgate_server::auth::{build_generator, Authenticator};
use hamgate_server::backend::{BackendError, CommandExecutor};
use hamgate_server::server::Listener;
use hamgate_server::GatewayState;

const CALLSIGN: &str = "KN4XYZ";
const SECRET: &str = "JBSWY3DPEHPK3PXP";
const IO_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct RecordingExecutor {
    calls: Mutex<Vec<Command>>,
}

#[async_trait]
impl CommandExecutor for RecordingExecutor {
    async fn execute(&self, command: &Command) -> Result<Vec<String>, BackendError> {
        self.calls.lock().unwrap().push(command.clone());
        Ok(vec![format!("OK: {}", command.name())])
    }
}

struct TestGateway {
    addr: SocketAddr,
    listener: Arc<Listener>,
    executor: Arc<RecordingExecutor>,
    serve: tokio::task::JoinHandle<()>,
    _dir: tempfile::TempDir,
}

impl TestGateway {
    async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    async fn start_with(customize: impl FnOnce(&mut GatewayConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let users = dir.path().join("users.toml");

        let mut identities = IdentityFile::default();
        identities.insert(&Callsign::from(CALLSIGN), SECRET);
        identities.save(&users).unwrap();

        let mut config = GatewayConfig::default();
        config.network.host = "127.0.0.1".to_string();
        config.network.port = 0;
        config.identities.path = users.clone();
        customize(&mut config);

        let executor = Arc::new(RecordingExecutor::default());
        let state = Arc::new(GatewayState::new(
            config,
            Arc::new(Authenticator::load(&users)),
            Arc::clone(&executor) as Arc<dyn CommandExecutor>,
        ));

        let listener = Arc::new(Listener::new(state, CancellationToken::new()));
        let socket = listener.bind().await.unwrap();
        let addr = socket.local_addr().unwrap();

        let server = Arc::clone(&listener);
        let serve = tokio::spawn(async move {
            server.serve(socket).await.unwrap();
        });

        Self {
            addr,
            listener,
            executor,
            serve,
            _dir: dir,
        }
    }

    async fn connect(&self) -> TestClient {
        TestClient::connect(self.addr).await
    }

    fn calls(&self) -> Vec<Command> {
        self.executor.calls.lock().unwrap().clone()
    }

    async fn stop(self) {
        self.listener.shutdown().await;
        self.serve.await.unwrap();
    }
}

struct TestClient {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    pending: String,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self {
            reader,
            writer,
            pending: String::new(),
        }
    }

    async fn send(&mut self, line: &str) {
        self.send_raw(format!("{}\r\n", line).as_bytes()).await;
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }

    /// Read until `needle` arrives; returns everything up to and including it
    async fn expect(&mut self, needle: &str) -> String {
        let deadline = tokio::time::Instant::now() + IO_TIMEOUT;
        let mut buf = [0u8; 4096];

        loop {
            if let Some(index) = self.pending.find(needle) {
                let end = index + needle.len();
                let seen = self.pending[..end].to_string();
                self.pending.drain(..end);
                return seen;
            }

            let n = tokio::time::timeout_at(deadline, self.reader.read(&mut buf))
                .await
                .unwrap_or_else(|_| panic!("timed out waiting for {:?}, got {:?}", needle, self.pending))
                .unwrap();
            assert!(n > 0, "connection closed waiting for {:?}, got {:?}", needle, self.pending);
            self.pending.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
    }

    /// Read everything until the server closes the connection
    async fn read_to_close(&mut self) -> String {
        let mut rest = Vec::new();
        tokio::time::timeout(IO_TIMEOUT, self.reader.read_to_end(&mut rest))
            .await
            .expect("server did not close the connection")
            .unwrap();
        let mut output = std::mem::take(&mut self.pending);
        output.push_str(&String::from_utf8_lossy(&rest));
        output
    }

    async fn login(&mut self) {
        self.expect("╝\r\n").await;
        self.send(CALLSIGN).await;
        self.expect("TOTP Code: ").await;
        self.send(&valid_code()).await;
        self.expect("Type H for help\r\n").await;
        self.expect("> ").await;
    }
}

fn valid_code() -> String {
    build_generator(&Callsign::from(CALLSIGN), SECRET)
        .unwrap()
        .generate(current_time_secs())
}

fn wrong_code() -> String {
    if valid_code() == "000000" { "111111" } else { "000000" }.to_string()
}

#[tokio::test]
async fn test_legacy_login_welcomes_operator() {
    let gateway = TestGateway::start().await;
    let mut client = gateway.connect().await;

    let banner = client.expect("╝\r\n").await;
    assert!(banner.contains("HamGate"));

    client.send("kn4xyz").await;
    client.expect("TOTP Code: ").await;
    client.send(&valid_code()).await;

    let welcome = client.expect("> ").await;
    assert!(welcome.contains("Welcome KN4XYZ!"));

    client.send("Q").await;
    assert!(client.read_to_close().await.contains("73!"));
    gateway.stop().await;
}

#[tokio::test]
async fn test_write_with_wrong_code_is_not_executed() {
    let gateway = TestGateway::start().await;
    let mut client = gateway.connect().await;
    client.login().await;

    client.send("ON 1").await;
    client.expect("TOTP Code: ").await;
    client.send(&wrong_code()).await;

    let reply = client.expect("> ").await;
    assert!(reply.contains("Invalid callsign or token."));
    assert!(gateway.calls().is_empty());

    client.send("L 2").await;
    assert!(client.expect("> ").await.contains("OK: LIST"));
    assert_eq!(gateway.calls(), vec![Command::List { page: Some(2) }]);

    client.send("Q").await;
    client.read_to_close().await;
    gateway.stop().await;
}

#[tokio::test]
async fn test_prompted_login_with_lowercase_callsign() {
    let gateway = TestGateway::start_with(|config| {
        config.network.legacy_mode = false;
        config.security.banner_text = String::new();
    })
    .await;
    let mut client = gateway.connect().await;

    client.expect("Callsign: ").await;
    client.send("  kn4xyz ").await;
    client.expect("TOTP Code: ").await;
    client.send(&valid_code()).await;
    assert!(client.expect("> ").await.contains("Welcome KN4XYZ!"));

    client.send("bye").await;
    client.read_to_close().await;
    gateway.stop().await;
}

#[tokio::test]
async fn test_hostile_input_ends_cleanly() {
    let long_line = "A".repeat(10 * 1024);
    let corpus: Vec<Vec<u8>> = vec![
        vec![0xff, 0xfb, 0x01, 0xff, 0xfd, 0x03, b'\r', b'\n'],
        vec![0x00, 0x01, 0x02, 0x1b, b'[', b'2', b'J', b'\n'],
        format!("{}\r\n", long_line).into_bytes(),
        b"\r\n\r\n\n\n".to_vec(),
        vec![0xc3, 0x28, 0xa0, 0xa1, b'\n'],
        b"S 1 \xf0\x9f\x92\xa5\r\n".to_vec(),
        b"ON -1\r\nS 99999999999999999999\r\nL 0\r\n".to_vec(),
    ];

    let gateway = TestGateway::start().await;

    // Codes are single-use, so the logged-in half of the corpus shares one login
    let mut client = gateway.connect().await;
    client.login().await;
    for input in &corpus {
        client.send_raw(input).await;
    }
    client.send("QUIT").await;
    let output = client.read_to_close().await;
    assert!(output.contains("ERR: Device ID must be >= 1"));
    assert!(output.ends_with("73!\r\n"));
    assert_eq!(gateway.calls(), vec![Command::Show { id: 1 }]);

    for input in &corpus {
        let mut client = gateway.connect().await;
        client.send_raw(input).await;
        client.writer.shutdown().await.unwrap();
        client.read_to_close().await;
    }

    gateway.stop().await;
}

#[tokio::test]
async fn test_disallowed_address_is_rejected() {
    let gateway = TestGateway::start_with(|config| {
        config.security.ip_allowlist = vec!["192.0.2.0/24".to_string()];
    })
    .await;

    let mut client = gateway.connect().await;
    assert_eq!(
        client.read_to_close().await,
        "ERR: Connection not allowed from this address.\r\n"
    );
    gateway.stop().await;
}

#[tokio::test]
async fn test_connection_limit() {
    let gateway = TestGateway::start_with(|config| {
        config.network.max_connections = 1;
    })
    .await;

    let mut first = gateway.connect().await;
    first.expect("╝\r\n").await;

    let mut second = gateway.connect().await;
    assert_eq!(
        second.read_to_close().await,
        "ERR: Connection limit reached. Try again later.\r\n"
    );

    first.send("").await;
    first.send("Q").await;
    first.writer.shutdown().await.unwrap();
    first.read_to_close().await;

    // The slot frees once the first handler has finished
    let deadline = tokio::time::Instant::now() + IO_TIMEOUT;
    while gateway.listener.stats().active_connections > 0 {
        assert!(tokio::time::Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let mut third = gateway.connect().await;
    third.expect("╝\r\n").await;
    gateway.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_silent_clients() {
    let gateway = TestGateway::start().await;

    let mut idle = gateway.connect().await;
    idle.expect("╝\r\n").await;
    let mut logged_in = gateway.connect().await;
    logged_in.login().await;

    let stats = gateway.listener.stats();
    assert_eq!(stats.active_connections, 2);
    assert_eq!(gateway.listener.active_callsigns(), vec!["KN4XYZ".to_string()]);

    tokio::time::timeout(IO_TIMEOUT, gateway.listener.shutdown())
        .await
        .expect("shutdown did not finish");

    idle.read_to_close().await;
    logged_in.read_to_close().await;
    assert_eq!(gateway.listener.stats().active_connections, 0);
    gateway.serve.await.unwrap();
}
