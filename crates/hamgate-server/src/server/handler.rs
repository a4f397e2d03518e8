//! Per-connection protocol state machine
//!
//! Banner, then login, then the command loop. Every read is bounded by a
//! timeout and by the connection's cancellation token; a timeout or EOF ends
//! the connection normally.

use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use hamgate_core::{Callsign, ConnectionState, SessionId};
use hamgate_protocol::{parse, Command, LineCodec, ProtocolError, Reply};

use crate::auth::{is_code_format, Verification};
use crate::server::registry::ConnectionStatus;
use crate::state::GatewayState;

/// Timeout for callsign and code prompts
pub const CREDENTIAL_TIMEOUT: Duration = Duration::from_secs(60);

/// Malformed codes tolerated during one login
pub const MAX_MALFORMED_CODES: u32 = 10;

/// Longest a single write may block on a client that is not reading
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest the final flush and shutdown may take
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

const FAREWELL: &str = "73!";
const BAD_CODE_FORMAT: &str = "Invalid code format (must be 6 digits).";
const PROCESSING_ERROR: &str = "ERR: Command processing error";

/// Result of one bounded read
#[derive(Debug, PartialEq, Eq)]
enum ReadOutcome {
    /// A trimmed line
    Line(String),
    /// Nothing arrived in time
    TimedOut,
    /// EOF or cancellation
    Closed,
}

#[derive(Debug, PartialEq, Eq)]
enum LoginOutcome {
    Authenticated,
    Failed,
    Disconnected,
}

#[derive(Debug, PartialEq, Eq)]
enum Reauth {
    Granted,
    Denied,
    Closed,
}

/// Serves one client connection
pub struct ConnectionHandler<T> {
    framed: Framed<T, LineCodec>,
    state: Arc<GatewayState>,
    status: Arc<ConnectionStatus>,
    cancel: CancellationToken,
    /// Expect the callsign unprompted on the first attempt
    legacy_mode: bool,
    callsign: Option<Callsign>,
    session_id: Option<SessionId>,
    closed: bool,
}

impl<T> ConnectionHandler<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(
        io: T,
        state: Arc<GatewayState>,
        status: Arc<ConnectionStatus>,
        cancel: CancellationToken,
    ) -> Self {
        let codec = LineCodec::with_max_length(state.config.network.max_line_length);
        let legacy_mode = state.config.network.legacy_mode;

        Self {
            framed: Framed::new(io, codec),
            state,
            status,
            cancel,
            legacy_mode,
            callsign: None,
            session_id: None,
            closed: false,
        }
    }

    /// Run the connection to completion, then tear it down
    pub async fn run(mut self) {
        tracing::info!(
            conn = self.status.id,
            peer = %self.status.peer,
            legacy = self.legacy_mode,
            "Connection opened"
        );

        if let Err(e) = self.serve().await {
            tracing::warn!(
                conn = self.status.id,
                peer = %self.status.peer,
                "Connection error: {}",
                e
            );
        }

        self.close().await;
    }

    async fn serve(&mut self) -> Result<(), ProtocolError> {
        if !self.state.banner.is_empty() {
            let mut lines = self.state.banner.clone();
            lines.push(String::new());
            self.send_lines(lines).await?;
        }

        self.status.set_state(ConnectionState::LoggingIn);
        match self.authenticate().await? {
            LoginOutcome::Authenticated => self.command_loop().await,
            LoginOutcome::Failed => self.send_line("Authentication failed. Goodbye.").await,
            LoginOutcome::Disconnected => Ok(()),
        }
    }

    async fn authenticate(&mut self) -> Result<LoginOutcome, ProtocolError> {
        let max_attempts = self.state.config.security.max_login_attempts;
        let mut attempt = 1;
        let mut malformed = 0;

        while attempt <= max_attempts {
            let line = match self.read_callsign().await? {
                ReadOutcome::Line(line) => line,
                ReadOutcome::TimedOut => return Ok(LoginOutcome::Failed),
                ReadOutcome::Closed => return Ok(LoginOutcome::Disconnected),
            };

            let callsign = Callsign::normalize(&line);
            if callsign.is_empty() {
                self.send_line("Callsign required.").await?;
                attempt += 1;
                continue;
            }

            if self.state.authenticator.is_rate_limited(callsign.as_str()) {
                tracing::warn!(
                    conn = self.status.id,
                    peer = %self.status.peer,
                    callsign = %callsign,
                    "Login refused: rate limited"
                );
                self.send_line(Verification::RateLimited.message()).await?;
                return Ok(LoginOutcome::Failed);
            }

            let code = match self.read_line(Some("TOTP Code: "), CREDENTIAL_TIMEOUT).await? {
                ReadOutcome::Line(code) => code,
                ReadOutcome::TimedOut => return Ok(LoginOutcome::Failed),
                ReadOutcome::Closed => return Ok(LoginOutcome::Disconnected),
            };

            if !is_code_format(&code) {
                malformed += 1;
                self.send_line(BAD_CODE_FORMAT).await?;
                if malformed >= MAX_MALFORMED_CODES {
                    return Ok(LoginOutcome::Failed);
                }
                continue;
            }

            let verdict = self.state.authenticator.verify_code(callsign.as_str(), &code);
            if verdict.is_accepted() {
                let session_id = self.state.sessions.create_session(&callsign);
                tracing::info!(
                    conn = self.status.id,
                    peer = %self.status.peer,
                    callsign = %callsign,
                    session = %session_id.short(),
                    "Login succeeded"
                );

                self.status.set_callsign(callsign.clone());
                self.status.set_state(ConnectionState::Authenticated);
                self.session_id = Some(session_id);

                let welcome = format!("Welcome {}!", callsign);
                self.callsign = Some(callsign);
                self.send_lines(vec![
                    String::new(),
                    welcome,
                    "Type H for help".to_string(),
                    String::new(),
                ])
                .await?;
                return Ok(LoginOutcome::Authenticated);
            }

            tracing::warn!(
                conn = self.status.id,
                peer = %self.status.peer,
                callsign = %callsign,
                "Login attempt {}/{} failed",
                attempt,
                max_attempts
            );
            self.send_line(verdict.message()).await?;

            if verdict == Verification::RateLimited {
                return Ok(LoginOutcome::Failed);
            }
            if attempt < max_attempts {
                self.send_lines(vec![
                    format!("Try again ({} attempts remaining).", max_attempts - attempt),
                    String::new(),
                ])
                .await?;
            }
            attempt += 1;
        }

        self.send_line("Maximum authentication attempts exceeded.").await?;
        Ok(LoginOutcome::Failed)
    }

    /// Read a callsign, unprompted the first time in legacy mode
    ///
    /// An empty unprompted line switches the connection to prompted mode.
    async fn read_callsign(&mut self) -> Result<ReadOutcome, ProtocolError> {
        if self.legacy_mode {
            self.legacy_mode = false;
            match self.read_line(None, CREDENTIAL_TIMEOUT).await? {
                ReadOutcome::Line(line) if line.is_empty() => {
                    tracing::debug!(conn = self.status.id, "No callsign sent, prompting");
                }
                other => return Ok(other),
            }
        }

        self.read_line(Some("Callsign: "), CREDENTIAL_TIMEOUT).await
    }

    async fn command_loop(&mut self) -> Result<(), ProtocolError> {
        let (Some(callsign), Some(session_id)) = (self.callsign.clone(), self.session_id.clone())
        else {
            return Ok(());
        };
        let idle_timeout = self.state.config.network.idle_timeout;

        loop {
            if !self.state.sessions.is_active(&session_id) {
                self.session_expired(&callsign).await?;
                break;
            }

            let line = match self.read_line(Some("> "), idle_timeout).await? {
                ReadOutcome::Line(line) => line,
                ReadOutcome::TimedOut => {
                    tracing::info!(conn = self.status.id, callsign = %callsign, "Idle timeout");
                    self.send_lines(vec!["Idle timeout.".to_string(), FAREWELL.to_string()])
                        .await?;
                    break;
                }
                ReadOutcome::Closed => break,
            };

            if line.is_empty() {
                continue;
            }
            if !self.state.sessions.touch(&session_id) {
                self.session_expired(&callsign).await?;
                break;
            }

            let command = match std::panic::catch_unwind(|| parse(&line)) {
                Ok(Ok(command)) => command,
                Ok(Err(e)) => {
                    self.send_lines(e.to_lines()).await?;
                    continue;
                }
                Err(_) => {
                    tracing::error!(conn = self.status.id, "Parser panicked");
                    self.send_line(PROCESSING_ERROR).await?;
                    continue;
                }
            };

            if matches!(command, Command::Quit) {
                tracing::info!(conn = self.status.id, callsign = %callsign, "Operator quit");
                self.send_line(FAREWELL).await?;
                break;
            }

            if command.is_write_operation() {
                match self.reauthorize(&callsign, &command).await? {
                    Reauth::Granted => {}
                    Reauth::Denied => continue,
                    Reauth::Closed => break,
                }
            }

            let lines = self.execute(&command).await;
            self.send_lines(lines).await?;
        }

        Ok(())
    }

    async fn session_expired(&mut self, callsign: &Callsign) -> Result<(), ProtocolError> {
        tracing::info!(conn = self.status.id, callsign = %callsign, "Session expired");
        self.send_line("Session expired due to inactivity.").await
    }

    /// Ask for a fresh code before a write command
    ///
    /// Independent of the login session: the session is neither read nor
    /// refreshed here.
    async fn reauthorize(
        &mut self,
        callsign: &Callsign,
        command: &Command,
    ) -> Result<Reauth, ProtocolError> {
        self.status.set_state(ConnectionState::ReauthPending);
        let outcome = self.read_reauth_code(callsign, command).await;
        self.status.set_state(ConnectionState::Authenticated);
        outcome
    }

    async fn read_reauth_code(
        &mut self,
        callsign: &Callsign,
        command: &Command,
    ) -> Result<Reauth, ProtocolError> {
        self.send_line("").await?;

        let code = match self.read_line(Some("TOTP Code: "), CREDENTIAL_TIMEOUT).await? {
            ReadOutcome::Line(code) => code,
            ReadOutcome::TimedOut => {
                self.send_line("Operation cancelled.").await?;
                return Ok(Reauth::Denied);
            }
            ReadOutcome::Closed => return Ok(Reauth::Closed),
        };

        if !is_code_format(&code) {
            self.send_lines(vec![BAD_CODE_FORMAT.to_string(), String::new()])
                .await?;
            return Ok(Reauth::Denied);
        }

        let verdict = self.state.authenticator.verify_code(callsign.as_str(), &code);
        if !verdict.is_accepted() {
            tracing::warn!(
                conn = self.status.id,
                callsign = %callsign,
                command = command.name(),
                "Write re-authentication failed"
            );
            self.send_lines(vec![verdict.message().to_string(), String::new()])
                .await?;
            return Ok(Reauth::Denied);
        }

        tracing::info!(
            conn = self.status.id,
            callsign = %callsign,
            command = command.name(),
            "Write re-authenticated"
        );
        Ok(Reauth::Granted)
    }

    /// Run a command, confining executor errors and panics to one line
    async fn execute(&mut self, command: &Command) -> Vec<String> {
        let executor = Arc::clone(&self.state.executor);

        match AssertUnwindSafe(executor.execute(command)).catch_unwind().await {
            Ok(Ok(lines)) => lines,
            Ok(Err(e)) => {
                tracing::error!(
                    conn = self.status.id,
                    command = command.name(),
                    "Command failed: {}",
                    e
                );
                vec![PROCESSING_ERROR.to_string()]
            }
            Err(_) => {
                tracing::error!(
                    conn = self.status.id,
                    command = command.name(),
                    "Executor panicked"
                );
                vec![PROCESSING_ERROR.to_string()]
            }
        }
    }

    /// Read one line, optionally after writing a prompt
    async fn read_line(
        &mut self,
        prompt: Option<&str>,
        limit: Duration,
    ) -> Result<ReadOutcome, ProtocolError> {
        if let Some(prompt) = prompt {
            self.send(Reply::prompt(prompt)).await?;
        }

        let cancel = self.cancel.clone();
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(ReadOutcome::Closed),
            next = tokio::time::timeout(limit, self.framed.next()) => next,
        };

        match next {
            Err(_) => {
                tracing::debug!(conn = self.status.id, "Read timed out after {:?}", limit);
                Ok(ReadOutcome::TimedOut)
            }
            Ok(None) => {
                tracing::debug!(conn = self.status.id, "Peer closed the connection");
                Ok(ReadOutcome::Closed)
            }
            Ok(Some(Ok(line))) => {
                self.status.touch();
                Ok(ReadOutcome::Line(line.trim().to_string()))
            }
            Ok(Some(Err(e))) => Err(e),
        }
    }

    async fn send_line(&mut self, text: &str) -> Result<(), ProtocolError> {
        self.send(Reply::line(text)).await
    }

    async fn send(&mut self, reply: Reply) -> Result<(), ProtocolError> {
        self.write(std::iter::once(reply)).await
    }

    async fn send_lines(&mut self, lines: Vec<String>) -> Result<(), ProtocolError> {
        self.write(lines.into_iter().map(Reply::Line)).await
    }

    /// Queue replies and flush, giving up on cancellation or a stalled peer
    async fn write<I>(&mut self, replies: I) -> Result<(), ProtocolError>
    where
        I: IntoIterator<Item = Reply>,
    {
        let cancel = self.cancel.clone();
        let framed = &mut self.framed;

        let write = async move {
            for reply in replies {
                framed.feed(reply).await?;
            }
            framed.flush().await
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(aborted("connection cancelled")),
            result = tokio::time::timeout(WRITE_TIMEOUT, write) => {
                result.unwrap_or_else(|_| Err(aborted("write timed out")))
            }
        }
    }

    /// End the session and close the transport; safe to call twice
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(session_id) = self.session_id.take() {
            self.state.sessions.end_session(&session_id);
        }
        self.status.set_state(ConnectionState::Closed);

        match tokio::time::timeout(CLOSE_TIMEOUT, self.framed.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(conn = self.status.id, "Error closing transport: {}", e);
            }
            Err(_) => {
                tracing::debug!(conn = self.status.id, "Timed out closing transport");
            }
        }

        tracing::info!(
            conn = self.status.id,
            peer = %self.status.peer,
            callsign = self.callsign.as_ref().map(Callsign::as_str).unwrap_or("-"),
            "Connection closed"
        );
    }
}

impl<T> Drop for ConnectionHandler<T> {
    fn drop(&mut self) {
        if let Some(session_id) = self.session_id.take() {
            self.state.sessions.end_session(&session_id);
        }
    }
}

fn aborted(reason: &str) -> ProtocolError {
    ProtocolError::Io(io::Error::new(io::ErrorKind::ConnectionAborted, reason.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{build_generator, Authenticator};
    use crate::backend::{BackendError, CommandExecutor};
    use crate::server::registry::ConnectionRegistry;
    use async_trait::async_trait;
    use hamgate_core::config::GatewayConfig;
    use hamgate_core::time::current_time_secs;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    const SECRET: &str = "JBSWY3DPEHPK3PXP";

    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<Command>>,
        fail: bool,
        panic: bool,
    }

    #[async_trait]
    impl CommandExecutor for RecordingExecutor {
        async fn execute(&self, command: &Command) -> Result<Vec<String>, BackendError> {
            self.calls.lock().unwrap().push(command.clone());
            if self.panic {
                panic!("executor fault");
            }
            if self.fail {
                return Err(BackendError::Unauthorized);
            }
            Ok(vec![format!("OK: {}", command.name())])
        }
    }

    struct Harness {
        client: DuplexStream,
        state: Arc<GatewayState>,
        executor: Arc<RecordingExecutor>,
        task: tokio::task::JoinHandle<()>,
        _registry: Arc<ConnectionRegistry>,
    }

    fn harness_with(config: GatewayConfig, executor: RecordingExecutor) -> Harness {
        let executor = Arc::new(executor);
        let authenticator = Arc::new(Authenticator::with_secrets([("KN4XYZ", SECRET)]));
        let state = Arc::new(GatewayState::new(
            config,
            authenticator,
            Arc::clone(&executor) as Arc<dyn CommandExecutor>,
        ));

        let registry = Arc::new(ConnectionRegistry::new());
        let guard = registry.register("127.0.0.1:5000".parse().unwrap());
        let (client, server) = tokio::io::duplex(64 * 1024);

        let handler = ConnectionHandler::new(
            server,
            Arc::clone(&state),
            Arc::clone(guard.status()),
            CancellationToken::new(),
        );
        let task = tokio::spawn(async move {
            let _guard = guard;
            handler.run().await;
        });

        Harness {
            client,
            state,
            executor,
            task,
            _registry: registry,
        }
    }

    fn harness() -> Harness {
        let mut config = GatewayConfig::default();
        config.security.banner_text = String::new();
        harness_with(config, RecordingExecutor::default())
    }

    fn valid_code() -> String {
        build_generator(&Callsign::from("KN4XYZ"), SECRET)
            .unwrap()
            .generate(current_time_secs())
    }

    fn wrong_code() -> String {
        let valid = valid_code();
        if valid == "000000" { "111111" } else { "000000" }.to_string()
    }

    /// Write input, close the write side and collect everything the server sends
    async fn converse(mut h: Harness, input: &str) -> (String, Harness) {
        h.client.write_all(input.as_bytes()).await.unwrap();
        h.client.shutdown().await.unwrap();

        let mut output = Vec::new();
        h.client.read_to_end(&mut output).await.unwrap();
        (String::from_utf8_lossy(&output).into_owned(), h)
    }

    #[tokio::test]
    async fn test_legacy_login_and_quit() {
        let code = valid_code();
        let (output, h) = converse(harness(), &format!("KN4XYZ\r\n{}\r\nQ\r\n", code)).await;

        assert!(!output.starts_with("Callsign: "));
        assert!(output.contains("TOTP Code: "));
        assert!(output.contains("Welcome KN4XYZ!\r\n"));
        assert!(output.contains("Type H for help\r\n"));
        assert!(output.ends_with("> 73!\r\n"));

        h.task.await.unwrap();
        assert!(h.state.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_empty_legacy_line_switches_to_prompt() {
        let code = valid_code();
        let (output, _h) = converse(harness(), &format!("\r\nkn4xyz\r\n{}\r\nQ\r\n", code)).await;

        assert!(output.starts_with("Callsign: "));
        assert!(output.contains("Welcome KN4XYZ!"));
    }

    #[tokio::test]
    async fn test_banner_is_boxed() {
        let (output, _h) = converse(
            harness_with(GatewayConfig::default(), RecordingExecutor::default()),
            "",
        )
        .await;
        assert!(output.starts_with("╔"));
        assert!(output.contains("║  HamGate  ║\r\n"));
    }

    #[tokio::test]
    async fn test_failed_attempts_then_goodbye() {
        let wrong = wrong_code();
        let input = format!("KN4XYZ\r\n{w}\r\nKN4XYZ\r\n{w}\r\nKN4XYZ\r\n{w}\r\n", w = wrong);
        let (output, h) = converse(harness(), &input).await;

        assert!(output.contains("Invalid callsign or token.\r\n"));
        assert!(output.contains("Try again (2 attempts remaining).\r\n"));
        assert!(output.contains("Try again (1 attempts remaining).\r\n"));
        assert!(output.contains("Maximum authentication attempts exceeded.\r\n"));
        assert!(output.ends_with("Authentication failed. Goodbye.\r\n"));
        assert!(h.state.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_code_does_not_consume_attempt() {
        let code = valid_code();
        let input = format!(
            "KN4XYZ\r\n12ab56\r\nKN4XYZ\r\n1234567\r\nKN4XYZ\r\n\r\nKN4XYZ\r\n{}\r\nQ\r\n",
            code
        );

        let mut config = GatewayConfig::default();
        config.security.banner_text = String::new();
        config.security.max_login_attempts = 1;
        let (output, _h) = converse(harness_with(config, RecordingExecutor::default()), &input).await;

        assert_eq!(output.matches(BAD_CODE_FORMAT).count(), 3);
        assert!(output.contains("Welcome KN4XYZ!"));
    }

    #[tokio::test]
    async fn test_malformed_code_limit() {
        let input = "KN4XYZ\r\nabc\r\n".to_string() + &"KN4XYZ\r\nabc\r\n".repeat(20);
        let (output, _h) = converse(harness(), &input).await;

        assert_eq!(
            output.matches(BAD_CODE_FORMAT).count(),
            MAX_MALFORMED_CODES as usize
        );
        assert!(output.ends_with("Authentication failed. Goodbye.\r\n"));
    }

    #[tokio::test]
    async fn test_empty_callsign_consumes_attempt() {
        let mut config = GatewayConfig::default();
        config.security.banner_text = String::new();
        config.network.legacy_mode = false;
        config.security.max_login_attempts = 2;

        let (output, _h) =
            converse(harness_with(config, RecordingExecutor::default()), "\r\n  \r\n").await;

        assert_eq!(output.matches("Callsign required.").count(), 2);
        assert!(output.ends_with("Authentication failed. Goodbye.\r\n"));
    }

    #[tokio::test]
    async fn test_rate_limited_login_aborts() {
        let h = harness();
        for _ in 0..5 {
            h.state.authenticator.record_failure("KN4XYZ");
        }

        let (output, h) = converse(h, "KN4XYZ\r\n").await;
        assert!(output.contains("Too many failed attempts. Try again in 5 minutes.\r\n"));
        assert!(!output.contains("TOTP Code: "));
        assert!(h.executor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_requires_fresh_code() {
        let code = valid_code();
        let wrong = wrong_code();
        let input = format!("KN4XYZ\r\n{}\r\nON 1\r\n{}\r\nL\r\nQ\r\n", code, wrong);
        let (output, h) = converse(harness(), &input).await;

        assert!(output.contains("> \r\nTOTP Code: Invalid callsign or token.\r\n\r\n> "));
        assert!(output.contains("OK: LIST\r\n"));

        let calls = h.executor.calls.lock().unwrap();
        assert_eq!(*calls, vec![Command::List { page: None }]);
    }

    #[tokio::test]
    async fn test_write_rejects_replayed_login_code() {
        let code = valid_code();
        let input = format!("KN4XYZ\r\n{c}\r\nOFF 2\r\n{c}\r\nQ\r\n", c = code);
        let (output, h) = converse(harness(), &input).await;

        assert!(output.contains("Code already used. Wait for next code.\r\n"));
        assert!(h.executor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_parse_errors_and_empty_lines() {
        let code = valid_code();
        let input = format!("KN4XYZ\r\n{}\r\n\r\nFROB\r\nS\r\nQ\r\n", code);
        let (output, _h) = converse(harness(), &input).await;

        assert!(output.contains("ERR: Unknown command: FROB\r\nType H for help\r\n"));
        assert!(output.contains("ERR: SHOW requires device ID\r\n"));
        assert!(output.ends_with("73!\r\n"));
    }

    #[tokio::test]
    async fn test_executor_error_is_contained() {
        let code = valid_code();
        let mut config = GatewayConfig::default();
        config.security.banner_text = String::new();
        let executor = RecordingExecutor {
            fail: true,
            ..Default::default()
        };

        let input = format!("KN4XYZ\r\n{}\r\nL\r\nH\r\nQ\r\n", code);
        let (output, _h) = converse(harness_with(config, executor), &input).await;

        assert_eq!(output.matches(PROCESSING_ERROR).count(), 2);
        assert!(output.ends_with("73!\r\n"));
    }

    #[tokio::test]
    async fn test_executor_panic_is_contained() {
        let code = valid_code();
        let mut config = GatewayConfig::default();
        config.security.banner_text = String::new();
        let executor = RecordingExecutor {
            panic: true,
            ..Default::default()
        };

        let input = format!("KN4XYZ\r\n{}\r\nL\r\nQ\r\n", code);
        let (output, h) = converse(harness_with(config, executor), &input).await;

        assert!(output.contains(PROCESSING_ERROR));
        assert!(output.ends_with("73!\r\n"));
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_credential_timeout() {
        let mut h = harness();

        let mut output = Vec::new();
        h.client.read_to_end(&mut output).await.unwrap();
        let output = String::from_utf8_lossy(&output);

        assert!(output.ends_with("Authentication failed. Goodbye.\r\n"));
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_ends_session() {
        let mut h = harness();
        let code = valid_code();
        h.client
            .write_all(format!("KN4XYZ\r\n{}\r\n", code).as_bytes())
            .await
            .unwrap();

        let mut output = Vec::new();
        h.client.read_to_end(&mut output).await.unwrap();
        let output = String::from_utf8_lossy(&output);

        assert!(output.contains("Welcome KN4XYZ!"));
        assert!(output.ends_with("> Idle timeout.\r\n73!\r\n"));
        assert!(h.state.sessions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_expiry() {
        let mut config = GatewayConfig::default();
        config.security.banner_text = String::new();
        config.security.session_timeout = Duration::from_secs(60);
        config.network.idle_timeout = Duration::from_secs(600);

        let mut h = harness_with(config, RecordingExecutor::default());
        let code = valid_code();
        h.client
            .write_all(format!("KN4XYZ\r\n{}\r\n", code).as_bytes())
            .await
            .unwrap();

        // Stay silent past the session timeout but inside the idle timeout
        tokio::time::sleep(Duration::from_secs(120)).await;
        h.client.write_all(b"L\r\n").await.unwrap();

        let mut output = Vec::new();
        h.client.read_to_end(&mut output).await.unwrap();
        let output = String::from_utf8_lossy(&output);

        assert!(!output.contains("OK: LIST"));
        assert!(output.ends_with("> Session expired due to inactivity.\r\n"));
        assert!(h.executor.calls.lock().unwrap().is_empty());
    }
}
