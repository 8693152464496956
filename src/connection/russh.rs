//! SSH transport for IOS devices using russh.
//!
//! Show commands each run on their own exec channel. Configuration is pushed
//! through an interactive shell (`configure terminal` ... `end`), since IOS
//! does not accept configuration over exec. Output is scanned for the CLI's
//! `%` error markers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{Handle, Handler};
use russh::keys::key::PublicKey;
use russh::ChannelMsg;
use tracing::{debug, trace, warn};

use super::{
    ConnectionError, ConnectionResult, DeviceSession, RusshError, SessionFactory, SessionTarget,
};
use crate::inventory::{Credentials, Login};
use crate::retry::RetryPolicy;

/// CLI responses that mean the device refused a line.
const ERROR_MARKERS: &[&str] = &[
    "% Invalid input",
    "% Incomplete command",
    "% Ambiguous command",
    "% Unknown command",
    "% Bad mask",
];

/// Client handler; switches are rarely in known_hosts, so keys are accepted
/// and logged.
struct ClientHandler {
    host: String,
}

#[async_trait]
impl Handler for ClientHandler {
    type Error = RusshError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            host = %self.host,
            fingerprint = %server_public_key.fingerprint(),
            "Accepting device host key"
        );
        Ok(true)
    }
}

/// Opens password-authenticated SSH sessions.
#[derive(Debug, Clone)]
pub struct SshSessionFactory {
    connect_retry: RetryPolicy,
}

impl Default for SshSessionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SshSessionFactory {
    pub fn new() -> Self {
        Self {
            connect_retry: RetryPolicy::constant(2, Duration::from_secs(2)),
        }
    }

    /// Policy for retrying the TCP connect and handshake.
    pub fn with_connect_retry(mut self, policy: RetryPolicy) -> Self {
        self.connect_retry = policy;
        self
    }

    async fn connect(
        target: &SessionTarget,
        login: &Login,
    ) -> ConnectionResult<Handle<ClientHandler>> {
        let mut config = russh::client::Config::default();
        config.inactivity_timeout = Some(target.timeout);
        let config = Arc::new(config);

        let addr = format!("{}:{}", target.host, target.port);
        let socket = tokio::time::timeout(target.timeout, tokio::net::TcpStream::connect(&addr))
            .await
            .map_err(|_| ConnectionError::Timeout(target.timeout.as_secs()))?
            .map_err(|e| {
                ConnectionError::ConnectionFailed(format!("Failed to connect to {addr}: {e}"))
            })?;
        socket.set_nodelay(true).map_err(|e| {
            ConnectionError::ConnectionFailed(format!("Failed to set TCP_NODELAY: {e}"))
        })?;

        let handler = ClientHandler {
            host: target.host.clone(),
        };
        let mut session = russh::client::connect_stream(config, socket, handler)
            .await
            .map_err(|e| ConnectionError::ConnectionFailed(format!("SSH handshake failed: {e}")))?;

        let authenticated = tokio::time::timeout(
            target.timeout,
            session.authenticate_password(&login.username, login.password()),
        )
        .await
        .map_err(|_| ConnectionError::Timeout(target.timeout.as_secs()))?
        .map_err(|e| ConnectionError::SshError(format!("Password authentication failed: {e}")))?;

        if !authenticated {
            return Err(ConnectionError::AuthenticationFailed(format!(
                "{}@{} rejected",
                login.username, target.host
            )));
        }
        Ok(session)
    }
}

#[async_trait]
impl SessionFactory for SshSessionFactory {
    async fn open(
        &self,
        target: &SessionTarget,
        credentials: &Credentials,
    ) -> ConnectionResult<Box<dyn DeviceSession>> {
        let identifier = format!("{}:{}", target.host, target.port);
        let mut last_error = None;

        for (i, login) in credentials.logins().enumerate() {
            if i > 0 {
                warn!(host = %target.host, user = %login.username, "Trying fallback credentials");
            }
            let result = self
                .connect_retry
                .execute_if(|| Self::connect(target, login), ConnectionError::is_transient)
                .await;
            match result {
                Ok(handle) => {
                    debug!(host = %identifier, user = %login.username, "SSH session established");
                    return Ok(Box::new(SshSession {
                        handle: Some(handle),
                        identifier,
                        timeout: target.timeout,
                    }));
                }
                Err(e) => {
                    let e = e.into_inner();
                    if !matches!(e, ConnectionError::AuthenticationFailed(_)) {
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ConnectionError::AuthenticationFailed("no credentials supplied".to_string())
        }))
    }
}

/// An authenticated SSH session to one device.
pub struct SshSession {
    handle: Option<Handle<ClientHandler>>,
    identifier: String,
    timeout: Duration,
}

impl SshSession {
    fn handle(&self) -> ConnectionResult<&Handle<ClientHandler>> {
        self.handle.as_ref().ok_or(ConnectionError::ConnectionClosed)
    }

    /// Drain a channel until it closes, returning everything it printed.
    async fn collect_output(
        channel: &mut russh::Channel<russh::client::Msg>,
    ) -> Vec<u8> {
        let mut output = Vec::new();
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } | ChannelMsg::ExtendedData { ref data, .. } => {
                    output.extend_from_slice(data);
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    trace!(exit_status, "Channel exit status");
                }
                ChannelMsg::Close => break,
                _ => {}
            }
        }
        output
    }
}

#[async_trait]
impl DeviceSession for SshSession {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn send_command(&mut self, command: &str) -> ConnectionResult<String> {
        trace!(host = %self.identifier, command = %command, "Sending command");
        let timeout = self.timeout;

        let exec = async {
            let handle = self.handle()?;
            let mut channel = handle.channel_open_session().await.map_err(|e| {
                ConnectionError::ExecutionFailed(format!("Failed to open channel: {e}"))
            })?;
            channel.exec(true, command).await.map_err(|e| {
                ConnectionError::ExecutionFailed(format!("Failed to execute command: {e}"))
            })?;
            let output = Self::collect_output(&mut channel).await;
            Ok::<_, ConnectionError>(String::from_utf8_lossy(&output).into_owned())
        };

        let output = tokio::time::timeout(timeout, exec)
            .await
            .map_err(|_| ConnectionError::Timeout(timeout.as_secs()))??;

        if let Some(marker) = find_error_marker(&output) {
            return Err(ConnectionError::CommandRejected {
                command: command.to_string(),
                output: marker.to_string(),
            });
        }
        Ok(output)
    }

    async fn send_config_set(&mut self, lines: &[String]) -> ConnectionResult<String> {
        debug!(host = %self.identifier, lines = lines.len(), "Pushing configuration");
        let timeout = self.timeout;
        let script = config_script(lines);

        let push = async {
            let handle = self.handle()?;
            let mut channel = handle.channel_open_session().await.map_err(|e| {
                ConnectionError::ExecutionFailed(format!("Failed to open channel: {e}"))
            })?;
            channel
                .request_pty(false, "vt100", 200, 24, 0, 0, &[])
                .await
                .map_err(|e| ConnectionError::ExecutionFailed(format!("Failed to request pty: {e}")))?;
            channel.request_shell(true).await.map_err(|e| {
                ConnectionError::ExecutionFailed(format!("Failed to start shell: {e}"))
            })?;
            channel.data(script.as_bytes()).await.map_err(|e| {
                ConnectionError::ExecutionFailed(format!("Failed to write configuration: {e}"))
            })?;
            let output = Self::collect_output(&mut channel).await;
            Ok::<_, ConnectionError>(String::from_utf8_lossy(&output).into_owned())
        };

        let output = tokio::time::timeout(timeout, push)
            .await
            .map_err(|_| ConnectionError::Timeout(timeout.as_secs()))??;

        if let Some((command, marker)) = find_rejected_line(&output, lines) {
            return Err(ConnectionError::CommandRejected { command, output: marker });
        }
        Ok(output)
    }

    async fn close(&mut self) -> ConnectionResult<()> {
        if let Some(handle) = self.handle.take() {
            handle
                .disconnect(russh::Disconnect::ByApplication, "", "en")
                .await
                .map_err(|e| ConnectionError::SshError(format!("Failed to disconnect: {e}")))?;
            debug!(host = %self.identifier, "SSH session closed");
        }
        Ok(())
    }
}

/// The full shell input for a configuration push.
fn config_script(lines: &[String]) -> String {
    let mut script = String::from("terminal length 0\nconfigure terminal\n");
    for line in lines {
        script.push_str(line);
        script.push('\n');
    }
    script.push_str("end\nexit\n");
    script
}

fn find_error_marker(output: &str) -> Option<&str> {
    output
        .lines()
        .map(str::trim)
        .find(|line| ERROR_MARKERS.iter().any(|m| line.starts_with(m)))
}

/// Find the first refused line in shell output and the device's complaint.
///
/// IOS echoes each line before its error, so the refused line is the last
/// sent line echoed ahead of the first marker.
fn find_rejected_line(output: &str, lines: &[String]) -> Option<(String, String)> {
    let mut last_echoed: Option<&str> = None;
    for raw in output.lines() {
        let line = raw.trim();
        if ERROR_MARKERS.iter().any(|m| line.starts_with(m)) {
            let command = last_echoed.unwrap_or("<unknown>").to_string();
            return Some((command, line.to_string()));
        }
        if let Some(sent) = lines
            .iter()
            .find(|l| !l.is_empty() && line.ends_with(l.trim()))
        {
            last_echoed = Some(sent.as_str());
        }
    }
    None
}
