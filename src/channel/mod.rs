use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::core::SettingValue;

mod batch;
#[cfg(test)]
mod scripted;

pub use batch::{
    FailureReason, QueryBatch, QueryFailure, query_settings, query_statuses, read_setting,
};
#[cfg(test)]
pub(crate) use scripted::ScriptedLink;

pub const DEFAULT_PORT: u16 = 2222;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

const READ_CHUNK: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceAddress {
    pub host: String,
    pub port: u16,
}

impl DeviceAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("could not resolve {addr}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("connection to {addr} timed out")]
    ConnectTimeout { addr: String },
    #[error("failed to connect to {addr}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("communication error with {addr}")]
    Io {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("not connected")]
    NotConnected,
    #[error("unsupported command: {0} (only `get` and `set` are allowed)")]
    UnsupportedCommand(String),
}

impl ChannelError {
    /// True for failures of the transport itself, as opposed to a rejected request.
    pub fn is_transport(&self) -> bool {
        !matches!(self, ChannelError::UnsupportedCommand(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            read: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// A request/response peer speaking the line protocol.
pub trait DeviceLink {
    fn send_command(&mut self, command: &str) -> Result<String, ChannelError>;

    /// Value of `key`: the last whitespace-separated token of the reply.
    fn get_setting(&mut self, key: &str) -> Result<String, ChannelError> {
        let response = self.send_command(&format!("get {key}"))?;
        Ok(last_token(&response).to_string())
    }

    fn set_setting(&mut self, key: &str, value: &SettingValue) -> Result<String, ChannelError> {
        self.send_command(&format!("set {key} {value}"))
    }

    fn get_status(&mut self, port: &str) -> Result<String, ChannelError> {
        self.send_command(&format!("get status {port}"))
    }
}

pub fn last_token(response: &str) -> &str {
    response.split_whitespace().last().unwrap_or("")
}

/// Checks a caller-supplied command before it reaches the wire.
pub fn validate_command(command: &str) -> Result<&str, ChannelError> {
    let command = command.trim();
    if command.contains(['\r', '\n']) {
        return Err(ChannelError::UnsupportedCommand(command.escape_debug().to_string()));
    }
    let mut words = command.split_whitespace();
    let verb = words.next().unwrap_or("").to_ascii_lowercase();
    if !matches!(verb.as_str(), "get" | "set") || words.next().is_none() {
        return Err(ChannelError::UnsupportedCommand(command.to_string()));
    }
    Ok(command)
}

/// Builds the `set` line for one assignment, rejecting anything that would not stay a single
/// `set <key> <value>` command.
pub fn validate_assignment(key: &str, value: &SettingValue) -> Result<String, ChannelError> {
    let value = value.to_string();
    let key_ok = !key.is_empty() && !key.chars().any(|c| c.is_whitespace() || c.is_control());
    if !key_ok || value.trim().is_empty() || value.contains(['\r', '\n']) {
        let line = format!("set {key} {value}");
        return Err(ChannelError::UnsupportedCommand(line.escape_debug().to_string()));
    }
    validate_command(&format!("set {key} {value}")).map(str::to_string)
}

/// One TCP connection to the box. The socket is closed on `disconnect` or drop.
#[derive(Debug)]
pub struct LineChannel {
    addr: DeviceAddress,
    timeouts: Timeouts,
    stream: Option<TcpStream>,
}

impl LineChannel {
    pub fn new(addr: DeviceAddress, timeouts: Timeouts) -> Self {
        Self {
            addr,
            timeouts,
            stream: None,
        }
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn connect(&mut self) -> Result<(), ChannelError> {
        self.disconnect();
        let addr = self.addr.to_string();
        let deadline = Instant::now() + self.timeouts.connect;
        let candidates = resolve(&self.addr, self.timeouts.connect)?;

        let mut last_err: Option<io::Error> = None;
        for candidate in candidates {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                last_err = Some(io::Error::from(io::ErrorKind::TimedOut));
                break;
            }
            match TcpStream::connect_timeout(&candidate, remaining) {
                Ok(stream) => {
                    let read = nonzero(self.timeouts.read);
                    let configure = stream
                        .set_read_timeout(Some(read))
                        .and_then(|()| stream.set_write_timeout(Some(read)))
                        .and_then(|()| stream.set_nodelay(true));
                    if let Err(source) = configure {
                        return Err(ChannelError::Connect { addr, source });
                    }
                    debug!(%addr, peer = %candidate, "connected");
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(err) => last_err = Some(err),
            }
        }

        match last_err {
            Some(err) if err.kind() == io::ErrorKind::TimedOut => {
                Err(ChannelError::ConnectTimeout { addr })
            }
            Some(source) => Err(ChannelError::Connect { addr, source }),
            None => Err(ChannelError::Resolve {
                addr,
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses resolved"),
            }),
        }
    }

    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            debug!(addr = %self.addr, "disconnected");
        }
    }
}

impl DeviceLink for LineChannel {
    fn send_command(&mut self, command: &str) -> Result<String, ChannelError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(ChannelError::NotConnected);
        };
        let io_err = |source: io::Error| ChannelError::Io {
            addr: self.addr.to_string(),
            source,
        };

        debug!(command, "send");
        stream
            .write_all(format!("{command}\r\n").as_bytes())
            .map_err(io_err)?;

        let mut response: Vec<u8> = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    response.extend_from_slice(&chunk[..n]);
                    if response.ends_with(b"\r\n") {
                        break;
                    }
                }
                Err(err) if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    debug!(command, bytes = response.len(), "read timed out; using partial response");
                    break;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(io_err(err)),
            }
        }

        let text = String::from_utf8_lossy(&response).trim().to_string();
        debug!(command, bytes = response.len(), "recv");
        Ok(text)
    }
}

impl Drop for LineChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Name resolution bounded by `budget`. The lookup runs on a helper thread because the
/// resolver itself has no timeout; a lookup that overruns is abandoned.
fn resolve(addr: &DeviceAddress, budget: Duration) -> Result<Vec<SocketAddr>, ChannelError> {
    let target = (addr.host.clone(), addr.port);
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = target
            .to_socket_addrs()
            .map(|addrs| addrs.collect::<Vec<_>>());
        let _ = tx.send(result);
    });
    match rx.recv_timeout(nonzero(budget)) {
        Ok(Ok(addrs)) => Ok(addrs),
        Ok(Err(source)) => Err(ChannelError::Resolve {
            addr: addr.to_string(),
            source,
        }),
        Err(_) => Err(ChannelError::ConnectTimeout {
            addr: addr.to_string(),
        }),
    }
}

fn nonzero(d: Duration) -> Duration {
    d.max(Duration::from_millis(1))
}
