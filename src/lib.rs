//! Types and methods for checking that a Hotline server answers the TRTP handshake.
//!
//! One attempt runs a fixed sequence: connect, send the 12 byte request, read the 8 byte
//! reply, interpret the error code. The first failure ends the attempt, nothing is retried.

pub mod protocol;
pub(crate) mod util;

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::protocol::{display_protocol_id, HandshakeReply, HandshakeRequest};
use crate::util::{read_handshake_reply, send_handshake_msg};

/// Where a local Hotline server listens by default.
pub const DEFAULT_TARGET: &str = "127.0.0.1:5500";
/// Bound applied to connecting and to each read or write.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Failures below the protocol: the server never produced a full reply.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection refused")]
    Refused,

    #[error("connection timeout")]
    Timeout,

    #[error("expected 8 bytes, got {got}")]
    ShortReply { got: usize },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Short machine-friendly tag for the failure.
    pub fn reason(&self) -> &'static str {
        match self {
            TransportError::Refused => "refused",
            TransportError::Timeout => "timeout",
            TransportError::ShortReply { .. } => "short-reply",
            TransportError::Io(_) => "io",
        }
    }

    fn from_connect(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => TransportError::Refused,
            io::ErrorKind::TimedOut => TransportError::Timeout,
            _ => TransportError::Io(err),
        }
    }
}

/// Outcome of a single handshake attempt.
#[derive(Debug)]
pub enum Verdict {
    /// Server replied with error code 0.
    Success { protocol_id: [u8; 4] },
    /// Server replied with a nonzero error code.
    ProtocolError { code: u32, protocol_id: [u8; 4] },
    /// No complete reply was received.
    TransportError(TransportError),
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success { .. })
    }

    /// Process exit code: 0 on success, 1 for any failure.
    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// Decode the verdict carried by a complete reply.
pub fn interpret(reply: &HandshakeReply) -> Verdict {
    if !reply.has_valid_magic() {
        warn!(
            "server echoed unexpected protocol id: {}",
            display_protocol_id(&reply.protocol_id)
        );
    }
    if reply.is_success() {
        Verdict::Success {
            protocol_id: reply.protocol_id,
        }
    } else {
        Verdict::ProtocolError {
            code: reply.error_code,
            protocol_id: reply.protocol_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `host:port`, resolved at connect time.
    pub target: String,
    pub timeout: Duration,
    pub request: HandshakeRequest,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.into(),
            timeout: DEFAULT_TIMEOUT,
            request: HandshakeRequest::default(),
        }
    }
}

/// Makes handshake attempts against the configured server.
pub struct Client {
    config: ClientConfig,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Open a tcp connection to the target.
    ///
    /// ## Errors
    /// [TransportError::Refused] if nothing listens on the target.
    /// [TransportError::Timeout] if the connection is not established within the timeout.
    pub async fn connect(&self) -> Result<Connection, TransportError> {
        let stream = timeout(self.config.timeout, TcpStream::connect(&self.config.target))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(TransportError::from_connect)?;
        let addr = stream.peer_addr()?;
        Ok(Connection {
            stream,
            addr,
            timeout: self.config.timeout,
        })
    }

    /// Run one full handshake attempt. The socket is closed before this returns, whatever
    /// the verdict.
    pub async fn attempt(&self) -> Verdict {
        match self._attempt_inner().await {
            Ok(reply) => interpret(&reply),
            Err(e) => Verdict::TransportError(e),
        }
    }

    async fn _attempt_inner(&self) -> Result<HandshakeReply, TransportError> {
        info!("connecting to {}...", self.config.target);
        let mut connection = self.connect().await?;
        info!("connected to {}", connection.peer_addr());

        info!("sending handshake...");
        connection.send_handshake(&self.config.request).await?;
        let reply = connection.read_reply().await?;
        info!(
            "received handshake reply: protocol={}, error_code={}",
            display_protocol_id(&reply.protocol_id),
            reply.error_code
        );
        Ok(reply)
    }
}

/// An open connection to the server. Dropping it closes the socket.
pub struct Connection {
    stream: TcpStream,
    addr: SocketAddr,
    timeout: Duration,
}

impl Connection {
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Write the full 12 byte request.
    pub async fn send_handshake(&mut self, request: &HandshakeRequest) -> Result<(), TransportError> {
        timeout(self.timeout, send_handshake_msg(&mut self.stream, request))
            .await
            .map_err(|_| TransportError::Timeout)?
    }

    /// Wait for the 8 byte reply.
    ///
    /// ## Errors
    /// [TransportError::ShortReply] if the server closes the stream early.
    /// [TransportError::Timeout] if the reply is incomplete when the timeout elapses.
    pub async fn read_reply(&mut self) -> Result<HandshakeReply, TransportError> {
        timeout(self.timeout, read_handshake_reply(&mut self.stream))
            .await
            .map_err(|_| TransportError::Timeout)?
    }
}
