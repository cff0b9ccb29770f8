//! Convenience functions for writing and reading handshake records on a stream.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::protocol::{HandshakeReply, HandshakeRequest};
use crate::TransportError;

/// Send a [HandshakeRequest] in full. `write_all` retries partial writes until every byte
/// is out.
pub async fn send_handshake_msg<W>(
    stream: &mut W,
    request: &HandshakeRequest,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = request.to_bytes()?;
    debug!("sending handshake: {bytes:02x?}");
    stream.write_all(&bytes).await?;
    stream.flush().await?;
    Ok(())
}

/// Read exactly [HandshakeReply::SIZE] bytes, accumulating fragments. Anything the peer
/// sends after that is left unread.
pub async fn read_handshake_reply<R>(stream: &mut R) -> Result<HandshakeReply, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; HandshakeReply::SIZE];
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]).await {
            Ok(0) => return Err(TransportError::ShortReply { got: filled }),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    debug!("received handshake reply: {buf:02x?}");
    HandshakeReply::from_bytes(&buf)
        .map_err(|e| TransportError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}
