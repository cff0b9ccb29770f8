//! Wire records of the TRTP handshake preamble and methods for (de)serialization.
//!
//! Both records are fixed-size and every integer field is big-endian:
//!
//! ```text
//! request: "TRTP" | sub-protocol u32 | version u16 | sub-version u16   (12 bytes)
//! reply:   protocol id [u8; 4] | error code u32                        (8 bytes)
//! ```

use std::io::{self, Read};

use anyhow::bail;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

/// Magic opening every handshake.
pub const MAGIC: [u8; 4] = *b"TRTP";
/// Protocol version requested by default.
pub const VERSION: u16 = 1;
/// Port Hotline servers listen on by default.
pub const DEFAULT_PORT: u16 = 5500;

/// Error code sent by servers for a bad magic.
pub const ERR_INVALID_PROTOCOL: u32 = 1;
/// Error code sent by servers for a version they don't speak.
pub const ERR_UNSUPPORTED_VERSION: u32 = 2;

/// Client handshake, sent as soon as the tcp connection is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub magic: [u8; 4],
    pub sub_protocol_id: u32,
    pub version: u16,
    pub sub_version: u16,
}

impl HandshakeRequest {
    pub const SIZE: usize = 12;

    pub fn new(sub_protocol_id: u32, version: u16, sub_version: u16) -> Self {
        Self {
            magic: MAGIC,
            sub_protocol_id,
            version,
            sub_version,
        }
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend(&self.magic);
        WriteBytesExt::write_u32::<BigEndian>(&mut buf, self.sub_protocol_id)?;
        WriteBytesExt::write_u16::<BigEndian>(&mut buf, self.version)?;
        WriteBytesExt::write_u16::<BigEndian>(&mut buf, self.sub_version)?;
        Ok(buf)
    }

    /// Only the server side needs this; kept for fixtures standing in for a server.
    pub fn from_bytes(buf: &[u8]) -> anyhow::Result<Self> {
        if buf.len() < Self::SIZE {
            bail!(
                "insufficient bytes for handshake request: expected {}, got {}",
                Self::SIZE,
                buf.len()
            );
        }
        let mut bytes = buf;
        let mut magic = [0u8; 4];
        bytes.read_exact(&mut magic)?;
        Ok(Self {
            magic,
            sub_protocol_id: bytes.read_u32::<BigEndian>()?,
            version: bytes.read_u16::<BigEndian>()?,
            sub_version: bytes.read_u16::<BigEndian>()?,
        })
    }
}

impl Default for HandshakeRequest {
    /// Sub-protocol 0, version 1, sub-version 0.
    fn default() -> Self {
        Self::new(0, VERSION, 0)
    }
}

/// Server reply to a [HandshakeRequest].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeReply {
    /// Echoed protocol tag. Not validated, servers may send anything here.
    pub protocol_id: [u8; 4],
    /// Zero on success.
    pub error_code: u32,
}

impl HandshakeReply {
    pub const SIZE: usize = 8;

    pub fn new(protocol_id: [u8; 4], error_code: u32) -> Self {
        Self {
            protocol_id,
            error_code,
        }
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend(&self.protocol_id);
        WriteBytesExt::write_u32::<BigEndian>(&mut buf, self.error_code)?;
        Ok(buf)
    }

    /// Decode the first [HandshakeReply::SIZE] bytes of `buf`, anything after is ignored.
    pub fn from_bytes(buf: &[u8]) -> anyhow::Result<Self> {
        if buf.len() < Self::SIZE {
            bail!(
                "insufficient bytes for handshake reply: expected {}, got {}",
                Self::SIZE,
                buf.len()
            );
        }
        let mut bytes = buf;
        let mut protocol_id = [0u8; 4];
        bytes.read_exact(&mut protocol_id)?;
        let error_code = bytes.read_u32::<BigEndian>()?;
        Ok(Self {
            protocol_id,
            error_code,
        })
    }

    pub fn is_success(&self) -> bool {
        self.error_code == 0
    }

    pub fn has_valid_magic(&self) -> bool {
        self.protocol_id == MAGIC
    }
}

/// Human readable meaning of the error codes Hotline servers are known to send.
pub fn describe_error_code(code: u32) -> Option<&'static str> {
    match code {
        ERR_INVALID_PROTOCOL => Some("invalid protocol magic"),
        ERR_UNSUPPORTED_VERSION => Some("unsupported protocol version"),
        _ => None,
    }
}

/// Render a protocol id for display: ASCII when printable, hex otherwise.
pub fn display_protocol_id(protocol_id: &[u8; 4]) -> String {
    if protocol_id.iter().all(|b| b.is_ascii_graphic()) {
        protocol_id.iter().map(|&b| b as char).collect()
    } else {
        protocol_id
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rustfmt::skip]
    #[test]
    fn serialize_default_request() {
        let target = vec![
            0x54, 0x52, 0x54, 0x50, // "TRTP"
            0x00, 0x00, 0x00, 0x00, // sub-protocol (0)
            0x00, 0x01,             // version (1)
            0x00, 0x00,             // sub-version (0)
        ];
        assert_eq!(
            HandshakeRequest::default().to_bytes().expect("error serializing request"),
            target
        );
    }

    #[rustfmt::skip]
    #[test]
    fn serialize_custom_request() {
        let request = HandshakeRequest::new(0x0102_0304, 0x00c5, 2);
        let target = vec![
            0x54, 0x52, 0x54, 0x50,
            0x01, 0x02, 0x03, 0x04,
            0x00, 0xc5,
            0x00, 0x02,
        ];
        assert_eq!(request.to_bytes().expect("error serializing request"), target);
    }

    #[test]
    fn deserialize_request() {
        let bytes = [0x54, 0x52, 0x54, 0x50, 0, 0, 0, 0, 0, 1, 0, 0];
        let request = HandshakeRequest::from_bytes(&bytes).expect("error deserializing request");
        assert_eq!(request, HandshakeRequest::default());
    }

    #[rustfmt::skip]
    #[test]
    fn deserialize_reply() {
        let bytes = [
            0x54, 0x52, 0x54, 0x50, // "TRTP"
            0x00, 0x00, 0x00, 0x05, // error code (5)
        ];
        let reply = HandshakeReply::from_bytes(&bytes).expect("error deserializing reply");
        assert_eq!(reply, HandshakeReply::new(MAGIC, 5));
        assert!(!reply.is_success());
        assert!(reply.has_valid_magic());
    }

    #[test]
    fn reply_ignores_trailing_bytes() {
        let bytes = [0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 0, 0xff, 0xff];
        let reply = HandshakeReply::from_bytes(&bytes).expect("error deserializing reply");
        assert!(reply.is_success());
        assert!(!reply.has_valid_magic());
        assert_eq!(reply.protocol_id, [0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn short_buffers_rejected() {
        assert!(HandshakeReply::from_bytes(&[0x54, 0x52, 0x54]).is_err());
        assert!(HandshakeRequest::from_bytes(&[0u8; 11]).is_err());
    }

    #[test]
    fn serialize_error_reply() {
        let reply = HandshakeReply::new(MAGIC, ERR_UNSUPPORTED_VERSION);
        assert_eq!(
            reply.to_bytes().expect("error serializing reply"),
            vec![0x54, 0x52, 0x54, 0x50, 0, 0, 0, 2]
        );
    }

    #[test]
    fn known_error_codes() {
        assert_eq!(describe_error_code(1), Some("invalid protocol magic"));
        assert_eq!(describe_error_code(2), Some("unsupported protocol version"));
        assert_eq!(describe_error_code(5), None);
    }

    #[test]
    fn protocol_id_display() {
        assert_eq!(display_protocol_id(&MAGIC), "TRTP");
        assert_eq!(display_protocol_id(&[0, 0, 0, 0]), "00 00 00 00");
        assert_eq!(display_protocol_id(&[0x54, 0x52, 0x0a, 0x50]), "54 52 0a 50");
    }
}
