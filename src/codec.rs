//! Wire format of the messages.
//!
//! Every datagram starts with a single byte naming the kind of message,
//! followed by the bincode encoding of that kind's record. The kind is
//! read once and the payload is decoded straight into the matching record.
use crate::paxos::*;
use bincode::Options;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{de::DeserializeOwned, Serialize};

/// Largest datagram accepted by the transport.
pub const MAX_DATAGRAM_SIZE: usize = 65536;

/// Discriminant written in front of every message.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Kind {
    Phase1A = 1,
    Phase1B = 2,
    Phase2A = 3,
    Phase2B = 4,
    Decide = 5,
    Proposal = 6,
}

impl TryFrom<u8> for Kind {
    type Error = CodecError;

    fn try_from(tag: u8) -> Result<Kind, CodecError> {
        match tag {
            1 => Ok(Kind::Phase1A),
            2 => Ok(Kind::Phase1B),
            3 => Ok(Kind::Phase2A),
            4 => Ok(Kind::Phase2B),
            5 => Ok(Kind::Decide),
            6 => Ok(Kind::Proposal),
            tag => Err(CodecError::UnknownKind(tag)),
        }
    }
}

/// Reasons a datagram could not be turned into a message, or a message
/// into a datagram.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("empty datagram")]
    Empty,
    #[error("unknown message kind {0}")]
    UnknownKind(u8),
    #[error("datagram of {0} bytes exceeds the maximum size")]
    Oversized(usize),
    #[error("malformed {kind:?} payload: {source}")]
    Malformed {
        kind: Kind,
        #[source]
        source: bincode::Error,
    },
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_varint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

impl Message {
    /// Kind of the message
    pub fn kind(&self) -> Kind {
        match *self {
            Message::Phase1A(_) => Kind::Phase1A,
            Message::Phase1B(_) => Kind::Phase1B,
            Message::Phase2A(_) => Kind::Phase2A,
            Message::Phase2B(_) => Kind::Phase2B,
            Message::Decide(_) => Kind::Decide,
            Message::Proposal(_) => Kind::Proposal,
        }
    }

    /// Serializes the message into a datagram. Messages too large for a
    /// single datagram are refused with `Oversized`.
    pub fn encode(&self) -> Result<Bytes, CodecError> {
        let kind = self.kind();
        let mut buf = BytesMut::new();
        buf.put_u8(kind as u8);

        let mut writer = buf.writer();
        let res = match *self {
            Message::Phase1A(ref m) => serialize_into(&mut writer, m),
            Message::Phase1B(ref m) => serialize_into(&mut writer, m),
            Message::Phase2A(ref m) => serialize_into(&mut writer, m),
            Message::Phase2B(ref m) => serialize_into(&mut writer, m),
            Message::Decide(ref m) => serialize_into(&mut writer, m),
            Message::Proposal(ref m) => serialize_into(&mut writer, m),
        };
        res.map_err(|source| CodecError::Malformed { kind, source })?;

        let buf = writer.into_inner();
        if buf.len() > MAX_DATAGRAM_SIZE {
            return Err(CodecError::Oversized(buf.len()));
        }
        Ok(buf.freeze())
    }

    /// Deserializes a datagram. Either the whole datagram is consumed by
    /// exactly one message or an error is returned.
    pub fn decode(buf: &[u8]) -> Result<Message, CodecError> {
        if buf.len() > MAX_DATAGRAM_SIZE {
            return Err(CodecError::Oversized(buf.len()));
        }

        let (&tag, payload) = buf.split_first().ok_or(CodecError::Empty)?;
        let kind = Kind::try_from(tag)?;
        let msg = match kind {
            Kind::Phase1A => Message::Phase1A(deserialize(kind, payload)?),
            Kind::Phase1B => Message::Phase1B(deserialize(kind, payload)?),
            Kind::Phase2A => Message::Phase2A(deserialize(kind, payload)?),
            Kind::Phase2B => Message::Phase2B(deserialize(kind, payload)?),
            Kind::Decide => Message::Decide(deserialize(kind, payload)?),
            Kind::Proposal => Message::Proposal(deserialize(kind, payload)?),
        };
        Ok(msg)
    }
}

fn serialize_into<W: std::io::Write, T: Serialize>(writer: W, value: &T) -> bincode::Result<()> {
    options().serialize_into(writer, value)
}

fn deserialize<T: DeserializeOwned>(kind: Kind, payload: &[u8]) -> Result<T, CodecError> {
    options()
        .with_limit(MAX_DATAGRAM_SIZE as u64)
        .deserialize(payload)
        .map_err(|source| CodecError::Malformed { kind, source })
}
