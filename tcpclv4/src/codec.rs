/*!
The TCPCLv4 steady-state message wire format (RFC 9174 §4.2) and its
`tokio_util` framing.
*/

use dtncore_bpv7::Eid;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid message type {0}")]
    InvalidMessageType(u8),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid node id string: {0}")]
    InvalidNodeIdUtf8(#[from] std::string::FromUtf8Error),

    #[error("invalid node id: {0}")]
    InvalidNodeId(#[from] dtncore_bpv7::eid::EidError),
}

#[repr(u8)]
#[allow(clippy::upper_case_acronyms, non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    XFER_SEGMENT = 1,
    XFER_ACK = 2,
    XFER_REFUSE = 3,
    KEEPALIVE = 4,
    SESS_TERM = 5,
    MSG_REJECT = 6,
    SESS_INIT = 7,
}

impl TryFrom<u8> for MessageType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::XFER_SEGMENT),
            2 => Ok(Self::XFER_ACK),
            3 => Ok(Self::XFER_REFUSE),
            4 => Ok(Self::KEEPALIVE),
            5 => Ok(Self::SESS_TERM),
            6 => Ok(Self::MSG_REJECT),
            7 => Ok(Self::SESS_INIT),
            n => Err(Error::InvalidMessageType(n)),
        }
    }
}

/*
+-----------------------------+
|       Message Header        |
+-----------------------------+
|   Keepalive Interval (U16)  |
+-----------------------------+
|       Segment MRU (U64)     |
+-----------------------------+
|      Transfer MRU (U64)     |
+-----------------------------+
|     Node ID Length (U16)    |
+-----------------------------+
|    Node ID Data (variable)  |
+-----------------------------+
|  Session Ext Items Len (U32)|
+-----------------------------+
|   Session Ext Items (var.)  |
+-----------------------------+ */

#[derive(Debug, Default, Clone)]
pub struct SessionInitMessage {
    pub keepalive_interval: u16,
    pub segment_mru: u64,
    pub transfer_mru: u64,
    pub node_id: Option<Eid>,
}

impl SessionInitMessage {
    fn encode(self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u8(MessageType::SESS_INIT as u8);
        dst.put_u16(self.keepalive_interval);
        dst.put_u64(self.segment_mru);
        dst.put_u64(self.transfer_mru);
        if let Some(node_id) = &self.node_id {
            let node_id_str = node_id.to_string();
            dst.put_u16(node_id_str.len() as u16);
            dst.put(node_id_str.as_bytes());
        } else {
            dst.put_u16(0);
        }
        // We never emit session extension items.
        dst.put_u32(0);
        Ok(())
    }

    fn decode(src: &mut BytesMut) -> Result<Option<Message>, Error> {
        if src.len() < 20 {
            return Ok(None);
        }

        let mut cursor = src.clone();
        let keepalive_interval = cursor.get_u16();
        let segment_mru = cursor.get_u64();
        let transfer_mru = cursor.get_u64();
        let node_id_length = cursor.get_u16();
        let node_id = if node_id_length > 0 {
            if cursor.len() < node_id_length as usize {
                return Ok(None);
            }
            Some(String::from_utf8(cursor.split_to(node_id_length as usize).into())?.parse::<Eid>()?)
        } else {
            None
        };

        if cursor.len() < 4 {
            return Ok(None);
        }
        let ext_items_length = cursor.get_u32();
        let mut consumed = 24 + node_id_length as usize;
        for _ in 0..ext_items_length {
            if cursor.len() < 7 {
                return Ok(None);
            }
            cursor.advance(3); // flags (u8) + item type (u16)
            let item_length = cursor.get_u32();
            if cursor.len() < item_length as usize {
                return Ok(None);
            }
            cursor.advance(item_length as usize);
            consumed += 7 + item_length as usize;
        }
        src.advance(consumed);
        Ok(Some(Message::SessionInit(SessionInitMessage {
            keepalive_interval,
            segment_mru,
            transfer_mru,
            node_id,
        })))
    }
}

/*
+-----------------------------+
|       Message Header        |
+-----------------------------+
|     Message Flags (U8)      |
+-----------------------------+
|      Reason Code (U8)       |
+-----------------------------+ */

#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct SessionTermMessage {
    pub message_flags: SessionTermMessageFlags,
    pub reason_code: SessionTermReasonCode,
}

impl SessionTermMessage {
    fn encode(self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u8(MessageType::SESS_TERM as u8);
        dst.put_u8(self.message_flags.into());
        dst.put_u8(self.reason_code.into());
        Ok(())
    }

    fn decode(src: &mut BytesMut) -> Result<Option<Message>, Error> {
        if src.len() < 2 {
            Ok(None)
        } else {
            Ok(Some(Message::SessionTerm(SessionTermMessage {
                message_flags: src.get_u8().into(),
                reason_code: src.get_u8().into(),
            })))
        }
    }
}

#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct SessionTermMessageFlags {
    pub reply: bool,
}

impl From<u8> for SessionTermMessageFlags {
    fn from(value: u8) -> Self {
        let flags = Self { reply: value & 1 != 0 };
        if value & 0xFE != 0 {
            trace!("session term message with reserved flag bits set: {value:#x}");
        }
        flags
    }
}

impl From<SessionTermMessageFlags> for u8 {
    fn from(value: SessionTermMessageFlags) -> u8 {
        u8::from(value.reply)
    }
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum SessionTermReasonCode {
    #[default]
    Unknown,
    IdleTimeout,
    VersionMismatch,
    Busy,
    ContactFailure,
    ResourceExhaustion,
    Unassigned(u8),
    Private(u8),
}

impl From<u8> for SessionTermReasonCode {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Unknown,
            1 => Self::IdleTimeout,
            2 => Self::VersionMismatch,
            3 => Self::Busy,
            4 => Self::ContactFailure,
            5 => Self::ResourceExhaustion,
            n @ 6..=0xEF => Self::Unassigned(n),
            n => Self::Private(n),
        }
    }
}

impl From<SessionTermReasonCode> for u8 {
    fn from(value: SessionTermReasonCode) -> u8 {
        match value {
            SessionTermReasonCode::Unknown => 0,
            SessionTermReasonCode::IdleTimeout => 1,
            SessionTermReasonCode::VersionMismatch => 2,
            SessionTermReasonCode::Busy => 3,
            SessionTermReasonCode::ContactFailure => 4,
            SessionTermReasonCode::ResourceExhaustion => 5,
            SessionTermReasonCode::Unassigned(n) | SessionTermReasonCode::Private(n) => n,
        }
    }
}

/*
+-----------------------------+
|       Message Header        |
+-----------------------------+
|      Reason Code (U8)       |
+-----------------------------+
|   Rejected Message Header   |
+-----------------------------+ */

#[derive(Debug, Clone)]
pub struct MessageRejectMessage {
    pub reason_code: MessageRejectionReasonCode,
    pub rejected_message: u8,
}

impl MessageRejectMessage {
    fn encode(self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u8(MessageType::MSG_REJECT as u8);
        dst.put_u8(self.reason_code.into());
        dst.put_u8(self.rejected_message);
        Ok(())
    }

    fn decode(src: &mut BytesMut) -> Result<Option<Message>, Error> {
        if src.len() < 2 {
            Ok(None)
        } else {
            Ok(Some(Message::Reject(MessageRejectMessage {
                reason_code: src.get_u8().into(),
                rejected_message: src.get_u8(),
            })))
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum MessageRejectionReasonCode {
    UnknownType,
    Unsupported,
    Unexpected,
    Unassigned(u8),
    Private(u8),
}

impl From<u8> for MessageRejectionReasonCode {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::UnknownType,
            2 => Self::Unsupported,
            3 => Self::Unexpected,
            n @ (0 | 4..=0xEF) => Self::Unassigned(n),
            n => Self::Private(n),
        }
    }
}

impl From<MessageRejectionReasonCode> for u8 {
    fn from(value: MessageRejectionReasonCode) -> u8 {
        match value {
            MessageRejectionReasonCode::UnknownType => 1,
            MessageRejectionReasonCode::Unsupported => 2,
            MessageRejectionReasonCode::Unexpected => 3,
            MessageRejectionReasonCode::Unassigned(n) | MessageRejectionReasonCode::Private(n) => n,
        }
    }
}

/*
+-----------------------------+
|       Message Header        |
+-----------------------------+
|      Reason Code (U8)       |
+-----------------------------+
|      Transfer ID (U64)      |
+-----------------------------+ */

#[derive(Debug, Clone)]
pub struct TransferRefuseMessage {
    pub reason_code: TransferRefuseReasonCode,
    pub transfer_id: u64,
}

impl TransferRefuseMessage {
    fn encode(self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u8(MessageType::XFER_REFUSE as u8);
        dst.put_u8(self.reason_code.into());
        dst.put_u64(self.transfer_id);
        Ok(())
    }

    fn decode(src: &mut BytesMut) -> Result<Option<Message>, Error> {
        if src.len() < 9 {
            Ok(None)
        } else {
            Ok(Some(Message::TransferRefuse(TransferRefuseMessage {
                reason_code: src.get_u8().into(),
                transfer_id: src.get_u64(),
            })))
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TransferRefuseReasonCode {
    Unknown,
    Completed,
    NoResources,
    Retransmit,
    NotAcceptable,
    ExtensionFailure,
    SessionTerminating,
    Unassigned(u8),
    Private(u8),
}

impl From<u8> for TransferRefuseReasonCode {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Unknown,
            1 => Self::Completed,
            2 => Self::NoResources,
            3 => Self::Retransmit,
            4 => Self::NotAcceptable,
            5 => Self::ExtensionFailure,
            6 => Self::SessionTerminating,
            n @ 7..=0xEF => Self::Unassigned(n),
            n => Self::Private(n),
        }
    }
}

impl From<TransferRefuseReasonCode> for u8 {
    fn from(value: TransferRefuseReasonCode) -> u8 {
        match value {
            TransferRefuseReasonCode::Unknown => 0,
            TransferRefuseReasonCode::Completed => 1,
            TransferRefuseReasonCode::NoResources => 2,
            TransferRefuseReasonCode::Retransmit => 3,
            TransferRefuseReasonCode::NotAcceptable => 4,
            TransferRefuseReasonCode::ExtensionFailure => 5,
            TransferRefuseReasonCode::SessionTerminating => 6,
            TransferRefuseReasonCode::Unassigned(n) | TransferRefuseReasonCode::Private(n) => n,
        }
    }
}

/*
+-----------------------------+
|       Message Header        |
+-----------------------------+
|     Message Flags (U8)      |
+-----------------------------+
|      Transfer ID (U64)      |
+-----------------------------+
| Acknowledged length (U64)   |
+-----------------------------+ */

#[derive(Debug, Clone)]
pub struct TransferAckMessage {
    pub message_flags: TransferSegmentMessageFlags,
    pub transfer_id: u64,
    pub acknowledged_length: u64,
}

impl TransferAckMessage {
    fn encode(self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u8(MessageType::XFER_ACK as u8);
        dst.put_u8(self.message_flags.into());
        dst.put_u64(self.transfer_id);
        dst.put_u64(self.acknowledged_length);
        Ok(())
    }

    fn decode(src: &mut BytesMut) -> Result<Option<Message>, Error> {
        if src.len() < 17 {
            Ok(None)
        } else {
            Ok(Some(Message::TransferAck(TransferAckMessage {
                message_flags: src.get_u8().into(),
                transfer_id: src.get_u64(),
                acknowledged_length: src.get_u64(),
            })))
        }
    }
}

#[derive(Debug)]
pub enum Message {
    SessionInit(SessionInitMessage),
    SessionTerm(SessionTermMessage),
    Keepalive,
    TransferSegment(TransferSegmentMessage),
    TransferAck(TransferAckMessage),
    TransferRefuse(TransferRefuseMessage),
    Reject(MessageRejectMessage),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::SessionInit(_) => MessageType::SESS_INIT,
            Message::SessionTerm(_) => MessageType::SESS_TERM,
            Message::Keepalive => MessageType::KEEPALIVE,
            Message::TransferSegment(_) => MessageType::XFER_SEGMENT,
            Message::TransferAck(_) => MessageType::XFER_ACK,
            Message::TransferRefuse(_) => MessageType::XFER_REFUSE,
            Message::Reject(_) => MessageType::MSG_REJECT,
        }
    }
}

/*
+------------------------------+
|       Message Header         |
+------------------------------+
|     Message Flags (U8)       |
+------------------------------+
|      Transfer ID (U64)       |
+------------------------------+
|     Transfer Ext Items       |
|      Length (U32), if START  |
+------------------------------+
|     Transfer Ext Items (var.)|
|          if START             |
+------------------------------+
|      Data length (U64)       |
+------------------------------+
| Data contents (octet string) |
+------------------------------+ */

#[derive(Debug, Clone)]
pub struct TransferSegmentMessage {
    pub message_flags: TransferSegmentMessageFlags,
    pub transfer_id: u64,
    pub data: Vec<u8>,
}

impl TransferSegmentMessage {
    fn encode(self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u8(MessageType::XFER_SEGMENT as u8);
        dst.put_u8(self.message_flags.into());
        dst.put_u64(self.transfer_id);
        if self.message_flags.start {
            // We never emit transfer extension items.
            dst.put_u32(0);
        }
        dst.put_u64(self.data.len() as u64);
        dst.put(self.data.as_slice());
        Ok(())
    }

    fn decode(src: &mut BytesMut) -> Result<Option<Message>, Error> {
        if src.len() < 9 {
            return Ok(None);
        }
        let mut cursor = src.clone();
        let message_flags: TransferSegmentMessageFlags = cursor.get_u8().into();
        let transfer_id = cursor.get_u64();

        let mut consumed = 9;
        if message_flags.start {
            if cursor.len() < 4 {
                return Ok(None);
            }
            let ext_items_length = cursor.get_u32();
            consumed += 4;
            for _ in 0..ext_items_length {
                if cursor.len() < 7 {
                    return Ok(None);
                }
                cursor.advance(3);
                let item_length = cursor.get_u32();
                if cursor.len() < item_length as usize {
                    return Ok(None);
                }
                cursor.advance(item_length as usize);
                consumed += 7 + item_length as usize;
            }
        }
        if cursor.len() < 8 {
            return Ok(None);
        }
        let data_length = cursor.get_u64();
        if cursor.len() < data_length as usize {
            return Ok(None);
        }
        let data = cursor.split_to(data_length as usize).to_vec();
        src.advance(consumed + 8 + data_length as usize);
        Ok(Some(Message::TransferSegment(TransferSegmentMessage {
            message_flags,
            transfer_id,
            data,
        })))
    }
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct TransferSegmentMessageFlags {
    pub start: bool,
    pub end: bool,
}

impl From<u8> for TransferSegmentMessageFlags {
    fn from(value: u8) -> Self {
        let flags = Self {
            end: value & 1 != 0,
            start: value & 2 != 0,
        };
        if value & 0xFC != 0 {
            trace!("transfer segment message with reserved flag bits set: {value:#x}");
        }
        flags
    }
}

impl From<TransferSegmentMessageFlags> for u8 {
    fn from(value: TransferSegmentMessageFlags) -> u8 {
        let mut flags = 0;
        if value.end {
            flags |= 1;
        }
        if value.start {
            flags |= 2;
        }
        flags
    }
}

pub struct MessageCodec {}

impl MessageCodec {
    pub fn new_framed<T: AsyncRead + AsyncWrite + Sized>(io: T) -> tokio_util::codec::Framed<T, Self> {
        Self {}.framed(io)
    }
}

impl tokio_util::codec::Decoder for MessageCodec {
    type Item = Message;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        let message_type: MessageType = src[0].try_into()?;

        // Decode into a clone of the body so a short read leaves `src`
        // untouched; only advance the real buffer once a full message has
        // been parsed.
        let mut body = src.clone();
        body.advance(1);
        let body_len_before = body.len();

        let decoded = match message_type {
            MessageType::XFER_SEGMENT => TransferSegmentMessage::decode(&mut body),
            MessageType::XFER_ACK => TransferAckMessage::decode(&mut body),
            MessageType::XFER_REFUSE => TransferRefuseMessage::decode(&mut body),
            MessageType::KEEPALIVE => Ok(Some(Message::Keepalive)),
            MessageType::SESS_TERM => SessionTermMessage::decode(&mut body),
            MessageType::MSG_REJECT => MessageRejectMessage::decode(&mut body),
            MessageType::SESS_INIT => SessionInitMessage::decode(&mut body),
        }?;

        match decoded {
            Some(message) => {
                src.advance(1 + (body_len_before - body.len()));
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }
}

impl tokio_util::codec::Encoder<Message> for MessageCodec {
    type Error = Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::SessionInit(m) => m.encode(dst),
            Message::SessionTerm(m) => m.encode(dst),
            Message::Keepalive => {
                dst.put_u8(MessageType::KEEPALIVE as u8);
                Ok(())
            }
            Message::TransferSegment(m) => m.encode(dst),
            Message::TransferAck(m) => m.encode(dst),
            Message::TransferRefuse(m) => m.encode(dst),
            Message::Reject(m) => m.encode(dst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::codec::{Decoder, Encoder};

    fn roundtrip(msg: Message) -> Message {
        let mut codec = MessageCodec {};
        let mut buf = BytesMut::new();
        codec.encode(msg, &mut buf).unwrap();
        codec.decode(&mut buf).unwrap().unwrap()
    }

    #[test]
    fn keepalive_roundtrips() {
        assert!(matches!(roundtrip(Message::Keepalive), Message::Keepalive));
    }

    #[test]
    fn session_init_roundtrips_with_node_id() {
        let msg = Message::SessionInit(SessionInitMessage {
            keepalive_interval: 60,
            segment_mru: 16384,
            transfer_mru: 0x2_0000_0000_0000,
            node_id: Some(Eid::Ipn { node: 1, service: 0 }),
        });
        match roundtrip(msg) {
            Message::SessionInit(init) => {
                assert_eq!(init.keepalive_interval, 60);
                assert_eq!(init.node_id, Some(Eid::Ipn { node: 1, service: 0 }));
            }
            other => panic!("expected SessionInit, got {other:?}"),
        }
    }

    #[test]
    fn transfer_segment_splits_across_partial_reads() {
        let mut codec = MessageCodec {};
        let mut buf = BytesMut::new();
        codec
            .encode(
                Message::TransferSegment(TransferSegmentMessage {
                    message_flags: TransferSegmentMessageFlags { start: true, end: true },
                    transfer_id: 1,
                    data: b"hello world".to_vec(),
                }),
                &mut buf,
            )
            .unwrap();

        let mut partial = buf.split_to(buf.len() - 3);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        // The remaining bytes rejoin the partial buffer; nothing was lost
        // by the earlier short read.
        partial.unsplit(buf);
        match codec.decode(&mut partial).unwrap().unwrap() {
            Message::TransferSegment(seg) => {
                assert_eq!(seg.transfer_id, 1);
                assert_eq!(seg.data, b"hello world");
            }
            other => panic!("expected TransferSegment, got {other:?}"),
        }
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        let mut codec = MessageCodec {};
        let mut buf = BytesMut::from(&[0xEFu8][..]);
        assert!(matches!(codec.decode(&mut buf), Err(Error::InvalidMessageType(0xEF))));
    }
}
