//! Wire Codec
//!
//! Framing for messages carried on QUIC streams: a 4-byte big-endian length
//! followed by the bincode body. Pure functions, no I/O, so framing can be
//! tested without sockets.

use crate::domain::entities::RoutableRecord;
use serde::{Deserialize, Serialize};

/// Largest body accepted on the wire.
pub const MAX_FRAME_LEN: usize = 10 * 1024 * 1024;

/// Stream payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Agent to node: records still to be routed.
    Report(Vec<RoutableRecord>),
    /// Node to node: records already routed to the receiver.
    Forward(Vec<RoutableRecord>),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Report(_) => MessageKind::Report,
            Message::Forward(_) => MessageKind::Forward,
        }
    }

    pub fn records(&self) -> &[RoutableRecord] {
        match self {
            Message::Report(records) | Message::Forward(records) => records,
        }
    }

    pub fn into_records(self) -> Vec<RoutableRecord> {
        match self {
            Message::Report(records) | Message::Forward(records) => records,
        }
    }
}

/// Which envelope an outbound batch is wrapped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Report,
    Forward,
}

impl MessageKind {
    pub fn wrap(self, records: Vec<RoutableRecord>) -> Message {
        match self {
            MessageKind::Report => Message::Report(records),
            MessageKind::Forward => Message::Forward(records),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Report => "report",
            MessageKind::Forward => "forward",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("frame of {0} bytes exceeds limit of {MAX_FRAME_LEN}")]
    FrameTooLarge(usize),
    #[error("serialization failed: {0}")]
    Serialize(#[from] bincode::Error),
}

/// Encode `msg` into a length-prefixed frame.
pub fn encode_message(msg: &Message) -> Result<Vec<u8>, CodecError> {
    let data = bincode::serialize(msg)?;
    if data.len() > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge(data.len()));
    }

    let mut frame = Vec::with_capacity(4 + data.len());
    frame.extend_from_slice(&(data.len() as u32).to_be_bytes());
    frame.extend_from_slice(&data);
    Ok(frame)
}

/// Body length announced by a frame header.
pub fn decode_length(header: &[u8; 4]) -> Result<usize, CodecError> {
    let len = u32::from_be_bytes(*header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge(len));
    }
    Ok(len)
}

/// Decode a frame body (without its length header).
pub fn decode_message(body: &[u8]) -> Result<Message, CodecError> {
    Ok(bincode::deserialize(body)?)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::entities::Record;

    fn records() -> Vec<RoutableRecord> {
        vec![
            RoutableRecord::new("svc-1", Record::with_timestamp(1, b"cpu=3".to_vec())),
            RoutableRecord::new("svc-2", Record::with_timestamp(2, b"heap=9".to_vec())),
        ]
    }

    #[test]
    fn test_frame_header_matches_body() {
        let frame = encode_message(&Message::Report(records())).unwrap();
        let header: [u8; 4] = frame[..4].try_into().unwrap();
        assert_eq!(decode_length(&header).unwrap(), frame.len() - 4);
    }

    #[test]
    fn test_decode_encoded_forward() {
        let msg = Message::Forward(records());
        let frame = encode_message(&msg).unwrap();
        let decoded = decode_message(&frame[4..]).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.kind(), MessageKind::Forward);
        assert_eq!(decoded.records().len(), 2);
    }

    #[test]
    fn test_oversized_header_rejected() {
        let header = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes();
        assert!(matches!(
            decode_length(&header),
            Err(CodecError::FrameTooLarge(_))
        ));
    }

    #[test]
    fn test_garbage_body_rejected() {
        assert!(decode_message(&[0xff, 0xff, 0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn test_kind_wraps_records() {
        let msg = MessageKind::Report.wrap(records());
        assert!(matches!(msg, Message::Report(ref r) if r.len() == 2));
        assert_eq!(MessageKind::Forward.as_str(), "forward");
        assert_eq!(msg.into_records().len(), 2);
    }
}
