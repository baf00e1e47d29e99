#![forbid(unsafe_code)]

use super::Message;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Largest accepted frame body.
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

const TYPE_LEN_SIZE: usize = 2;

/// Whether a message with this type and payload size can be encoded.
pub fn fits_in_frame(message_type: &str, payload_len: usize) -> bool {
    TYPE_LEN_SIZE + message_type.len() + payload_len <= MAX_FRAME_LENGTH
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {0} bytes is shorter than its message type")]
    Truncated(usize),

    #[error("message type is not UTF-8: {0}")]
    MessageType(#[from] std::str::Utf8Error),

    #[error("message type of {0} bytes does not fit the frame header")]
    MessageTypeTooLong(usize),
}

/// Splits a byte stream into [`Message`]s.
#[derive(Debug)]
pub struct MessageCodec {
    frames: LengthDelimitedCodec,
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageCodec {
    pub fn new() -> Self {
        Self {
            frames: LengthDelimitedCodec::builder()
                .big_endian()
                .length_field_type::<u32>()
                .max_frame_length(MAX_FRAME_LENGTH)
                .new_codec(),
        }
    }
}

fn parse_body(mut body: Bytes) -> Result<Message, CodecError> {
    let frame_len = body.len();
    if frame_len < TYPE_LEN_SIZE {
        return Err(CodecError::Truncated(frame_len));
    }
    let type_len = usize::from(body.get_u16());
    if body.len() < type_len {
        return Err(CodecError::Truncated(frame_len));
    }
    let type_bytes = body.split_to(type_len);
    let message_type = std::str::from_utf8(&type_bytes)?.to_owned();
    Ok(Message {
        payload: body,
        message_type,
    })
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        match self.frames.decode(src)? {
            Some(body) => parse_body(body.freeze()).map(Some),
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        match self.frames.decode_eof(src)? {
            Some(body) => parse_body(body.freeze()).map(Some),
            None => Ok(None),
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        let type_bytes = item.message_type.as_bytes();
        let type_len = u16::try_from(type_bytes.len())
            .map_err(|_| CodecError::MessageTypeTooLong(type_bytes.len()))?;

        let mut body = BytesMut::with_capacity(TYPE_LEN_SIZE + type_bytes.len() + item.payload.len());
        body.put_u16(type_len);
        body.put_slice(type_bytes);
        body.put_slice(&item.payload);

        self.frames.encode(body.freeze(), dst)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(msg: Message) -> BytesMut {
        let mut buf = BytesMut::new();
        MessageCodec::new().encode(msg, &mut buf).unwrap();
        buf
    }

    #[test]
    fn frame_layout() {
        let buf = encode(Message::new("checkUnsigned", Bytes::new()));
        let mut expected = Vec::new();
        expected.extend_from_slice(&15u32.to_be_bytes());
        expected.extend_from_slice(&13u16.to_be_bytes());
        expected.extend_from_slice(b"checkUnsigned");
        assert_eq!(&buf[..], &expected[..]);
    }

    #[test]
    fn decodes_across_partial_reads() {
        let msg = Message::new("unsignedResults", &b"[]"[..]);
        let full = encode(msg.clone());
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();

        for byte in &full[..full.len() - 1] {
            buf.put_u8(*byte);
            assert!(codec.decode(&mut buf).unwrap().is_none());
        }
        buf.put_u8(full[full.len() - 1]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(msg));
        assert!(buf.is_empty());
    }

    #[test]
    fn decodes_back_to_back_frames() {
        let mut buf = encode(Message::new("a", &b"1"[..]));
        buf.extend_from_slice(&encode(Message::new("b", &b"2"[..])));
        let mut codec = MessageCodec::new();
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().message_type, "a");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().message_type, "b");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn type_length_beyond_body_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32(4);
        buf.put_u16(10);
        buf.put_slice(b"ab");
        let err = MessageCodec::new().decode(&mut buf).unwrap_err();
        assert!(matches!(err, CodecError::Truncated(4)));
    }

    #[test]
    fn non_utf8_type_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32(4);
        buf.put_u16(2);
        buf.put_slice(&[0xff, 0xfe]);
        let err = MessageCodec::new().decode(&mut buf).unwrap_err();
        assert!(matches!(err, CodecError::MessageType(_)));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32(MAX_FRAME_LENGTH as u32 + 1);
        let err = MessageCodec::new().decode(&mut buf).unwrap_err();
        assert!(matches!(err, CodecError::Io(_)));
    }

    #[test]
    fn frame_capacity_accounts_for_type_header() {
        let ty = "relationshipResults";
        let room = MAX_FRAME_LENGTH - TYPE_LEN_SIZE - ty.len();
        assert!(fits_in_frame(ty, room));
        assert!(!fits_in_frame(ty, room + 1));

        let mut buf = BytesMut::new();
        MessageCodec::new()
            .encode(Message::new(ty, vec![b'x'; room]), &mut buf)
            .unwrap();
        assert!(
            MessageCodec::new()
                .encode(Message::new(ty, vec![b'x'; room + 1]), &mut BytesMut::new())
                .is_err()
        );
    }

    #[test]
    fn overlong_type_cannot_be_encoded() {
        let msg = Message::new("x".repeat(usize::from(u16::MAX) + 1), Bytes::new());
        let err = MessageCodec::new().encode(msg, &mut BytesMut::new()).unwrap_err();
        assert!(matches!(err, CodecError::MessageTypeTooLong(_)));
    }
}
