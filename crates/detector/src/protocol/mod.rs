//! Length-prefixed request/response protocol used by [`QueryService`].
//!
//! Every frame is a big-endian `u32` body length followed by the body:
//! a big-endian `u16` type length, the UTF-8 message type, then the payload.

#![forbid(unsafe_code)]

mod client;
mod codec;
mod service;

pub use client::QueryClient;
pub use codec::{CodecError, MAX_FRAME_LENGTH, MessageCodec, fits_in_frame};
pub use service::QueryService;

use bytes::Bytes;
use std::fmt;
use std::str::FromStr;

/// Message type of replies to requests the service cannot answer.
pub const ERROR: &str = "error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub payload: Bytes,
    pub message_type: String,
}

impl Message {
    pub fn new(message_type: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            message_type: message_type.into(),
        }
    }

    /// A request; queries carry no payload.
    pub fn request(kind: RequestKind) -> Self {
        Self::new(kind.as_str(), Bytes::new())
    }

    pub fn error(reason: &str) -> Self {
        Self::new(ERROR, Bytes::copy_from_slice(reason.as_bytes()))
    }

    pub fn is_error(&self) -> bool {
        self.message_type == ERROR
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Unsigned,
    Malicious,
    Relationships,
    Defective,
}

impl RequestKind {
    pub const ALL: [RequestKind; 4] = [
        Self::Unsigned,
        Self::Malicious,
        Self::Relationships,
        Self::Defective,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unsigned => "checkUnsigned",
            Self::Malicious => "checkMalicious",
            Self::Relationships => "checkRelationships",
            Self::Defective => "checkDefective",
        }
    }

    pub fn response_type(self) -> &'static str {
        match self {
            Self::Unsigned => "unsignedResults",
            Self::Malicious => "maliciousResults",
            Self::Relationships => "relationshipResults",
            Self::Defective => "defectiveResults",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown request type {0:?}")]
pub struct UnknownRequest(pub String);

impl FromStr for RequestKind {
    type Err = UnknownRequest;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownRequest(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_names_round_trip() {
        for kind in RequestKind::ALL {
            assert_eq!(kind.as_str().parse::<RequestKind>(), Ok(kind));
        }
    }

    #[test]
    fn names_are_case_sensitive() {
        assert!("CheckUnsigned".parse::<RequestKind>().is_err());
        assert!("checkunsigned".parse::<RequestKind>().is_err());
        assert!("".parse::<RequestKind>().is_err());
    }

    #[test]
    fn error_message_carries_reason() {
        let msg = Message::error("unknown request type");
        assert!(msg.is_error());
        assert_eq!(&msg.payload[..], b"unknown request type");
    }
}
