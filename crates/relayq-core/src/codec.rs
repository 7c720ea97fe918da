// SPDX-License-Identifier: MIT OR Apache-2.0
//! Serialization providers and the cloud envelope codec.
//!
//! Wire-format plug-ins are external collaborators: adapters only see the
//! [`SerializationProvider`] trait. [`JsonCodec`] is the default used
//! throughout the workspace. The cloud-style broker additionally wraps the
//! serialized payload in an outer JSON envelope under a `"Message"` key,
//! optionally accompanied by a `"Signature"`.

use crate::{Message, WorkerError};
use serde::{Deserialize, Serialize};

/// Encodes and decodes messages for the wire.
pub trait SerializationProvider: Send + Sync {
    /// Serialize a message into payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Encode`] when the message cannot be
    /// serialized.
    fn encode(&self, message: &Message) -> Result<Vec<u8>, WorkerError>;

    /// Deserialize payload bytes into a message.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Decode`] when the payload is malformed.
    fn decode(&self, payload: &[u8]) -> Result<Message, WorkerError>;
}

/// JSON serialization provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl SerializationProvider for JsonCodec {
    fn encode(&self, message: &Message) -> Result<Vec<u8>, WorkerError> {
        serde_json::to_vec(message).map_err(|e| WorkerError::Encode(e.into()))
    }

    fn decode(&self, payload: &[u8]) -> Result<Message, WorkerError> {
        serde_json::from_slice(payload).map_err(|e| WorkerError::Decode(e.into()))
    }
}

/// Outer envelope used by the cloud-style broker.
///
/// The body of a received queue message is this JSON object; the inner
/// `message` string holds the serialized payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// Serialized payload string.
    #[serde(rename = "Message")]
    pub message: String,

    /// Optional hex signature over the payload string.
    #[serde(rename = "Signature", default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Envelope {
    /// Wrap a serialized payload, optionally signed.
    #[must_use]
    pub fn new(message: impl Into<String>, signature: Option<String>) -> Self {
        Self {
            message: message.into(),
            signature,
        }
    }

    /// Render the envelope as the queue message body.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Encode`] when serialization fails.
    pub fn to_body(&self) -> Result<String, WorkerError> {
        serde_json::to_string(self).map_err(|e| WorkerError::Encode(e.into()))
    }

    /// Parse a queue message body into an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Decode`] when the body is not a well-formed
    /// envelope.
    pub fn parse(body: &str) -> Result<Self, WorkerError> {
        serde_json::from_str(body).map_err(|e| WorkerError::Decode(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_codec_roundtrip() {
        let codec = JsonCodec;
        let msg = Message::new("t", json!({"n": 1})).with_id("m-1");
        let bytes = codec.encode(&msg).unwrap();
        let back = codec.decode(&bytes).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn json_codec_rejects_garbage() {
        let codec = JsonCodec;
        let err = codec.decode(b"not json").unwrap_err();
        assert!(matches!(err, WorkerError::Decode(_)));
    }

    #[test]
    fn envelope_roundtrip_with_signature() {
        let env = Envelope::new("{\"id\":\"m\"}", Some("abc123".into()));
        let body = env.to_body().unwrap();
        assert!(body.contains("\"Message\""));
        assert!(body.contains("\"Signature\""));
        let back = Envelope::parse(&body).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn envelope_signature_is_optional() {
        let parsed = Envelope::parse("{\"Message\":\"payload\"}").unwrap();
        assert_eq!(parsed.message, "payload");
        assert!(parsed.signature.is_none());
    }

    #[test]
    fn envelope_parse_rejects_missing_message_key() {
        let err = Envelope::parse("{\"Body\":\"x\"}").unwrap_err();
        assert!(matches!(err, WorkerError::Decode(_)));
    }
}
