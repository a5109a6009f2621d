//! Frame and acknowledgement types plus their JSON wire envelope.
//!
//! Outbound frames are encoded as
//!
//! ```text
//! {"frameId": 7, "data": "frame-7"}                  single client
//! {"clientId": 2, "frameId": 7, "data": "frame-7"}   group member
//! ```
//!
//! and the peer acknowledges with `{"type": "ack", "frameId": 7}`, optionally
//! carrying the `clientId` it is answering.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrandAckError};

/// Type alias for frame identifiers.
pub type FrameId = u64;

/// Type alias for client instance indices inside a group.
pub type ClientId = u32;

/// Value of the `type` field that marks an acknowledgement.
const ACK_TYPE: &str = "ack";

/// A unit of work sent to the peer.
///
/// Frames are immutable once created: retransmission sends the exact same
/// `id` and `payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "clientId", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
    #[serde(rename = "frameId")]
    pub id: FrameId,
    #[serde(rename = "data")]
    pub payload: String,
}

impl Frame {
    /// Create a frame with the default `frame-<id>` payload.
    pub fn new(id: FrameId, client_id: Option<ClientId>) -> Self {
        Self {
            client_id,
            id,
            payload: format!("frame-{id}"),
        }
    }

    /// Create a frame with an explicit payload.
    pub fn with_payload(
        id: FrameId,
        client_id: Option<ClientId>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            client_id,
            id,
            payload: payload.into(),
        }
    }

    /// Serialize to the outbound JSON envelope.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse an outbound envelope (used by peers and tests).
    pub fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// An acknowledgement received from the peer. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub frame_id: FrameId,
    pub client_id: Option<ClientId>,
}

impl Ack {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            client_id: None,
        }
    }

    pub fn for_client(frame_id: FrameId, client_id: ClientId) -> Self {
        Self {
            frame_id,
            client_id: Some(client_id),
        }
    }

    /// Serialize to the inbound JSON envelope (used by peers and tests).
    pub fn encode(&self) -> Result<String> {
        let envelope = Envelope {
            kind: ACK_TYPE.to_string(),
            frame_id: Some(self.frame_id),
            client_id: self.client_id,
        };
        Ok(serde_json::to_string(&envelope)?)
    }
}

/// Raw shape of every inbound message.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "frameId", default, skip_serializing_if = "Option::is_none")]
    frame_id: Option<FrameId>,
    #[serde(rename = "clientId", default, skip_serializing_if = "Option::is_none")]
    client_id: Option<ClientId>,
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Acknowledgement of a frame.
    Ack(Ack),
    /// A well-formed message of a type this client does not act on.
    Other(String),
}

impl Inbound {
    /// Decode a raw inbound text message.
    ///
    /// Fails with `MalformedMessage` if the text is not a JSON object with a
    /// string `type` field, or if an ack lacks its `frameId`.
    pub fn decode(raw: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(raw)?;
        if envelope.kind != ACK_TYPE {
            return Ok(Inbound::Other(envelope.kind));
        }
        let frame_id = envelope
            .frame_id
            .ok_or_else(|| StrandAckError::MalformedMessage("ack without frameId".into()))?;
        Ok(Inbound::Ack(Ack {
            frame_id,
            client_id: envelope.client_id,
        }))
    }
}
