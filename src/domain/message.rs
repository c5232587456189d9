// src/domain/message.rs

//! Message model.
//!
//! A [`Message`] is a set of [`MessageAttributes`] plus an opaque
//! [`Payload`]. Messages are immutable once sent; use
//! [`MessageBuilder`](crate::MessageBuilder) to assemble valid ones.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Address, Code, MessageId, Result};

/// Kind of a message; selects the validation rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Only seen on malformed input. Never valid.
    #[default]
    Unspecified,
    Publish,
    Request,
    Response,
    Notification,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        let name = match self {
            MessageType::Unspecified => "UNSPECIFIED",
            MessageType::Publish => "PUBLISH",
            MessageType::Request => "REQUEST",
            MessageType::Response => "RESPONSE",
            MessageType::Notification => "NOTIFICATION",
        };
        f.write_str(name)
    }
}

/// Ordered delivery priority, lowest first.
///
/// `Unspecified` exists for attributes decoded from the wire and is
/// rejected by validation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Unspecified,
    Low,
    Background,
    Standard,
    Streaming,
    Interactive,
    Realtime,
    NetworkControl,
}

/// Encoding tag carried next to the payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    #[default]
    Unspecified,
    Json,
    Raw,
    Text,
}

impl PayloadFormat {
    /// MIME-style content type, informational only.
    pub fn content_type(&self) -> &'static str {
        match self {
            PayloadFormat::Unspecified | PayloadFormat::Raw => "application/octet-stream",
            PayloadFormat::Json => "application/json",
            PayloadFormat::Text => "text/plain",
        }
    }
}

/// Opaque payload bytes plus a format tag.
///
/// The correlation engines never look inside; the helpers here are the
/// crate's payload codec.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub data: Bytes,
    pub format: PayloadFormat,
}

impl Payload {
    pub fn new(data: impl Into<Bytes>, format: PayloadFormat) -> Self {
        Self {
            data: data.into(),
            format,
        }
    }

    pub fn raw(data: impl Into<Bytes>) -> Self {
        Self::new(data, PayloadFormat::Raw)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text.into().into_bytes(), PayloadFormat::Text)
    }

    /// Pack a value as JSON.
    pub fn from_json<T: Serialize>(value: &T) -> Result<Self> {
        // ---
        let bytes = serde_json::to_vec(value)?;
        Ok(Self::new(bytes, PayloadFormat::Json))
    }

    /// Unpack a JSON payload.
    ///
    /// Returns `None` when the format tag is not JSON or the bytes do not
    /// decode to `T`.
    pub fn to_json<T: DeserializeOwned>(&self) -> Option<T> {
        // ---
        if self.format != PayloadFormat::Json {
            return None;
        }
        serde_json::from_slice(&self.data).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Metadata of a message.
///
/// Fields are optional where the wire may omit them; which ones must be
/// present depends on `message_type` and is enforced by
/// [`AttributesValidator`](crate::AttributesValidator).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageAttributes {
    pub id: Option<MessageId>,
    pub message_type: MessageType,
    pub source: Option<Address>,
    pub sink: Option<Address>,
    pub priority: Priority,
    /// Time-to-live in milliseconds.
    pub ttl: Option<u32>,
    /// Authorization token. Carried, never verified here.
    pub token: Option<String>,
    /// Id of the request a response answers.
    pub request_id: Option<MessageId>,
    /// In-band application-level status.
    pub comm_status: Option<Code>,
    /// Detail text accompanying `comm_status`.
    pub comm_message: Option<String>,
}

impl MessageAttributes {
    pub fn is_request(&self) -> bool {
        self.message_type == MessageType::Request
    }

    pub fn is_response(&self) -> bool {
        self.message_type == MessageType::Response
    }

    /// True when a non-OK `comm_status` is present.
    pub fn has_failure_status(&self) -> bool {
        matches!(self.comm_status, Some(code) if code != Code::Ok)
    }
}

/// A message: attributes plus payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub attributes: MessageAttributes,
    pub payload: Option<Payload>,
}

impl Message {
    pub fn id(&self) -> Option<&MessageId> {
        self.attributes.id.as_ref()
    }

    pub fn message_type(&self) -> MessageType {
        self.attributes.message_type
    }

    pub fn source(&self) -> Option<&Address> {
        self.attributes.source.as_ref()
    }

    pub fn sink(&self) -> Option<&Address> {
        self.attributes.sink.as_ref()
    }

    /// Payload, or an empty one if none was attached.
    pub fn payload_or_default(&self) -> Payload {
        self.payload.clone().unwrap_or_default()
    }
}
