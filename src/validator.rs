//! Message attribute validation.
//!
//! Each [`MessageType`] has a fixed rule set. All rules of a set are
//! evaluated and every failure is reported in one [`ValidationError`], so a
//! caller sees the complete list of problems at once.
//!
//! Validation is pure: no state, no clock, no I/O. TTL expiry lives here too
//! ([`is_expired`]) because it only depends on attributes and a timestamp.

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::{MessageAttributes, MessageType, Priority, RpcError};

/// Aggregated validation failure.
///
/// `message` is the comma-joined list of every failed check.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    fn from_failures(failures: Vec<String>) -> Self {
        Self {
            message: failures.join(", "),
        }
    }
}

impl From<ValidationError> for RpcError {
    fn from(err: ValidationError) -> Self {
        RpcError::InvalidArgument(err.message)
    }
}

/// Rule set for one message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributesValidator {
    Publish,
    Request,
    Response,
    Notification,
}

impl AttributesValidator {
    /// Select the rule set for a message type.
    ///
    /// # Errors
    ///
    /// `MessageType::Unspecified` has no rule set.
    pub fn for_type(message_type: MessageType) -> Result<Self, ValidationError> {
        // ---
        match message_type {
            MessageType::Publish => Ok(Self::Publish),
            MessageType::Request => Ok(Self::Request),
            MessageType::Response => Ok(Self::Response),
            MessageType::Notification => Ok(Self::Notification),
            MessageType::Unspecified => Err(ValidationError {
                message: "Unsupported message type: UNSPECIFIED".into(),
            }),
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Publish => MessageType::Publish,
            Self::Request => MessageType::Request,
            Self::Response => MessageType::Response,
            Self::Notification => MessageType::Notification,
        }
    }

    /// Run every rule of this set against `attrs`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing all failed checks.
    pub fn validate(&self, attrs: &MessageAttributes) -> Result<(), ValidationError> {
        // ---
        let mut failures = Vec::new();

        if attrs.message_type != self.message_type() {
            failures.push(format!(
                "Wrong message type [{}], expected [{}]",
                attrs.message_type,
                self.message_type()
            ));
        }

        check_common(attrs, &mut failures);

        match self {
            Self::Publish => {
                if attrs.sink.is_some() {
                    failures.push("Publish message must not have a sink".into());
                }
            }
            Self::Request => {
                if attrs.sink.is_none() {
                    failures.push("Missing sink (method address)".into());
                }
                match attrs.ttl {
                    None => failures.push("Missing TTL".into()),
                    Some(0) => failures.push("TTL must be greater than zero".into()),
                    Some(_) => {}
                }
            }
            Self::Response => {
                if attrs.sink.is_none() {
                    failures.push("Missing sink (reply-to address)".into());
                }
                if attrs.request_id.is_none() {
                    failures.push("Missing request id".into());
                }
            }
            Self::Notification => {
                if attrs.sink.is_none() {
                    failures.push("Missing sink".into());
                }
                if attrs.request_id.is_some() {
                    failures.push("Notification must not have a request id".into());
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::from_failures(failures))
        }
    }
}

fn check_common(attrs: &MessageAttributes, failures: &mut Vec<String>) {
    // ---
    match attrs.id {
        None => failures.push("Missing id".into()),
        Some(id) if !id.is_valid() => failures.push(format!("Invalid id [{id}]: no timestamp")),
        Some(_) => {}
    }

    if attrs.source.is_none() {
        failures.push("Missing source".into());
    }

    if attrs.priority == Priority::Unspecified {
        failures.push("Invalid priority".into());
    }
}

/// Validate attributes with the rule set matching their message type.
///
/// # Errors
///
/// Returns a [`ValidationError`] listing all failed checks.
pub fn validate(attrs: &MessageAttributes) -> Result<(), ValidationError> {
    AttributesValidator::for_type(attrs.message_type)?.validate(attrs)
}

/// True when the message outlived its TTL at `now_ms` (unix milliseconds).
///
/// Messages without a TTL, with a zero TTL, or without a timestamped id
/// never expire.
pub fn is_expired(attrs: &MessageAttributes, now_ms: u64) -> bool {
    // ---
    let ttl = match attrs.ttl {
        Some(ttl) if ttl > 0 => u64::from(ttl),
        _ => return false,
    };

    match attrs.id.as_ref().and_then(|id| id.timestamp_millis()) {
        Some(created) => now_ms.saturating_sub(created) > ttl,
        None => false,
    }
}

/// [`is_expired`] against the system clock.
pub fn is_expired_now(attrs: &MessageAttributes) -> bool {
    // ---
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    is_expired(attrs, now_ms)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{Address, MessageId};
    use uuid::Uuid;

    fn addr(resource: u16) -> Address {
        Address::new("ecu", 0x10, 1, resource)
    }

    fn base(message_type: MessageType) -> MessageAttributes {
        MessageAttributes {
            id: Some(MessageId::generate()),
            message_type,
            source: Some(addr(0)),
            priority: Priority::Interactive,
            ..Default::default()
        }
    }

    #[test]
    fn test_publish_rejects_sink() {
        // ---
        let mut attrs = base(MessageType::Publish);
        attrs.source = Some(addr(0x8001));
        assert!(validate(&attrs).is_ok());

        attrs.sink = Some(addr(0));
        let err = validate(&attrs).unwrap_err();
        assert_eq!(err.message, "Publish message must not have a sink");
    }

    #[test]
    fn test_request_requires_sink_and_ttl() {
        // ---
        let mut attrs = base(MessageType::Request);
        let err = validate(&attrs).unwrap_err();
        assert_eq!(err.message, "Missing sink (method address), Missing TTL");

        attrs.sink = Some(addr(3));
        attrs.ttl = Some(0);
        let err = validate(&attrs).unwrap_err();
        assert_eq!(err.message, "TTL must be greater than zero");

        attrs.ttl = Some(1000);
        assert!(validate(&attrs).is_ok());
    }

    #[test]
    fn test_response_requires_request_id() {
        // ---
        let mut attrs = base(MessageType::Response);
        attrs.sink = Some(addr(0));
        let err = validate(&attrs).unwrap_err();
        assert_eq!(err.message, "Missing request id");

        attrs.request_id = Some(MessageId::generate());
        assert!(validate(&attrs).is_ok());
    }

    #[test]
    fn test_notification_rules() {
        // ---
        let mut attrs = base(MessageType::Notification);
        attrs.request_id = Some(MessageId::generate());
        let err = validate(&attrs).unwrap_err();
        assert_eq!(
            err.message,
            "Missing sink, Notification must not have a request id"
        );

        attrs.sink = Some(addr(0));
        attrs.request_id = None;
        assert!(validate(&attrs).is_ok());
    }

    #[test]
    fn test_all_failures_are_reported() {
        // ---
        let attrs = MessageAttributes {
            message_type: MessageType::Request,
            id: Some(MessageId::from(Uuid::nil())),
            ..Default::default()
        };
        let err: RpcError = validate(&attrs).unwrap_err().into();

        let RpcError::InvalidArgument(message) = err else {
            panic!("expected InvalidArgument");
        };
        let parts: Vec<&str> = message.split(", ").collect();
        assert_eq!(parts.len(), 5, "{message}");
        assert!(parts[0].starts_with("Invalid id"));
        assert_eq!(parts[1], "Missing source");
        assert_eq!(parts[2], "Invalid priority");
    }

    #[test]
    fn test_missing_id() {
        // ---
        let mut attrs = base(MessageType::Publish);
        attrs.id = None;
        assert_eq!(validate(&attrs).unwrap_err().message, "Missing id");
    }

    #[test]
    fn test_unspecified_type_rejected() {
        // ---
        let attrs = base(MessageType::Unspecified);
        assert!(validate(&attrs).is_err());
    }

    #[test]
    fn test_explicit_rule_set_checks_type() {
        // ---
        let mut attrs = base(MessageType::Notification);
        attrs.sink = Some(addr(0));
        let err = AttributesValidator::Publish.validate(&attrs).unwrap_err();
        assert!(err.message.contains("Wrong message type [NOTIFICATION]"));
    }

    #[test]
    fn test_is_expired() {
        // ---
        let mut attrs = base(MessageType::Request);
        let created = attrs.id.unwrap().timestamp_millis().unwrap();

        // no ttl: never expires
        assert!(!is_expired(&attrs, created + 1_000_000));

        attrs.ttl = Some(0);
        assert!(!is_expired(&attrs, created + 1_000_000));

        attrs.ttl = Some(100);
        assert!(!is_expired(&attrs, created + 100));
        assert!(is_expired(&attrs, created + 101));

        // clock behind the id: not expired
        assert!(!is_expired(&attrs, created.saturating_sub(50)));
        assert!(!is_expired_now(&attrs));
    }

    #[test]
    fn test_is_expired_needs_timestamped_id() {
        // ---
        let mut attrs = base(MessageType::Request);
        attrs.ttl = Some(1);
        attrs.id = Some(MessageId::from(Uuid::nil()));
        assert!(!is_expired(&attrs, u64::MAX));
    }
}
