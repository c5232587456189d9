use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Time-ordered unique message identifier.
///
/// Every message carries one. For requests it doubles as the correlation id:
/// the peer echoes it back as the response's `request_id`.
///
/// Identifiers are UUID v7, so the creation time (unix milliseconds) can be
/// recovered from the id itself. That embedded timestamp is what TTL expiry
/// is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a new identifier stamped with the current time.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creation time embedded in the id, in milliseconds since the unix epoch.
    ///
    /// Returns `None` for identifiers that carry no timestamp (e.g. nil or
    /// random UUIDs).
    pub fn timestamp_millis(&self) -> Option<u64> {
        // ---
        let ts = self.0.get_timestamp()?;
        let (secs, nanos) = ts.to_unix();
        Some(secs * 1000 + u64::from(nanos) / 1_000_000)
    }

    /// True when the id embeds a positive creation timestamp.
    pub fn is_valid(&self) -> bool {
        matches!(self.timestamp_millis(), Some(ms) if ms > 0)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for MessageId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn test_generate_unique() {
        // ---
        let id1 = MessageId::generate();
        let id2 = MessageId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_timestamp_is_recent() {
        // ---
        let before = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        let id = MessageId::generate();
        let ts = id.timestamp_millis().expect("v7 ids carry a timestamp");

        assert!(ts >= before);
        assert!(ts - before < 1_000);
        assert!(id.is_valid());
    }

    #[test]
    fn test_ids_without_timestamp_are_invalid() {
        // ---
        assert!(!MessageId::from(Uuid::nil()).is_valid());

        let random: MessageId = "5d0bb0a5-1c43-4d5e-9b1e-2f3c4d5e6f70".parse().unwrap();
        assert_eq!(random.timestamp_millis(), None);
        assert!(!random.is_valid());
    }
}
