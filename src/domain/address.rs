// src/domain/address.rs

//! Entity addresses.
//!
//! An [`Address`] names either a software entity (resource `0`), one of its
//! RPC methods or one of its topics. Listener filters reuse the same type
//! with wildcard components.
//!
//! The textual form produced by `Display` is for logs only; wire
//! serialization of addresses is left to transports.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Authority wildcard, matches any authority.
pub const WILDCARD_AUTHORITY: &str = "*";
/// Entity id wildcard.
///
/// Reserved: an entity cannot use id `0xFFFF`. Such an address is always a
/// filter, so [`Address::is_rpc_method`] and [`Address::is_topic`] reject it.
pub const WILDCARD_ENTITY_ID: u32 = 0xFFFF;
/// Entity major version wildcard.
pub const WILDCARD_ENTITY_VERSION: u8 = 0xFF;
/// Resource id wildcard.
pub const WILDCARD_RESOURCE_ID: u16 = 0xFFFF;

/// Resource id that addresses the entity itself; responses are sent here.
pub const RESOURCE_ID_RESPONSE: u16 = 0;
/// Lowest resource id of an RPC method.
pub const RESOURCE_ID_MIN_METHOD: u16 = 0x0001;
/// Highest resource id of an RPC method.
pub const RESOURCE_ID_MAX_METHOD: u16 = 0x7FFF;
/// Lowest resource id of a topic.
pub const RESOURCE_ID_MIN_TOPIC: u16 = 0x8000;

/// Address of an entity, method or topic.
///
/// Addresses are cheap to clone and safe to share across threads.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub authority: String,
    pub entity_id: u32,
    pub entity_version_major: u8,
    pub resource_id: u16,
}

impl Address {
    pub fn new(
        authority: impl Into<String>,
        entity_id: u32,
        entity_version_major: u8,
        resource_id: u16,
    ) -> Self {
        // ---
        Self {
            authority: authority.into(),
            entity_id,
            entity_version_major,
            resource_id,
        }
    }

    /// Filter matching every address.
    pub fn any() -> Self {
        Self::new(
            WILDCARD_AUTHORITY,
            WILDCARD_ENTITY_ID,
            WILDCARD_ENTITY_VERSION,
            WILDCARD_RESOURCE_ID,
        )
    }

    /// The same entity at another resource.
    pub fn with_resource(&self, resource_id: u16) -> Self {
        Self {
            resource_id,
            ..self.clone()
        }
    }

    /// The entity itself (resource `0`), used as reply-to address.
    pub fn entity(&self) -> Self {
        self.with_resource(RESOURCE_ID_RESPONSE)
    }

    pub fn has_wildcard(&self) -> bool {
        // ---
        self.authority == WILDCARD_AUTHORITY
            || self.entity_id == WILDCARD_ENTITY_ID
            || self.entity_version_major == WILDCARD_ENTITY_VERSION
            || self.resource_id == WILDCARD_RESOURCE_ID
    }

    /// True for a concrete address of an RPC method.
    pub fn is_rpc_method(&self) -> bool {
        !self.has_wildcard()
            && (RESOURCE_ID_MIN_METHOD..=RESOURCE_ID_MAX_METHOD).contains(&self.resource_id)
    }

    /// True for a concrete topic address.
    pub fn is_topic(&self) -> bool {
        !self.has_wildcard() && self.resource_id >= RESOURCE_ID_MIN_TOPIC
    }

    /// True when authority, entity id and entity major version are equal;
    /// the resource component is ignored.
    pub fn is_same_entity(&self, other: &Address) -> bool {
        // ---
        self.authority == other.authority
            && self.entity_id == other.entity_id
            && self.entity_version_major == other.entity_version_major
    }

    /// Match `candidate` against `self` used as a filter.
    ///
    /// Each wildcard component of the filter matches anything; all other
    /// components must be equal.
    pub fn matches(&self, candidate: &Address) -> bool {
        // ---
        (self.authority == WILDCARD_AUTHORITY || self.authority == candidate.authority)
            && (self.entity_id == WILDCARD_ENTITY_ID || self.entity_id == candidate.entity_id)
            && (self.entity_version_major == WILDCARD_ENTITY_VERSION
                || self.entity_version_major == candidate.entity_version_major)
            && (self.resource_id == WILDCARD_RESOURCE_ID
                || self.resource_id == candidate.resource_id)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "//{}/{:X}/{:X}/{:X}",
            self.authority, self.entity_id, self.entity_version_major, self.resource_id
        )
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn service() -> Address {
        Address::new("vcu.local", 0x1234, 2, 0)
    }

    #[test]
    fn test_wildcard_filter_matches_everything() {
        // ---
        let any = Address::any();
        assert!(any.matches(&service()));
        assert!(any.matches(&service().with_resource(0x8001)));
        assert!(!service().matches(&any));
    }

    #[test]
    fn test_resource_wildcard() {
        // ---
        let filter = service().with_resource(WILDCARD_RESOURCE_ID);
        assert!(filter.matches(&service().with_resource(7)));
        assert!(!filter.matches(&Address::new("vcu.local", 0x1234, 3, 7)));
    }

    #[test]
    fn test_same_entity_ignores_resource() {
        // ---
        let method = service().with_resource(3);
        assert!(method.is_same_entity(&service()));
        assert!(!method.is_same_entity(&Address::new("other", 0x1234, 2, 3)));
        assert!(!method.is_same_entity(&Address::new("vcu.local", 0x1235, 2, 3)));
        assert!(!method.is_same_entity(&Address::new("vcu.local", 0x1234, 1, 3)));
    }

    #[test]
    fn test_resource_kinds() {
        // ---
        assert!(service().with_resource(1).is_rpc_method());
        assert!(!service().is_rpc_method());
        assert!(!service().with_resource(0x8000).is_rpc_method());
        assert!(service().with_resource(0x8000).is_topic());
        assert!(!Address::any().is_rpc_method());
    }

    #[test]
    fn test_reserved_entity_id_is_never_concrete() {
        // ---
        let reserved = Address::new("vcu.local", WILDCARD_ENTITY_ID, 2, 1);
        assert!(reserved.has_wildcard());
        assert!(!reserved.is_rpc_method());
        assert!(!reserved.with_resource(0x8001).is_topic());
        assert!(reserved.matches(&service().with_resource(1)));

        // ids above the wildcard are ordinary entities
        let wide = Address::new("vcu.local", 0x1_FFFF, 2, 1);
        assert!(wide.is_rpc_method());
        assert!(!wide.matches(&Address::new("vcu.local", 0xFFFF_FFFF, 2, 1)));
    }

    #[test]
    fn test_display() {
        // ---
        assert_eq!(service().with_resource(0x1A).to_string(), "//vcu.local/1234/2/1A");
    }
}
